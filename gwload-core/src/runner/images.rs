use std::path::{Path, PathBuf};
use std::time::Duration;

use gwload_http::{HttpClient, HttpRequest, HttpResponse};

use crate::call::Gateway;
use crate::payload::ImageResponse;

#[derive(Debug, thiserror::Error)]
pub(crate) enum ImageError {
    #[error("image response is not valid json: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid image url `{url}`: {source}")]
    Url {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("image fetch failed: {0}")]
    Fetch(#[from] gwload_http::Error),

    #[error("image fetch returned http status {0}")]
    Status(u16),

    #[error("failed to write image {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Fetch every image referenced by a generation response and write it under `dir`.
///
/// Failures are logged and skipped; the return value is the number of images written.
pub(crate) async fn save_images(
    client: &HttpClient,
    gateway: &Gateway,
    response: &HttpResponse,
    dir: &Path,
    index: u64,
    timeout: Duration,
) -> usize {
    let parsed: ImageResponse = match serde_json::from_slice(&response.body) {
        Ok(v) => v,
        Err(err) => {
            tracing::warn!(request = index, gateway = gateway.name(), "{}", ImageError::from(err));
            return 0;
        }
    };

    if parsed.images.is_empty() {
        tracing::warn!(request = index, gateway = gateway.name(), "image response has no images");
        return 0;
    }

    let mut saved = 0usize;
    for (i, image) in parsed.images.iter().enumerate() {
        match save_one(client, gateway, &image.url, dir, index, i, timeout).await {
            Ok(path) => {
                tracing::debug!(request = index, path = %path.display(), "image saved");
                saved += 1;
            }
            Err(err) => {
                tracing::warn!(request = index, gateway = gateway.name(), image = i, "{err}");
            }
        }
    }
    saved
}

async fn save_one(
    client: &HttpClient,
    gateway: &Gateway,
    reference: &str,
    dir: &Path,
    index: u64,
    position: usize,
    timeout: Duration,
) -> Result<PathBuf, ImageError> {
    let url = gateway.resolve(reference).map_err(|source| ImageError::Url {
        url: reference.to_string(),
        source,
    })?;

    let res = client
        .request(HttpRequest::get(url.as_str()).with_timeout(timeout))
        .await?;
    if !res.is_success() {
        return Err(ImageError::Status(res.status));
    }

    let path = dir.join(format!(
        "{}_req{index}_{position}.{}",
        gateway.name(),
        image_extension(&url)
    ));

    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|source| ImageError::Write {
            path: dir.to_path_buf(),
            source,
        })?;
    tokio::fs::write(&path, &res.body)
        .await
        .map_err(|source| ImageError::Write {
            path: path.clone(),
            source,
        })?;

    Ok(path)
}

fn image_extension(url: &url::Url) -> &str {
    url.path_segments()
        .and_then(|mut segs| segs.next_back())
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or("png")
}
