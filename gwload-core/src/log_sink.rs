use std::path::{Path, PathBuf};

use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt as _;
use tokio::sync::Mutex;

use crate::error::{Error, Result};

/// Append-only outcome log shared by the invocations of one batch.
///
/// Each append holds the lock across a single `write_all` + `flush`, so concurrent writers never
/// interleave partial lines and a line is on disk before the call returns.
#[derive(Debug)]
pub struct LogSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl LogSink {
    /// Open `path` for appending, creating it and its parent directories if needed.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| Error::LogFile {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|source| Error::LogFile {
                path: path.clone(),
                source,
            })?;

        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn append_line(&self, line: &str) -> Result<()> {
        let mut buf = String::with_capacity(line.len() + 1);
        buf.push_str(line.trim_end_matches('\n'));
        buf.push('\n');
        self.write(buf.as_bytes()).await
    }

    /// Append a multi-line block as one write.
    pub async fn append_block(&self, block: &str) -> Result<()> {
        let mut buf = String::with_capacity(block.len() + 1);
        buf.push_str(block);
        if !buf.ends_with('\n') {
            buf.push('\n');
        }
        self.write(buf.as_bytes()).await
    }

    async fn write(&self, bytes: &[u8]) -> Result<()> {
        let mut file = self.file.lock().await;
        file.write_all(bytes).await.map_err(|source| self.write_error(source))?;
        file.flush().await.map_err(|source| self.write_error(source))
    }

    fn write_error(&self, source: std::io::Error) -> Error {
        Error::LogWrite {
            path: self.path.clone(),
            source,
        }
    }
}
