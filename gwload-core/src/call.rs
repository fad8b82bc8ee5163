use std::fmt;

use url::Url;

use crate::error::{Error, Result};

/// Kind of generation call issued against a gateway.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "snake_case")]
pub enum CallType {
    Llm,
    Image,
}

/// A remote gateway under test.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Gateway {
    name: String,
    base_url: Url,
}

impl Gateway {
    pub fn new(name: impl Into<String>, url: &str) -> Result<Self> {
        let base_url = Url::parse(url.trim()).map_err(|source| Error::InvalidGatewayUrl {
            url: url.to_string(),
            source,
        })?;
        if base_url.scheme() != "http" && base_url.scheme() != "https" {
            return Err(Error::UnsupportedGatewayScheme(url.to_string()));
        }

        Ok(Self {
            name: name.into(),
            base_url,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `{base}/{endpoint}` with exactly one slash between the two parts.
    pub fn endpoint_url(&self, endpoint: &str) -> String {
        let base = self.base_url.as_str().trim_end_matches('/');
        let endpoint = endpoint.trim_start_matches('/');
        format!("{base}/{endpoint}")
    }

    /// Resolve a url returned by the gateway.
    ///
    /// Absolute urls are kept as-is. Anything else, rooted or not, is placed under the gateway
    /// base the same way [`Gateway::endpoint_url`] places endpoints, so a base path prefix is kept.
    pub fn resolve(&self, reference: &str) -> std::result::Result<Url, url::ParseError> {
        let reference = reference.trim();
        match Url::parse(reference) {
            Ok(absolute) => Ok(absolute),
            Err(url::ParseError::RelativeUrlWithoutBase) if reference.starts_with("//") => {
                self.base_url.join(reference)
            }
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                Url::parse(&self.endpoint_url(reference))
            }
            Err(err) => Err(err),
        }
    }
}

impl fmt::Display for Gateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.base_url)
    }
}

/// Where one batch sends its requests.
#[derive(Debug, Clone)]
pub struct RequestTarget {
    pub gateway: Gateway,
    pub call_type: CallType,
    pub endpoint: String,
}

impl RequestTarget {
    pub fn url(&self) -> String {
        self.gateway.endpoint_url(&self.endpoint)
    }

    /// Short label used in log lines and file names, e.g. `gateway1_llm`.
    pub fn label(&self) -> String {
        format!("{}_{}", self.gateway.name(), self.call_type)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn endpoint_url_joins_with_single_slash() {
        let gw = Gateway::new("gateway1", "https://gw.example/api/").unwrap();
        assert_eq!(gw.endpoint_url("llm"), "https://gw.example/api/llm");
        assert_eq!(gw.endpoint_url("/text-to-image"), "https://gw.example/api/text-to-image");

        let gw = Gateway::new("gateway1", "http://127.0.0.1:8935").unwrap();
        assert_eq!(gw.endpoint_url("llm"), "http://127.0.0.1:8935/llm");
    }

    #[test]
    fn resolve_handles_relative_and_absolute_urls() {
        let gw = Gateway::new("gateway1", "http://127.0.0.1:8935").unwrap();
        assert_eq!(
            gw.resolve("/stream/img.png").unwrap().as_str(),
            "http://127.0.0.1:8935/stream/img.png"
        );
        assert_eq!(
            gw.resolve("https://cdn.example/img.png").unwrap().as_str(),
            "https://cdn.example/img.png"
        );
    }

    #[test]
    fn resolve_keeps_the_gateway_path_prefix() {
        for base in ["https://gw.example/api", "https://gw.example/api/"] {
            let gw = Gateway::new("gateway1", base).unwrap();
            assert_eq!(gw.endpoint_url("text-to-image"), "https://gw.example/api/text-to-image");
            assert_eq!(
                gw.resolve("stream/a.png").unwrap().as_str(),
                "https://gw.example/api/stream/a.png"
            );
            assert_eq!(
                gw.resolve("/stream/a.png").unwrap().as_str(),
                "https://gw.example/api/stream/a.png"
            );
        }

        let gw = Gateway::new("gateway1", "https://gw.example/api").unwrap();
        assert_eq!(
            gw.resolve("//cdn.example/a.png").unwrap().as_str(),
            "https://cdn.example/a.png"
        );
    }

    #[test]
    fn rejects_invalid_gateway_urls() {
        assert!(matches!(
            Gateway::new("gateway1", "not a url"),
            Err(Error::InvalidGatewayUrl { .. })
        ));
        assert!(matches!(
            Gateway::new("gateway1", "ftp://gw.example"),
            Err(Error::UnsupportedGatewayScheme(_))
        ));
    }

    #[test]
    fn call_type_round_trips_through_strings() {
        assert_eq!(CallType::Llm.to_string(), "llm");
        assert_eq!("image".parse::<CallType>().unwrap(), CallType::Image);
    }

    #[test]
    fn target_label_combines_gateway_and_call_type() {
        let target = RequestTarget {
            gateway: Gateway::new("gateway2", "http://gw2.example").unwrap(),
            call_type: CallType::Image,
            endpoint: "text-to-image".to_string(),
        };
        assert_eq!(target.label(), "gateway2_image");
        assert_eq!(target.url(), "http://gw2.example/text-to-image");
    }
}
