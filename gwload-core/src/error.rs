use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid gateway url `{url}`: {source}")]
    InvalidGatewayUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("gateway url must use http:// or https://: `{0}`")]
    UnsupportedGatewayScheme(String),

    #[error("failed to encode request payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("failed to open log file {}: {source}", path.display())]
    LogFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write log file {}: {source}", path.display())]
    LogWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("`concurrency` must be a positive integer")]
    InvalidConcurrency,
}
