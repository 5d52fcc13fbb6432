use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Network request failed for {0}")]
    NetworkRequest(String, #[source] reqwest::Error),

    #[error("HTTP request failed for {url} with status {status}")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to read response body from {0}")]
    BodyRead(String, #[source] reqwest::Error),

    #[error("Failed to parse station feed XML")]
    XmlParse(#[from] quick_xml::DeError),

    #[error("Failed to read registry snapshot '{0}'")]
    SnapshotRead(PathBuf, #[source] std::io::Error),

    #[error("Failed to write registry snapshot '{0}'")]
    SnapshotWrite(PathBuf, #[source] std::io::Error),

    #[error("Failed to decode registry snapshot '{0}'")]
    SnapshotDecode(PathBuf, #[source] Box<bincode::error::DecodeError>),

    #[error("Failed to encode registry snapshot")]
    SnapshotEncode(#[source] Box<bincode::error::EncodeError>),

    #[error("Background task failed to complete")]
    TaskJoin(#[from] tokio::task::JoinError),
}
