use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReadingError {
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

    #[error("Observation feed for station '{station}' is truncated")]
    TruncatedFeed { station: String },

    #[error("Observation for station '{station}' has no usable timestamp")]
    MissingTimestamp { station: String },
}
