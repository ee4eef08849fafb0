use polars::error::PolarsError;
use thiserror::Error;

/// Fetch problems that abort the run. Everything a remote server can do
/// wrong is a [`crate::SkipReason`] instead.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Failed to build HTTP client")]
    ClientBuild(#[source] reqwest::Error),

    #[error("Request to {url} could not be built")]
    InvalidRequest {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to build a batch frame for range {range}")]
    Frame {
        range: String,
        #[source]
        source: PolarsError,
    },
}

/// Why a sub-range contributed no batch. Not fatal: the run continues with
/// the next sub-range.
#[derive(Debug, Error)]
pub enum SkipReason {
    #[error("Network request failed for {url}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP {status} from {url}: {}", message.as_deref().unwrap_or("unknown API error"))]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
        message: Option<String>,
    },

    #[error("Response body from {url} is not valid JSON")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}
