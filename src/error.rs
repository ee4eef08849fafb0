use crate::config::ConfigError;
use crate::extract::ExtractError;
use crate::sink::error::SinkError;
use crate::source::error::FetchError;
use crate::types::schema::SchemaError;
use polars::error::PolarsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error("Failed to determine data directory")]
    DataDirResolution(#[source] std::io::Error),

    #[error("Failed to merge prior state with fetched batches")]
    Merge(#[from] PolarsError),
}
