use polars::error::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Failed to read metadata for '{0}'")]
    Metadata(PathBuf, #[source] std::io::Error),

    #[error("Failed to create directory for '{0}'")]
    DirCreation(PathBuf, #[source] std::io::Error),

    #[error("Failed to read CSV file '{0}'")]
    CsvRead(PathBuf, #[source] PolarsError),

    #[error("Failed to re-parse columns of CSV file '{0}'")]
    CsvReparse(PathBuf, #[source] PolarsError),

    // Errors during CSV writing (inside blocking task)
    #[error("I/O error writing CSV file '{0}'")]
    CsvWriteIo(PathBuf, #[source] std::io::Error),
    #[error("Encoding error writing CSV file '{0}'")]
    CsvWritePolars(PathBuf, #[source] PolarsError),

    #[error("Failed to open database '{0}'")]
    DatabaseOpen(PathBuf, #[source] rusqlite::Error),

    #[error("Database operation on table '{table}' failed")]
    Database {
        table: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Table '{0}' does not exist")]
    MissingTable(String),

    #[error("Table '{table}' is missing columns: {}", columns.join(", "))]
    MissingTableColumns { table: String, columns: Vec<String> },

    #[error("Column '{column}' reads field '{field}', which the data does not have")]
    UnknownField { column: String, field: String },

    #[error("Key column '{0}' is not one of the mapped table columns")]
    UnknownKeyColumn(String),

    #[error("'{0}' is not a valid SQL identifier")]
    InvalidIdentifier(String),

    #[error("Table sink for '{0}' maps no columns")]
    NoColumns(String),

    #[error("Failed reading rows from the dataset frame")]
    Frame(#[source] PolarsError),

    #[error("Background task failed to complete")]
    TaskJoin(#[from] tokio::task::JoinError),
}
