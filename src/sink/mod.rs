pub mod csv_file;
pub mod error;
pub mod table;

pub use csv_file::CsvFileSink;
pub use error::SinkError;
pub use table::{ColumnSource, TableColumn, TableSink, TableWriteMode};

use crate::dataset::Dataset;
use crate::types::schema::Schema;
use polars::prelude::DataFrame;
use std::fmt;

/// Where a pipeline keeps its dataset between runs.
#[derive(Debug, Clone)]
pub enum Sink {
    /// The whole dataset, rewritten on every run.
    CsvFile(CsvFileSink),
    /// Rows added to an existing table.
    Table(TableSink),
}

impl Sink {
    /// Fails if the sink cannot hold data shaped by `schema`.
    pub fn validate(&self, schema: &Schema) -> Result<(), SinkError> {
        match self {
            Sink::CsvFile(_) => Ok(()),
            Sink::Table(table) => table.validate(&schema.names()),
        }
    }

    /// Previously persisted state. Tables are never read back, so repeated
    /// runs against a table rely on its [`TableWriteMode`] for deduplication.
    pub async fn load_prior(&self, schema: &Schema) -> Result<Option<DataFrame>, SinkError> {
        match self {
            Sink::CsvFile(file) => file.load(schema).await,
            Sink::Table(_) => Ok(None),
        }
    }

    /// Writes the dataset. Returns the number of rows written.
    pub async fn persist(&self, dataset: &Dataset) -> Result<usize, SinkError> {
        match self {
            Sink::CsvFile(file) => file.write(dataset.frame()).await,
            Sink::Table(table) => table.insert_frame(dataset.frame()).await,
        }
    }
}

impl fmt::Display for Sink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sink::CsvFile(file) => write!(f, "file {}", file.path().display()),
            Sink::Table(table) => {
                write!(f, "table '{}' in {}", table.table(), table.database().display())
            }
        }
    }
}

impl From<CsvFileSink> for Sink {
    fn from(sink: CsvFileSink) -> Self {
        Sink::CsvFile(sink)
    }
}

impl From<TableSink> for Sink {
    fn from(sink: TableSink) -> Self {
        Sink::Table(sink)
    }
}
