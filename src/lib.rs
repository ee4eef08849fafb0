pub mod config;
mod dataset;
mod error;
pub mod extract;
mod pipeline;
pub mod presets;
pub mod sink;
pub mod source;
mod types;
pub mod utils;

pub use dataset::Dataset;
pub use error::AcquisitionError;
pub use pipeline::*;

pub use config::{ApiKey, ConfigError};
pub use extract::{CompositeColumn, CsvExtract, ExtractError};
pub use sink::{
    ColumnSource, CsvFileSink, Sink, SinkError, TableColumn, TableSink, TableWriteMode,
};
pub use source::{
    Batch, Credential, FetchError, FetchOutcome, RangeEncoding, RangeFetcher, SkipReason,
    SourceDescriptor,
};

pub use types::instant::{parse_instant, IntoUtcDateTime};
pub use types::record::Record;
pub use types::schema::{Field, Schema, SchemaError};
pub use types::time_range::TimeRange;
pub use types::value::{FieldKind, Value};
