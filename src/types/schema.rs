//! The explicit, ordered schema every batch and dataset is shaped by.

use crate::types::record::Record;
use crate::types::value::{FieldKind, Value};
use polars::prelude::*;
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("Schema has no fields")]
    Empty,

    #[error("Field '{0}' is declared more than once")]
    DuplicateField(String),

    #[error("Time field '{0}' is not declared in the schema")]
    UnknownTimeField(String),

    #[error("Time field '{name}' must be of kind timestamp, found {kind}")]
    TimeFieldNotTimestamp { name: String, kind: FieldKind },

    #[error("Dedup key is empty")]
    EmptyDedupKey,

    #[error("Dedup key field '{0}' is not declared in the schema")]
    UnknownKeyField(String),

    #[error("Dedup key field '{0}' is listed more than once")]
    DuplicateKeyField(String),
}

/// One named, typed field and the dotted path it is read from in a source entry.
///
/// Path segments index into objects by key and into arrays by position, so
/// `weather.0.main` reads `entry["weather"][0]["main"]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    name: String,
    kind: FieldKind,
    path: String,
}

impl Field {
    /// A field read from the entry key with the same name.
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        let name = name.into();
        Self {
            path: name.clone(),
            name,
            kind,
        }
    }

    /// Reads the field from a different (possibly nested) path.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// The path as a JSON pointer (`arrival.scheduledTime.utc` -> `/arrival/scheduledTime/utc`).
    pub(crate) fn json_pointer(&self) -> String {
        self.path
            .split('.')
            .map(|segment| format!("/{}", segment.replace('~', "~0").replace('/', "~1")))
            .collect()
    }

    pub(crate) fn dtype(&self) -> DataType {
        match self.kind {
            FieldKind::Timestamp => DataType::Datetime(TimeUnit::Milliseconds, None),
            FieldKind::Float => DataType::Float64,
            FieldKind::Int => DataType::Int64,
            FieldKind::Text | FieldKind::LocalTimestamp(_) => DataType::String,
        }
    }
}

/// Ordered typed fields, the designated time field and the dedup key.
///
/// Validated once on construction so a misconfigured pipeline fails before
/// any request is made.
///
/// # Examples
///
/// ```
/// use acquisition::{Field, FieldKind, Schema};
///
/// let schema = Schema::new(
///     vec![
///         Field::new("time_utc", FieldKind::Timestamp).with_path("dt_txt"),
///         Field::new("temperature", FieldKind::Float).with_path("main.temp"),
///     ],
///     "time_utc",
///     ["time_utc"],
/// )
/// .unwrap();
/// assert_eq!(schema.names(), vec!["time_utc", "temperature"]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    fields: Vec<Field>,
    time_index: usize,
    dedup_key: Vec<String>,
}

impl Schema {
    pub fn new<K, S>(fields: Vec<Field>, time_field: &str, dedup_key: K) -> Result<Self, SchemaError>
    where
        K: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if fields.is_empty() {
            return Err(SchemaError::Empty);
        }
        let mut seen = HashSet::new();
        for field in &fields {
            if !seen.insert(field.name.as_str()) {
                return Err(SchemaError::DuplicateField(field.name.clone()));
            }
        }

        let time_index = fields
            .iter()
            .position(|f| f.name == time_field)
            .ok_or_else(|| SchemaError::UnknownTimeField(time_field.to_string()))?;
        if fields[time_index].kind != FieldKind::Timestamp {
            return Err(SchemaError::TimeFieldNotTimestamp {
                name: time_field.to_string(),
                kind: fields[time_index].kind,
            });
        }

        let dedup_key: Vec<String> = dedup_key.into_iter().map(Into::into).collect();
        if dedup_key.is_empty() {
            return Err(SchemaError::EmptyDedupKey);
        }
        let mut seen_key = HashSet::new();
        for name in &dedup_key {
            if !seen.contains(name.as_str()) {
                return Err(SchemaError::UnknownKeyField(name.clone()));
            }
            if !seen_key.insert(name.as_str()) {
                return Err(SchemaError::DuplicateKeyField(name.clone()));
            }
        }

        Ok(Self {
            fields,
            time_index,
            dedup_key,
        })
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn time_field(&self) -> &Field {
        &self.fields[self.time_index]
    }

    pub fn time_index(&self) -> usize {
        self.time_index
    }

    pub fn dedup_key(&self) -> &[String] {
        &self.dedup_key
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    /// Drops records without a time value; returns the survivors and the
    /// number dropped.
    pub fn retain_timed(&self, records: Vec<Record>) -> (Vec<Record>, usize) {
        let before = records.len();
        let kept: Vec<Record> = records
            .into_iter()
            .filter(|record| record.get(self.time_index).and_then(Value::as_timestamp).is_some())
            .collect();
        let dropped = before - kept.len();
        (kept, dropped)
    }

    /// Builds a frame whose columns are exactly the schema fields, in order,
    /// with the schema's dtypes.
    pub fn frame_from_records(&self, records: &[Record]) -> PolarsResult<DataFrame> {
        let columns = self
            .fields
            .iter()
            .enumerate()
            .map(|(idx, field)| build_column(field, idx, records))
            .collect::<PolarsResult<Vec<Column>>>()?;
        DataFrame::new(columns)
    }

    pub fn empty_frame(&self) -> PolarsResult<DataFrame> {
        self.frame_from_records(&[])
    }

    /// Re-parses a frame of text cells (a CSV read without type inference)
    /// into records. Schema fields missing from the frame become null.
    pub fn records_from_text_frame(&self, frame: &DataFrame) -> PolarsResult<Vec<Record>> {
        let height = frame.height();
        let mut rows: Vec<Vec<Value>> = (0..height)
            .map(|_| Vec::with_capacity(self.fields.len()))
            .collect();

        for field in &self.fields {
            match frame.column(&field.name) {
                Ok(column) => {
                    let as_text = column.cast(&DataType::String)?;
                    let cells = as_text.str()?;
                    for (row, cell) in rows.iter_mut().zip(cells.into_iter()) {
                        row.push(cell.map_or(Value::Null, |s| Value::from_text(field.kind, s)));
                    }
                }
                Err(_) => rows.iter_mut().for_each(|row| row.push(Value::Null)),
            }
        }

        Ok(rows.into_iter().map(Record::new).collect())
    }

    /// Reads every row of one of our frames back into records.
    pub fn records_from_frame(&self, frame: &DataFrame) -> PolarsResult<Vec<Record>> {
        let columns = self
            .fields
            .iter()
            .map(|field| frame.column(&field.name))
            .collect::<PolarsResult<Vec<&Column>>>()?;
        (0..frame.height())
            .map(|row| {
                columns
                    .iter()
                    .map(|column| column.get(row).map(Value::from_any_value))
                    .collect::<PolarsResult<Vec<Value>>>()
                    .map(Record::new)
            })
            .collect()
    }
}

fn build_column(field: &Field, idx: usize, records: &[Record]) -> PolarsResult<Column> {
    let cell = |record: &Record| record.get(idx).cloned().unwrap_or(Value::Null);
    let name: PlSmallStr = field.name.as_str().into();

    let series = match field.kind {
        FieldKind::Timestamp => {
            let millis: Vec<Option<i64>> = records
                .iter()
                .map(|r| cell(r).as_timestamp().map(|ts| ts.timestamp_millis()))
                .collect();
            Series::new(name, millis).cast(&field.dtype())?
        }
        FieldKind::Float => {
            let values: Vec<Option<f64>> = records.iter().map(|r| cell(r).as_f64()).collect();
            Series::new(name, values)
        }
        FieldKind::Int => {
            let values: Vec<Option<i64>> = records
                .iter()
                .map(|r| match cell(r) {
                    Value::Int(v) => Some(v),
                    _ => None,
                })
                .collect();
            Series::new(name, values)
        }
        FieldKind::Text | FieldKind::LocalTimestamp(_) => {
            let values: Vec<Option<String>> = records
                .iter()
                .map(|r| match cell(r) {
                    Value::Null => None,
                    other => Some(other.to_string()),
                })
                .collect();
            Series::new(name, values)
        }
    };
    Ok(Column::from(series))
}
