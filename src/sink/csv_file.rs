use crate::sink::error::SinkError;
use crate::types::schema::Schema;
use crate::utils::ensure_dir_exists;
use bon::Builder;
use log::{info, warn};
use polars::prelude::*;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::{fs, task};

/// How timestamps are written, so that reloading parses them back exactly.
const CSV_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// A delimited text file holding the whole dataset.
///
/// Loading re-parses every schema column from text; saving rewrites the
/// file atomically (temporary file in the same directory, then rename).
#[derive(Debug, Clone, Builder)]
pub struct CsvFileSink {
    #[builder(into)]
    path: PathBuf,
    #[builder(default = b',')]
    separator: u8,
    /// Prefix the file with a UTF-8 byte order mark, which spreadsheet
    /// tools use to detect the encoding.
    #[builder(default = false)]
    include_bom: bool,
}

impl CsvFileSink {
    /// A comma-separated sink without byte order mark.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            separator: b',',
            include_bom: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the previously persisted dataset, shaped by `schema`.
    ///
    /// Returns `None` when the file does not exist (or is empty). Rows whose
    /// time field cannot be re-parsed are dropped.
    pub async fn load(&self, schema: &Schema) -> Result<Option<DataFrame>, SinkError> {
        let metadata = match fs::metadata(&self.path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No prior dataset at {}", self.path.display());
                return Ok(None);
            }
            Err(e) => return Err(SinkError::Metadata(self.path.clone(), e)),
        };
        if metadata.len() == 0 {
            return Ok(None);
        }

        let path = self.path.clone();
        let separator = self.separator;
        let schema = schema.clone();
        task::spawn_blocking(move || {
            // Read every column as text; types are restored from the schema.
            let text_frame = CsvReadOptions::default()
                .with_has_header(true)
                .with_infer_schema_length(Some(0))
                .map_parse_options(|opts| opts.with_separator(separator))
                .try_into_reader_with_file_path(Some(path.clone()))
                .map_err(|e| SinkError::CsvRead(path.clone(), e))?
                .finish()
                .map_err(|e| SinkError::CsvRead(path.clone(), e))?;

            let records = schema
                .records_from_text_frame(&text_frame)
                .map_err(|e| SinkError::CsvReparse(path.clone(), e))?;
            let (records, dropped) = schema.retain_timed(records);
            if dropped > 0 {
                warn!(
                    "Dropped {} rows of {} without a valid '{}'",
                    dropped,
                    path.display(),
                    schema.time_field().name()
                );
            }
            info!("Loaded {} prior rows from {}", records.len(), path.display());

            schema
                .frame_from_records(&records)
                .map(Some)
                .map_err(|e| SinkError::CsvReparse(path, e))
        })
        .await?
    }

    /// Overwrites the file with `frame`. Returns the number of rows written.
    pub async fn write(&self, frame: &DataFrame) -> Result<usize, SinkError> {
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        ensure_dir_exists(&parent)
            .await
            .map_err(|e| SinkError::DirCreation(self.path.clone(), e))?;

        let path = self.path.clone();
        let separator = self.separator;
        let include_bom = self.include_bom;
        let mut frame = frame.clone();
        task::spawn_blocking(move || {
            let mut temp_file = NamedTempFile::new_in(&parent)
                .map_err(|e| SinkError::CsvWriteIo(path.clone(), e))?;
            CsvWriter::new(temp_file.as_file_mut())
                .include_header(true)
                .include_bom(include_bom)
                .with_separator(separator)
                .with_datetime_format(Some(CSV_DATETIME_FORMAT.to_string()))
                .finish(&mut frame)
                .map_err(|e| SinkError::CsvWritePolars(path.clone(), e))?;
            temp_file
                .persist(&path)
                .map_err(|e| SinkError::CsvWriteIo(path.clone(), e.error))?;
            Ok::<usize, SinkError>(frame.height())
        })
        .await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::record::Record;
    use crate::types::schema::Field;
    use crate::types::value::{FieldKind, Value};
    use chrono::{TimeZone, Utc};

    fn schema() -> Schema {
        Schema::new(
            vec![
                Field::new("time_utc", FieldKind::Timestamp),
                Field::new("time_berlin", FieldKind::LocalTimestamp(chrono_tz::Europe::Berlin))
                    .with_path("time_utc"),
                Field::new("temperature", FieldKind::Float),
                Field::new("humidity", FieldKind::Int),
                Field::new("weather_status", FieldKind::Text),
            ],
            "time_utc",
            ["time_utc"],
        )
        .unwrap()
    }

    fn record(hour: u32, temp: Option<f64>) -> Record {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, hour, 0, 0).unwrap();
        Record::new(vec![
            Value::Timestamp(ts),
            Value::Text(
                ts.with_timezone(&chrono_tz::Europe::Berlin)
                    .format("%Y-%m-%d %H:%M:%S%:z")
                    .to_string(),
            ),
            temp.map_or(Value::Null, Value::Float),
            Value::Int(60),
            Value::Text("Clear, sunny".into()),
        ])
    }

    #[tokio::test]
    async fn test_missing_file_loads_as_none() -> Result<(), SinkError> {
        let tmp = tempfile::tempdir().map_err(|e| SinkError::Metadata(PathBuf::new(), e))?;
        let sink = CsvFileSink::new(tmp.path().join("nothing.csv"));
        assert!(sink.load(&schema()).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_write_then_load_restores_types() -> Result<(), Box<dyn std::error::Error>> {
        let tmp = tempfile::tempdir()?;
        let sink = CsvFileSink::builder()
            .path(tmp.path().join("weather").join("berlin.csv"))
            .include_bom(true)
            .build();
        let schema = schema();
        let records = vec![record(6, Some(12.5)), record(9, None)];
        let frame = schema.frame_from_records(&records)?;

        let written = sink.write(&frame).await?;
        assert_eq!(written, 2);
        assert!(sink.path().exists());

        let loaded = sink.load(&schema).await?.expect("file was written");
        assert_eq!(loaded.schema(), frame.schema());
        assert_eq!(schema.records_from_frame(&loaded)?, records);
        Ok(())
    }

    #[tokio::test]
    async fn test_load_reparses_foreign_text_and_drops_untimed_rows() -> Result<(), Box<dyn std::error::Error>> {
        let tmp = tempfile::tempdir()?;
        let path = tmp.path().join("legacy.csv");
        std::fs::write(
            &path,
            "time_utc,temperature,extra\n\
             2024-05-01 06:00:00+00:00,11.0,x\n\
             ,12.0,y\n\
             2024-05-01 09:00:00,n/a,z\n",
        )?;

        let schema = schema();
        let loaded = CsvFileSink::new(&path).load(&schema).await?.expect("file exists");
        assert_eq!(loaded.height(), 2);
        assert_eq!(loaded.get_column_names().len(), 5);
        let records = schema.records_from_frame(&loaded)?;
        assert_eq!(records[0].field(&schema, "temperature"), Some(&Value::Float(11.0)));
        assert_eq!(records[1].field(&schema, "temperature"), Some(&Value::Null));
        assert_eq!(records[1].field(&schema, "humidity"), Some(&Value::Null));
        Ok(())
    }

    #[tokio::test]
    async fn test_semicolon_separator() -> Result<(), Box<dyn std::error::Error>> {
        let tmp = tempfile::tempdir()?;
        let sink = CsvFileSink::builder()
            .path(tmp.path().join("semi.csv"))
            .separator(b';')
            .build();
        let schema = schema();
        let frame = schema.frame_from_records(&[record(6, Some(1.0))])?;
        sink.write(&frame).await?;

        let text = std::fs::read_to_string(sink.path())?;
        assert!(text.starts_with("time_utc;time_berlin;temperature"));
        assert_eq!(sink.load(&schema).await?.map(|f| f.height()), Some(1));
        Ok(())
    }
}
