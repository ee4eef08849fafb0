use crate::sink::error::SinkError;
use crate::types::value::Value;
use bon::Builder;
use log::info;
use polars::prelude::{Column, DataFrame};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection, OpenFlags};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::task;

/// Rendering used for timestamps written into table columns.
const TABLE_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Where the value of one table column comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnSource {
    /// A column of the dataset.
    Field(String),
    /// The same text for every row.
    Constant(String),
    /// Always null.
    Null,
    /// The first whitespace-separated word of a text field, cut to
    /// `max_chars` characters (`"LH 123"` with 3 gives `"LH"`).
    FirstWordPrefix { field: String, max_chars: usize },
}

/// One column of the target table and its value source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableColumn {
    name: String,
    source: ColumnSource,
}

impl TableColumn {
    pub fn new(name: impl Into<String>, source: ColumnSource) -> Self {
        Self {
            name: name.into(),
            source,
        }
    }

    pub fn field(name: impl Into<String>, field: impl Into<String>) -> Self {
        Self::new(name, ColumnSource::Field(field.into()))
    }

    pub fn constant(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(name, ColumnSource::Constant(value.into()))
    }

    pub fn null(name: impl Into<String>) -> Self {
        Self::new(name, ColumnSource::Null)
    }

    pub fn first_word_prefix(
        name: impl Into<String>,
        field: impl Into<String>,
        max_chars: usize,
    ) -> Self {
        Self::new(
            name,
            ColumnSource::FirstWordPrefix {
                field: field.into(),
                max_chars,
            },
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &ColumnSource {
        &self.source
    }

    fn source_field(&self) -> Option<&str> {
        match &self.source {
            ColumnSource::Field(field) | ColumnSource::FirstWordPrefix { field, .. } => {
                Some(field)
            }
            ColumnSource::Constant(_) | ColumnSource::Null => None,
        }
    }
}

/// How rows reach the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableWriteMode {
    /// Insert every row. Repeated runs insert duplicates.
    Append,
    /// Delete rows whose key columns equal those of an incoming row, then
    /// insert. Makes repeated runs idempotent on the key.
    ReplaceMatchingKeys(Vec<String>),
}

/// Rows inserted into an existing table of a SQLite database.
///
/// The table and its columns must already exist; this sink never creates
/// or alters them.
#[derive(Debug, Clone, Builder)]
pub struct TableSink {
    #[builder(into)]
    database: PathBuf,
    #[builder(into)]
    table: String,
    columns: Vec<TableColumn>,
    mode: TableWriteMode,
}

impl TableSink {
    pub fn database(&self) -> &Path {
        &self.database
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn columns(&self) -> &[TableColumn] {
        &self.columns
    }

    pub fn mode(&self) -> &TableWriteMode {
        &self.mode
    }

    /// Checks the mapping against the names of the data it will receive.
    /// Does not touch the database.
    pub fn validate(&self, available: &[&str]) -> Result<(), SinkError> {
        if self.columns.is_empty() {
            return Err(SinkError::NoColumns(self.table.clone()));
        }
        check_identifier(&self.table)?;

        let mut mapped = HashSet::new();
        for column in &self.columns {
            check_identifier(&column.name)?;
            mapped.insert(column.name.as_str());
            if let Some(field) = column.source_field() {
                if !available.contains(&field) {
                    return Err(SinkError::UnknownField {
                        column: column.name.clone(),
                        field: field.to_string(),
                    });
                }
            }
        }

        if let TableWriteMode::ReplaceMatchingKeys(keys) = &self.mode {
            if keys.is_empty() {
                return Err(SinkError::UnknownKeyColumn(String::new()));
            }
            if let Some(key) = keys.iter().find(|k| !mapped.contains(k.as_str())) {
                return Err(SinkError::UnknownKeyColumn(key.clone()));
            }
        }
        Ok(())
    }

    /// Writes every row of `frame` in one transaction. Returns the number
    /// of rows inserted.
    pub async fn insert_frame(&self, frame: &DataFrame) -> Result<usize, SinkError> {
        let names: Vec<&str> = frame.get_column_names().iter().map(|n| n.as_str()).collect();
        self.validate(&names)?;

        let rows = self.rows(frame)?;
        let sink = self.clone();
        task::spawn_blocking(move || sink.write_rows(&rows)).await?
    }

    /// Evaluates the column mapping for every row of the frame.
    fn rows(&self, frame: &DataFrame) -> Result<Vec<Vec<SqlValue>>, SinkError> {
        let sources: Vec<Option<&Column>> = self
            .columns
            .iter()
            .map(|column| column.source_field().map(|f| frame.column(f)).transpose())
            .collect::<Result<_, _>>()
            .map_err(SinkError::Frame)?;

        (0..frame.height())
            .map(|row| {
                self.columns
                    .iter()
                    .zip(&sources)
                    .map(|(column, source)| {
                        let cell = match source {
                            Some(series) => {
                                Value::from_any_value(series.get(row).map_err(SinkError::Frame)?)
                            }
                            None => Value::Null,
                        };
                        Ok::<SqlValue, SinkError>(column_value(&column.source, cell))
                    })
                    .collect()
            })
            .collect()
    }

    fn write_rows(&self, rows: &[Vec<SqlValue>]) -> Result<usize, SinkError> {
        let db_err = |source: rusqlite::Error| SinkError::Database {
            table: self.table.clone(),
            source,
        };

        let mut conn = Connection::open_with_flags(&self.database, OpenFlags::SQLITE_OPEN_READ_WRITE)
            .map_err(|e| SinkError::DatabaseOpen(self.database.clone(), e))?;
        self.check_table(&conn)?;

        let column_list = self
            .columns
            .iter()
            .map(|c| quote(&c.name))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = (1..=self.columns.len())
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let insert_sql = format!(
            "INSERT INTO {} ({column_list}) VALUES ({placeholders})",
            quote(&self.table)
        );

        let tx = conn.transaction().map_err(db_err)?;
        let mut replaced = 0;
        {
            let mut insert = tx.prepare(&insert_sql).map_err(db_err)?;
            match &self.mode {
                TableWriteMode::Append => {
                    for row in rows {
                        insert.execute(params_from_iter(row.iter())).map_err(db_err)?;
                    }
                }
                TableWriteMode::ReplaceMatchingKeys(keys) => {
                    let key_positions: Vec<usize> = keys
                        .iter()
                        .filter_map(|k| self.columns.iter().position(|c| &c.name == k))
                        .collect();
                    let condition = keys
                        .iter()
                        .enumerate()
                        .map(|(i, k)| format!("{} IS ?{}", quote(k), i + 1))
                        .collect::<Vec<_>>()
                        .join(" AND ");
                    let mut delete = tx
                        .prepare(&format!("DELETE FROM {} WHERE {condition}", quote(&self.table)))
                        .map_err(db_err)?;
                    for row in rows {
                        let key_values = key_positions.iter().map(|&pos| &row[pos]);
                        replaced += delete.execute(params_from_iter(key_values)).map_err(db_err)?;
                        insert.execute(params_from_iter(row.iter())).map_err(db_err)?;
                    }
                }
            }
        }
        tx.commit().map_err(db_err)?;

        info!(
            "Inserted {} rows into table '{}' ({} replaced)",
            rows.len(),
            self.table,
            replaced
        );
        Ok(rows.len())
    }

    /// Fails unless the table exists with every mapped column.
    fn check_table(&self, conn: &Connection) -> Result<(), SinkError> {
        let db_err = |source: rusqlite::Error| SinkError::Database {
            table: self.table.clone(),
            source,
        };
        let mut stmt = conn
            .prepare(&format!("PRAGMA table_info({})", quote(&self.table)))
            .map_err(db_err)?;
        let existing = stmt
            .query_map([], |row| row.get::<_, String>(1))
            .map_err(db_err)?
            .collect::<Result<HashSet<String>, _>>()
            .map_err(db_err)?;

        if existing.is_empty() {
            return Err(SinkError::MissingTable(self.table.clone()));
        }
        let missing: Vec<String> = self
            .columns
            .iter()
            .filter(|c| !existing.contains(&c.name))
            .map(|c| c.name.clone())
            .collect();
        if !missing.is_empty() {
            return Err(SinkError::MissingTableColumns {
                table: self.table.clone(),
                columns: missing,
            });
        }
        Ok(())
    }
}

fn column_value(source: &ColumnSource, cell: Value) -> SqlValue {
    match source {
        ColumnSource::Constant(text) => SqlValue::Text(text.clone()),
        ColumnSource::Null => SqlValue::Null,
        ColumnSource::Field(_) => to_sql(cell),
        ColumnSource::FirstWordPrefix { max_chars, .. } => cell
            .as_str()
            .and_then(|text| text.split_whitespace().next())
            .map_or(SqlValue::Null, |word| {
                SqlValue::Text(word.chars().take(*max_chars).collect())
            }),
    }
}

fn to_sql(value: Value) -> SqlValue {
    match value {
        Value::Timestamp(ts) => SqlValue::Text(ts.format(TABLE_DATETIME_FORMAT).to_string()),
        Value::Float(v) => SqlValue::Real(v),
        Value::Int(v) => SqlValue::Integer(v),
        Value::Text(s) => SqlValue::Text(s),
        Value::Null => SqlValue::Null,
    }
}

fn check_identifier(name: &str) -> Result<(), SinkError> {
    let mut chars = name.chars();
    let valid = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(SinkError::InvalidIdentifier(name.to_string()))
    }
}

fn quote(identifier: &str) -> String {
    format!("\"{identifier}\"")
}
