//! Static CSV extracts: a reference file filtered down to a few rows and
//! reshaped for a table, e.g. one city out of a world cities list.

use bon::Builder;
use log::info;
use polars::prelude::*;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::task;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Failed to read CSV file '{0}'")]
    Read(PathBuf, #[source] PolarsError),

    #[error("Column '{column}' not found in '{path}'")]
    UnknownColumn { path: PathBuf, column: String },

    #[error("Failed to reshape rows of '{0}'")]
    Transform(PathBuf, #[source] PolarsError),

    #[error("Background task failed to complete")]
    TaskJoin(#[from] tokio::task::JoinError),
}

/// A column built by joining other columns' text with a separator.
///
/// `city_ascii` + `iso2` joined with `,` gives `Berlin,DE`. The result is
/// null when any part is null.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositeColumn {
    name: String,
    parts: Vec<String>,
    separator: String,
}

impl CompositeColumn {
    pub fn new<P, S>(name: impl Into<String>, parts: P, separator: impl Into<String>) -> Self
    where
        P: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            parts: parts.into_iter().map(Into::into).collect(),
            separator: separator.into(),
        }
    }

    fn column(&self, frame: &DataFrame) -> PolarsResult<Series> {
        let parts = self
            .parts
            .iter()
            .map(|part| frame.column(part)?.cast(&DataType::String))
            .collect::<PolarsResult<Vec<Column>>>()?;
        let texts = parts
            .iter()
            .map(|part| part.str())
            .collect::<PolarsResult<Vec<&StringChunked>>>()?;

        let joined: Vec<Option<String>> = (0..frame.height())
            .map(|row| {
                texts
                    .iter()
                    .map(|text| text.get(row))
                    .collect::<Option<Vec<&str>>>()
                    .map(|cells| cells.join(&self.separator))
            })
            .collect();
        Ok(Series::new(self.name.as_str().into(), joined))
    }
}

/// Rows of a local CSV file, filtered and reshaped.
///
/// Filters compare the text of a column with a value; rows must match all
/// of them. `columns` lists `(source, output)` pairs to keep, in order; when
/// empty every column is kept under its own name.
#[derive(Debug, Clone, Builder)]
pub struct CsvExtract {
    #[builder(into)]
    path: PathBuf,
    #[builder(default)]
    filters: Vec<(String, String)>,
    composite: Option<CompositeColumn>,
    #[builder(default)]
    columns: Vec<(String, String)>,
}

impl CsvExtract {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the file and applies filters, the composite column and the
    /// final selection.
    pub async fn load(&self) -> Result<DataFrame, ExtractError> {
        let extract = self.clone();
        task::spawn_blocking(move || extract.load_blocking()).await?
    }

    fn load_blocking(&self) -> Result<DataFrame, ExtractError> {
        let frame = CsvReadOptions::default()
            .with_has_header(true)
            .try_into_reader_with_file_path(Some(self.path.clone()))
            .map_err(|e| ExtractError::Read(self.path.clone(), e))?
            .finish()
            .map_err(|e| ExtractError::Read(self.path.clone(), e))?;

        let composite_parts = self.composite.iter().flat_map(|c| c.parts.iter());
        let sources = self.columns.iter().map(|(source, _)| source);
        for name in self.filters.iter().map(|(name, _)| name).chain(composite_parts) {
            self.require(&frame, name)?;
        }

        let transform = |e: PolarsError| ExtractError::Transform(self.path.clone(), e);

        let mut filtered = match self.filter_expr() {
            Some(predicate) => frame.lazy().filter(predicate).collect().map_err(transform)?,
            None => frame,
        };
        if let Some(composite) = &self.composite {
            let column = composite.column(&filtered).map_err(transform)?;
            filtered.with_column(column).map_err(transform)?;
        }
        for name in sources {
            self.require(&filtered, name)?;
        }

        let result = if self.columns.is_empty() {
            filtered
        } else {
            let selection: Vec<Expr> = self
                .columns
                .iter()
                .map(|(source, output)| col(source.as_str()).alias(output.as_str()))
                .collect();
            filtered.lazy().select(selection).collect().map_err(transform)?
        };
        info!("Extracted {} rows from {}", result.height(), self.path.display());
        Ok(result)
    }

    fn filter_expr(&self) -> Option<Expr> {
        self.filters
            .iter()
            .map(|(name, value)| {
                col(name.as_str())
                    .cast(DataType::String)
                    .eq(lit(value.as_str()))
            })
            .reduce(|acc, expr| acc.and(expr))
    }

    fn require(&self, frame: &DataFrame, name: &str) -> Result<(), ExtractError> {
        match frame.get_column_index(name) {
            Some(_) => Ok(()),
            None => Err(ExtractError::UnknownColumn {
                path: self.path.clone(),
                column: name.to_string(),
            }),
        }
    }
}
