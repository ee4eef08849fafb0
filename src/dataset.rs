use crate::types::record::Record;
use crate::types::schema::Schema;
use crate::types::value::Value;
use chrono::{DateTime, Utc};
use log::debug;
use polars::prelude::*;

/// Prior state merged with newly fetched batches: unique per dedup key and
/// sorted ascending by the time field.
#[derive(Debug, Clone)]
pub struct Dataset {
    schema: Schema,
    frame: DataFrame,
}

impl Dataset {
    /// Merges `prior` (if any) with `batches`.
    ///
    /// Frames are concatenated prior first, then batches in fetch order.
    /// For every dedup key the last row of that sequence survives, so a newly
    /// fetched record replaces a stored one with the same key. The result is
    /// sorted by the time field; equal times keep their relative order.
    pub fn merge(
        schema: &Schema,
        prior: Option<DataFrame>,
        batches: Vec<DataFrame>,
    ) -> PolarsResult<Self> {
        let columns: Vec<Expr> = schema.names().into_iter().map(col).collect();
        let inputs: Vec<LazyFrame> = prior
            .into_iter()
            .chain(batches)
            .map(|frame| frame.lazy().select(columns.clone()))
            .collect();
        if inputs.is_empty() {
            return Ok(Self {
                schema: schema.clone(),
                frame: schema.empty_frame()?,
            });
        }

        let frame_count = inputs.len();
        let key: Vec<PlSmallStr> = schema
            .dedup_key()
            .iter()
            .map(|name| name.as_str().into())
            .collect();
        let frame = concat(inputs, UnionArgs::default())?
            .unique_stable(Some(key), UniqueKeepStrategy::Last)
            .sort(
                [schema.time_field().name()],
                SortMultipleOptions::default().with_maintain_order(true),
            )
            .collect()?;
        debug!(
            "Merged {} frames into {} rows keyed on [{}]",
            frame_count,
            frame.height(),
            schema.dedup_key().join(", ")
        );

        Ok(Self {
            schema: schema.clone(),
            frame,
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn into_frame(self) -> DataFrame {
        self.frame
    }

    pub fn len(&self) -> usize {
        self.frame.height()
    }

    pub fn is_empty(&self) -> bool {
        self.frame.height() == 0
    }

    /// The first `rows` rows, for printing.
    pub fn preview(&self, rows: usize) -> DataFrame {
        self.frame.head(Some(rows))
    }

    pub fn records(&self) -> PolarsResult<Vec<Record>> {
        self.schema.records_from_frame(&self.frame)
    }

    /// Earliest and latest time value, or `None` when empty.
    pub fn time_span(&self) -> PolarsResult<Option<(DateTime<Utc>, DateTime<Utc>)>> {
        let height = self.frame.height();
        if height == 0 {
            return Ok(None);
        }
        let times = self.frame.column(self.schema.time_field().name())?;
        let first = Value::from_any_value(times.get(0)?).as_timestamp();
        let last = Value::from_any_value(times.get(height - 1)?).as_timestamp();
        Ok(first.zip(last))
    }
}
