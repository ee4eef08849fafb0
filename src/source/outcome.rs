use crate::source::error::SkipReason;
use crate::types::time_range::TimeRange;
use polars::prelude::DataFrame;

/// Records fetched for one sub-range, shaped by the pipeline schema.
#[derive(Debug, Clone)]
pub struct Batch {
    range: TimeRange,
    frame: DataFrame,
}

impl Batch {
    pub(crate) fn new(range: TimeRange, frame: DataFrame) -> Self {
        Self { range, frame }
    }

    pub fn range(&self) -> &TimeRange {
        &self.range
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
}

/// Terminal state of one sub-range fetch.
#[derive(Debug)]
pub enum FetchOutcome {
    /// The request succeeded. The batch may be empty when the source had no entries.
    Succeeded(Batch),
    /// The request failed in a recoverable way; this sub-range contributes nothing.
    Skipped(SkipReason),
}

impl FetchOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, FetchOutcome::Skipped(_))
    }

    /// Number of records this fetch contributes.
    pub fn rows(&self) -> usize {
        match self {
            FetchOutcome::Succeeded(batch) => batch.len(),
            FetchOutcome::Skipped(_) => 0,
        }
    }

    /// The batch, or `None` when skipped or empty.
    pub fn into_batch(self) -> Option<Batch> {
        match self {
            FetchOutcome::Succeeded(batch) if !batch.is_empty() => Some(batch),
            _ => None,
        }
    }
}
