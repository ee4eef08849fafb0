//! The acquisition pipeline: fetch every sub-range, merge with prior state,
//! deduplicate and persist.

use crate::dataset::Dataset;
use crate::error::AcquisitionError;
use crate::sink::Sink;
use crate::source::descriptor::SourceDescriptor;
use crate::source::error::{FetchError, SkipReason};
use crate::source::fetcher::RangeFetcher;
use crate::source::outcome::FetchOutcome;
use crate::types::schema::Schema;
use crate::types::time_range::TimeRange;
use bon::bon;
use log::{info, warn};

/// What happened to one sub-range during a run.
#[derive(Debug)]
pub enum RangeStatus {
    Succeeded,
    Skipped(SkipReason),
}

#[derive(Debug)]
pub struct RangeReport {
    pub range: TimeRange,
    pub status: RangeStatus,
    /// Records the range contributed before deduplication.
    pub rows: usize,
}

impl RangeReport {
    pub fn is_skipped(&self) -> bool {
        matches!(self.status, RangeStatus::Skipped(_))
    }
}

/// Result of [`AcquisitionPipeline::run`].
#[derive(Debug)]
pub struct RunReport {
    /// One entry per requested sub-range, in request order.
    pub ranges: Vec<RangeReport>,
    /// The merged dataset, or `None` when nothing was fetched and the sink
    /// was left untouched.
    pub dataset: Option<Dataset>,
    pub rows_written: usize,
}

impl RunReport {
    /// Records fetched over all ranges, before deduplication.
    pub fn fetched_rows(&self) -> usize {
        self.ranges.iter().map(|r| r.rows).sum()
    }

    pub fn skipped_ranges(&self) -> usize {
        self.ranges.iter().filter(|r| r.is_skipped()).count()
    }
}

/// Fetches one source shaped by one schema and keeps a sink up to date.
///
/// # Examples
///
/// ```no_run
/// use acquisition::{AcquisitionPipeline, AcquisitionError, CsvFileSink, TimeRange};
/// use acquisition::presets::{arrivals_schema, aerodatabox_arrivals};
/// use acquisition::config::ApiKey;
/// use chrono::{Duration, NaiveDate};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), AcquisitionError> {
/// let tz = chrono_tz::Europe::Berlin;
/// let source = aerodatabox_arrivals()
///     .host("aerodatabox.p.rapidapi.com")
///     .key(ApiKey::from_env("AERODATABOX_KEY")?)
///     .airport_iata("FRA")
///     .tz(tz)
///     .call();
/// let pipeline = AcquisitionPipeline::new(source, arrivals_schema(tz)?)?;
///
/// let day = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
/// let window = TimeRange::local_day_window(day, tz, 8, 20).unwrap();
/// let report = pipeline
///     .run()
///     .ranges(window.split(Duration::hours(6)))
///     .sink(CsvFileSink::new("frankfurt_arrivals.csv"))
///     .preview_rows(5)
///     .call()
///     .await?;
/// println!("{} rows written", report.rows_written);
/// # Ok(())
/// # }
/// ```
pub struct AcquisitionPipeline {
    fetcher: RangeFetcher,
}

#[bon]
impl AcquisitionPipeline {
    pub fn new(source: SourceDescriptor, schema: Schema) -> Result<Self, AcquisitionError> {
        Ok(Self {
            fetcher: RangeFetcher::new(source, schema)?,
        })
    }

    pub fn source(&self) -> &SourceDescriptor {
        self.fetcher.source()
    }

    pub fn schema(&self) -> &Schema {
        self.fetcher.schema()
    }

    /// Fetches a single sub-range without touching any sink.
    pub async fn fetch_range(&self, range: &TimeRange) -> Result<FetchOutcome, FetchError> {
        self.fetcher.fetch_range(range).await
    }

    /// Fetches every range in order, merges the batches with what the sink
    /// already holds and persists the result.
    ///
    /// Ranges are requested one after another. A skipped range (network
    /// error, HTTP error, bad body) contributes nothing and the run goes on.
    /// When no range yields a record, the sink is not read or written and
    /// the report carries no dataset. With `preview_rows` set, the first rows
    /// of the merged dataset are logged.
    ///
    /// # Errors
    ///
    /// The sink mapping is checked against the schema before any request.
    /// Invalid requests, sink I/O failures and merge failures abort the run.
    #[builder]
    pub async fn run(
        &self,
        ranges: Vec<TimeRange>,
        #[builder(into)] sink: Sink,
        preview_rows: Option<usize>,
    ) -> Result<RunReport, AcquisitionError> {
        let schema = self.schema();
        sink.validate(schema)?;

        let mut reports = Vec::with_capacity(ranges.len());
        let mut batches = Vec::new();
        for range in ranges {
            let report = match self.fetcher.fetch_range(&range).await? {
                FetchOutcome::Succeeded(batch) => {
                    let rows = batch.len();
                    if !batch.is_empty() {
                        batches.push(batch.into_frame());
                    }
                    info!("Range {} yielded {} records", range, rows);
                    RangeReport {
                        range,
                        status: RangeStatus::Succeeded,
                        rows,
                    }
                }
                FetchOutcome::Skipped(reason) => RangeReport {
                    range,
                    status: RangeStatus::Skipped(reason),
                    rows: 0,
                },
            };
            reports.push(report);
        }

        if batches.is_empty() {
            warn!(
                "No records fetched from {}; {} left untouched",
                self.source().name(),
                sink
            );
            return Ok(RunReport {
                ranges: reports,
                dataset: None,
                rows_written: 0,
            });
        }

        let prior = sink.load_prior(schema).await?;
        let prior_rows = prior.as_ref().map_or(0, |frame| frame.height());
        let dataset = Dataset::merge(schema, prior, batches)?;
        let rows_written = sink.persist(&dataset).await?;
        info!(
            "Wrote {} rows to {} ({} prior, {} fetched)",
            rows_written,
            sink,
            prior_rows,
            reports.iter().map(|r| r.rows).sum::<usize>()
        );
        if let Some(rows) = preview_rows {
            info!("Preview:\n{}", dataset.preview(rows));
        }

        Ok(RunReport {
            ranges: reports,
            dataset: Some(dataset),
            rows_written,
        })
    }
}
