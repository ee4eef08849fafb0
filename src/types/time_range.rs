use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use std::fmt;
use std::fmt::{Display, Formatter};

/// A half-open time range `[start, end)` in UTC.
///
/// Sub-ranges handed to the pipeline are expected to be disjoint and ordered;
/// [`TimeRange::split`] produces such a sequence from one larger window.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct TimeRange {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeRange {
    /// Creates a range, returning `None` when `start` is not before `end`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Option<Self> {
        (start < end).then_some(Self { start, end })
    }

    /// Builds the range `[start_hour, end_hour)` of a calendar day in a local
    /// time zone, e.g. 08:00 to 20:00 Europe/Berlin.
    ///
    /// Ambiguous local times (DST fold) resolve to the earliest instant.
    ///
    /// # Examples
    ///
    /// ```
    /// use acquisition::TimeRange;
    /// use chrono::{NaiveDate, TimeZone, Utc};
    ///
    /// let day = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
    /// let range = TimeRange::local_day_window(day, chrono_tz::Europe::Berlin, 8, 20).unwrap();
    /// assert_eq!(range.start(), Utc.with_ymd_and_hms(2024, 5, 1, 6, 0, 0).unwrap());
    /// assert_eq!(range.end(), Utc.with_ymd_and_hms(2024, 5, 1, 18, 0, 0).unwrap());
    /// ```
    pub fn local_day_window(date: NaiveDate, tz: Tz, start_hour: u32, end_hour: u32) -> Option<Self> {
        let start_naive = date.and_hms_opt(start_hour, 0, 0)?;
        let end_naive = if end_hour == 24 {
            date.succ_opt()?.and_hms_opt(0, 0, 0)?
        } else {
            date.and_hms_opt(end_hour, 0, 0)?
        };
        let start = tz.from_local_datetime(&start_naive).earliest()?;
        let end = tz.from_local_datetime(&end_naive).earliest()?;
        Self::new(start.with_timezone(&Utc), end.with_timezone(&Utc))
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }

    /// Splits the range into consecutive sub-ranges of at most `step`.
    ///
    /// APIs that cap the length of one query window (AeroDataBox allows 12
    /// hours) are served by fetching every piece in order. The last piece is
    /// shortened to end exactly at `end`. A non-positive step yields the
    /// range unchanged.
    pub fn split(&self, step: Duration) -> Vec<TimeRange> {
        if step <= Duration::zero() {
            return vec![*self];
        }
        let mut pieces = Vec::new();
        let mut cursor = self.start;
        while cursor < self.end {
            let next = (cursor + step).min(self.end);
            pieces.push(TimeRange {
                start: cursor,
                end: next,
            });
            cursor = next;
        }
        pieces
    }
}

impl Display for TimeRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {})",
            self.start.format("%Y-%m-%dT%H:%MZ"),
            self.end.format("%Y-%m-%dT%H:%MZ")
        )
    }
}
