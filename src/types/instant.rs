//! Lenient timestamp parsing into UTC instants.
//!
//! Public APIs hand out timestamps in a handful of shapes: RFC 3339, an
//! explicit offset without seconds (`2024-05-01 08:05+02:00`), a trailing
//! `Z` (`2024-05-01 06:05Z`), naive strings that are already UTC
//! (`2024-05-01 06:00:00`) and epoch seconds. Everything is normalized to
//! `DateTime<Utc>`.

use chrono::{DateTime, FixedOffset, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};

const OFFSET_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M%:z",
    "%Y-%m-%dT%H:%M%:z",
    "%Y-%m-%d %H:%M:%S%:z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
];

const NAIVE_FORMATS: [&str; 6] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Conversion of the chrono types we receive into a UTC instant.
pub trait IntoUtcDateTime {
    fn into_utc(self) -> DateTime<Utc>;
}

impl IntoUtcDateTime for NaiveDateTime {
    fn into_utc(self) -> DateTime<Utc> {
        Utc.from_utc_datetime(&self)
    }
}

impl IntoUtcDateTime for DateTime<Local> {
    fn into_utc(self) -> DateTime<Utc> {
        self.with_timezone(&Utc)
    }
}

impl IntoUtcDateTime for DateTime<Utc> {
    fn into_utc(self) -> DateTime<Utc> {
        self
    }
}

impl IntoUtcDateTime for DateTime<FixedOffset> {
    fn into_utc(self) -> DateTime<Utc> {
        self.with_timezone(&Utc)
    }
}

/// Parses a textual timestamp into a UTC instant.
///
/// Strings without an offset are taken to be UTC already. A bare date maps
/// to midnight UTC. Returns `None` when nothing matches, which callers
/// treat as a missing value.
///
/// # Examples
///
/// ```
/// use acquisition::parse_instant;
/// use chrono::{TimeZone, Utc};
///
/// let expected = Utc.with_ymd_and_hms(2024, 5, 1, 6, 5, 0).unwrap();
/// assert_eq!(parse_instant("2024-05-01 06:05Z"), Some(expected));
/// assert_eq!(parse_instant("2024-05-01 08:05+02:00"), Some(expected));
/// assert_eq!(parse_instant("not a time"), None);
/// ```
pub fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    let text = raw.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.into_utc());
    }
    // "2024-05-01 06:05Z": chrono has no 'Z' token for short formats, so
    // rewrite it as an explicit zero offset.
    let zulu_rewritten = text
        .strip_suffix('Z')
        .or_else(|| text.strip_suffix('z'))
        .map(|rest| format!("{rest}+00:00"));
    let candidate = zulu_rewritten.as_deref().unwrap_or(text);

    for format in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(candidate, format) {
            return Some(dt.into_utc());
        }
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(candidate, format) {
            return Some(naive.into_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(candidate, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(IntoUtcDateTime::into_utc);
    }
    None
}

/// Interprets a number as seconds since the Unix epoch.
pub fn instant_from_epoch_seconds(seconds: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(seconds, 0)
}

/// Interprets a number as milliseconds since the Unix epoch, the physical
/// representation of the timestamp columns in our frames.
pub fn instant_from_epoch_millis(millis: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
}
