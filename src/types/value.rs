//! Scalar values held by one record, and the coercion rules that turn raw
//! JSON or CSV text into them.

use crate::types::instant::{instant_from_epoch_millis, instant_from_epoch_seconds, parse_instant};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use polars::prelude::{AnyValue, TimeUnit};
use std::fmt;

/// Rendering used for local wall-clock columns, e.g. `2024-05-01 08:05:00+02:00`.
pub(crate) const LOCAL_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%:z";

/// The semantic type of one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// A UTC instant. Stored as a millisecond `Datetime` column.
    Timestamp,
    /// An instant rendered as local wall-clock text in the given zone.
    LocalTimestamp(Tz),
    Float,
    Int,
    Text,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKind::Timestamp => write!(f, "timestamp"),
            FieldKind::LocalTimestamp(tz) => write!(f, "local timestamp ({tz})"),
            FieldKind::Float => write!(f, "float"),
            FieldKind::Int => write!(f, "int"),
            FieldKind::Text => write!(f, "text"),
        }
    }
}

/// One scalar value of a record.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Timestamp(DateTime<Utc>),
    Float(f64),
    Int(i64),
    Text(String),
    Null,
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Coerces a JSON value to `kind`. Anything that cannot be represented
    /// becomes [`Value::Null`] rather than an error.
    pub fn from_json(kind: FieldKind, raw: &serde_json::Value) -> Value {
        use serde_json::Value as Json;

        match (kind, raw) {
            (_, Json::Null | Json::Array(_) | Json::Object(_)) => Value::Null,
            (FieldKind::Timestamp, _) => json_instant(raw).map_or(Value::Null, Value::Timestamp),
            (FieldKind::LocalTimestamp(tz), _) => {
                json_instant(raw).map_or(Value::Null, |ts| local_text(ts, tz))
            }
            (FieldKind::Float, Json::Number(n)) => n.as_f64().map_or(Value::Null, Value::Float),
            (FieldKind::Float, Json::String(s)) => Value::from_text(FieldKind::Float, s),
            (FieldKind::Int, Json::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().and_then(integral))
                .map_or(Value::Null, Value::Int),
            (FieldKind::Int, Json::String(s)) => Value::from_text(FieldKind::Int, s),
            (FieldKind::Text, Json::String(s)) => Value::Text(s.clone()),
            (FieldKind::Text, Json::Number(n)) => Value::Text(n.to_string()),
            (FieldKind::Text, Json::Bool(b)) => Value::Text(b.to_string()),
            (FieldKind::Float | FieldKind::Int, Json::Bool(_)) => Value::Null,
        }
    }

    /// Coerces CSV text to `kind`. Empty cells are null.
    pub fn from_text(kind: FieldKind, raw: &str) -> Value {
        let text = raw.trim();
        if text.is_empty() {
            return Value::Null;
        }
        match kind {
            FieldKind::Timestamp => parse_instant(text).map_or(Value::Null, Value::Timestamp),
            FieldKind::LocalTimestamp(tz) => {
                parse_instant(text).map_or(Value::Null, |ts| local_text(ts, tz))
            }
            FieldKind::Float => text.parse::<f64>().map_or(Value::Null, Value::Float),
            FieldKind::Int => text
                .parse::<i64>()
                .ok()
                .or_else(|| text.parse::<f64>().ok().and_then(integral))
                .map_or(Value::Null, Value::Int),
            FieldKind::Text => Value::Text(raw.to_string()),
        }
    }

    /// Reads a cell of one of our frames back into a `Value`.
    pub(crate) fn from_any_value(value: AnyValue<'_>) -> Value {
        match value {
            AnyValue::Null => Value::Null,
            AnyValue::Datetime(raw, unit, _) => {
                let instant = match unit {
                    TimeUnit::Milliseconds => instant_from_epoch_millis(raw),
                    TimeUnit::Microseconds => DateTime::from_timestamp_micros(raw),
                    TimeUnit::Nanoseconds => Some(DateTime::from_timestamp_nanos(raw)),
                };
                instant.map_or(Value::Null, Value::Timestamp)
            }
            AnyValue::Float64(v) => Value::Float(v),
            AnyValue::Float32(v) => Value::Float(v as f64),
            AnyValue::Int64(v) => Value::Int(v),
            AnyValue::Int32(v) => Value::Int(v as i64),
            AnyValue::UInt32(v) => Value::Int(v as i64),
            AnyValue::UInt64(v) => i64::try_from(v).map_or(Value::Null, Value::Int),
            AnyValue::String(s) => Value::Text(s.to_string()),
            AnyValue::StringOwned(s) => Value::Text(s.to_string()),
            AnyValue::Boolean(b) => Value::Text(b.to_string()),
            other => Value::Text(other.to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Timestamp(ts) => write!(f, "{}", ts.format("%Y-%m-%dT%H:%M:%SZ")),
            Value::Float(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Text(s) => write!(f, "{s}"),
            Value::Null => Ok(()),
        }
    }
}

fn json_instant(raw: &serde_json::Value) -> Option<DateTime<Utc>> {
    match raw {
        serde_json::Value::String(s) => parse_instant(s),
        // Numeric timestamps (OpenWeatherMap "dt") are epoch seconds
        serde_json::Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().and_then(integral))
            .and_then(instant_from_epoch_seconds),
        _ => None,
    }
}

fn local_text(instant: DateTime<Utc>, tz: Tz) -> Value {
    Value::Text(instant.with_timezone(&tz).format(LOCAL_TIME_FORMAT).to_string())
}

fn integral(v: f64) -> Option<i64> {
    (v.is_finite() && v.fract() == 0.0).then_some(v as i64)
}
