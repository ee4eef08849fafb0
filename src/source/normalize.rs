//! Flattening of nested JSON entries into schema-shaped records.

use crate::types::record::Record;
use crate::types::schema::Schema;
use crate::types::value::Value;

/// Flattens entries into records, one per entry. Only schema fields are
/// kept; a field whose path is absent or whose value cannot be coerced is
/// null. Records are not filtered here, see [`Schema::retain_timed`].
pub fn flatten_entries(schema: &Schema, entries: &[serde_json::Value]) -> Vec<Record> {
    let pointers: Vec<String> = schema.fields().iter().map(|f| f.json_pointer()).collect();

    entries
        .iter()
        .map(|entry| {
            let values = schema
                .fields()
                .iter()
                .zip(&pointers)
                .map(|(field, pointer)| {
                    entry
                        .pointer(pointer)
                        .map_or(Value::Null, |raw| Value::from_json(field.kind(), raw))
                })
                .collect();
            Record::new(values)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::schema::Field;
    use crate::types::value::FieldKind;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn weather_schema() -> Schema {
        Schema::new(
            vec![
                Field::new("time_utc", FieldKind::Timestamp).with_path("dt_txt"),
                Field::new("temperature", FieldKind::Float).with_path("main.temp"),
                Field::new("humidity", FieldKind::Int).with_path("main.humidity"),
                Field::new("weather_status", FieldKind::Text).with_path("weather.0.main"),
                Field::new("rain_3h", FieldKind::Float).with_path("rain.3h"),
            ],
            "time_utc",
            ["time_utc"],
        )
        .unwrap()
    }

    #[test]
    fn test_flatten_nested_and_indexed_paths() {
        let entries = vec![json!({
            "dt": 1714564800,
            "dt_txt": "2024-05-01 12:00:00",
            "main": {"temp": 18.4, "humidity": 52, "pressure": 1012},
            "weather": [{"main": "Clouds", "description": "overcast"}],
            "rain": {"3h": 0.4}
        })];

        let records = flatten_entries(&weather_schema(), &entries);
        assert_eq!(records.len(), 1);
        assert_eq!(
            records[0].values(),
            &[
                Value::Timestamp(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()),
                Value::Float(18.4),
                Value::Int(52),
                Value::Text("Clouds".into()),
                Value::Float(0.4),
            ]
        );
    }

    #[test]
    fn test_flatten_missing_paths_are_null() {
        let entries = vec![json!({"dt_txt": "not-a-date", "main": {}, "weather": []})];
        let records = flatten_entries(&weather_schema(), &entries);
        assert!(records[0].values().iter().all(Value::is_null));
    }
}
