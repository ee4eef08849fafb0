//! Ready-made sources, schemas and table mappings for the public APIs and
//! reference files this crate was first written against.
//!
//! * AeroDataBox airport arrivals: path-encoded local time window, RapidAPI
//!   header credentials, entries under `/arrivals`.
//! * OpenWeatherMap 5 day / 3 hour forecast: query-string credential,
//!   entries under `/list`.
//! * A world cities CSV, reduced to one city for a population table.

use crate::config::ApiKey;
use crate::extract::{CompositeColumn, CsvExtract};
use crate::sink::{TableColumn, TableSink, TableWriteMode};
use crate::source::descriptor::{Credential, RangeEncoding, SourceDescriptor};
use crate::types::schema::{Field, Schema, SchemaError};
use crate::types::value::FieldKind;
use bon::builder;
use chrono::Duration;
use chrono_tz::Tz;
use std::path::PathBuf;
use std::time::Duration as StdDuration;

pub const AERODATABOX_HOST_VAR: &str = "AERODATABOX_HOST";
pub const AERODATABOX_KEY_VAR: &str = "AERODATABOX_KEY";
pub const OPENWEATHER_KEY_VAR: &str = "OPENWEATHER_API_KEY";

pub const OPENWEATHER_BASE_URL: &str = "https://api.openweathermap.org";

/// AeroDataBox rejects windows longer than 12 hours.
pub fn aerodatabox_max_window() -> Duration {
    Duration::hours(12)
}

/// Arrivals at one airport.
///
/// Both ends of each range are sent as local times of `tz` in the URL path
/// (`/flights/airports/iata/FRA/2024-05-01T08:00/2024-05-01T14:00`).
/// `base_url` defaults to `https://{host}`.
#[builder]
pub fn aerodatabox_arrivals(
    #[builder(into)] host: String,
    key: ApiKey,
    #[builder(into)] airport_iata: String,
    tz: Tz,
    #[builder(into)] base_url: Option<String>,
) -> SourceDescriptor {
    let base_url = base_url.unwrap_or_else(|| format!("https://{host}"));
    let query = [
        ("withLeg", "true"),
        ("direction", "Arrival"),
        ("withCancelled", "true"),
        ("withCodeshared", "true"),
        ("withCargo", "false"),
        ("withPrivate", "false"),
        ("withLocation", "false"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();

    SourceDescriptor::builder()
        .name(format!("aerodatabox-arrivals-{airport_iata}"))
        .endpoint(format!(
            "{}/flights/airports/iata/{airport_iata}",
            base_url.trim_end_matches('/')
        ))
        .range_encoding(RangeEncoding::PathSegments {
            format: "%Y-%m-%dT%H:%M".into(),
            tz,
        })
        .query(query)
        .headers(vec![("x-rapidapi-host".into(), host)])
        .credential(Credential::Header {
            name: "x-rapidapi-key".into(),
            key,
        })
        .entries_pointer("/arrivals")
        .timeout(StdDuration::from_secs(25))
        .build()
}

/// One row per scheduled arrival, unique on time and flight number.
pub fn arrivals_schema(tz: Tz) -> Result<Schema, SchemaError> {
    Schema::new(
        vec![
            Field::new("scheduled_arrival_utc", FieldKind::Timestamp)
                .with_path("arrival.scheduledTime.utc"),
            Field::new("scheduled_arrival_local", FieldKind::LocalTimestamp(tz))
                .with_path("arrival.scheduledTime.local"),
            Field::new("flight_number", FieldKind::Text).with_path("number"),
            Field::new("from_airport_name", FieldKind::Text).with_path("departure.airport.name"),
            Field::new("airline", FieldKind::Text).with_path("airline.name"),
            Field::new("aircraft_model", FieldKind::Text).with_path("aircraft.model"),
        ],
        "scheduled_arrival_utc",
        ["scheduled_arrival_utc", "flight_number"],
    )
}

/// The `flight_arrival` table. Rows are replaced on flight number and
/// arrival time so re-running a day does not duplicate it.
pub fn flight_arrival_table(database: impl Into<PathBuf>, airport_iata: &str) -> TableSink {
    TableSink::builder()
        .database(database)
        .table("flight_arrival")
        .columns(vec![
            TableColumn::field("flight_icao", "flight_number"),
            TableColumn::field("arrival_time", "scheduled_arrival_utc"),
            TableColumn::constant("airport_iata", airport_iata),
            TableColumn::first_word_prefix("airline_iata", "airline", 3),
            TableColumn::null("delay_minutes"),
        ])
        .mode(TableWriteMode::ReplaceMatchingKeys(vec![
            "flight_icao".into(),
            "arrival_time".into(),
        ]))
        .build()
}

/// The 5 day forecast for `city,country`, metric units, Spanish descriptions.
#[builder]
pub fn openweather_forecast(
    key: ApiKey,
    #[builder(into)] city: String,
    #[builder(into)] country: String,
    #[builder(into)] base_url: Option<String>,
) -> SourceDescriptor {
    let base_url = base_url.unwrap_or_else(|| OPENWEATHER_BASE_URL.to_string());
    SourceDescriptor::builder()
        .name(format!("openweather-forecast-{city}"))
        .endpoint(format!("{}/data/2.5/forecast", base_url.trim_end_matches('/')))
        .query(vec![
            ("q".into(), format!("{city},{country}")),
            ("units".into(), "metric".into()),
            ("lang".into(), "es".into()),
        ])
        .credential(Credential::Query {
            name: "appid".into(),
            key,
        })
        .entries_pointer("/list")
        .timeout(StdDuration::from_secs(20))
        .build()
}

/// One row per 3 hour forecast step, unique on time.
pub fn forecast_schema(tz: Tz) -> Result<Schema, SchemaError> {
    Schema::new(
        vec![
            Field::new("time_utc", FieldKind::Timestamp).with_path("dt_txt"),
            Field::new("time_local", FieldKind::LocalTimestamp(tz)).with_path("dt_txt"),
            Field::new("temperature", FieldKind::Float).with_path("main.temp"),
            Field::new("humidity", FieldKind::Int).with_path("main.humidity"),
            Field::new("weather_status", FieldKind::Text).with_path("weather.0.main"),
            Field::new("wind_speed", FieldKind::Float).with_path("wind.speed"),
            Field::new("rain_3h", FieldKind::Float).with_path("rain.3h"),
            Field::new("snow_3h", FieldKind::Float).with_path("snow.3h"),
        ],
        "time_utc",
        ["time_utc"],
    )
}

/// The `weather_data` table, replaced on timestamp and city.
pub fn weather_table(database: impl Into<PathBuf>, city: &str) -> TableSink {
    TableSink::builder()
        .database(database)
        .table("weather_data")
        .columns(vec![
            TableColumn::field("timestamp", "time_utc"),
            TableColumn::field("temperature", "temperature"),
            TableColumn::field("humidity", "humidity"),
            TableColumn::field("wind_speed", "wind_speed"),
            TableColumn::field("weather_description", "weather_status"),
            TableColumn::constant("city", city),
        ])
        .mode(TableWriteMode::ReplaceMatchingKeys(vec![
            "timestamp".into(),
            "city".into(),
        ]))
        .build()
}

/// The row of a `worldcities.csv` file for one city, shaped for `city_pop`.
pub fn world_city_extract(path: impl Into<PathBuf>, city: &str, iso2: &str) -> CsvExtract {
    CsvExtract::builder()
        .path(path)
        .filters(vec![
            ("city_ascii".into(), city.into()),
            ("iso2".into(), iso2.into()),
        ])
        .composite(CompositeColumn::new(
            "municipality_iso_country",
            ["city_ascii", "iso2"],
            ",",
        ))
        .columns(
            [
                ("city_ascii", "city"),
                ("lat", "lat"),
                ("lng", "lng"),
                ("population", "population"),
                ("municipality_iso_country", "municipality_iso_country"),
            ]
            .into_iter()
            .map(|(source, output)| (source.to_string(), output.to_string()))
            .collect(),
        )
        .build()
}

/// The `city_pop` table. Rows are appended.
pub fn city_pop_table(database: impl Into<PathBuf>) -> TableSink {
    let columns = ["city", "lat", "lng", "population", "municipality_iso_country"]
        .into_iter()
        .map(|name| TableColumn::field(name, name))
        .collect();
    TableSink::builder()
        .database(database)
        .table("city_pop")
        .columns(columns)
        .mode(TableWriteMode::Append)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::AcquisitionPipeline;
    use crate::sink::CsvFileSink;
    use crate::source::normalize::flatten_entries;
    use crate::types::time_range::TimeRange;
    use crate::types::value::Value;
    use chrono::{NaiveDate, TimeZone, Utc};
    use chrono_tz::Europe::Berlin;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn key() -> ApiKey {
        ApiKey::new("k").unwrap()
    }

    #[test]
    fn test_aerodatabox_url_uses_local_window() {
        let source = aerodatabox_arrivals()
            .host("aerodatabox.p.rapidapi.com")
            .key(key())
            .airport_iata("FRA")
            .tz(Berlin)
            .call();
        let day = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let window = TimeRange::local_day_window(day, Berlin, 8, 20).unwrap();
        let ranges = window.split(Duration::hours(6));
        assert_eq!(ranges.len(), 2);
        assert!(ranges.iter().all(|r| r.duration() <= aerodatabox_max_window()));
        assert_eq!(
            source.url_for(&ranges[1]),
            "https://aerodatabox.p.rapidapi.com/flights/airports/iata/FRA/2024-05-01T14:00/2024-05-01T20:00"
        );
    }

    #[test]
    fn test_arrivals_schema_flattens_aerodatabox_entry() {
        let schema = arrivals_schema(Berlin).unwrap();
        let entry = json!({
            "number": "LH 401",
            "airline": {"name": "Lufthansa"},
            "aircraft": {"model": "Airbus A340-600"},
            "departure": {"airport": {"name": "New York"}},
            "arrival": {"scheduledTime": {"utc": "2024-05-01 06:05Z", "local": "2024-05-01 08:05+02:00"}}
        });
        let records = flatten_entries(&schema, &[entry]);
        let record = &records[0];
        assert_eq!(
            record.field(&schema, "scheduled_arrival_utc"),
            Some(&Value::Timestamp(Utc.with_ymd_and_hms(2024, 5, 1, 6, 5, 0).unwrap()))
        );
        assert_eq!(
            record.field(&schema, "scheduled_arrival_local"),
            Some(&Value::Text("2024-05-01 08:05:00+02:00".into()))
        );
        assert_eq!(
            record.field(&schema, "from_airport_name"),
            Some(&Value::Text("New York".into()))
        );
    }

    #[test]
    fn test_table_presets_match_their_schemas() {
        let arrivals = arrivals_schema(Berlin).unwrap();
        assert!(flight_arrival_table("gans.db", "FRA").validate(&arrivals.names()).is_ok());
        let forecast = forecast_schema(Berlin).unwrap();
        assert!(weather_table("gans.db", "Berlin").validate(&forecast.names()).is_ok());
        assert!(weather_table("gans.db", "Berlin").validate(&arrivals.names()).is_err());
    }

    #[tokio::test]
    async fn test_openweather_forecast_run() -> Result<(), Box<dyn std::error::Error>> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/2.5/forecast"))
            .and(query_param("q", "Berlin,DE"))
            .and(query_param("appid", "k"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "cod": "200",
                "list": [
                    {
                        "dt_txt": "2024-05-01 15:00:00",
                        "main": {"temp": 19.2, "humidity": 48},
                        "weather": [{"main": "Clear"}],
                        "wind": {"speed": 3.1}
                    },
                    {
                        "dt_txt": "2024-05-01 12:00:00",
                        "main": {"temp": 17.5, "humidity": 55},
                        "weather": [{"main": "Rain"}],
                        "wind": {"speed": 4.0},
                        "rain": {"3h": 1.25}
                    }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let source = openweather_forecast()
            .key(key())
            .city("Berlin")
            .country("DE")
            .base_url(server.uri())
            .call();
        let schema = forecast_schema(Berlin)?;
        let pipeline = AcquisitionPipeline::new(source, schema.clone())?;

        let tmp = tempfile::tempdir()?;
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        let report = pipeline
            .run()
            .ranges(vec![TimeRange::new(now, now + Duration::days(5)).unwrap()])
            .sink(CsvFileSink::new(tmp.path().join("berlin_forecast.csv")))
            .call()
            .await?;

        let records = report.dataset.expect("dataset expected").records()?;
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].field(&schema, "rain_3h"), Some(&Value::Float(1.25)));
        assert_eq!(records[1].field(&schema, "rain_3h"), Some(&Value::Null));
        assert_eq!(
            records[0].field(&schema, "time_local"),
            Some(&Value::Text("2024-05-01 14:00:00+02:00".into()))
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_aerodatabox_request_shape() -> Result<(), Box<dyn std::error::Error>> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(
                "/flights/airports/iata/FRA/2024-05-01T08:00/2024-05-01T14:00",
            ))
            .and(query_param("direction", "Arrival"))
            .and(header("x-rapidapi-host", "aerodatabox.p.rapidapi.com"))
            .and(header("x-rapidapi-key", "k"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"arrivals": []})))
            .expect(1)
            .mount(&server)
            .await;

        let source = aerodatabox_arrivals()
            .host("aerodatabox.p.rapidapi.com")
            .key(key())
            .airport_iata("FRA")
            .tz(Berlin)
            .base_url(server.uri())
            .call();
        let pipeline = AcquisitionPipeline::new(source, arrivals_schema(Berlin)?)?;
        let day = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let range = TimeRange::local_day_window(day, Berlin, 8, 14).unwrap();
        let outcome = pipeline.fetch_range(&range).await?;
        assert!(!outcome.is_skipped());
        assert_eq!(outcome.rows(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_world_city_into_city_pop() -> Result<(), Box<dyn std::error::Error>> {
        let tmp = tempfile::tempdir()?;
        let csv = tmp.path().join("worldcities.csv");
        std::fs::write(
            &csv,
            "city,city_ascii,lat,lng,country,iso2,population\n\
             Berlin,Berlin,52.52,13.405,Germany,DE,3644826\n\
             Hamburg,Hamburg,53.55,10.0,Germany,DE,1841179\n",
        )?;
        let db = tmp.path().join("gans.db");
        rusqlite::Connection::open(&db)?.execute_batch(
            "CREATE TABLE city_pop (
                city TEXT, lat REAL, lng REAL, population INTEGER, municipality_iso_country TEXT
            );",
        )?;

        let frame = world_city_extract(&csv, "Berlin", "DE").load().await?;
        let written = city_pop_table(&db).insert_frame(&frame).await?;
        assert_eq!(written, 1);

        let (name, population, key): (String, i64, String) = rusqlite::Connection::open(&db)?
            .query_row(
                "SELECT city, population, municipality_iso_country FROM city_pop",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )?;
        assert_eq!(name, "Berlin");
        assert_eq!(population, 3644826);
        assert_eq!(key, "Berlin,DE");
        Ok(())
    }
}
