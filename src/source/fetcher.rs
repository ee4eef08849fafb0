use crate::source::descriptor::SourceDescriptor;
use crate::source::error::{FetchError, SkipReason};
use crate::source::normalize::flatten_entries;
use crate::source::outcome::{Batch, FetchOutcome};
use crate::types::schema::Schema;
use crate::types::time_range::TimeRange;
use log::{debug, info, warn};
use reqwest::Client;

/// Issues one request per sub-range and normalizes the response into a [`Batch`].
pub struct RangeFetcher {
    client: Client,
    source: SourceDescriptor,
    schema: Schema,
}

impl RangeFetcher {
    pub fn new(source: SourceDescriptor, schema: Schema) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(source.timeout())
            .build()
            .map_err(FetchError::ClientBuild)?;
        Ok(Self {
            client,
            source,
            schema,
        })
    }

    pub fn source(&self) -> &SourceDescriptor {
        &self.source
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Fetches and normalizes one sub-range.
    ///
    /// Network errors, timeouts, non-2xx statuses and undecodable bodies are
    /// returned as [`FetchOutcome::Skipped`]. A response without entries is
    /// a success with an empty batch. Entries whose time field is missing or
    /// unparseable are dropped.
    ///
    /// # Errors
    ///
    /// Only configuration problems are errors: a request that cannot be
    /// built ([`FetchError::InvalidRequest`]) or a batch frame that cannot be
    /// assembled ([`FetchError::Frame`]).
    pub async fn fetch_range(&self, range: &TimeRange) -> Result<FetchOutcome, FetchError> {
        let url = self.source.url_for(range);
        info!("Fetching {} for {}", self.source.name(), range);

        let mut request = self
            .client
            .get(&url)
            .query(&self.source.query_for(range));
        for (name, value) in self.source.headers_for() {
            request = request.header(name, value);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) if e.is_builder() => {
                return Err(FetchError::InvalidRequest { url, source: e });
            }
            Err(e) => {
                // The error's own URL carries query credentials
                let e = e.without_url();
                warn!("Network error for {} ({}): {}. Skipping range.", url, range, e);
                return Ok(FetchOutcome::Skipped(SkipReason::Network { url, source: e }));
            }
        };

        let status = response.status();
        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => {
                let e = e.without_url();
                warn!("Failed reading body from {}: {}. Skipping range.", url, e);
                return Ok(FetchOutcome::Skipped(SkipReason::Network { url, source: e }));
            }
        };
        let payload = serde_json::from_slice::<serde_json::Value>(&body);

        if !status.is_success() {
            // Most APIs put a human readable reason in "message"
            let message = payload.ok().and_then(|v| {
                v.get("message")
                    .and_then(serde_json::Value::as_str)
                    .map(str::to_string)
            });
            let reason = SkipReason::HttpStatus {
                url,
                status,
                message,
            };
            warn!("{}. Skipping range {}.", reason, range);
            return Ok(FetchOutcome::Skipped(reason));
        }

        let payload = match payload {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Invalid JSON from {} (HTTP {}). Skipping range {}.", url, status, range);
                return Ok(FetchOutcome::Skipped(SkipReason::Decode { url, source: e }));
            }
        };

        let entries = payload
            .pointer(self.source.entries_pointer())
            .and_then(serde_json::Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        if entries.is_empty() {
            info!("No entries found for {} in {}", self.source.name(), range);
        }

        let (records, dropped) = self
            .schema
            .retain_timed(flatten_entries(&self.schema, entries));
        if dropped > 0 {
            warn!(
                "Dropped {} of {} entries without a valid '{}' in {}",
                dropped,
                entries.len(),
                self.schema.time_field().name(),
                range
            );
        }
        debug!("Normalized {} records for {}", records.len(), range);

        let frame = self
            .schema
            .frame_from_records(&records)
            .map_err(|e| FetchError::Frame {
                range: range.to_string(),
                source: e,
            })?;
        Ok(FetchOutcome::Succeeded(Batch::new(*range, frame)))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::ApiKey;
    use crate::source::descriptor::{Credential, RangeEncoding};
    use crate::types::schema::Field;
    use crate::types::value::FieldKind;
    use chrono::{TimeZone, Utc};
    use polars::prelude::{DataType, TimeUnit};
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub(crate) fn arrivals_schema() -> Schema {
        Schema::new(
            vec![
                Field::new("scheduled_arrival_utc", FieldKind::Timestamp)
                    .with_path("arrival.scheduledTime.utc"),
                Field::new("flight_number", FieldKind::Text).with_path("number"),
                Field::new("airline", FieldKind::Text).with_path("airline.name"),
            ],
            "scheduled_arrival_utc",
            ["scheduled_arrival_utc", "flight_number"],
        )
        .unwrap()
    }

    pub(crate) fn test_source(server: &MockServer) -> SourceDescriptor {
        SourceDescriptor::builder()
            .name("test-arrivals")
            .endpoint(format!("{}/arrivals", server.uri()))
            .range_encoding(RangeEncoding::QueryParams {
                start_param: "from".into(),
                end_param: "to".into(),
                format: "%H:%M".into(),
                tz: chrono_tz::UTC,
            })
            .credential(Credential::Header {
                name: "x-api-key".into(),
                key: ApiKey::new("test-key").unwrap(),
            })
            .entries_pointer("/arrivals")
            .timeout(Duration::from_millis(500))
            .build()
    }

    pub(crate) fn hours(start: u32, end: u32) -> TimeRange {
        TimeRange::new(
            Utc.with_ymd_and_hms(2024, 5, 1, start, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 5, 1, end, 0, 0).unwrap(),
        )
        .unwrap()
    }

    pub(crate) fn arrival(time: &str, number: &str, airline: &str) -> serde_json::Value {
        json!({
            "number": number,
            "airline": {"name": airline},
            "arrival": {"scheduledTime": {"utc": time, "local": time}},
            "aircraft": {"model": "Airbus A320"}
        })
    }

    pub(crate) async fn mount_range(
        server: &MockServer,
        from: &str,
        template: ResponseTemplate,
    ) {
        Mock::given(method("GET"))
            .and(path("/arrivals"))
            .and(query_param("from", from))
            .and(header("x-api-key", "test-key"))
            .respond_with(template)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_fetch_range_returns_all_well_formed_entries() -> Result<(), Box<dyn std::error::Error>> {
        let server = MockServer::start().await;
        mount_range(
            &server,
            "08:00",
            ResponseTemplate::new(200).set_body_json(json!({"arrivals": [
                arrival("2024-05-01 08:05Z", "LH 1", "Lufthansa"),
                arrival("2024-05-01 09:10Z", "BA 2", "British Airways"),
                arrival("2024-05-01 10:15Z", "AF 3", "Air France"),
            ]})),
        )
        .await;

        let fetcher = RangeFetcher::new(test_source(&server), arrivals_schema())?;
        let outcome = fetcher.fetch_range(&hours(8, 14)).await?;
        assert!(!outcome.is_skipped());
        assert_eq!(outcome.rows(), 3);

        let batch = outcome.into_batch().expect("batch expected");
        let times = batch.frame().column("scheduled_arrival_utc")?;
        assert_eq!(times.null_count(), 0);
        assert_eq!(
            times.dtype(),
            &DataType::Datetime(TimeUnit::Milliseconds, None)
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_fetch_range_drops_entries_without_time() -> Result<(), Box<dyn std::error::Error>> {
        let server = MockServer::start().await;
        mount_range(
            &server,
            "08:00",
            ResponseTemplate::new(200).set_body_json(json!({"arrivals": [
                arrival("2024-05-01 08:05Z", "LH 1", "Lufthansa"),
                {"number": "XX 9", "airline": {"name": "Ghost"}},
                arrival("unknown", "XX 10", "Ghost"),
            ]})),
        )
        .await;

        let fetcher = RangeFetcher::new(test_source(&server), arrivals_schema())?;
        let outcome = fetcher.fetch_range(&hours(8, 14)).await?;
        assert_eq!(outcome.rows(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_fetch_range_empty_list_is_empty_success() -> Result<(), Box<dyn std::error::Error>> {
        let server = MockServer::start().await;
        mount_range(
            &server,
            "08:00",
            ResponseTemplate::new(200).set_body_json(json!({"arrivals": []})),
        )
        .await;
        mount_range(
            &server,
            "14:00",
            ResponseTemplate::new(200).set_body_json(json!({"departures": []})),
        )
        .await;

        let fetcher = RangeFetcher::new(test_source(&server), arrivals_schema())?;
        for range in [hours(8, 14), hours(14, 20)] {
            let outcome = fetcher.fetch_range(&range).await?;
            assert!(!outcome.is_skipped());
            assert_eq!(outcome.rows(), 0);
            assert!(outcome.into_batch().is_none());
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_fetch_range_http_error_is_skipped() -> Result<(), Box<dyn std::error::Error>> {
        let server = MockServer::start().await;
        mount_range(
            &server,
            "08:00",
            ResponseTemplate::new(500).set_body_json(json!({"message": "upstream exploded"})),
        )
        .await;

        let fetcher = RangeFetcher::new(test_source(&server), arrivals_schema())?;
        let outcome = fetcher.fetch_range(&hours(8, 14)).await?;
        match outcome {
            FetchOutcome::Skipped(SkipReason::HttpStatus {
                status, message, ..
            }) => {
                assert_eq!(status.as_u16(), 500);
                assert_eq!(message.as_deref(), Some("upstream exploded"));
            }
            other => panic!("expected HTTP skip, got {:?}", other),
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_fetch_range_invalid_json_is_skipped() -> Result<(), Box<dyn std::error::Error>> {
        let server = MockServer::start().await;
        mount_range(
            &server,
            "08:00",
            ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"),
        )
        .await;

        let fetcher = RangeFetcher::new(test_source(&server), arrivals_schema())?;
        let outcome = fetcher.fetch_range(&hours(8, 14)).await?;
        assert!(matches!(
            outcome,
            FetchOutcome::Skipped(SkipReason::Decode { .. })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_fetch_range_timeout_is_skipped() -> Result<(), Box<dyn std::error::Error>> {
        let server = MockServer::start().await;
        mount_range(
            &server,
            "08:00",
            ResponseTemplate::new(200)
                .set_body_json(json!({"arrivals": []}))
                .set_delay(Duration::from_secs(3)),
        )
        .await;

        let fetcher = RangeFetcher::new(test_source(&server), arrivals_schema())?;
        let outcome = fetcher.fetch_range(&hours(8, 14)).await?;
        assert!(matches!(
            outcome,
            FetchOutcome::Skipped(SkipReason::Network { .. })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_fetch_range_without_credential_header_is_not_matched() -> Result<(), Box<dyn std::error::Error>> {
        let server = MockServer::start().await;
        mount_range(
            &server,
            "08:00",
            ResponseTemplate::new(200).set_body_json(json!({"arrivals": [
                arrival("2024-05-01 08:05Z", "LH 1", "Lufthansa"),
            ]})),
        )
        .await;

        // Same source but no credential: wiremock answers 404 for unmatched requests
        let source = SourceDescriptor::builder()
            .name("anonymous")
            .endpoint(format!("{}/arrivals", server.uri()))
            .range_encoding(test_source(&server).range_encoding().clone())
            .entries_pointer("/arrivals")
            .build();
        let fetcher = RangeFetcher::new(source, arrivals_schema())?;
        let outcome = fetcher.fetch_range(&hours(8, 14)).await?;
        assert!(outcome.is_skipped());
        Ok(())
    }

    #[tokio::test]
    async fn test_network_skip_does_not_expose_query_key() -> Result<(), Box<dyn std::error::Error>> {
        let source = SourceDescriptor::builder()
            .name("unreachable")
            .endpoint("http://127.0.0.1:9/forecast")
            .credential(Credential::Query {
                name: "appid".into(),
                key: ApiKey::new("TOPSECRET").unwrap(),
            })
            .entries_pointer("/list")
            .timeout(Duration::from_millis(500))
            .build();
        let fetcher = RangeFetcher::new(source, arrivals_schema())?;
        let outcome = fetcher.fetch_range(&hours(8, 14)).await?;

        let FetchOutcome::Skipped(reason) = outcome else {
            panic!("expected a skipped range");
        };
        assert!(matches!(reason, SkipReason::Network { .. }));
        let mut rendered = format!("{} {:?}", reason, reason);
        let mut cause = std::error::Error::source(&reason);
        while let Some(err) = cause {
            rendered.push_str(&err.to_string());
            cause = err.source();
        }
        assert!(!rendered.contains("TOPSECRET"), "key leaked: {rendered}");
        Ok(())
    }
}
