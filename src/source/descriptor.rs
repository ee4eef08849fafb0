//! Static description of one remote JSON source.

use crate::config::ApiKey;
use crate::types::time_range::TimeRange;
use bon::Builder;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::time::Duration;

/// Default request timeout, matching what the flight API needs for a 6 hour window.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(25);

/// How the API key travels with the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    /// Sent as a request header, e.g. `x-rapidapi-key`.
    Header { name: String, key: ApiKey },
    /// Sent as a query parameter, e.g. `appid`.
    Query { name: String, key: ApiKey },
}

/// How a [`TimeRange`] is encoded into the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RangeEncoding {
    /// The endpoint does not take a range; every sub-range issues the same request.
    Ignored,
    /// `{endpoint}/{start}/{end}`, both rendered with `format` in zone `tz`.
    PathSegments { format: String, tz: Tz },
    /// `?{start_param}={start}&{end_param}={end}`, rendered with `format` in zone `tz`.
    QueryParams {
        start_param: String,
        end_param: String,
        format: String,
        tz: Tz,
    },
}

impl RangeEncoding {
    pub(crate) fn render(instant: DateTime<Utc>, format: &str, tz: Tz) -> String {
        instant.with_timezone(&tz).format(format).to_string()
    }
}

/// Everything needed to issue one request against a source: endpoint,
/// range encoding, fixed query parameters and headers, the credential and
/// where the entry list sits in the response.
///
/// # Examples
///
/// ```
/// use acquisition::{ApiKey, Credential, SourceDescriptor};
///
/// let source = SourceDescriptor::builder()
///     .name("openweather-forecast")
///     .endpoint("https://api.openweathermap.org/data/2.5/forecast")
///     .entries_pointer("/list")
///     .query(vec![("q".into(), "Berlin,DE".into()), ("units".into(), "metric".into())])
///     .credential(Credential::Query {
///         name: "appid".into(),
///         key: ApiKey::new("secret").unwrap(),
///     })
///     .build();
/// assert_eq!(source.entries_pointer(), "/list");
/// ```
#[derive(Debug, Clone, Builder)]
pub struct SourceDescriptor {
    /// Short label used in log lines.
    #[builder(into)]
    name: String,
    #[builder(into)]
    endpoint: String,
    #[builder(default = RangeEncoding::Ignored)]
    range_encoding: RangeEncoding,
    #[builder(default)]
    query: Vec<(String, String)>,
    #[builder(default)]
    headers: Vec<(String, String)>,
    credential: Option<Credential>,
    /// JSON pointer to the entry list, e.g. `/arrivals`.
    #[builder(into)]
    entries_pointer: String,
    #[builder(default = DEFAULT_TIMEOUT)]
    timeout: Duration,
}

impl SourceDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn range_encoding(&self) -> &RangeEncoding {
        &self.range_encoding
    }

    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    pub fn entries_pointer(&self) -> &str {
        &self.entries_pointer
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// The URL for one sub-range, without query parameters.
    pub fn url_for(&self, range: &TimeRange) -> String {
        match &self.range_encoding {
            RangeEncoding::PathSegments { format, tz } => format!(
                "{}/{}/{}",
                self.endpoint.trim_end_matches('/'),
                RangeEncoding::render(range.start(), format, *tz),
                RangeEncoding::render(range.end(), format, *tz),
            ),
            RangeEncoding::Ignored | RangeEncoding::QueryParams { .. } => self.endpoint.clone(),
        }
    }

    /// Query parameters for one sub-range: fixed ones, the range (when
    /// encoded as parameters) and a query credential.
    pub(crate) fn query_for(&self, range: &TimeRange) -> Vec<(String, String)> {
        let mut params = self.query.clone();
        if let RangeEncoding::QueryParams {
            start_param,
            end_param,
            format,
            tz,
        } = &self.range_encoding
        {
            params.push((
                start_param.clone(),
                RangeEncoding::render(range.start(), format, *tz),
            ));
            params.push((
                end_param.clone(),
                RangeEncoding::render(range.end(), format, *tz),
            ));
        }
        if let Some(Credential::Query { name, key }) = &self.credential {
            params.push((name.clone(), key.expose().to_string()));
        }
        params
    }

    /// Headers for every request: fixed ones plus a header credential.
    pub(crate) fn headers_for(&self) -> Vec<(String, String)> {
        let mut headers = self.headers.clone();
        if let Some(Credential::Header { name, key }) = &self.credential {
            headers.push((name.clone(), key.expose().to_string()));
        }
        headers
    }
}
