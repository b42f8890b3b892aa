/// Environment Agency flood-monitoring API client.
///
/// Handles URL construction, JSON response parsing and blocking HTTP access
/// for the endpoints the dashboard needs:
///   https://environment.data.gov.uk/flood-monitoring/id/stations
///   https://environment.data.gov.uk/flood-monitoring/id/stations/{id}/measures
///   https://environment.data.gov.uk/flood-monitoring/id/{stations|measures}/{id}/readings
///
/// Every list response wraps its records in an `items` array. See
/// `fixtures.rs` for annotated examples of the payloads.

use crate::config::DashboardConfig;
use crate::model::{FloodApiError, Measure, RawReading, ReadingsTarget, Station};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;

pub const DEFAULT_BASE_URL: &str = "https://environment.data.gov.uk/flood-monitoring/id";

const USER_AGENT: &str = concat!("flood_dashboard/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Serde structures for the linked-data JSON envelope
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct ItemsEnvelope<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Deserialize)]
struct StationItem {
    notation: Option<String>,
    #[serde(default)]
    label: Value,
    #[serde(default)]
    lat: Value,
    #[serde(default)]
    long: Value,
}

#[derive(Deserialize)]
struct MeasureItem {
    notation: Option<String>,
    #[serde(default)]
    label: Value,
    #[serde(rename = "parameterName")]
    parameter_name: Option<String>,
    #[serde(rename = "unitName")]
    unit_name: Option<String>,
}

#[derive(Deserialize)]
struct ReadingItem {
    #[serde(rename = "dateTime")]
    date_time: Option<String>,
    #[serde(default)]
    value: Value,
    #[serde(default)]
    measure: Value,
}

/// Takes a scalar, or the first element of an array of scalars.
fn first_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Array(values) => values.iter().find_map(first_string),
        _ => None,
    }
}

fn first_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Array(values) => values.iter().find_map(first_f64),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// URL construction
// ---------------------------------------------------------------------------

/// `{base}/stations`
pub fn build_stations_url(base_url: &str) -> String {
    format!("{}/stations", base_url.trim_end_matches('/'))
}

/// `{base}/stations/{id}/measures`
pub fn build_measures_url(base_url: &str, station_id: &str) -> String {
    format!(
        "{}/stations/{}/measures",
        base_url.trim_end_matches('/'),
        urlencoding::encode(station_id)
    )
}

/// `{base}/{stations|measures}/{id}/readings?_sorted&since={since}`
///
/// `_sorted` asks the API for ascending time order; `since` must already be
/// an ISO 8601 instant (see [`since_timestamp`]).
pub fn build_readings_url(base_url: &str, target: &ReadingsTarget, since: &str) -> String {
    let collection = match target {
        ReadingsTarget::Station(_) => "stations",
        ReadingsTarget::Measure(_) => "measures",
    };

    format!(
        "{}/{}/{}/readings?_sorted&since={}",
        base_url.trim_end_matches('/'),
        collection,
        urlencoding::encode(target.id()),
        since
    )
}

/// Start of the lookback window as a UTC instant with an explicit `Z`
/// suffix, e.g. `"2024-01-01T00:00:00Z"`.
///
/// A window reaching past the earliest representable instant is clamped to
/// it rather than overflowing.
pub fn since_timestamp(now: DateTime<Utc>, lookback: Duration) -> String {
    now.checked_sub_signed(lookback)
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
        .format("%Y-%m-%dT%H:%M:%SZ")
        .to_string()
}

// ---------------------------------------------------------------------------
// Response parsing
// ---------------------------------------------------------------------------

fn parse_envelope<T: for<'de> Deserialize<'de>>(json: &str) -> Result<Vec<T>, FloodApiError> {
    let envelope: ItemsEnvelope<T> = serde_json::from_str(json).map_err(|e| {
        FloodApiError::MalformedResponse(format!("JSON deserialization failed: {}", e))
    })?;
    Ok(envelope.items)
}

/// Parses a `/stations` response body into stations in API order.
///
/// Items without a `notation` are skipped, and only the first item for any
/// repeated notation is kept, so the result is unique by `id`.
///
/// # Errors
/// - `FloodApiError::MalformedResponse`: body is not JSON or `items` is not
///   an array of objects.
pub fn parse_stations_response(json: &str) -> Result<Vec<Station>, FloodApiError> {
    let items: Vec<StationItem> = parse_envelope(json)?;

    let mut seen = HashSet::new();
    let mut stations = Vec::with_capacity(items.len());

    for item in items {
        let Some(id) = item.notation else {
            tracing::debug!("skipping station record without notation");
            continue;
        };
        if !seen.insert(id.clone()) {
            tracing::debug!(station = %id, "skipping duplicate station notation");
            continue;
        }

        stations.push(Station {
            label: first_string(&item.label).unwrap_or_else(|| id.clone()),
            lat: first_f64(&item.lat),
            lon: first_f64(&item.long),
            id,
        });
    }

    Ok(stations)
}

/// Parses a `/stations/{id}/measures` response body.
///
/// Falls back to `parameterName`, then the notation, when a measure has no
/// label.
pub fn parse_measures_response(json: &str) -> Result<Vec<Measure>, FloodApiError> {
    let items: Vec<MeasureItem> = parse_envelope(json)?;

    Ok(items
        .into_iter()
        .filter_map(|item| {
            let id = item.notation?;
            let label = first_string(&item.label)
                .or(item.parameter_name)
                .unwrap_or_else(|| id.clone());
            Some(Measure {
                id,
                label,
                unit: item.unit_name.unwrap_or_default(),
            })
        })
        .collect())
}

/// Parses a readings response body into raw records, preserving order.
///
/// Records without a `dateTime` cannot be placed on a time axis and are
/// dropped here; value checking is left to the normalizer.
pub fn parse_readings_response(json: &str) -> Result<Vec<RawReading>, FloodApiError> {
    let items: Vec<ReadingItem> = parse_envelope(json)?;

    Ok(items
        .into_iter()
        .filter_map(|item| {
            Some(RawReading {
                date_time: item.date_time?,
                measure: first_string(&item.measure),
                value: item.value,
            })
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Data source trait + HTTP client
// ---------------------------------------------------------------------------

/// Anything that can answer the three upstream queries.
///
/// Implemented by the live HTTP client and by the caching wrapper in
/// `cache.rs`; tests provide in-memory implementations.
pub trait FloodDataSource: Send + Sync {
    fn fetch_stations(&self) -> Result<Vec<Station>, FloodApiError>;
    fn fetch_measures(&self, station_id: &str) -> Result<Vec<Measure>, FloodApiError>;
    fn fetch_readings(&self, target: &ReadingsTarget) -> Result<Vec<RawReading>, FloodApiError>;

    /// Drop expired cached responses, returning how many were evicted.
    /// Uncached sources have nothing to drop.
    fn purge_expired(&self) -> usize {
        0
    }
}

/// Blocking client for the live flood-monitoring API.
pub struct FloodApiClient {
    http: reqwest::blocking::Client,
    base_url: String,
    lookback: Duration,
}

impl FloodApiClient {
    /// Build a client with an explicit per-request timeout.
    pub fn new(
        base_url: &str,
        timeout: std::time::Duration,
        lookback: Duration,
    ) -> Result<Self, FloodApiError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| FloodApiError::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            lookback,
        })
    }

    pub fn from_config(config: &DashboardConfig) -> Result<Self, FloodApiError> {
        Self::new(
            &config.api_base_url,
            config.request_timeout(),
            config.lookback(),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn get_body(&self, url: &str) -> Result<String, FloodApiError> {
        tracing::debug!(%url, "GET");

        let response = self
            .http
            .get(url)
            .header("Accept", "application/json")
            .send()?;

        if !response.status().is_success() {
            return Err(FloodApiError::HttpStatus(response.status().as_u16()));
        }

        Ok(response.text()?)
    }
}

impl FloodDataSource for FloodApiClient {
    fn fetch_stations(&self) -> Result<Vec<Station>, FloodApiError> {
        let body = self.get_body(&build_stations_url(&self.base_url))?;
        parse_stations_response(&body)
    }

    fn fetch_measures(&self, station_id: &str) -> Result<Vec<Measure>, FloodApiError> {
        let body = self.get_body(&build_measures_url(&self.base_url, station_id))?;
        parse_measures_response(&body)
    }

    fn fetch_readings(&self, target: &ReadingsTarget) -> Result<Vec<RawReading>, FloodApiError> {
        let since = since_timestamp(Utc::now(), self.lookback);
        let body = self.get_body(&build_readings_url(&self.base_url, target, &since))?;
        parse_readings_response(&body)
    }
}

// ---------------------------------------------------------------------------
// Recoverable fetches
// ---------------------------------------------------------------------------

/// Result of a fetch after failure recovery: on error `items` is empty and
/// `warning` holds the cause, so callers degrade to an empty chart/table.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchOutcome<T> {
    pub items: Vec<T>,
    pub warning: Option<FloodApiError>,
}

impl<T> FetchOutcome<T> {
    fn recover(what: &str, result: Result<Vec<T>, FloodApiError>) -> Self {
        match result {
            Ok(items) => Self { items, warning: None },
            Err(err) => {
                tracing::warn!(error = %err, "{} failed; continuing with no data", what);
                Self {
                    items: Vec::new(),
                    warning: Some(err),
                }
            }
        }
    }

    /// A successful fetch that returned zero items.
    pub fn is_empty_result(&self) -> bool {
        self.warning.is_none() && self.items.is_empty()
    }
}

pub fn list_stations<S: FloodDataSource + ?Sized>(source: &S) -> FetchOutcome<Station> {
    FetchOutcome::recover("station list", source.fetch_stations())
}

pub fn list_measures<S: FloodDataSource + ?Sized>(
    source: &S,
    station_id: &str,
) -> FetchOutcome<Measure> {
    let what = format!("measures for {}", station_id);
    FetchOutcome::recover(&what, source.fetch_measures(station_id))
}

pub fn list_readings<S: FloodDataSource + ?Sized>(
    source: &S,
    target: &ReadingsTarget,
) -> FetchOutcome<RawReading> {
    let what = format!("readings for {} {}", target.kind(), target.id());
    FetchOutcome::recover(&what, source.fetch_readings(target))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
