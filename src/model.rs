/// Core data types for the flood dashboard service.
///
/// This module defines the shared domain model imported by all other modules:
/// stations, measures, raw and normalized readings, the presentation view
/// handed to the UI layer, and the error type for upstream API calls.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Upstream entities
// ---------------------------------------------------------------------------

/// A flood/river monitoring station from the `/stations` endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    /// Station notation, e.g. "1491TH". Unique across the station set.
    pub id: String,
    pub label: String,
    /// WGS84 latitude, when the station publishes one.
    pub lat: Option<f64>,
    /// WGS84 longitude, when the station publishes one.
    pub lon: Option<f64>,
}

impl Station {
    /// Coordinates as a `(lat, lon)` pair, only if both are present.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => None,
        }
    }
}

/// A quantity tracked at a station (e.g. water level), with its unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measure {
    pub id: String,
    pub label: String,
    pub unit: String,
}

impl Measure {
    /// Selector label: `"Water Level (mASD)"`, or the bare label when the
    /// measure publishes no unit.
    pub fn display_label(&self) -> String {
        if self.unit.is_empty() {
            self.label.clone()
        } else {
            format!("{} ({})", self.label, self.unit)
        }
    }
}

/// One reading record exactly as the API returned it.
///
/// `value` stays a JSON value because upstream occasionally sends nulls,
/// strings or arrays; the normalizer decides what survives.
#[derive(Debug, Clone, PartialEq)]
pub struct RawReading {
    pub date_time: String,
    pub value: serde_json::Value,
    /// Measure URI the reading belongs to (present on station-wide queries).
    pub measure: Option<String>,
}

/// A normalized reading row: `{"time": "2024-01-01 00:00:00", "value": 1.23}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    #[serde(rename = "time")]
    pub timestamp: String,
    pub value: f64,
}

/// Which readings endpoint to query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ReadingsTarget {
    /// `/stations/{id}/readings`: every measure at the station.
    Station(String),
    /// `/measures/{id}/readings`: a single measure.
    Measure(String),
}

impl ReadingsTarget {
    pub fn id(&self) -> &str {
        match self {
            ReadingsTarget::Station(id) | ReadingsTarget::Measure(id) => id,
        }
    }

    /// Short tag used in cache keys and log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            ReadingsTarget::Station(_) => "station",
            ReadingsTarget::Measure(_) => "measure",
        }
    }
}

// ---------------------------------------------------------------------------
// Presentation outputs
// ---------------------------------------------------------------------------

/// One entry of a selector: machine id plus human label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelOption {
    pub id: String,
    pub label: String,
}

/// A station marker on the map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapPoint {
    pub lat: f64,
    pub lon: f64,
    pub label: String,
    pub highlighted: bool,
}

/// Everything the map widget needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapView {
    pub center_lat: f64,
    pub center_lon: f64,
    pub points: Vec<MapPoint>,
}

/// User-visible notice attached to a view.
///
/// A failed fetch and a successful-but-empty fetch are kept distinct so the
/// UI can show a warning in one case and a neutral message in the other.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum Notice {
    Warning(String),
    NoData(String),
}

/// The complete data contract handed to the presentation layer after one
/// refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardView {
    pub station_placeholder: String,
    pub station_options: Vec<LabelOption>,
    pub selected_station: Option<String>,
    pub selected_station_label: Option<String>,
    pub measure_placeholder: String,
    pub measure_options: Vec<LabelOption>,
    pub selected_measure: Option<String>,
    pub selected_measure_label: Option<String>,
    pub chart_title: String,
    pub readings: Vec<Reading>,
    pub map: MapView,
    pub notices: Vec<Notice>,
    /// UTC time the view was composed, `YYYY-MM-DD HH:MM:SS`.
    pub fetched_at: String,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can arise when fetching or parsing flood-monitoring API data.
///
/// None of these are fatal: the client boundary turns each into a warning
/// notice and an empty result.
#[derive(Debug, Clone, PartialEq)]
pub enum FloodApiError {
    /// Connection failure, DNS error or request timeout.
    Network(String),
    /// Non-2xx HTTP response from the API.
    HttpStatus(u16),
    /// The response body could not be deserialized.
    MalformedResponse(String),
}

impl std::fmt::Display for FloodApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FloodApiError::Network(msg) => write!(f, "Network error: {}", msg),
            FloodApiError::HttpStatus(code) => write!(f, "HTTP error: {}", code),
            FloodApiError::MalformedResponse(msg) => write!(f, "Malformed response: {}", msg),
        }
    }
}

impl std::error::Error for FloodApiError {}

impl From<reqwest::Error> for FloodApiError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            FloodApiError::HttpStatus(status.as_u16())
        } else if err.is_decode() {
            FloodApiError::MalformedResponse(err.to_string())
        } else {
            FloodApiError::Network(err.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
