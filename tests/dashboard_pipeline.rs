/// Pipeline tests against a local stand-in for the flood-monitoring API.
///
/// A tiny_http server on 127.0.0.1 serves canned payloads by path and
/// records every request, so these tests exercise the real blocking client,
/// the cache, the dashboard controller and the scheduler without touching
/// the network.

use flood_dashboard::cache::CachedSource;
use flood_dashboard::config::DashboardConfig;
use flood_dashboard::dashboard::{Dashboard, Selection};
use flood_dashboard::ingest::flood_api::{FloodApiClient, FloodDataSource};
use flood_dashboard::model::{FloodApiError, Notice, Reading, ReadingsTarget};
use flood_dashboard::scheduler::{LatestView, RefreshScheduler, SchedulerSettings};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

const STATIONS_JSON: &str = r#"{
  "@context": "http://environment.data.gov.uk/flood-monitoring/meta/context.jsonld",
  "items": [
    { "notation": "1491TH", "label": "Thames at X", "lat": 51.5, "long": -0.1 },
    { "notation": "E2043", "label": "Surfleet Sluice", "lat": 52.845991, "long": -0.100848 }
  ]
}"#;

const MEASURES_JSON: &str = r#"{
  "items": [
    {
      "notation": "1491TH-level-stage-i-15_min-mASD",
      "label": "Water Level",
      "parameterName": "Water Level",
      "unitName": "mASD"
    }
  ]
}"#;

const STATION_READINGS_JSON: &str = r#"{
  "items": [
    { "dateTime": "2024-01-01T00:00:00Z", "value": 1.23,
      "measure": "http://environment.data.gov.uk/flood-monitoring/id/measures/1491TH-level-stage-i-15_min-mASD" }
  ]
}"#;

const MEASURE_READINGS_JSON: &str = r#"{
  "items": [
    { "dateTime": "2024-01-01T00:00:00Z", "value": 0.412 },
    { "dateTime": "2024-01-01T00:15:00Z", "value": null },
    { "dateTime": "2024-01-01T00:30:00Z", "value": "0.418" }
  ]
}"#;

// ---------------------------------------------------------------------------
// Mock API server
// ---------------------------------------------------------------------------

/// Serves `(status, body)` by request path (query ignored), 404 otherwise.
/// Every response can be held back by a fixed delay.
struct MockApi {
    server: Arc<tiny_http::Server>,
    requests: Arc<Mutex<Vec<String>>>,
    thread: Option<JoinHandle<()>>,
    base_url: String,
}

impl MockApi {
    fn start(routes: &[(&str, u16, &str)]) -> Self {
        Self::start_delayed(routes, Duration::ZERO)
    }

    fn start_delayed(routes: &[(&str, u16, &str)], delay: Duration) -> Self {
        let server = Arc::new(tiny_http::Server::http("127.0.0.1:0").expect("bind mock server"));
        let addr = server.server_addr().to_ip().expect("mock server has an IP address");
        let base_url = format!("http://{}/flood-monitoring/id", addr);

        let routes: HashMap<String, (u16, String)> = routes
            .iter()
            .map(|(path, status, body)| {
                (format!("/flood-monitoring/id{}", path), (*status, body.to_string()))
            })
            .collect();
        let requests = Arc::new(Mutex::new(Vec::new()));

        let thread = {
            let server = Arc::clone(&server);
            let requests = Arc::clone(&requests);
            std::thread::spawn(move || {
                for request in server.incoming_requests() {
                    let url = request.url().to_string();
                    requests.lock().unwrap().push(url.clone());

                    let path = url.split('?').next().unwrap_or("");
                    let (status, body) = routes
                        .get(path)
                        .cloned()
                        .unwrap_or((404, r#"{"error":"not found"}"#.to_string()));

                    std::thread::sleep(delay);
                    let response = tiny_http::Response::from_string(body).with_status_code(status);
                    let _ = request.respond(response);
                }
            })
        };

        MockApi {
            server,
            requests,
            thread: Some(thread),
            base_url,
        }
    }

    fn client(&self) -> FloodApiClient {
        FloodApiClient::new(&self.base_url, Duration::from_secs(5), chrono::Duration::hours(24))
            .expect("client builds")
    }

    fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    /// How many requests hit `path` (query ignored).
    fn hits(&self, path: &str) -> usize {
        let full = format!("/flood-monitoring/id{}", path);
        self.requests()
            .iter()
            .filter(|url| url.split('?').next() == Some(full.as_str()))
            .count()
    }
}

impl Drop for MockApi {
    fn drop(&mut self) {
        self.server.unblock();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn standard_api() -> MockApi {
    MockApi::start(&[
        ("/stations", 200, STATIONS_JSON),
        ("/stations/1491TH/measures", 200, MEASURES_JSON),
        ("/stations/1491TH/readings", 200, STATION_READINGS_JSON),
        (
            "/measures/1491TH-level-stage-i-15_min-mASD/readings",
            200,
            MEASURE_READINGS_JSON,
        ),
    ])
}

fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    condition()
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

#[test]
fn test_client_fetches_and_parses_stations() {
    let api = standard_api();
    let stations = api.client().fetch_stations().expect("stations load");

    assert_eq!(stations.len(), 2);
    assert_eq!(stations[0].id, "1491TH");
    assert_eq!(stations[0].coordinates(), Some((51.5, -0.1)));
}

#[test]
fn test_readings_request_is_sorted_and_bounded() {
    let api = standard_api();
    api.client()
        .fetch_readings(&ReadingsTarget::Station("1491TH".to_string()))
        .expect("readings load");

    let requests = api.requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].starts_with("/flood-monitoring/id/stations/1491TH/readings?_sorted&since="));
    assert!(requests[0].ends_with('Z'), "since is a UTC instant: {}", requests[0]);
}

#[test]
fn test_http_500_is_an_http_status_error() {
    let api = MockApi::start(&[("/stations", 500, "internal error")]);
    let err = api.client().fetch_stations().unwrap_err();
    assert_eq!(err, FloodApiError::HttpStatus(500));
}

#[test]
fn test_missing_items_key_is_empty_not_an_error() {
    let api = MockApi::start(&[("/stations", 200, r#"{"meta": {"version": "0.9"}}"#)]);
    let stations = api.client().fetch_stations().expect("missing items is not an error");
    assert!(stations.is_empty());
}

#[test]
fn test_non_json_body_is_malformed() {
    let api = MockApi::start(&[("/stations", 200, "<html>maintenance</html>")]);
    let err = api.client().fetch_stations().unwrap_err();
    assert!(matches!(err, FloodApiError::MalformedResponse(_)));
}

#[test]
fn test_unreachable_api_is_a_network_error() {
    // Bind then drop to get a port nobody is listening on.
    let base_url = {
        let api = MockApi::start(&[]);
        api.base_url.clone()
    };
    let client =
        FloodApiClient::new(&base_url, Duration::from_secs(2), chrono::Duration::hours(24)).unwrap();

    let err = client.fetch_stations().unwrap_err();
    assert!(matches!(err, FloodApiError::Network(_)), "got {:?}", err);
}

#[test]
fn test_slow_api_times_out_as_network_error() {
    let api = MockApi::start_delayed(&[("/stations", 200, STATIONS_JSON)], Duration::from_secs(2));
    let client = FloodApiClient::new(
        &api.base_url,
        Duration::from_millis(200),
        chrono::Duration::hours(24),
    )
    .unwrap();

    let started = Instant::now();
    let err = client.fetch_stations().unwrap_err();

    assert!(matches!(err, FloodApiError::Network(_)), "got {:?}", err);
    assert!(started.elapsed() < Duration::from_millis(1500), "request was not cut off");
}

#[test]
fn test_slow_api_becomes_a_warning_in_the_view() {
    let api = MockApi::start_delayed(&[("/stations", 200, STATIONS_JSON)], Duration::from_secs(2));
    let client = FloodApiClient::new(
        &api.base_url,
        Duration::from_millis(200),
        chrono::Duration::hours(24),
    )
    .unwrap();
    let mut dashboard = Dashboard::new(client, &DashboardConfig::default());

    dashboard.select(Selection::new(Some("1491TH".to_string()), None));
    let view = dashboard.refresh();

    assert!(view.station_options.is_empty());
    assert!(
        view.notices
            .iter()
            .any(|n| matches!(n, Notice::Warning(msg) if msg.starts_with("Could not load stations: Network error"))),
        "notices: {:?}",
        view.notices
    );
}

// ---------------------------------------------------------------------------
// Dashboard over HTTP
// ---------------------------------------------------------------------------

#[test]
fn test_selecting_a_station_charts_its_readings() {
    let api = standard_api();
    let mut dashboard = Dashboard::new(api.client(), &DashboardConfig::default());

    dashboard.select(Selection::new(Some("1491TH".to_string()), None));
    let view = dashboard.refresh();

    assert_eq!(
        view.readings,
        vec![Reading {
            timestamp: "2024-01-01 00:00:00".to_string(),
            value: 1.23,
        }]
    );
    assert_eq!(view.selected_station.as_deref(), Some("1491TH"));
    assert_eq!(view.selected_station_label.as_deref(), Some("Thames at X"));
    assert_eq!((view.map.center_lat, view.map.center_lon), (51.5, -0.1));
    assert!(view.notices.is_empty(), "unexpected notices: {:?}", view.notices);

    let highlighted: Vec<_> = view.map.points.iter().filter(|p| p.highlighted).collect();
    assert_eq!(highlighted.len(), 1);
    assert_eq!(highlighted[0].label, "Thames at X");
}

#[test]
fn test_selecting_a_measure_drops_invalid_values() {
    let api = standard_api();
    let mut dashboard = Dashboard::new(api.client(), &DashboardConfig::default());

    dashboard.select(Selection::new(
        Some("1491TH".to_string()),
        Some("1491TH-level-stage-i-15_min-mASD".to_string()),
    ));
    let view = dashboard.refresh();

    let values: Vec<f64> = view.readings.iter().map(|r| r.value).collect();
    assert_eq!(values, vec![0.412, 0.418]);
    assert_eq!(view.selected_measure_label.as_deref(), Some("Water Level (mASD)"));
    assert_eq!(api.hits("/stations/1491TH/readings"), 0);
}

#[test]
fn test_station_list_failure_becomes_a_warning() {
    let api = MockApi::start(&[("/stations", 500, "internal error")]);
    let mut dashboard = Dashboard::new(api.client(), &DashboardConfig::default());

    dashboard.select(Selection::new(Some("1491TH".to_string()), None));
    let view = dashboard.refresh();

    assert!(view.station_options.is_empty());
    assert!(view.readings.is_empty());
    assert!(
        view.notices
            .iter()
            .any(|n| matches!(n, Notice::Warning(msg) if msg.contains("HTTP error: 500"))),
        "notices: {:?}",
        view.notices
    );
}

#[test]
fn test_empty_readings_is_no_data_not_a_warning() {
    let api = MockApi::start(&[
        ("/stations", 200, STATIONS_JSON),
        ("/stations/E2043/measures", 200, r#"{"items": []}"#),
        ("/stations/E2043/readings", 200, r#"{"items": []}"#),
    ]);
    let mut dashboard = Dashboard::new(api.client(), &DashboardConfig::default());

    dashboard.select(Selection::new(Some("E2043".to_string()), None));
    let view = dashboard.refresh();

    assert_eq!(
        view.notices,
        vec![Notice::NoData(
            "No readings available for the selected station.".to_string()
        )]
    );
}

// ---------------------------------------------------------------------------
// Cache
// ---------------------------------------------------------------------------

#[test]
fn test_cached_source_hits_upstream_once_per_ttl() {
    let api = standard_api();
    let source = CachedSource::new(api.client(), Duration::from_secs(60));
    let mut dashboard = Dashboard::new(source, &DashboardConfig::default());

    dashboard.select(Selection::new(Some("1491TH".to_string()), None));
    let first = dashboard.refresh();
    let second = dashboard.refresh();

    assert_eq!(first.readings, second.readings);
    assert_eq!(api.hits("/stations"), 1);
    assert_eq!(api.hits("/stations/1491TH/measures"), 1);
    assert_eq!(api.hits("/stations/1491TH/readings"), 1);
}

#[test]
fn test_failed_fetch_is_retried_not_cached() {
    let api = MockApi::start(&[("/stations", 503, "busy")]);
    let source = CachedSource::new(api.client(), Duration::from_secs(60));

    assert!(source.fetch_stations().is_err());
    assert!(source.fetch_stations().is_err());
    assert_eq!(api.hits("/stations"), 2);
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

#[test]
fn test_scheduler_refreshes_repeatedly_against_live_client() {
    let api = standard_api();
    let latest = LatestView::new();
    let dashboard = Dashboard::new(api.client(), &DashboardConfig::default());

    let scheduler = RefreshScheduler::spawn(
        dashboard,
        latest.clone(),
        SchedulerSettings {
            tick: Duration::from_millis(20),
            interval_ticks: 2,
        },
    );
    assert_eq!(api.hits("/stations"), 0, "idle until something is selected");

    scheduler.select(Some("1491TH".to_string()), None);

    assert!(wait_until(Duration::from_secs(10), || api.hits("/stations") >= 3));
    let view = latest.get().expect("a view was rendered");
    assert_eq!(view.selected_station.as_deref(), Some("1491TH"));
    assert_eq!(view.readings.len(), 1);

    scheduler.stop();
    let hits_after_stop = api.hits("/stations");
    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(api.hits("/stations"), hits_after_stop);
}
