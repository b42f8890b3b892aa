/// HTTP endpoint for the presentation layer.
///
/// Serves the most recent `DashboardView` as JSON and accepts selection
/// changes, so any UI (browser page, notebook, terminal widget) can drive
/// the dashboard without linking against this crate.
///
/// Endpoints:
/// - GET /health    - Service health check
/// - GET /dashboard - Latest rendered view plus scheduler state
/// - GET /select?station={id}[&measure={id}] - Change selection
///   (no `station` clears it)

use crate::scheduler::{LatestView, SchedulerHandle};
use serde_json::json;
use std::collections::HashMap;
use threadpool::ThreadPool;

/// Requests are handled on a small pool so a slow client can't stall others.
const WORKER_THREADS: usize = 4;

type JsonResponse = tiny_http::Response<std::io::Cursor<Vec<u8>>>;

/// Everything a request handler can touch.
#[derive(Clone)]
pub struct EndpointState {
    pub scheduler: SchedulerHandle,
    pub latest: LatestView,
}

// ---------------------------------------------------------------------------
// Routing
// ---------------------------------------------------------------------------

/// Splits `path?query` and decodes the query into a map. Later duplicate
/// keys overwrite earlier ones.
fn parse_query(url: &str) -> (&str, HashMap<String, String>) {
    let (path, query) = url.split_once('?').unwrap_or((url, ""));

    let params = query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let value = value.replace('+', " ");
            let value = urlencoding::decode(&value).ok()?.into_owned();
            Some((key.to_string(), value))
        })
        .collect();

    (path, params)
}

/// Maps a request URL to a status code and JSON body.
pub fn route(url: &str, state: &EndpointState) -> (u16, serde_json::Value) {
    let (path, params) = parse_query(url);

    match path {
        "/health" => handle_health(),
        "/dashboard" => handle_dashboard(state),
        "/select" => handle_select(state, params),
        _ => (
            404,
            json!({
                "error": "Not found",
                "available_endpoints": ["/health", "/dashboard", "/select?station={id}&measure={id}"]
            }),
        ),
    }
}

fn handle_health() -> (u16, serde_json::Value) {
    (
        200,
        json!({
            "status": "ok",
            "service": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION")
        }),
    )
}

fn handle_dashboard(state: &EndpointState) -> (u16, serde_json::Value) {
    (
        200,
        json!({
            "scheduler": state.scheduler.state(),
            "view": state.latest.get(),
        }),
    )
}

fn handle_select(state: &EndpointState, mut params: HashMap<String, String>) -> (u16, serde_json::Value) {
    let station = params.remove("station");
    let measure = params.remove("measure");

    if state.scheduler.select(station.clone(), measure.clone()) {
        (
            202,
            json!({
                "accepted": true,
                "station": station,
                "measure": measure
            }),
        )
    } else {
        (503, json!({ "error": "Refresh scheduler is not running" }))
    }
}

// ---------------------------------------------------------------------------
// HTTP Server
// ---------------------------------------------------------------------------

/// Bind the endpoint server. Port 0 picks a free port.
pub fn bind(addr: &str) -> Result<tiny_http::Server, String> {
    tiny_http::Server::http(addr).map_err(|e| format!("Failed to start HTTP server: {}", e))
}

/// Start HTTP endpoint server on the specified port (blocks forever).
pub fn start_endpoint_server(port: u16, state: EndpointState) -> Result<(), String> {
    let server = bind(&format!("0.0.0.0:{}", port))?;

    tracing::info!("HTTP endpoint listening on http://0.0.0.0:{}", port);
    tracing::info!("  GET /health    - Service health check");
    tracing::info!("  GET /dashboard - Latest dashboard view");
    tracing::info!("  GET /select?station={{id}}&measure={{id}} - Change selection");

    serve(server, state);
    Ok(())
}

/// Serve requests from an already bound server until it shuts down.
pub fn serve(server: tiny_http::Server, state: EndpointState) {
    let pool = ThreadPool::new(WORKER_THREADS);

    for request in server.incoming_requests() {
        let state = state.clone();
        pool.execute(move || {
            let (status, body) = route(request.url(), &state);
            tracing::debug!(method = %request.method(), url = %request.url(), status, "request");

            if let Err(e) = request.respond(create_response(status, body)) {
                tracing::warn!(error = %e, "failed to send response");
            }
        });
    }

    pool.join();
}

/// Create HTTP response with JSON body
fn create_response(status_code: u16, json: serde_json::Value) -> JsonResponse {
    let body = serde_json::to_string_pretty(&json).unwrap_or_else(|_| "{}".to_string());

    let mut response = tiny_http::Response::from_data(body.into_bytes())
        .with_status_code(tiny_http::StatusCode::from(status_code));

    if let Ok(header) =
        tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
    {
        response.add_header(header);
    }

    response
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
