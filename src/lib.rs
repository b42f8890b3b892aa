/// flood_dashboard: data pipeline behind a river-level dashboard for the
/// Environment Agency flood-monitoring API.
///
/// # Module structure
///
/// ```text
/// flood_dashboard
/// ├── model       — shared data types (Station, Measure, Reading, DashboardView, FloodApiError, …)
/// ├── config      — dashboard.toml + environment overrides
/// ├── logging     — tracing subscriber setup
/// ├── ingest
/// │   ├── flood_api — flood-monitoring API: URL construction, JSON parsing, blocking client
/// │   └── fixtures (test only) — representative API response payloads
/// ├── normalize   — raw readings → (timestamp, value) pairs, invalid records dropped
/// ├── cache       — per-key TTL memoization in front of any FloodDataSource
/// ├── dashboard   — selection state, option lists, map and chart view assembly
/// ├── scheduler   — fetch → render → wait refresh cycle on a worker thread
/// └── endpoint    — JSON HTTP API over the scheduler for presentation layers
/// ```

/// Public modules
pub mod cache;
pub mod config;
pub mod dashboard;
pub mod endpoint;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod normalize;
pub mod scheduler;
