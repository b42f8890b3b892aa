//! Flood Dashboard - Refresh Service
//!
//! Keeps a river-level dashboard view current for one selected station:
//! 1. Loads the station list from the flood-monitoring API
//! 2. Offers the selected station's measures
//! 3. Fetches and normalizes readings over the lookback window
//! 4. Re-fetches every refresh interval (cached responses in between)
//! 5. Serves the latest view over HTTP for any presentation layer
//!
//! Usage:
//!   cargo run --release -- --station 1491TH --once        # Print one view as JSON
//!   cargo run --release -- --station 1491TH               # Refresh forever, log each view
//!   cargo run --release -- --endpoint 8080                # Serve /dashboard, select via /select
//!   cargo run --release -- --config my.toml --station 1491TH --measure <id> --endpoint 8080
//!
//! Environment:
//!   FLOOD_API_BASE_URL, FLOOD_REFRESH_MINUTES, FLOOD_LOOKBACK_HOURS,
//!   FLOOD_REQUEST_TIMEOUT_SECS - configuration overrides (see dashboard.toml)
//!   RUST_LOG / FLOOD_LOG_LEVEL - log level

use anyhow::{Context, Result, bail};
use flood_dashboard::cache::CachedSource;
use flood_dashboard::config::load_config;
use flood_dashboard::dashboard::{Dashboard, Selection};
use flood_dashboard::endpoint::{self, EndpointState};
use flood_dashboard::ingest::flood_api::FloodApiClient;
use flood_dashboard::logging::init_tracing;
use flood_dashboard::model::DashboardView;
use flood_dashboard::scheduler::{
    LatestView, Presenter, RefreshScheduler, SchedulerSettings, SchedulerState,
};
use std::env;
use std::path::PathBuf;

const USAGE: &str = "[--config PATH] [--station ID] [--measure ID] [--endpoint PORT] [--once]";

#[derive(Debug, Default)]
struct Args {
    config: Option<PathBuf>,
    station: Option<String>,
    measure: Option<String>,
    endpoint_port: Option<u16>,
    once: bool,
}

fn parse_args(args: &[String]) -> Result<Args> {
    let mut parsed = Args::default();

    let mut i = 1;
    while i < args.len() {
        let flag = args[i].as_str();
        match flag {
            "--once" => {
                parsed.once = true;
                i += 1;
                continue;
            }
            "--config" | "--station" | "--measure" | "--endpoint" => {}
            _ => bail!("Unknown argument: {}\nUsage: {} {}", flag, args[0], USAGE),
        }

        let Some(value) = args.get(i + 1) else {
            bail!("{} requires a value", flag);
        };
        match flag {
            "--config" => parsed.config = Some(PathBuf::from(value)),
            "--station" => parsed.station = Some(value.clone()),
            "--measure" => parsed.measure = Some(value.clone()),
            _ => {
                let port = value
                    .parse()
                    .with_context(|| format!("--endpoint requires a port number, got {}", value))?;
                parsed.endpoint_port = Some(port);
            }
        }
        i += 2;
    }

    Ok(parsed)
}

/// Logs each rendered view and keeps it for the HTTP endpoint.
struct LogPresenter {
    latest: LatestView,
    /// Countdown ticks between progress log lines (about one minute).
    report_every: u64,
}

/// Ticks that make up roughly one minute of countdown.
fn ticks_per_minute(tick_seconds: u64) -> u64 {
    (60 / tick_seconds.max(1)).max(1)
}

fn should_report(remaining: u64, total: u64, report_every: u64) -> bool {
    remaining > 0 && remaining < total && remaining % report_every.max(1) == 0
}

impl Presenter for LogPresenter {
    fn render(&self, view: &DashboardView) {
        tracing::info!(
            station = view.selected_station.as_deref().unwrap_or("-"),
            measure = view.selected_measure.as_deref().unwrap_or("-"),
            readings = view.readings.len(),
            points = view.map.points.len(),
            "{}",
            view.chart_title
        );
        if let Some(last) = view.readings.last() {
            tracing::info!("  latest reading: {} = {}", last.timestamp, last.value);
        }
        for notice in &view.notices {
            tracing::warn!("  {:?}", notice);
        }
        self.latest.render(view);
    }

    fn progress(&self, remaining: u64, total: u64) {
        if should_report(remaining, total, self.report_every) {
            tracing::debug!("next refresh in {} of {} ticks", remaining, total);
        }
    }

    fn state_changed(&self, state: SchedulerState) {
        tracing::debug!(?state, "scheduler state");
    }
}

fn main() -> Result<()> {
    init_tracing();

    let args: Vec<String> = env::args().collect();
    let args = parse_args(&args)?;

    let config = load_config(args.config.as_deref())?;
    config.log_config();

    let client = FloodApiClient::from_config(&config).context("Failed to build HTTP client")?;
    let source = CachedSource::new(client, config.refresh_interval());
    let mut dashboard = Dashboard::new(source, &config);
    let selection = Selection::new(args.station, args.measure);

    if args.once {
        if selection.is_empty() {
            bail!("--once requires --station");
        }
        dashboard.select(selection);
        let view = dashboard.refresh();
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    if selection.is_empty() && args.endpoint_port.is_none() {
        bail!("Nothing to refresh: pass --station or --endpoint\nUsage: {}", USAGE);
    }

    let latest = LatestView::new();
    let presenter = LogPresenter {
        latest: latest.clone(),
        report_every: ticks_per_minute(config.tick_seconds),
    };
    let scheduler = RefreshScheduler::spawn(dashboard, presenter, SchedulerSettings::from_config(&config));

    if !selection.is_empty() {
        scheduler.select(selection.station, selection.measure);
    }

    if let Some(port) = args.endpoint_port {
        let state = EndpointState {
            scheduler: scheduler.handle(),
            latest,
        };
        std::thread::Builder::new()
            .name("endpoint".to_string())
            .spawn(move || {
                if let Err(e) = endpoint::start_endpoint_server(port, state) {
                    tracing::error!("Endpoint server error: {}", e);
                }
            })
            .context("Failed to spawn endpoint thread")?;
    }

    tracing::info!("Refresh scheduler running (Ctrl+C to stop)");
    scheduler.join();
    Ok(())
}
