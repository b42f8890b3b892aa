/// Dashboard configuration loader - parses dashboard.toml
///
/// Keeps the tunable parts of the pipeline (API base URL, refresh interval,
/// lookback window, request timeout, map fallback) out of the code. Every
/// field has a default, so the file is optional; environment variables
/// (optionally from `.env`) override whatever the file says.
///
/// Environment overrides:
///   FLOOD_API_BASE_URL         - upstream API base (…/flood-monitoring/id)
///   FLOOD_REFRESH_MINUTES      - auto-refresh interval and cache TTL
///   FLOOD_LOOKBACK_HOURS       - readings window ending at fetch time
///   FLOOD_REQUEST_TIMEOUT_SECS - per-request HTTP timeout

use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;

use crate::ingest::flood_api::DEFAULT_BASE_URL;

/// Fallback map center when no station has coordinates: roughly the middle
/// of England, which is what the Environment Agency network covers.
pub const DEFAULT_MAP_CENTER: (f64, f64) = (54.0, -2.0);

/// Longest accepted readings window (ten years).
pub const MAX_LOOKBACK_HOURS: u64 = 24 * 365 * 10;

/// Longest accepted refresh interval (one week).
pub const MAX_REFRESH_MINUTES: u64 = 7 * 24 * 60;

/// Default configuration file, looked up in the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "dashboard.toml";

/// Runtime configuration for the dashboard pipeline.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub api_base_url: String,

    /// How often the refresh cycle re-fetches (default: 15 minutes). Also
    /// the cache TTL, so the UI is never more than one interval stale.
    pub refresh_interval_minutes: u64,

    /// Length of the readings window ending at fetch time (default: 24 hours).
    pub lookback_hours: u64,

    /// Per-request HTTP timeout (default: 30 seconds).
    pub request_timeout_secs: u64,

    /// Length of one countdown tick while waiting for the next refresh.
    pub tick_seconds: u64,

    pub default_center_lat: f64,
    pub default_center_lon: f64,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_BASE_URL.to_string(),
            refresh_interval_minutes: 15,
            lookback_hours: 24,
            request_timeout_secs: 30,
            tick_seconds: 1,
            default_center_lat: DEFAULT_MAP_CENTER.0,
            default_center_lon: DEFAULT_MAP_CENTER.1,
        }
    }
}

impl DashboardConfig {
    /// Parses configuration from TOML text. Missing keys take defaults.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: DashboardConfig =
            toml::from_str(contents).context("invalid dashboard configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Applies overrides from a `(name) -> value` lookup. Split out from
    /// [`apply_env`](Self::apply_env) so tests don't touch process state.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("FLOOD_API_BASE_URL") {
            self.api_base_url = url;
        }
        if let Some(v) = lookup("FLOOD_REFRESH_MINUTES") {
            self.refresh_interval_minutes = parse_override("FLOOD_REFRESH_MINUTES", &v)?;
        }
        if let Some(v) = lookup("FLOOD_LOOKBACK_HOURS") {
            self.lookback_hours = parse_override("FLOOD_LOOKBACK_HOURS", &v)?;
        }
        if let Some(v) = lookup("FLOOD_REQUEST_TIMEOUT_SECS") {
            self.request_timeout_secs = parse_override("FLOOD_REQUEST_TIMEOUT_SECS", &v)?;
        }
        self.validate()
    }

    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|name| env::var(name).ok())
    }

    /// Rejects settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.api_base_url.trim().is_empty() {
            bail!("api_base_url must not be empty");
        }
        if !(1..=MAX_REFRESH_MINUTES).contains(&self.refresh_interval_minutes) {
            bail!(
                "refresh_interval_minutes must be between 1 and {}",
                MAX_REFRESH_MINUTES
            );
        }
        if !(1..=MAX_LOOKBACK_HOURS).contains(&self.lookback_hours) {
            bail!("lookback_hours must be between 1 and {}", MAX_LOOKBACK_HOURS);
        }
        if self.request_timeout_secs == 0 {
            bail!("request_timeout_secs must be at least 1");
        }
        // The countdown must land exactly on the cache TTL.
        let interval_secs = self.refresh_interval_minutes * 60;
        if self.tick_seconds == 0 || interval_secs % self.tick_seconds != 0 {
            bail!(
                "tick_seconds ({}) must evenly divide the refresh interval ({} s)",
                self.tick_seconds,
                interval_secs
            );
        }
        if !(-90.0..=90.0).contains(&self.default_center_lat)
            || !(-180.0..=180.0).contains(&self.default_center_lon)
        {
            bail!(
                "default map center ({}, {}) is not a valid coordinate",
                self.default_center_lat,
                self.default_center_lon
            );
        }
        Ok(())
    }

    pub fn refresh_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.refresh_interval_minutes * 60)
    }

    pub fn lookback(&self) -> chrono::Duration {
        chrono::Duration::hours(self.lookback_hours.min(MAX_LOOKBACK_HOURS) as i64)
    }

    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.request_timeout_secs)
    }

    pub fn tick(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.tick_seconds)
    }

    /// Ticks in one refresh interval (900 one-second ticks by default).
    /// Validation guarantees the tick divides the interval evenly.
    pub fn interval_ticks(&self) -> u64 {
        self.refresh_interval_minutes * 60 / self.tick_seconds.max(1)
    }

    pub fn default_center(&self) -> (f64, f64) {
        (self.default_center_lat, self.default_center_lon)
    }

    /// Log the effective configuration.
    pub fn log_config(&self) {
        tracing::info!("Configuration loaded:");
        tracing::info!("  api_base_url     : {}", self.api_base_url);
        tracing::info!("  refresh interval : {} min", self.refresh_interval_minutes);
        tracing::info!("  lookback window  : {} h", self.lookback_hours);
        tracing::info!("  request timeout  : {} s", self.request_timeout_secs);
        tracing::info!(
            "  default center   : ({}, {})",
            self.default_center_lat,
            self.default_center_lon
        );
    }
}

fn parse_override(name: &str, value: &str) -> Result<u64> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|e| anyhow!("Invalid {}: {}", name, e))
}

/// Loads configuration: defaults ← TOML file (if present) ← environment.
///
/// An explicitly requested file that is missing is an error; the default
/// `dashboard.toml` is optional.
pub fn load_config(path: Option<&Path>) -> Result<DashboardConfig> {
    dotenv::dotenv().ok();

    let (path, required) = match path {
        Some(p) => (p, true),
        None => (Path::new(DEFAULT_CONFIG_PATH), false),
    };

    let mut config = if path.exists() {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        DashboardConfig::from_toml_str(&contents)
            .with_context(|| format!("Failed to parse {}", path.display()))?
    } else if required {
        bail!("configuration file {} not found", path.display());
    } else {
        DashboardConfig::default()
    };

    config.apply_env()?;
    Ok(config)
}
