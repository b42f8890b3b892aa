/// Tracing subscriber setup.
///
/// Log level: `RUST_LOG` wins when set (full directive syntax), otherwise
/// `FLOOD_LOG_LEVEL` (trace|debug|info|warn|error), otherwise `info`.
/// Colors follow `FORCE_COLOR`, falling back to whether stderr is a terminal.
///
/// Logs go to stderr so `--once` can print the view as JSON on stdout.

use std::env;
use std::io::IsTerminal;
use tracing_subscriber::filter::EnvFilter;

const DEFAULT_LEVEL: &str = "info";

/// Maps a `FLOOD_LOG_LEVEL` value to a filter directive. Unknown values fall
/// back to the default level.
fn level_directive(value: Option<&str>) -> &'static str {
    match value.map(str::trim) {
        Some("trace") => "trace",
        Some("debug") => "debug",
        Some("info") => "info",
        Some("warn") => "warn",
        Some("error") => "error",
        _ => DEFAULT_LEVEL,
    }
}

fn use_color() -> bool {
    match env::var("FORCE_COLOR").as_deref() {
        Ok("1") | Ok("true") | Ok("yes") => true,
        Ok("0") | Ok("false") | Ok("no") => false,
        _ => std::io::stderr().is_terminal(),
    }
}

/// Install the global subscriber. Call once at startup, before any logging.
/// A second call is a no-op.
pub fn init_tracing() {
    let env_filter = if env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = level_directive(env::var("FLOOD_LOG_LEVEL").ok().as_deref());
        // reqwest/hyper are noisy at debug
        EnvFilter::new(format!("{level},hyper=warn,reqwest=warn,rustls=warn"))
    };

    let _ = tracing_subscriber::fmt()
        .with_target(true)
        .with_line_number(true)
        .with_env_filter(env_filter)
        .with_ansi(use_color())
        .with_writer(std::io::stderr)
        .compact()
        .try_init();
}
