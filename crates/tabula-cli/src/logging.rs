//! Logging and tracing setup for the `tabula` binary
//!
//! Console output goes to stderr so that stdout carries only command output
//! (an export piped into a file stays valid JSON). An optional JSON layer
//! writes daily-rolling files for bug reports.

use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::settings::LogSettings;

const DEBUG_FILTER: &str = "info,tabula_services=debug,tabula_interchange=debug,tabula_drivers=debug";

/// How the subscriber is assembled for one run
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Where the JSON files go
    pub log_dir: PathBuf,
    pub enable_json_logs: bool,
    /// file:line on console lines
    pub include_location: bool,
    /// Used when `RUST_LOG` is unset
    pub default_filter: String,
}

impl LoggingConfig {
    /// Debug builds log engine detail with locations; release builds only warnings
    pub fn for_profile(release: bool) -> Self {
        Self {
            log_dir: log_directory(),
            enable_json_logs: false,
            include_location: !release,
            default_filter: if release { "warn" } else { DEBUG_FILTER }.to_string(),
        }
    }

    /// The build profile's defaults, overridden by the settings file and
    /// the `--json-logs` flag
    pub fn for_run(settings: &LogSettings, json_flag: bool) -> Self {
        let mut config = Self::for_profile(!cfg!(debug_assertions));
        config.enable_json_logs = json_flag || settings.json_logs;
        if let Some(filter) = &settings.filter {
            config.default_filter = filter.clone();
        }
        if let Some(dir) = &settings.log_dir {
            config.log_dir = dir.clone();
        }
        config
    }
}

/// Install the global subscriber.
///
/// The returned guard flushes the JSON file writer on drop; hold it until
/// the program exits.
pub fn init(config: &LoggingConfig) -> anyhow::Result<Option<WorkerGuard>> {
    // RUST_LOG takes precedence over the configured filter
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_filter));

    let mut layers = vec![
        fmt::layer()
            .with_target(true)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_writer(std::io::stderr)
            .with_filter(env_filter.clone())
            .boxed(),
    ];

    let mut guard = None;
    if config.enable_json_logs {
        std::fs::create_dir_all(&config.log_dir)?;
        let file_appender = tracing_appender::rolling::daily(&config.log_dir, "tabula.log");
        let (non_blocking, worker_guard) = tracing_appender::non_blocking(file_appender);
        guard = Some(worker_guard);

        let json_layer = fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .with_ansi(false)
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_writer(non_blocking)
            .with_filter(env_filter)
            .boxed();
        layers.push(json_layer);
    }

    tracing_subscriber::registry().with(layers).try_init()?;

    tracing::debug!(
        log_dir = %config.log_dir.display(),
        json_enabled = config.enable_json_logs,
        "logging initialized"
    );
    Ok(guard)
}

/// Default directory for JSON log files
pub fn log_directory() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tabula")
        .join("logs")
}
