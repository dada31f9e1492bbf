//! Telemetry module
//!
//! Logging to console and a per-run file, plus Prometheus metrics

mod logging;
mod metrics;

pub use self::logging::init_logging;
pub use self::metrics::{increment, install_exporter, set_gauge, CounterMetric, GaugeMetric};

use crate::config::TelemetryConfig;
use std::fs::{self, File};
use std::path::PathBuf;

/// Handle returned by [`init_telemetry`]
pub struct TelemetryGuard {
    /// Per-run log file, when file logging is enabled
    pub log_path: Option<PathBuf>,
}

/// Initialize all telemetry subsystems.
///
/// `run_label` names the log file, e.g. `WIF_100` gives
/// `logs/trailstop_WIF_100_20240101_120000.log`.
pub fn init_telemetry(config: &TelemetryConfig, run_label: &str) -> anyhow::Result<TelemetryGuard> {
    let (log_file, log_path) = match &config.log_dir {
        Some(dir) => {
            fs::create_dir_all(dir)?;
            let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
            let path = dir.join(format!("trailstop_{}_{}.log", run_label, timestamp));
            (Some(File::create(&path)?), Some(path))
        }
        None => (None, None),
    };

    init_logging(&config.log_level, config.log_format, log_file)?;

    if let Some(path) = &log_path {
        tracing::info!(path = %path.display(), "Log file");
    }

    if let Some(port) = config.metrics_port {
        install_exporter(port)?;
    }

    Ok(TelemetryGuard { log_path })
}
