//! Tracing setup
//!
//! Human-readable output goes to stderr so it never mixes with answers on
//! stdout. A daily JSON log is kept under `~/.research-assistant/logs`.

use anyhow::Result;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::config_dir;

/// Log file name prefix inside the logs directory
const LOG_FILE_PREFIX: &str = "ra.log";

/// Default filter when `RUST_LOG` is unset
fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "vault_agent=info,ra=info"
    } else {
        "vault_agent=warn,ra=warn"
    }
}

/// Install the global subscriber. Keep the guard alive until exit so the
/// file writer flushes.
pub fn init_logging(verbose: bool) -> Result<WorkerGuard> {
    let log_dir = config_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, LOG_FILE_PREFIX);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(fmt::layer().json().with_writer(file_writer))
        .try_init()?;

    tracing::debug!("[Logging] Writing logs to {}", log_dir.display());
    Ok(guard)
}
