//! Subscriber setup for the binary.

use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use musicdl_core::config::LoggingConfig;

/// Base name of the daily log files.
const LOG_FILE_PREFIX: &str = "musicdl.log";

/// Installs the global subscriber.
///
/// `RUST_LOG` wins over `config.level`. When file logging is on, a daily
/// rolling file is written under `log_dir`; the returned guard must live
/// until the run ends so buffered lines are flushed.
pub fn init(config: &LoggingConfig, log_dir: &Path) -> Result<Option<WorkerGuard>> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level)
            .with_context(|| format!("Invalid logging.level {:?}", config.level))?,
    };

    let (json, plain) = if config.json {
        (Some(fmt::layer().json().with_current_span(true)), None)
    } else {
        (None, Some(fmt::layer()))
    };

    let (file, guard) = if config.file {
        let appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        (
            Some(fmt::layer().with_ansi(false).with_writer(writer)),
            Some(guard),
        )
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .with(plain)
        .with(file)
        .try_init()
        .context("Failed to install the log subscriber")?;

    Ok(guard)
}
