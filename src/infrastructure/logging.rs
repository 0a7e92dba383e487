//! Logging initialization
//!
//! Console logging through `tracing-subscriber` with an env-filter,
//! optionally mirrored to a non-blocking file appender. The worker guard
//! for the file writer is kept alive in a process-wide slot.

use std::sync::Mutex;

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::infrastructure::config::LoggingConfig;

static LOG_GUARD: Lazy<Mutex<Option<WorkerGuard>>> = Lazy::new(|| Mutex::new(None));

/// Initialize logging from a [`LoggingConfig`].
///
/// `RUST_LOG` overrides the configured default filter. Returns an error if
/// a subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.default_filter.clone()));

    let console_layer = fmt::layer().with_target(true);

    if config.file_logging {
        std::fs::create_dir_all(&config.log_dir).with_context(|| {
            format!("failed to create log directory {}", config.log_dir.display())
        })?;
        let appender = tracing_appender::rolling::daily(&config.log_dir, "pagerize.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);

        if let Ok(mut slot) = LOG_GUARD.lock() {
            *slot = Some(guard);
        }

        let file_layer = fmt::layer().with_ansi(false).with_writer(writer);
        tracing_subscriber::registry()
            .with(filter)
            .with(console_layer)
            .with(file_layer)
            .try_init()
            .context("logging already initialized")?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(console_layer)
            .try_init()
            .context("logging already initialized")?;
    }

    Ok(())
}
