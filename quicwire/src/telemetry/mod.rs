//! # Telemetry
//!
//! Structured logging through `tracing`. Per-packet detail is logged at
//! `trace`, dropped datagrams at `debug`, worker state changes at `info`.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use quicwire::config::LoggingConfig;
//! use quicwire::telemetry::init_logging;
//!
//! init_logging(&LoggingConfig::default()).expect("logging");
//! ```

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

/// Build the filter: `RUST_LOG` wins, the configured level is the fallback.
pub fn env_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.level.to_string()))
        .context("invalid log filter")
}

/// Initialize structured logging. Fails if a global subscriber is already set.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = env_filter(config)?;

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_names(true)
        .with_ansi(config.enable_colors)
        .with_line_number(config.include_file_line)
        .with_file(config.include_file_line);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .context("failed to install tracing subscriber")?;

    tracing::info!(level = %config.level, "Logging initialized");
    Ok(())
}
