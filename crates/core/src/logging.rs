//! Structured logging infrastructure for Palisade.
//!
//! This module provides centralized logging initialization with support
//! for structured JSON output and environment-based configuration.

use crate::config::LogFormat;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the logging system with structured output.
///
/// Log level can be configured via the `RUST_LOG` environment variable.
/// If not set, defaults to `info` level.
///
/// # Example
/// ```no_run
/// use palisade_core::logging;
///
/// logging::init();
/// tracing::info!("Shield started");
/// ```
pub fn init() {
    init_with_filter("info", LogFormat::Plain);
}

/// Initialize the logging system with JSON output for production environments.
///
/// This format is suitable for log aggregation systems and structured log analysis.
/// Log level can be configured via the `RUST_LOG` environment variable.
///
/// # Example
/// ```no_run
/// use palisade_core::logging;
///
/// logging::init_json();
/// tracing::info!(node_id = "node-1", "Node started");
/// ```
pub fn init_json() {
    init_with_filter("info", LogFormat::Json);
}

/// Initialize logging with an explicit fallback filter and output format.
///
/// `RUST_LOG` still wins when set; `default_filter` is used otherwise.
/// Calling this more than once is harmless: later calls are ignored.
pub fn init_with_filter(default_filter: &str, format: LogFormat) {
    let filter = build_filter(default_filter);

    let result = match format {
        LogFormat::Plain => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_target(true).with_thread_ids(true))
            .try_init(),
    };

    if result.is_err() {
        tracing::debug!("Global subscriber already installed, keeping existing one");
    }
}

fn build_filter(default_filter: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}
