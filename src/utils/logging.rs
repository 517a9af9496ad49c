//! Logging initialization for Overseer.
//!
//! Supports two formats:
//! - `compact`: human-readable text with targets
//! - `json`: structured JSON lines for log aggregators

use crate::config::{LogFormat, LoggingConfig};

/// Initialize the global tracing subscriber from config.
///
/// Call this once at startup before any tracing events are emitted.
/// Falls back to the `RUST_LOG` env var; if unset, uses `cfg.level`.
pub fn init_logging(cfg: &LoggingConfig) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.level));

    match cfg.format {
        LogFormat::Json => {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .init();
        }
        LogFormat::Compact => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(true)
                .compact()
                .init();
        }
    }
}
