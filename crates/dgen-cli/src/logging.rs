//! Structured conversion logging.
//!
//! Provides consistent, structured logging for conversions and the
//! subscriber setup used by the binary.

use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Conversion logger for structured logging with consistent formatting.
///
/// Every event carries the bundle ID and the operation name.
#[derive(Debug, Clone)]
pub struct ConversionLogger {
    bundle_id: String,
    operation: String,
}

impl ConversionLogger {
    pub fn new(bundle_id: &str, operation: &str) -> Self {
        Self {
            bundle_id: bundle_id.to_string(),
            operation: operation.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            bundle_id = %self.bundle_id,
            operation = %self.operation,
            "Conversion started: {}", message
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(
            bundle_id = %self.bundle_id,
            operation = %self.operation,
            "Conversion progress: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            bundle_id = %self.bundle_id,
            operation = %self.operation,
            "Conversion warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            bundle_id = %self.bundle_id,
            operation = %self.operation,
            "Conversion error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            bundle_id = %self.bundle_id,
            operation = %self.operation,
            "Conversion completed: {}", message
        );
    }
}

/// Install the global subscriber: JSON when `LOG_FORMAT=json`, ANSI
/// otherwise. `RUST_LOG` directives are honoured on top of `dgen=info`.
pub fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("dgen=info"));

    // Logs go to stderr; stdout carries command output.
    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .with(env_filter)
            .init();
    }
}
