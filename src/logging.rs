//! # Structured Logging
//!
//! Environment-aware tracing initialization. Console output by default,
//! JSON output when `FLOWVAULT_LOG_FORMAT=json` (for log shippers). Safe to
//! call more than once; only the first call installs the subscriber.

use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific defaults.
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let filter = EnvFilter::try_from_env("FLOWVAULT_LOG")
            .unwrap_or_else(|_| EnvFilter::new(default_log_level(&environment())));

        let json = std::env::var("FLOWVAULT_LOG_FORMAT")
            .map(|v| v.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let result = if json {
            tracing_subscriber::registry()
                .with(fmt::layer().json().with_target(true).with_filter(filter))
                .try_init()
        } else {
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_filter(filter))
                .try_init()
        };

        // A subscriber installed by the embedding application wins; that is
        // not an error.
        if result.is_err() {
            tracing::debug!("global tracing subscriber already initialized");
        }
    });
}

fn environment() -> String {
    std::env::var("FLOWVAULT_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

fn default_log_level(environment: &str) -> String {
    match environment {
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}
