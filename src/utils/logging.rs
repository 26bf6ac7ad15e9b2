//! Logging initialization for the hub and its module loader
//!
//! - Respects the `RUST_LOG` environment variable, which always wins
//! - Falls back to the filter from `[logging]` in the hub config
//! - Defaults to `info`
//!
//! # Usage
//! ```rust,no_run
//! use homehub_modules::utils::init_logging;
//!
//! init_logging(Some("homehub_modules::module=debug"));
//! ```

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

/// Default filter when neither `RUST_LOG` nor the config provides one
const DEFAULT_FILTER: &str = "info";

fn build_filter(filter: Option<&str>) -> EnvFilter {
    if std::env::var("RUST_LOG").is_ok() {
        return EnvFilter::from_default_env();
    }
    EnvFilter::new(filter.unwrap_or(DEFAULT_FILTER))
}

/// Initialize human-readable logging on stderr
///
/// # Arguments
/// * `filter` - Optional filter from config (e.g. "debug",
///   "homehub_modules::module::orchestrator=trace"). Ignored when `RUST_LOG`
///   is set.
///
/// Calling this twice is harmless: the second global subscriber install is
/// rejected and ignored.
pub fn init_logging(filter: Option<&str>) {
    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_ansi(std::env::var("NO_COLOR").is_err()),
        )
        .with(build_filter(filter))
        .try_init();
}

/// Initialize logging with JSON output for log aggregation systems
#[cfg(feature = "json-logging")]
pub fn init_json_logging(filter: Option<&str>) {
    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .json()
                .with_target(true)
                .with_current_span(true)
                .with_span_list(true),
        )
        .with(build_filter(filter))
        .try_init();
}

/// Initialize logging from the `[logging]` section of the hub config
///
/// Falls back to plain output when `json_format` is requested but the
/// `json-logging` feature is not compiled in.
pub fn init_logging_from_config(config: Option<&LoggingConfig>) {
    let filter = config.and_then(|c| c.filter.as_deref());

    if config.map(|c| c.json_format).unwrap_or(false) {
        #[cfg(feature = "json-logging")]
        {
            init_json_logging(filter);
            return;
        }
    }
    init_logging(filter);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeated_initialization_is_harmless() {
        init_logging(Some("debug"));
        init_logging(None);
        init_logging_from_config(Some(&LoggingConfig::default()));
    }
}
