//! Structured logging setup.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::LoggingConfig;

/// Builds the log filter: `RUST_LOG` if set and valid, else the configured
/// level, else `info`.
#[must_use]
pub fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Installs the global tracing subscriber.
///
/// Returns `false` if a global subscriber was already installed, in which
/// case the existing one is kept.
pub fn init_logging(config: &LoggingConfig) -> bool {
    let layer = if config.json {
        fmt::layer()
            .with_target(true)
            .with_level(true)
            .json()
            .with_filter(build_filter(&config.level))
            .boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_level(true)
            .with_ansi(true)
            .with_filter(build_filter(&config.level))
            .boxed()
    };

    let installed = tracing_subscriber::registry().with(layer).try_init().is_ok();
    if installed {
        tracing::debug!(level = %config.level, json = config.json, "Logging initialized");
    } else {
        tracing::debug!("Global tracing subscriber already initialized - continuing with existing subscriber");
    }
    installed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_falls_back_on_garbage() {
        // Must not panic whatever RUST_LOG holds.
        let _ = build_filter("definitely not a directive [[[");
        let _ = build_filter("debug");
    }

    #[test]
    fn test_second_init_keeps_existing_subscriber() {
        let config = LoggingConfig::default();
        let _ = init_logging(&config);
        assert!(!init_logging(&config));
    }
}
