//! Tracing subscriber setup
//!
//! The subscriber is installed before configuration is read so that config
//! loading is logged. The configured level is applied afterwards through a
//! reload handle; `RUST_LOG` always wins over it.

use tracing_subscriber::filter::ParseError;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, reload, EnvFilter, Registry};

/// Level used until configuration is loaded
pub const STARTUP_LOG_LEVEL: &str = "info";

/// Handle for swapping the active filter
pub type LogFilterHandle = reload::Handle<EnvFilter, Registry>;

/// Filter from `RUST_LOG` when set, else from `level`
pub fn log_filter(rust_log: Option<&str>, level: &str) -> Result<EnvFilter, ParseError> {
    match rust_log.map(str::trim).filter(|directives| !directives.is_empty()) {
        Some(directives) => EnvFilter::try_new(directives),
        None => EnvFilter::try_new(level),
    }
}

fn rust_log() -> Option<String> {
    std::env::var(EnvFilter::DEFAULT_ENV).ok()
}

/// Install the global subscriber at the startup level
pub fn init_logging() -> LogFilterHandle {
    let filter = log_filter(rust_log().as_deref(), STARTUP_LOG_LEVEL)
        .unwrap_or_else(|_| EnvFilter::new(STARTUP_LOG_LEVEL));
    let (filter, handle) = reload::Layer::new(filter);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .init();

    handle
}

/// Switch to the configured level unless `RUST_LOG` overrides it
pub fn apply_log_level(handle: &LogFilterHandle, level: &str) -> anyhow::Result<()> {
    let filter = log_filter(rust_log().as_deref(), level)?;
    handle.reload(filter)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::Level;

    #[test]
    fn test_rust_log_wins_over_configured_level() {
        let filter = log_filter(Some("warn"), "debug").unwrap();
        assert_eq!(filter.to_string(), "warn");
    }

    #[test]
    fn test_configured_level_used_without_rust_log() {
        assert_eq!(log_filter(None, "debug").unwrap().to_string(), "debug");
        assert_eq!(log_filter(Some("  "), "trace").unwrap().to_string(), "trace");
    }

    #[test]
    fn test_invalid_level_is_rejected() {
        assert!(log_filter(None, "loud=?").is_err());
    }

    #[test]
    fn test_reload_applies_configured_level() {
        let (filter, handle) = reload::Layer::new(EnvFilter::new(STARTUP_LOG_LEVEL));
        let subscriber = tracing_subscriber::registry().with(filter);

        tracing::subscriber::with_default(subscriber, || {
            assert!(tracing::enabled!(Level::INFO));
            assert!(!tracing::enabled!(Level::DEBUG));

            handle.reload(log_filter(None, "debug").unwrap()).unwrap();

            assert!(tracing::enabled!(Level::DEBUG));
        });
    }
}
