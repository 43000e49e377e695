//! Structured logging.
//!
//! `RUST_LOG` wins over the configured level. JSON output is meant for log
//! shippers, pretty output for local development.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::schema::LogFormat;
use crate::config::ObservabilityConfig;

/// Default filter when neither `RUST_LOG` nor a configured level is set.
pub const DEFAULT_FILTER: &str = "rimtoken_wallet=debug,tower_http=debug";

/// Filter directives for a configured level (`"info"` → this crate and tower-http at info).
pub fn filter_directives(log_level: &str) -> String {
    let level = log_level.trim();
    if level.is_empty() {
        DEFAULT_FILTER.to_string()
    } else if level.contains('=') {
        level.to_string()
    } else {
        format!("rimtoken_wallet={level},tower_http={level}")
    }
}

/// Install the global subscriber. Later calls are ignored.
pub fn init(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directives(&config.log_level)));

    let registry = tracing_subscriber::registry().with(filter);
    let result = match config.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
            .try_init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).try_init(),
    };

    if let Err(e) = result {
        eprintln!("logging already initialized: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_directives() {
        assert_eq!(filter_directives(""), DEFAULT_FILTER);
        assert_eq!(filter_directives("info"), "rimtoken_wallet=info,tower_http=info");
        assert_eq!(filter_directives("warn,sqlx=error"), "warn,sqlx=error");
    }
}
