//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check that the selected backends have what they need (database URL, API key)
//! - Validate value ranges (timeouts > 0, addresses parse, URLs parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: WalletConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::{
    EvmChainConfig, MarketProviderKind, StorageBackend, WalletConfig,
};

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a configuration, collecting every error.
pub fn validate_config(config: &WalletConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    if config.storage.backend == StorageBackend::Postgres {
        match &config.storage.database_url {
            Some(url) if url.starts_with("postgres://") || url.starts_with("postgresql://") => {}
            Some(url) => errors.push(ValidationError::new(
                "storage.database_url",
                format!("'{}' is not a postgres URL", url),
            )),
            None => errors.push(ValidationError::new(
                "storage.database_url",
                "required for the postgres backend (set DATABASE_URL)",
            )),
        }
        if config.storage.max_connections == 0 {
            errors.push(ValidationError::new("storage.max_connections", "must be > 0"));
        }
    }

    if config.market.provider == MarketProviderKind::CoinMarketCap
        && config.market.api_key.is_none()
        && !config.market.fallback_on_error
    {
        errors.push(ValidationError::new(
            "market.api_key",
            "CoinMarketCap needs an API key unless fallback_on_error is set",
        ));
    }
    if config.market.request_timeout_secs == 0 {
        errors.push(ValidationError::new("market.request_timeout_secs", "must be > 0"));
    }
    if config.market.max_attempts == 0 {
        errors.push(ValidationError::new("market.max_attempts", "must be >= 1"));
    }
    if config.market.base_delay_ms > config.market.max_delay_ms {
        errors.push(ValidationError::new(
            "market.base_delay_ms",
            "must not exceed market.max_delay_ms",
        ));
    }

    check_evm("chains.ethereum", &config.chains.ethereum, &mut errors);
    check_evm("chains.binance", &config.chains.binance, &mut errors);
    check_evm("chains.polygon", &config.chains.polygon, &mut errors);

    let solana = &config.chains.solana;
    if solana.enabled {
        if url::Url::parse(&solana.rpc_url).is_err() {
            errors.push(ValidationError::new(
                "chains.solana.rpc_url",
                format!("'{}' is not a URL", solana.rpc_url),
            ));
        }
        if solana.rpc_timeout_secs == 0 {
            errors.push(ValidationError::new("chains.solana.rpc_timeout_secs", "must be > 0"));
        }
        if !(1..=1000).contains(&solana.history_limit) {
            errors.push(ValidationError::new(
                "chains.solana.history_limit",
                "must be between 1 and 1000",
            ));
        }
    }

    if config.auth.session_ttl_secs == 0 {
        errors.push(ValidationError::new("auth.session_ttl_secs", "must be > 0"));
    }
    if chrono::NaiveDate::parse_from_str(&config.auth.launch_date, "%Y-%m-%d").is_err() {
        errors.push(ValidationError::new(
            "auth.launch_date",
            format!("'{}' is not a YYYY-MM-DD date", config.auth.launch_date),
        ));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be > 0"));
    }

    if config.rate_limit.enabled {
        if config.rate_limit.window_ms == 0 {
            errors.push(ValidationError::new("rate_limit.window_ms", "must be > 0"));
        }
        if config.rate_limit.max_requests == 0 {
            errors.push(ValidationError::new("rate_limit.max_requests", "must be > 0"));
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if config.security.max_body_size == 0 {
        errors.push(ValidationError::new("security.max_body_size", "must be > 0"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_evm(prefix: &str, chain: &EvmChainConfig, errors: &mut Vec<ValidationError>) {
    if !chain.enabled {
        return;
    }
    if url::Url::parse(&chain.rpc_url).is_err() {
        errors.push(ValidationError::new(
            format!("{prefix}.rpc_url"),
            format!("'{}' is not a URL", chain.rpc_url),
        ));
    }
    for failover in &chain.failover_urls {
        if url::Url::parse(failover).is_err() {
            errors.push(ValidationError::new(
                format!("{prefix}.failover_urls"),
                format!("'{}' is not a URL", failover),
            ));
        }
    }
    if chain.chain_id == 0 {
        errors.push(ValidationError::new(format!("{prefix}.chain_id"), "must be > 0"));
    }
    if chain.rpc_timeout_secs == 0 {
        errors.push(ValidationError::new(format!("{prefix}.rpc_timeout_secs"), "must be > 0"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&WalletConfig::default()).is_ok());
    }

    #[test]
    fn test_postgres_requires_url() {
        let mut config = WalletConfig::default();
        config.storage.backend = StorageBackend::Postgres;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "storage.database_url");
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = WalletConfig::default();
        config.listener.bind_address = "not-an-address".to_string();
        config.timeouts.request_secs = 0;
        config.chains.binance.rpc_url = "::::".to_string();
        config.auth.launch_date = "yesterday".to_string();

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"listener.bind_address"));
        assert!(fields.contains(&"timeouts.request_secs"));
        assert!(fields.contains(&"chains.binance.rpc_url"));
        assert!(fields.contains(&"auth.launch_date"));
    }

    #[test]
    fn test_solana_history_limit_range() {
        let mut config = WalletConfig::default();
        assert_eq!(config.chains.solana.history_limit, 1000);

        config.chains.solana.history_limit = 5000;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "chains.solana.history_limit");

        config.chains.solana.history_limit = 20;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_disabled_chain_is_not_checked() {
        let mut config = WalletConfig::default();
        config.chains.polygon.enabled = false;
        config.chains.polygon.rpc_url = "garbage".to_string();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_coinmarketcap_without_key_or_fallback() {
        let mut config = WalletConfig::default();
        config.market.fallback_on_error = false;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "market.api_key");
    }
}
