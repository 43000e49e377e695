//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use crate::config::schema::{StorageBackend, WalletConfig};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Env { var: &'static str, message: String },
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Env { var, message } => write!(f, "Invalid {}: {}", var, message),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load configuration from an optional TOML file, apply environment
/// overrides and validate the result.
///
/// A missing file is not an error when `required` is false; defaults are used.
pub fn load_config(path: &Path, required: bool) -> Result<WalletConfig, ConfigError> {
    let mut config = match fs::read_to_string(path) {
        Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse)?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && !required => {
            tracing::info!(path = %path.display(), "No config file, using defaults");
            WalletConfig::default()
        }
        Err(e) => return Err(ConfigError::Io(e)),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Overlay deployment values and secrets from the environment.
///
/// `lookup` is `std::env::var` in production; tests pass a map.
pub fn apply_env_overrides<F>(config: &mut WalletConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(url) = get("DATABASE_URL") {
        config.storage.database_url = Some(url);
        config.storage.backend = StorageBackend::Postgres;
    }
    if let Some(key) = get("COINMARKETCAP_API_KEY") {
        config.market.api_key = Some(key);
    } else if let Some(key) = get("COINGECKO_API_KEY") {
        if config.market.api_key.is_none() {
            config.market.api_key = Some(key);
        }
    }
    if let Some(key) = get("INFURA_API_KEY") {
        config.chains.infura_api_key = Some(key);
    }
    if let Some(url) = get("ETHEREUM_RPC_URL") {
        config.chains.ethereum.rpc_url = url;
    }
    if let Some(url) = get("BSC_RPC_URL") {
        config.chains.binance.rpc_url = url;
    }
    if let Some(url) = get("POLYGON_RPC_URL") {
        config.chains.polygon.rpc_url = url;
        config.chains.polygon.enabled = true;
    }
    if let Some(url) = get("SOLANA_RPC_URL") {
        config.chains.solana.rpc_url = url;
    }
    if let Some(origin) = get("CORS_ORIGIN") {
        config.security.cors_origin = origin;
    }
    if let Some(port) = get("PORT") {
        let port: u16 = port.parse().map_err(|_| ConfigError::Env {
            var: "PORT",
            message: format!("'{}' is not a port number", port),
        })?;
        let host = config
            .listener
            .bind_address
            .rsplit_once(':')
            .map(|(host, _)| host.to_string())
            .unwrap_or_else(|| "0.0.0.0".to_string());
        config.listener.bind_address = format!("{}:{}", host, port);
    }
    if let Some(window) = get("RATE_LIMIT_WINDOW_MS") {
        config.rate_limit.window_ms = window.parse().map_err(|_| ConfigError::Env {
            var: "RATE_LIMIT_WINDOW_MS",
            message: format!("'{}' is not a number", window),
        })?;
    }
    if let Some(max) = get("RATE_LIMIT_MAX_REQUESTS") {
        config.rate_limit.max_requests = max.parse().map_err(|_| ConfigError::Env {
            var: "RATE_LIMIT_MAX_REQUESTS",
            message: format!("'{}' is not a number", max),
        })?;
    }

    Ok(())
}
