//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the wallet
//! service. All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the wallet service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct WalletConfig {
    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// Persistence backend.
    pub storage: StorageConfig,

    /// Market data provider and refresh schedule.
    pub market: MarketConfig,

    /// Per-network RPC endpoints.
    pub chains: ChainsConfig,

    /// Session settings.
    pub auth: AuthConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Rate limiting configuration.
    pub rate_limit: RateLimitConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    #[serde(default)]
    pub security: SecurityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
            tls: None,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Which storage backend to run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// In-process store seeded with demo data.
    Memory,
    /// Postgres through a sqlx pool.
    Postgres,
}

/// Storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,

    /// Postgres connection string, required for the postgres backend.
    pub database_url: Option<String>,

    /// Maximum pooled connections.
    pub max_connections: u32,

    /// Seed demo user, assets and balances into an empty store.
    pub seed_demo_data: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            database_url: None,
            max_connections: 5,
            seed_demo_data: true,
        }
    }
}

/// Upstream market data API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketProviderKind {
    CoinMarketCap,
    CoinGecko,
}

/// Market data configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MarketConfig {
    pub provider: MarketProviderKind,

    /// API key sent with every request (CoinMarketCap requires one).
    pub api_key: Option<String>,

    /// Override of the provider base URL.
    pub base_url: Option<String>,

    /// HTTP timeout for provider calls in seconds.
    pub request_timeout_secs: u64,

    /// Serve the built-in fallback quotes when the provider fails.
    pub fallback_on_error: bool,

    /// Background refresh interval in seconds (0 disables the task).
    pub refresh_interval_secs: u64,

    /// Record a portfolio history entry per user after each background refresh.
    pub snapshot_portfolios: bool,

    /// Retry attempts for a failed refresh.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            provider: MarketProviderKind::CoinMarketCap,
            api_key: None,
            base_url: None,
            request_timeout_secs: 10,
            fallback_on_error: true,
            refresh_interval_secs: 0,
            snapshot_portfolios: false,
            max_attempts: 3,
            base_delay_ms: 200,
            max_delay_ms: 2000,
        }
    }
}

/// Endpoints for every supported network.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ChainsConfig {
    /// Infura project key used to build the default Ethereum URL.
    pub infura_api_key: Option<String>,

    pub ethereum: EvmChainConfig,
    pub binance: EvmChainConfig,
    pub polygon: EvmChainConfig,
    pub solana: SolanaChainConfig,
}

impl Default for ChainsConfig {
    fn default() -> Self {
        Self {
            infura_api_key: None,
            ethereum: EvmChainConfig {
                enabled: true,
                rpc_url: "https://sepolia.infura.io/v3/".to_string(),
                failover_urls: Vec::new(),
                chain_id: 11155111,
                rpc_timeout_secs: 10,
            },
            binance: EvmChainConfig {
                enabled: true,
                rpc_url: "https://data-seed-prebsc-1-s1.binance.org:8545/".to_string(),
                failover_urls: Vec::new(),
                chain_id: 97,
                rpc_timeout_secs: 10,
            },
            polygon: EvmChainConfig {
                enabled: false,
                rpc_url: "https://rpc-amoy.polygon.technology/".to_string(),
                failover_urls: Vec::new(),
                chain_id: 80002,
                rpc_timeout_secs: 10,
            },
            solana: SolanaChainConfig::default(),
        }
    }
}

/// EVM-compatible network configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EvmChainConfig {
    /// Register this network in the chain registry.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// JSON-RPC endpoint URL.
    pub rpc_url: String,

    /// Failover JSON-RPC endpoint URLs.
    #[serde(default)]
    pub failover_urls: Vec<String>,

    /// Chain ID used when signing transfers.
    pub chain_id: u64,

    /// RPC request timeout in seconds.
    #[serde(default = "default_rpc_timeout")]
    pub rpc_timeout_secs: u64,
}

/// Solana network configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SolanaChainConfig {
    pub enabled: bool,

    /// JSON-RPC endpoint URL.
    pub rpc_url: String,

    /// RPC request timeout in seconds.
    pub rpc_timeout_secs: u64,

    /// How long to wait for a sent transfer to reach `confirmed`.
    pub confirm_timeout_secs: u64,

    /// Signatures fetched per history request (1..=1000, the RPC maximum and default).
    pub history_limit: usize,
}

impl Default for SolanaChainConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rpc_url: "https://api.devnet.solana.com".to_string(),
            rpc_timeout_secs: 10,
            confirm_timeout_secs: 30,
            history_limit: 1000,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_rpc_timeout() -> u64 {
    10
}

/// Session configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Session lifetime in seconds.
    pub session_ttl_secs: u64,

    /// Launch date (YYYY-MM-DD) used by the early-adopter achievement.
    pub launch_date: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_ttl_secs: 30 * 24 * 60 * 60,
            launch_date: "2024-08-01".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,

    /// Grace period for in-flight requests on shutdown, in seconds.
    pub shutdown_grace_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            shutdown_grace_secs: 10,
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Window length in milliseconds.
    pub window_ms: u64,

    /// Requests allowed per client IP in one window.
    pub max_requests: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_ms: 15 * 60 * 1000,
            max_requests: 100,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level filter used when RUST_LOG is unset.
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "rimtoken_wallet=debug,tower_http=debug".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum body size in bytes.
    pub max_body_size: usize,

    /// Allowed CORS origin ("*" for any).
    pub cors_origin: String,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 2 * 1024 * 1024, // 2MB
            cors_origin: "*".to_string(),
        }
    }
}
