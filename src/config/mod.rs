//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize, environment overrides)
//!     → validation.rs (semantic checks)
//!     → WalletConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Secrets come from the environment, never from the file in production
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use schema::WalletConfig;
pub use schema::{
    AuthConfig, ChainsConfig, EvmChainConfig, ListenerConfig, MarketConfig, MarketProviderKind,
    ObservabilityConfig, RateLimitConfig, SolanaChainConfig, StorageBackend, StorageConfig,
};
