//! Persistence subsystem.
//!
//! # Data Flow
//! ```text
//! HTTP handlers / ledger / market refresher
//!     → Storage trait (async, object safe)
//!         → memory.rs   (single RwLock over in-process tables)
//!         → postgres.rs (sqlx pool, schema in migrations/)
//!     → seed.rs populates an empty store with the demo account
//! ```
//!
//! # Design Decisions
//! - Both backends implement the same trait so handlers never know which one runs
//! - Multi-row updates (ledger effects) go through one call so each backend
//!   can make them atomic (one write lock / one DB transaction)
//! - Balances and prices are f64 at the API edge; Postgres keeps NUMERIC columns

pub mod memory;
pub mod postgres;
pub mod seed;
pub mod types;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

pub use memory::MemStorage;
pub use postgres::PgStorage;
pub use types::*;

use crate::config::{StorageBackend, StorageConfig};

/// Balances closer to zero than this are treated as zero.
pub const BALANCE_EPSILON: f64 = 1e-9;

/// Storage operations shared by every backend.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Cheap liveness check.
    async fn ping(&self) -> StorageResult<()>;

    async fn get_user(&self, id: i32) -> StorageResult<Option<User>>;
    async fn get_user_by_username(&self, username: &str) -> StorageResult<Option<User>>;
    /// Fails with [`StorageError::Conflict`] when the username is taken.
    async fn create_user(&self, user: NewUser) -> StorageResult<User>;
    async fn list_user_ids(&self) -> StorageResult<Vec<i32>>;

    async fn list_assets(&self) -> StorageResult<Vec<Asset>>;
    async fn get_asset(&self, id: i32) -> StorageResult<Option<Asset>>;
    async fn get_asset_by_symbol(&self, symbol: &str) -> StorageResult<Option<Asset>>;
    async fn create_asset(&self, asset: NewAsset) -> StorageResult<Asset>;
    async fn update_asset_price(&self, id: i32, price: f64, change_24h: f64) -> StorageResult<Asset>;

    async fn wallets_for_user(&self, user_id: i32) -> StorageResult<Vec<Wallet>>;
    async fn wallet_for(&self, user_id: i32, asset_id: i32) -> StorageResult<Option<Wallet>>;
    async fn create_wallet(&self, user_id: i32, asset_id: i32, balance: f64) -> StorageResult<Wallet>;

    /// Newest first, optionally truncated.
    async fn transactions_for_user(
        &self,
        user_id: i32,
        limit: Option<usize>,
    ) -> StorageResult<Vec<Transaction>>;

    /// Insert a transaction and apply its balance changes atomically.
    ///
    /// Missing wallets are created for positive changes. A change that would
    /// leave a balance below zero aborts the whole operation.
    async fn apply_transaction(
        &self,
        tx: NewTransaction,
        changes: &[BalanceChange],
    ) -> StorageResult<Transaction>;

    async fn insert_market_data(&self, data: NewMarketData) -> StorageResult<MarketData>;
    /// Up to `limit` most recent snapshot prices, oldest first.
    async fn recent_prices(&self, asset_id: i32, limit: usize) -> StorageResult<Vec<f64>>;

    /// Entries at or after `since`, ascending by timestamp.
    async fn portfolio_history(
        &self,
        user_id: i32,
        since: DateTime<Utc>,
    ) -> StorageResult<Vec<PortfolioHistory>>;
    async fn first_portfolio_value(&self, user_id: i32) -> StorageResult<Option<f64>>;
    async fn add_portfolio_snapshot(
        &self,
        user_id: i32,
        total_value: f64,
        at: Option<DateTime<Utc>>,
    ) -> StorageResult<PortfolioHistory>;

    async fn wallet_addresses(&self, user_id: i32) -> StorageResult<Vec<WalletAddress>>;
    async fn add_wallet_address(&self, address: NewWalletAddress) -> StorageResult<WalletAddress>;

    async fn defi_positions(&self, user_id: i32) -> StorageResult<Vec<DefiPosition>>;
    async fn create_defi_position(&self, position: NewDefiPosition) -> StorageResult<DefiPosition>;
    /// Change status; leaving `active` stamps the end date.
    async fn set_defi_status(&self, id: i32, status: DefiPositionStatus) -> StorageResult<DefiPosition>;

    async fn user_achievements(&self, user_id: i32) -> StorageResult<Vec<UserAchievement>>;
    async fn upsert_user_achievement(&self, record: UserAchievement) -> StorageResult<UserAchievement>;
}

/// Shared handle used across the application.
pub type SharedStorage = Arc<dyn Storage>;

/// Build the configured backend, seeding it when empty and asked to.
pub async fn connect(config: &StorageConfig) -> StorageResult<SharedStorage> {
    let storage: SharedStorage = match config.backend {
        StorageBackend::Memory => Arc::new(MemStorage::new()),
        StorageBackend::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .ok_or_else(|| StorageError::NotFound("database_url".to_string()))?;
            Arc::new(PgStorage::connect(url, config.max_connections).await?)
        }
    };

    if config.seed_demo_data {
        seed::seed_if_empty(storage.as_ref()).await?;
    }

    Ok(storage)
}
