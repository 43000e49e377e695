//! Startup orchestration.
//!
//! # Responsibilities
//! - Connect storage and build chain and market clients from the config
//! - Assemble the shared [`AppState`]
//! - Start background tasks (market refresh, session and rate-limit housekeeping)
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - Background tasks subscribe to the shutdown broadcast before the listener binds

use chrono::NaiveDate;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::auth::SessionStore;
use crate::blockchain::{BlockchainError, ChainRegistry};
use crate::config::WalletConfig;
use crate::http::AppState;
use crate::lifecycle::shutdown::Shutdown;
use crate::market::{self, MarketDataProvider, MarketError, MarketRefresher};
use crate::resilience::RetryPolicy;
use crate::security::RateLimiter;
use crate::storage::{self, SharedStorage, StorageError};

/// How often expired sessions and idle rate-limit buckets are dropped.
const HOUSEKEEPING_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Invalid launch date '{0}'")]
    LaunchDate(String),

    #[error("Storage: {0}")]
    Storage(#[from] StorageError),

    #[error("Market provider: {0}")]
    Market(#[from] MarketError),

    #[error("Chains: {0}")]
    Chains(#[from] BlockchainError),
}

pub fn parse_launch_date(value: &str) -> Result<NaiveDate, StartupError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| StartupError::LaunchDate(value.to_string()))
}

/// Build the application state from already constructed backends.
///
/// `api_market` serves the pass-through endpoints; `refresh_market` feeds the
/// refresher, which applies its own fallback policy.
pub fn assemble_state(
    config: WalletConfig,
    storage: SharedStorage,
    chains: ChainRegistry,
    api_market: Arc<dyn MarketDataProvider>,
    refresh_market: Arc<dyn MarketDataProvider>,
) -> Result<AppState, StartupError> {
    let launch_date = parse_launch_date(&config.auth.launch_date)?;
    let refresher = MarketRefresher::new(
        storage.clone(),
        refresh_market,
        RetryPolicy::from(&config.market),
        config.market.fallback_on_error,
    );

    Ok(AppState {
        sessions: Arc::new(SessionStore::new(Duration::from_secs(config.auth.session_ttl_secs))),
        rate_limiter: Arc::new(RateLimiter::new(&config.rate_limit)),
        refresher: Arc::new(refresher),
        chains: Arc::new(chains),
        market: api_market,
        storage,
        launch_date,
        config: Arc::new(config),
    })
}

/// Connect every subsystem described by `config`.
pub async fn build_state(config: WalletConfig) -> Result<AppState, StartupError> {
    let storage = storage::connect(&config.storage).await?;
    tracing::info!(backend = ?config.storage.backend, "Storage ready");

    let chains = ChainRegistry::from_config(&config.chains)?;
    tracing::info!(networks = ?chains.networks(), "Chains ready");

    let api_market = market::build_api_provider(&config.market)?;
    let refresh_market = market::build_provider(&config.market)?;

    assemble_state(config, storage, chains, api_market, refresh_market)
}

/// Spawn the periodic tasks. Each one exits when `shutdown` fires.
pub fn spawn_background_tasks(state: &AppState, shutdown: &Shutdown) -> Vec<JoinHandle<()>> {
    let mut handles = Vec::new();

    let interval = state.config.market.refresh_interval_secs;
    if interval > 0 {
        handles.push(tokio::spawn(state.refresher.clone().run(
            Duration::from_secs(interval),
            state.config.market.snapshot_portfolios,
            shutdown.subscribe(),
        )));
    } else {
        tracing::info!("Scheduled market refresh disabled");
    }

    let sessions = state.sessions.clone();
    let limiter = state.rate_limiter.clone();
    let mut stop = shutdown.subscribe();
    handles.push(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(HOUSEKEEPING_INTERVAL);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let sessions_purged = sessions.purge_expired();
                    let buckets_purged = limiter.purge_idle();
                    if sessions_purged + buckets_purged > 0 {
                        tracing::debug!(sessions_purged, buckets_purged, "Housekeeping");
                    }
                }
                _ = stop.recv() => break,
            }
        }
    }));

    handles
}
