//! Market data subsystem.
//!
//! # Data Flow
//! ```text
//! MarketConfig
//!     → build_provider (CoinMarketCap | CoinGecko, optional fallback wrapper)
//!     → /api/crypto/* pass-through handlers
//!     → MarketRefresher (assets table + market_data snapshots)
//!     → market_assets (overview with sparkline from stored snapshots)
//! ```

pub mod coingecko;
pub mod coinmarketcap;
pub mod fallback;
pub mod provider;
pub mod refresh;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

pub use coingecko::CoinGeckoClient;
pub use coinmarketcap::CoinMarketCapClient;
pub use fallback::{fallback_quotes, WithFallback};
pub use provider::MarketDataProvider;
pub use refresh::MarketRefresher;
pub use types::*;

use crate::config::{MarketConfig, MarketProviderKind};
use crate::storage::{Storage, StorageResult};

/// Number of stored snapshot prices returned as sparkline.
pub const SPARKLINE_POINTS: usize = 24;

/// Symbols quoted by `/api/crypto/prices` when none are requested.
pub const DEFAULT_SYMBOLS: &[&str] = &["BTC", "ETH", "BNB", "SOL", "DOGE", "USDC"];

fn build_client(config: &MarketConfig) -> MarketResult<Box<dyn MarketDataProvider>> {
    let timeout = Duration::from_secs(config.request_timeout_secs);
    let base_url = config.base_url.as_deref();
    let api_key = config.api_key.clone();
    Ok(match config.provider {
        MarketProviderKind::CoinMarketCap => {
            Box::new(CoinMarketCapClient::new(base_url, api_key, timeout)?)
        }
        MarketProviderKind::CoinGecko => Box::new(CoinGeckoClient::new(base_url, api_key, timeout)?),
    })
}

/// Build the configured upstream client, without the fallback wrapper.
/// The refresher uses this one so it can tell real quotes from fallback ones.
pub fn build_provider(config: &MarketConfig) -> MarketResult<Arc<dyn MarketDataProvider>> {
    let provider = build_client(config)?;
    tracing::info!(
        provider = provider.name(),
        authenticated = config.api_key.is_some(),
        fallback = config.fallback_on_error,
        "Market data provider configured"
    );
    Ok(Arc::from(provider))
}

/// Client for the pass-through API, wrapped with fallback prices when enabled.
pub fn build_api_provider(config: &MarketConfig) -> MarketResult<Arc<dyn MarketDataProvider>> {
    let inner = build_client(config)?;
    if config.fallback_on_error {
        Ok(Arc::new(WithFallback::new(inner)))
    } else {
        Ok(Arc::from(inner))
    }
}

/// Market overview: every asset with its last stored prices.
pub async fn market_assets(storage: &dyn Storage) -> StorageResult<Vec<MarketAsset>> {
    let assets = storage.list_assets().await?;
    let mut out = Vec::with_capacity(assets.len());
    for asset in assets {
        let sparkline_data = storage.recent_prices(asset.id, SPARKLINE_POINTS).await?;
        out.push(MarketAsset {
            id: asset.id,
            symbol: asset.symbol,
            name: asset.name,
            icon: asset.icon.unwrap_or_default(),
            price: asset.current_price.unwrap_or(0.0),
            price_change_percentage_24h: asset.price_change_percentage_24h.unwrap_or(0.0),
            sparkline_data,
        });
    }
    Ok(out)
}
