//! Price refresh: provider quotes → asset prices + market snapshots.
//!
//! # Data Flow
//! ```text
//! MarketRefresher::refresh_once
//!     → storage.list_assets (symbols to price)
//!     → provider.quotes (retried with backoff on transient errors)
//!         → on final failure: built-in quotes when fallback is enabled
//!     → per known symbol: update_asset_price + insert_market_data
//!     → RefreshReport { updated, unknown, fallback }
//!
//! MarketRefresher::run (background)
//!     → tick every interval → refresh_once → optional portfolio snapshots
//!     → exits on shutdown broadcast
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

use crate::market::fallback::fallback_quotes;
use crate::market::provider::MarketDataProvider;
use crate::market::types::{MarketError, MarketResult, PriceQuote, RefreshReport};
use crate::observability::metrics;
use crate::portfolio;
use crate::resilience::{retry, RetryPolicy};
use crate::storage::{NewMarketData, SharedStorage};

pub struct MarketRefresher {
    storage: SharedStorage,
    provider: Arc<dyn MarketDataProvider>,
    policy: RetryPolicy,
    fallback_on_error: bool,
}

impl MarketRefresher {
    pub fn new(
        storage: SharedStorage,
        provider: Arc<dyn MarketDataProvider>,
        policy: RetryPolicy,
        fallback_on_error: bool,
    ) -> Self {
        Self {
            storage,
            provider,
            policy,
            fallback_on_error,
        }
    }

    async fn fetch_quotes(&self, symbols: &[String]) -> MarketResult<(Vec<PriceQuote>, bool)> {
        let provider = self.provider.clone();
        let result = retry(self.policy, MarketError::is_transient, |attempt| {
            let provider = provider.clone();
            async move {
                tracing::debug!(provider = provider.name(), attempt, "Fetching quotes");
                provider.quotes(symbols).await
            }
        })
        .await;

        match result {
            Ok(quotes) => Ok((quotes, false)),
            Err(e) if self.fallback_on_error => {
                tracing::warn!(provider = self.provider.name(), error = %e, "Refresh using fallback prices");
                Ok((fallback_quotes(symbols), true))
            }
            Err(e) => Err(e),
        }
    }

    /// Fetch quotes for every stored asset and persist them.
    pub async fn refresh_once(&self) -> MarketResult<RefreshReport> {
        let assets = self.storage.list_assets().await?;
        let symbols: Vec<String> = assets.iter().map(|a| a.symbol.clone()).collect();

        let (quotes, fallback) = match self.fetch_quotes(&symbols).await {
            Ok(result) => result,
            Err(e) => {
                metrics::record_market_refresh("error");
                return Err(e);
            }
        };
        let by_symbol: HashMap<String, &PriceQuote> = quotes
            .iter()
            .map(|q| (q.symbol.to_ascii_uppercase(), q))
            .collect();

        let mut report = RefreshReport {
            fallback,
            ..RefreshReport::default()
        };
        for asset in &assets {
            let Some(quote) = by_symbol.get(&asset.symbol.to_ascii_uppercase()) else {
                report.unknown.push(asset.symbol.clone());
                continue;
            };
            self.storage
                .update_asset_price(asset.id, quote.price, quote.change_24h)
                .await?;
            self.storage
                .insert_market_data(NewMarketData {
                    asset_id: asset.id,
                    price: quote.price,
                    volume_24h: quote.volume_24h,
                    market_cap: quote.market_cap,
                    price_change_percentage_24h: Some(quote.change_24h),
                })
                .await?;
            report.updated.push(asset.symbol.clone());
        }

        let outcome = if fallback { "fallback" } else { "ok" };
        metrics::record_market_refresh(outcome);
        tracing::info!(
            updated = report.updated.len(),
            unknown = ?report.unknown,
            fallback,
            "Market data refreshed"
        );
        Ok(report)
    }

    /// Record a portfolio history entry for every user.
    pub async fn snapshot_portfolios(&self) -> MarketResult<usize> {
        let users = self.storage.list_user_ids().await?;
        for user_id in &users {
            portfolio::snapshot(self.storage.as_ref(), *user_id).await?;
        }
        tracing::debug!(users = users.len(), "Portfolio snapshots recorded");
        Ok(users.len())
    }

    /// Refresh periodically until shutdown is signalled.
    pub async fn run(
        self: Arc<Self>,
        interval: Duration,
        snapshot: bool,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        let mut ticker = tokio::time::interval(interval);
        tracing::info!(interval_secs = interval.as_secs(), snapshot, "Market refresher started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.refresh_once().await {
                        tracing::error!(error = %e, "Scheduled market refresh failed");
                        continue;
                    }
                    if snapshot {
                        if let Err(e) = self.snapshot_portfolios().await {
                            tracing::error!(error = %e, "Portfolio snapshot failed");
                        }
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Market refresher stopping");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::types::{ApiStatus, CoinInfo, Listing};
    use crate::storage::MemStorage;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails `failures` times with a transient error, then quotes BTC and ETH.
    struct Flaky {
        failures: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl MarketDataProvider for Flaky {
        fn name(&self) -> &'static str {
            "flaky"
        }
        async fn quotes(&self, _: &[String]) -> MarketResult<Vec<PriceQuote>> {
            if self.calls.fetch_add(1, Ordering::SeqCst) < self.failures {
                return Err(MarketError::Status {
                    status: 503,
                    message: "busy".into(),
                });
            }
            Ok(vec![
                PriceQuote {
                    symbol: "BTC".into(),
                    name: "Bitcoin".into(),
                    price: 70000.0,
                    change_24h: 1.0,
                    market_cap: Some(1.0),
                    volume_24h: Some(2.0),
                    last_updated: None,
                },
                PriceQuote {
                    symbol: "ETH".into(),
                    name: "Ethereum".into(),
                    price: 4000.0,
                    change_24h: -2.0,
                    market_cap: None,
                    volume_24h: None,
                    last_updated: None,
                },
            ])
        }
        async fn top_listings(&self, _: u32) -> MarketResult<Vec<Listing>> {
            Ok(Vec::new())
        }
        async fn coin_info(&self, symbol: &str) -> MarketResult<CoinInfo> {
            Err(MarketError::NotFound(symbol.to_string()))
        }
        async fn status(&self) -> MarketResult<ApiStatus> {
            Err(MarketError::MissingApiKey)
        }
    }

    async fn seeded() -> SharedStorage {
        let storage = Arc::new(MemStorage::new());
        crate::storage::seed::seed_demo_data(storage.as_ref()).await.unwrap();
        storage
    }

    fn refresher(storage: SharedStorage, failures: u32, fallback: bool) -> MarketRefresher {
        MarketRefresher::new(
            storage,
            Arc::new(Flaky {
                failures,
                calls: AtomicU32::new(0),
            }),
            RetryPolicy::new(3, 1, 5),
            fallback,
        )
    }

    #[tokio::test]
    async fn test_refresh_updates_known_and_reports_unknown() {
        let storage = seeded().await;
        let report = refresher(storage.clone(), 1, false).refresh_once().await.unwrap();

        assert_eq!(report.updated, vec!["BTC", "ETH"]);
        assert_eq!(report.unknown, vec!["USDC", "SOL", "DOGE", "BNB"]);
        assert!(!report.fallback);

        let btc = storage.get_asset_by_symbol("BTC").await.unwrap().unwrap();
        assert_eq!(btc.current_price, Some(70000.0));
        assert_eq!(storage.recent_prices(btc.id, 24).await.unwrap(), vec![70000.0]);
    }

    #[tokio::test]
    async fn test_refresh_fails_without_fallback() {
        let storage = seeded().await;
        let result = refresher(storage, 10, false).refresh_once().await;
        assert!(matches!(result, Err(MarketError::Status { status: 503, .. })));
    }

    #[tokio::test]
    async fn test_refresh_falls_back() {
        let storage = seeded().await;
        let report = refresher(storage.clone(), 10, true).refresh_once().await.unwrap();
        assert!(report.fallback);
        assert_eq!(report.updated.len(), 6);

        let sol = storage.get_asset_by_symbol("SOL").await.unwrap().unwrap();
        assert_eq!(sol.current_price, Some(165.0));
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let storage = seeded().await;
        let (tx, rx) = broadcast::channel(1);
        let task = tokio::spawn(
            Arc::new(refresher(storage, 0, false)).run(Duration::from_millis(10), true, rx),
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(1), task).await.unwrap().unwrap();
    }
}
