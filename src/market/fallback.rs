//! Built-in quotes served when the upstream provider is unavailable.

use async_trait::async_trait;

use crate::market::provider::{normalize_symbols, MarketDataProvider};
use crate::market::types::{ApiStatus, CoinInfo, Listing, MarketResult, PriceQuote};
use crate::observability::metrics;

/// (symbol, name, price, 24h change %)
const FALLBACK_QUOTES: &[(&str, &str, f64, f64)] = &[
    ("BTC", "Bitcoin", 67500.0, 2.5),
    ("ETH", "Ethereum", 3850.0, 1.8),
    ("BNB", "Binance Coin", 635.0, 0.9),
    ("SOL", "Solana", 165.0, 3.2),
    ("DOGE", "Dogecoin", 0.38, 4.1),
    ("USDC", "USD Coin", 1.00, 0.0),
];

/// Fallback quotes for the requested symbols, in request order.
pub fn fallback_quotes(symbols: &[String]) -> Vec<PriceQuote> {
    normalize_symbols(symbols)
        .iter()
        .filter_map(|symbol| FALLBACK_QUOTES.iter().find(|(s, ..)| s == symbol))
        .map(|(symbol, name, price, change)| PriceQuote {
            symbol: symbol.to_string(),
            name: name.to_string(),
            price: *price,
            change_24h: *change,
            market_cap: None,
            volume_24h: None,
            last_updated: None,
        })
        .collect()
}

fn fallback_listings(limit: u32) -> Vec<Listing> {
    FALLBACK_QUOTES
        .iter()
        .take(limit as usize)
        .enumerate()
        .map(|(i, (symbol, name, price, change))| Listing {
            id: symbol.to_ascii_lowercase(),
            name: name.to_string(),
            symbol: symbol.to_string(),
            price: *price,
            change_24h: *change,
            change_7d: None,
            market_cap: None,
            volume_24h: None,
            rank: Some(i as u32 + 1),
        })
        .collect()
}

/// Wraps a provider and substitutes built-in data for failed price calls.
///
/// Coin metadata and status errors are passed through unchanged.
pub struct WithFallback {
    inner: Box<dyn MarketDataProvider>,
}

impl WithFallback {
    pub fn new(inner: Box<dyn MarketDataProvider>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl MarketDataProvider for WithFallback {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn quotes(&self, symbols: &[String]) -> MarketResult<Vec<PriceQuote>> {
        match self.inner.quotes(symbols).await {
            Ok(quotes) => Ok(quotes),
            Err(e) => {
                tracing::warn!(provider = self.inner.name(), error = %e, "Quotes failed, serving fallback prices");
                metrics::record_market_fallback();
                Ok(fallback_quotes(symbols))
            }
        }
    }

    async fn top_listings(&self, limit: u32) -> MarketResult<Vec<Listing>> {
        match self.inner.top_listings(limit).await {
            Ok(listings) => Ok(listings),
            Err(e) => {
                tracing::warn!(provider = self.inner.name(), error = %e, "Listings failed, serving fallback");
                metrics::record_market_fallback();
                Ok(fallback_listings(limit))
            }
        }
    }

    async fn coin_info(&self, symbol: &str) -> MarketResult<CoinInfo> {
        self.inner.coin_info(symbol).await
    }

    async fn status(&self) -> MarketResult<ApiStatus> {
        self.inner.status().await
    }
}
