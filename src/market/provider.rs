//! Market data provider abstraction and shared HTTP handling.

use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use std::time::Duration;

use crate::market::types::{ApiStatus, CoinInfo, Listing, MarketError, MarketResult, PriceQuote};

/// Source of USD quotes, rankings and coin metadata.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Short provider name used in logs and status output.
    fn name(&self) -> &'static str;

    /// Quotes for the given symbols. Symbols the provider does not know are
    /// left out of the result rather than failing the call.
    async fn quotes(&self, symbols: &[String]) -> MarketResult<Vec<PriceQuote>>;

    async fn top_listings(&self, limit: u32) -> MarketResult<Vec<Listing>>;

    async fn coin_info(&self, symbol: &str) -> MarketResult<CoinInfo>;

    async fn status(&self) -> MarketResult<ApiStatus>;
}

pub(crate) fn http_client(timeout: Duration) -> MarketResult<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("rimtoken-wallet/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

/// Map upstream error statuses to [`MarketError`].
pub(crate) async fn check_response(response: Response) -> MarketResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    match status {
        StatusCode::TOO_MANY_REQUESTS => Err(MarketError::RateLimited),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(MarketError::InvalidApiKey),
        _ => {
            let body = response.text().await.unwrap_or_default();
            let mut message: String = body.chars().take(200).collect();
            if message.is_empty() {
                message = status.canonical_reason().unwrap_or("unknown").to_string();
            }
            Err(MarketError::Status {
                status: status.as_u16(),
                message,
            })
        }
    }
}

/// Normalize user-supplied symbols: trimmed, upper case, no blanks or duplicates.
pub fn normalize_symbols(symbols: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(symbols.len());
    for symbol in symbols {
        let s = symbol.trim().to_ascii_uppercase();
        if !s.is_empty() && !out.contains(&s) {
            out.push(s);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_symbols() {
        let input = vec![" btc".to_string(), "ETH".into(), "".into(), "Btc".into()];
        assert_eq!(normalize_symbols(&input), vec!["BTC", "ETH"]);
    }
}
