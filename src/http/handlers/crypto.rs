//! Pass-through to the configured market data provider.
//!
//! Responses are wrapped as `{ success, data, source }`.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::http::handlers::{ApiPath, ApiQuery};
use crate::http::{ApiError, ApiResult, AppState};
use crate::market::provider::normalize_symbols;
use crate::market::{ApiStatus, CoinInfo, Listing, PriceQuote, DEFAULT_SYMBOLS};

const DEFAULT_TOP_LIMIT: u32 = 20;
const MAX_TOP_LIMIT: u32 = 100;

#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub data: T,
    pub source: &'static str,
}

fn envelope<T>(state: &AppState, data: T) -> Json<Envelope<T>> {
    Json(Envelope {
        success: true,
        data,
        source: state.market.name(),
    })
}

#[derive(Debug, Deserialize)]
pub struct PricesQuery {
    /// Comma separated, e.g. `BTC,ETH`.
    pub symbols: Option<String>,
}

/// Symbols from the query string, or the default set when none are given.
fn requested_symbols(raw: Option<&str>) -> Vec<String> {
    let requested: Vec<String> = raw
        .unwrap_or_default()
        .split(',')
        .map(str::to_string)
        .collect();
    let symbols = normalize_symbols(&requested);
    if symbols.is_empty() {
        DEFAULT_SYMBOLS.iter().map(|s| s.to_string()).collect()
    } else {
        symbols
    }
}

pub async fn prices(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<PricesQuery>,
) -> ApiResult<Json<Envelope<Vec<PriceQuote>>>> {
    let symbols = requested_symbols(query.symbols.as_deref());
    let quotes = state.market.quotes(&symbols).await?;
    Ok(envelope(&state, quotes))
}

#[derive(Debug, Deserialize)]
pub struct TopQuery {
    pub limit: Option<u32>,
}

pub async fn top(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<TopQuery>,
) -> ApiResult<Json<Envelope<Vec<Listing>>>> {
    let limit = query.limit.unwrap_or(DEFAULT_TOP_LIMIT);
    if limit == 0 || limit > MAX_TOP_LIMIT {
        return Err(ApiError::BadRequest(format!(
            "limit must be between 1 and {}",
            MAX_TOP_LIMIT
        )));
    }
    let listings = state.market.top_listings(limit).await?;
    Ok(envelope(&state, listings))
}

pub async fn info(
    State(state): State<AppState>,
    ApiPath(symbol): ApiPath<String>,
) -> ApiResult<Json<Envelope<CoinInfo>>> {
    let symbol = symbol.trim().to_ascii_uppercase();
    let info = state.market.coin_info(&symbol).await?;
    Ok(envelope(&state, info))
}

/// Provider errors are reported inside the status rather than as an HTTP error.
pub async fn status(State(state): State<AppState>) -> Json<Envelope<ApiStatus>> {
    let authenticated = state.config.market.api_key.is_some();
    let status = match state.market.status().await {
        Ok(status) => status,
        Err(e) => ApiStatus::error(state.market.name(), authenticated, e.to_string()),
    };
    envelope(&state, status)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requested_symbols() {
        assert_eq!(requested_symbols(Some("btc, eth,,BTC")), vec!["BTC", "ETH"]);
        assert_eq!(requested_symbols(None).len(), DEFAULT_SYMBOLS.len());
        assert_eq!(requested_symbols(Some(" , ")).len(), DEFAULT_SYMBOLS.len());
    }
}
