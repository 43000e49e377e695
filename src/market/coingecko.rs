//! CoinGecko v3 API client.
//!
//! CoinGecko addresses coins by id ("bitcoin"), not ticker; a fixed table
//! maps the tickers this wallet lists.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::market::provider::{check_response, http_client, normalize_symbols, MarketDataProvider};
use crate::market::types::{ApiStatus, CoinInfo, Listing, MarketError, MarketResult, PriceQuote};

pub const DEFAULT_BASE_URL: &str = "https://api.coingecko.com/api/v3";
const API_KEY_HEADER: &str = "x-cg-demo-api-key";

/// (ticker, coingecko id, display name)
const COINS: &[(&str, &str, &str)] = &[
    ("BTC", "bitcoin", "Bitcoin"),
    ("ETH", "ethereum", "Ethereum"),
    ("USDC", "usd-coin", "USD Coin"),
    ("USDT", "tether", "Tether"),
    ("SOL", "solana", "Solana"),
    ("DOGE", "dogecoin", "Dogecoin"),
    ("BNB", "binancecoin", "Binance Coin"),
    ("MATIC", "matic-network", "Polygon"),
    ("ADA", "cardano", "Cardano"),
    ("XRP", "ripple", "XRP"),
];

fn coin_id(symbol: &str) -> Option<(&'static str, &'static str)> {
    COINS
        .iter()
        .find(|(ticker, _, _)| ticker.eq_ignore_ascii_case(symbol))
        .map(|(_, id, name)| (*id, *name))
}

#[derive(Deserialize)]
struct SimplePrice {
    usd: Option<f64>,
    usd_24h_change: Option<f64>,
    usd_market_cap: Option<f64>,
    usd_24h_vol: Option<f64>,
    last_updated_at: Option<i64>,
}

#[derive(Deserialize)]
struct MarketRow {
    id: String,
    symbol: String,
    name: String,
    current_price: Option<f64>,
    price_change_percentage_24h: Option<f64>,
    price_change_percentage_7d_in_currency: Option<f64>,
    market_cap: Option<f64>,
    total_volume: Option<f64>,
    market_cap_rank: Option<u32>,
}

#[derive(Deserialize)]
struct CoinDetail {
    id: String,
    symbol: String,
    name: String,
    #[serde(default)]
    description: HashMap<String, String>,
    #[serde(default)]
    links: Links,
    #[serde(default)]
    image: HashMap<String, String>,
}

#[derive(Deserialize, Default)]
struct Links {
    #[serde(default)]
    homepage: Vec<String>,
    #[serde(default)]
    blockchain_site: Vec<String>,
    #[serde(default)]
    repos_url: HashMap<String, Vec<String>>,
}

#[derive(Deserialize)]
struct Ping {
    gecko_says: Option<String>,
}

fn first_non_empty(values: Vec<String>) -> Option<String> {
    values.into_iter().find(|v| !v.trim().is_empty())
}

/// Client for `api.coingecko.com/api/v3`. The API key is optional.
#[derive(Debug, Clone)]
pub struct CoinGeckoClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl CoinGeckoClient {
    pub fn new(base_url: Option<&str>, api_key: Option<String>, timeout: Duration) -> MarketResult<Self> {
        Ok(Self {
            http: http_client(timeout)?,
            base_url: base_url.unwrap_or(DEFAULT_BASE_URL).trim_end_matches('/').to_string(),
            api_key,
        })
    }

    async fn get<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> MarketResult<T> {
        let mut request = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .header(reqwest::header::ACCEPT, "application/json")
            .query(query);
        if let Some(key) = &self.api_key {
            request = request.header(API_KEY_HEADER, key);
        }
        let response = check_response(request.send().await?).await?;
        response.json().await.map_err(|e| MarketError::Decode(e.to_string()))
    }
}

#[async_trait]
impl MarketDataProvider for CoinGeckoClient {
    fn name(&self) -> &'static str {
        "coingecko"
    }

    async fn quotes(&self, symbols: &[String]) -> MarketResult<Vec<PriceQuote>> {
        let known: Vec<(String, &str, &str)> = normalize_symbols(symbols)
            .into_iter()
            .filter_map(|s| coin_id(&s).map(|(id, name)| (s, id, name)))
            .collect();
        if known.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<&str> = known.iter().map(|(_, id, _)| *id).collect();

        let data: HashMap<String, SimplePrice> = self
            .get(
                "/simple/price",
                &[
                    ("ids", ids.join(",")),
                    ("vs_currencies", "usd".to_string()),
                    ("include_24hr_change", "true".to_string()),
                    ("include_market_cap", "true".to_string()),
                    ("include_24hr_vol", "true".to_string()),
                    ("include_last_updated_at", "true".to_string()),
                ],
            )
            .await?;

        Ok(known
            .into_iter()
            .filter_map(|(symbol, id, name)| {
                let row = data.get(id)?;
                Some(PriceQuote {
                    symbol,
                    name: name.to_string(),
                    price: row.usd?,
                    change_24h: row.usd_24h_change.unwrap_or(0.0),
                    market_cap: row.usd_market_cap,
                    volume_24h: row.usd_24h_vol,
                    last_updated: row
                        .last_updated_at
                        .and_then(|ts| chrono::DateTime::from_timestamp(ts, 0))
                        .map(|dt| dt.to_rfc3339()),
                })
            })
            .collect())
    }

    async fn top_listings(&self, limit: u32) -> MarketResult<Vec<Listing>> {
        let rows: Vec<MarketRow> = self
            .get(
                "/coins/markets",
                &[
                    ("vs_currency", "usd".to_string()),
                    ("order", "market_cap_desc".to_string()),
                    ("per_page", limit.clamp(1, 250).to_string()),
                    ("page", "1".to_string()),
                    ("price_change_percentage", "24h,7d".to_string()),
                ],
            )
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| Listing {
                id: row.id,
                name: row.name,
                symbol: row.symbol.to_ascii_uppercase(),
                price: row.current_price.unwrap_or(0.0),
                change_24h: row.price_change_percentage_24h.unwrap_or(0.0),
                change_7d: row.price_change_percentage_7d_in_currency,
                market_cap: row.market_cap,
                volume_24h: row.total_volume,
                rank: row.market_cap_rank,
            })
            .collect())
    }

    async fn coin_info(&self, symbol: &str) -> MarketResult<CoinInfo> {
        let (id, _) = coin_id(symbol.trim()).ok_or_else(|| MarketError::NotFound(symbol.to_string()))?;
        let mut detail: CoinDetail = self
            .get(
                &format!("/coins/{}", id),
                &[
                    ("localization", "false".to_string()),
                    ("tickers", "false".to_string()),
                    ("market_data", "false".to_string()),
                    ("community_data", "false".to_string()),
                    ("developer_data", "false".to_string()),
                ],
            )
            .await?;

        Ok(CoinInfo {
            id: detail.id,
            name: detail.name,
            symbol: detail.symbol.to_ascii_uppercase(),
            description: detail.description.remove("en").unwrap_or_default(),
            website: first_non_empty(detail.links.homepage),
            explorer: first_non_empty(detail.links.blockchain_site),
            source_code: detail
                .links
                .repos_url
                .remove("github")
                .and_then(first_non_empty),
            logo: detail.image.remove("large"),
        })
    }

    async fn status(&self) -> MarketResult<ApiStatus> {
        let ping: Ping = self.get("/ping", &[]).await?;
        Ok(ApiStatus {
            provider: self.name(),
            status: "active",
            authenticated: self.api_key.is_some(),
            plan: None,
            credits_used: None,
            credits_left: None,
            message: Some(ping.gecko_says.unwrap_or_else(|| "API is working".to_string())),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Query;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_quotes_map_ids_to_tickers() {
        let router = Router::new().route(
            "/simple/price",
            get(|Query(q): Query<HashMap<String, String>>| async move {
                assert_eq!(q.get("ids").map(String::as_str), Some("bitcoin,usd-coin"));
                Json(json!({
                    "bitcoin": {"usd": 67000.0, "usd_24h_change": 2.0, "usd_market_cap": 1.0e12},
                    "usd-coin": {"usd": 1.0}
                }))
            }),
        );
        let base = serve(router).await;
        let client = CoinGeckoClient::new(Some(&base), None, Duration::from_secs(5)).unwrap();

        let quotes = client
            .quotes(&["BTC".to_string(), "usdc".into(), "UNKNOWNCOIN".into()])
            .await
            .unwrap();
        assert_eq!(quotes.len(), 2);
        assert_eq!(quotes[0].symbol, "BTC");
        assert_eq!(quotes[0].change_24h, 2.0);
        assert_eq!(quotes[1].symbol, "USDC");
        assert_eq!(quotes[1].change_24h, 0.0);
    }

    #[tokio::test]
    async fn test_listings() {
        let router = Router::new().route(
            "/coins/markets",
            get(|| async {
                Json(json!([
                    {"id": "bitcoin", "symbol": "btc", "name": "Bitcoin", "current_price": 67000.0,
                     "price_change_percentage_24h": 1.0, "market_cap": 1.3e12, "total_volume": 3.0e10,
                     "market_cap_rank": 1}
                ]))
            }),
        );
        let base = serve(router).await;
        let client = CoinGeckoClient::new(Some(&base), None, Duration::from_secs(5)).unwrap();

        let listings = client.top_listings(5).await.unwrap();
        assert_eq!(listings[0].symbol, "BTC");
        assert_eq!(listings[0].rank, Some(1));
    }

    #[tokio::test]
    async fn test_unknown_coin_info() {
        let client = CoinGeckoClient::new(Some("http://127.0.0.1:9"), None, Duration::from_secs(1)).unwrap();
        assert!(matches!(client.coin_info("ZZZ").await, Err(MarketError::NotFound(_))));
    }
}
