//! CoinMarketCap Pro API client.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::market::provider::{check_response, http_client, normalize_symbols, MarketDataProvider};
use crate::market::types::{ApiStatus, CoinInfo, Listing, MarketError, MarketResult, PriceQuote};

pub const DEFAULT_BASE_URL: &str = "https://pro-api.coinmarketcap.com";
const API_KEY_HEADER: &str = "X-CMC_PRO_API_KEY";

#[derive(Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Deserialize)]
struct Coin {
    id: i64,
    name: String,
    symbol: String,
    #[serde(default)]
    cmc_rank: Option<u32>,
    quote: HashMap<String, Quote>,
}

#[derive(Deserialize, Default, Clone)]
struct Quote {
    price: Option<f64>,
    percent_change_24h: Option<f64>,
    percent_change_7d: Option<f64>,
    market_cap: Option<f64>,
    volume_24h: Option<f64>,
    last_updated: Option<String>,
}

#[derive(Deserialize)]
struct Info {
    id: i64,
    name: String,
    symbol: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    logo: Option<String>,
    #[serde(default)]
    urls: Urls,
}

#[derive(Deserialize, Default)]
struct Urls {
    #[serde(default)]
    website: Vec<String>,
    #[serde(default)]
    explorer: Vec<String>,
    #[serde(default)]
    source_code: Vec<String>,
}

#[derive(Deserialize)]
struct KeyInfo {
    plan: Plan,
    usage: Usage,
}

#[derive(Deserialize)]
struct Plan {
    name: String,
}

#[derive(Deserialize)]
struct Usage {
    current_month: CurrentMonth,
}

#[derive(Deserialize)]
struct CurrentMonth {
    credits_used: Option<f64>,
    credits_left: Option<f64>,
}

/// Client for `pro-api.coinmarketcap.com/v1`.
#[derive(Debug, Clone)]
pub struct CoinMarketCapClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl CoinMarketCapClient {
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
        let key = self.api_key.as_deref().ok_or(MarketError::MissingApiKey)?;
        let url = format!("{}/v1{}", self.base_url, path);
        let response = self
            .http
            .get(&url)
            .header(API_KEY_HEADER, key)
            .header(reqwest::header::ACCEPT, "application/json")
            .query(query)
            .send()
            .await?;
        let response = check_response(response).await?;
        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|e| MarketError::Decode(e.to_string()))?;
        Ok(envelope.data)
    }
}

fn usd(coin: &Coin) -> Quote {
    coin.quote.get("USD").cloned().unwrap_or_default()
}

#[async_trait]
impl MarketDataProvider for CoinMarketCapClient {
    fn name(&self) -> &'static str {
        "coinmarketcap"
    }

    async fn quotes(&self, symbols: &[String]) -> MarketResult<Vec<PriceQuote>> {
        let symbols = normalize_symbols(symbols);
        if symbols.is_empty() {
            return Ok(Vec::new());
        }
        let data: HashMap<String, Coin> = self
            .get(
                "/cryptocurrency/quotes/latest",
                &[
                    ("symbol", symbols.join(",")),
                    ("convert", "USD".to_string()),
                    ("skip_invalid", "true".to_string()),
                ],
            )
            .await?;

        // Keep the caller's order.
        Ok(symbols
            .iter()
            .filter_map(|symbol| {
                let coin = data.get(symbol)?;
                let quote = usd(coin);
                Some(PriceQuote {
                    symbol: coin.symbol.clone(),
                    name: coin.name.clone(),
                    price: quote.price?,
                    change_24h: quote.percent_change_24h.unwrap_or(0.0),
                    market_cap: quote.market_cap,
                    volume_24h: quote.volume_24h,
                    last_updated: quote.last_updated,
                })
            })
            .collect())
    }

    async fn top_listings(&self, limit: u32) -> MarketResult<Vec<Listing>> {
        let coins: Vec<Coin> = self
            .get(
                "/cryptocurrency/listings/latest",
                &[
                    ("start", "1".to_string()),
                    ("limit", limit.to_string()),
                    ("convert", "USD".to_string()),
                ],
            )
            .await?;

        Ok(coins
            .iter()
            .map(|coin| {
                let quote = usd(coin);
                Listing {
                    id: coin.id.to_string(),
                    name: coin.name.clone(),
                    symbol: coin.symbol.clone(),
                    price: quote.price.unwrap_or(0.0),
                    change_24h: quote.percent_change_24h.unwrap_or(0.0),
                    change_7d: quote.percent_change_7d,
                    market_cap: quote.market_cap,
                    volume_24h: quote.volume_24h,
                    rank: coin.cmc_rank,
                }
            })
            .collect())
    }

    async fn coin_info(&self, symbol: &str) -> MarketResult<CoinInfo> {
        let symbol = symbol.trim().to_ascii_uppercase();
        let mut data: HashMap<String, Info> = self
            .get("/cryptocurrency/info", &[("symbol", symbol.clone())])
            .await?;
        let info = data.remove(&symbol).ok_or(MarketError::NotFound(symbol))?;

        Ok(CoinInfo {
            id: info.id.to_string(),
            name: info.name,
            symbol: info.symbol,
            description: info.description.unwrap_or_default(),
            website: info.urls.website.into_iter().next(),
            explorer: info.urls.explorer.into_iter().next(),
            source_code: info.urls.source_code.into_iter().next(),
            logo: info.logo,
        })
    }

    async fn status(&self) -> MarketResult<ApiStatus> {
        let info: KeyInfo = self.get("/key/info", &[]).await?;
        Ok(ApiStatus {
            provider: self.name(),
            status: "active",
            authenticated: true,
            plan: Some(info.plan.name),
            credits_used: info.usage.current_month.credits_used,
            credits_left: info.usage.current_month.credits_left,
            message: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, StatusCode};
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

    fn client(base_url: &str, key: Option<&str>) -> CoinMarketCapClient {
        CoinMarketCapClient::new(Some(base_url), key.map(str::to_string), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_quotes_parsing_and_header() {
        let router = Router::new().route(
            "/v1/cryptocurrency/quotes/latest",
            get(|headers: HeaderMap| async move {
                if headers.get("X-CMC_PRO_API_KEY").and_then(|v| v.to_str().ok()) != Some("k") {
                    return (StatusCode::UNAUTHORIZED, Json(json!({})));
                }
                (
                    StatusCode::OK,
                    Json(json!({
                        "data": {
                            "BTC": {"id": 1, "name": "Bitcoin", "symbol": "BTC",
                                    "quote": {"USD": {"price": 67000.5, "percent_change_24h": 1.5,
                                                      "market_cap": 1.3e12, "volume_24h": 2.0e10}}},
                            "ETH": {"id": 1027, "name": "Ethereum", "symbol": "ETH",
                                    "quote": {"USD": {"price": 3800.0, "percent_change_24h": -0.5}}}
                        }
                    })),
                )
            }),
        );
        let base = serve(router).await;

        let quotes = client(&base, Some("k"))
            .quotes(&["eth".to_string(), "BTC".into(), "NOPE".into()])
            .await
            .unwrap();
        assert_eq!(quotes.len(), 2);
        assert_eq!(quotes[0].symbol, "ETH");
        assert_eq!(quotes[1].price, 67000.5);
        assert_eq!(quotes[1].market_cap, Some(1.3e12));

        let err = client(&base, Some("wrong")).quotes(&["BTC".to_string()]).await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid API key");
    }

    #[tokio::test]
    async fn test_rate_limit_maps_to_error() {
        let router = Router::new().route(
            "/v1/cryptocurrency/listings/latest",
            get(|| async { StatusCode::TOO_MANY_REQUESTS }),
        );
        let base = serve(router).await;
        let err = client(&base, Some("k")).top_listings(20).await.unwrap_err();
        assert!(matches!(err, MarketError::RateLimited));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_missing_key() {
        let err = client("http://127.0.0.1:9", None).quotes(&["BTC".to_string()]).await.unwrap_err();
        assert!(matches!(err, MarketError::MissingApiKey));
    }

    #[tokio::test]
    async fn test_coin_info_and_status() {
        let router = Router::new()
            .route(
                "/v1/cryptocurrency/info",
                get(|| async {
                    Json(json!({"data": {"SOL": {
                        "id": 5426, "name": "Solana", "symbol": "SOL",
                        "description": "Fast chain", "logo": "https://logo/sol.png",
                        "urls": {"website": ["https://solana.com"], "explorer": [], "source_code": ["https://github.com/solana-labs"]}
                    }}}))
                }),
            )
            .route(
                "/v1/key/info",
                get(|| async {
                    Json(json!({"data": {"plan": {"name": "Basic"},
                        "usage": {"current_month": {"credits_used": 12, "credits_left": 9988}}}}))
                }),
            );
        let base = serve(router).await;
        let cmc = client(&base, Some("k"));

        let info = cmc.coin_info("sol").await.unwrap();
        assert_eq!(info.website.as_deref(), Some("https://solana.com"));
        assert!(info.explorer.is_none());

        let status = cmc.status().await.unwrap();
        assert_eq!(status.plan.as_deref(), Some("Basic"));
        assert_eq!(status.credits_left, Some(9988.0));
    }
}
