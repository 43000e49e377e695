//! Market data records and errors.

use serde::Serialize;
use thiserror::Error;

use crate::storage::StorageError;

/// Latest USD quote of one coin.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceQuote {
    pub symbol: String,
    pub name: String,
    pub price: f64,
    pub change_24h: f64,
    pub market_cap: Option<f64>,
    pub volume_24h: Option<f64>,
    pub last_updated: Option<String>,
}

/// Entry of a market-cap ranked listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub id: String,
    pub name: String,
    pub symbol: String,
    pub price: f64,
    pub change_24h: f64,
    pub change_7d: Option<f64>,
    pub market_cap: Option<f64>,
    pub volume_24h: Option<f64>,
    pub rank: Option<u32>,
}

/// Descriptive metadata of a coin.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoinInfo {
    pub id: String,
    pub name: String,
    pub symbol: String,
    pub description: String,
    pub website: Option<String>,
    pub explorer: Option<String>,
    pub source_code: Option<String>,
    pub logo: Option<String>,
}

/// Provider account / connectivity status.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiStatus {
    pub provider: &'static str,
    /// "active" or "error".
    pub status: &'static str,
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credits_used: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credits_left: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ApiStatus {
    pub fn error(provider: &'static str, authenticated: bool, message: impl Into<String>) -> Self {
        Self {
            provider,
            status: "error",
            authenticated,
            plan: None,
            credits_used: None,
            credits_left: None,
            message: Some(message.into()),
        }
    }
}

/// Asset row of the market overview with its recent price trail.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketAsset {
    pub id: i32,
    pub symbol: String,
    pub name: String,
    pub icon: String,
    pub price: f64,
    pub price_change_percentage_24h: f64,
    pub sparkline_data: Vec<f64>,
}

/// Outcome of one refresh pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshReport {
    pub updated: Vec<String>,
    pub unknown: Vec<String>,
    /// True when the built-in quotes were used.
    pub fallback: bool,
}

#[derive(Debug, Error)]
pub enum MarketError {
    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("Invalid API key")]
    InvalidApiKey,

    #[error("API key is not configured")]
    MissingApiKey,

    #[error("Coin {0} not found")]
    NotFound(String),

    #[error("Upstream returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected response: {0}")]
    Decode(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl MarketError {
    /// Worth retrying: network trouble, throttling, upstream 5xx.
    pub fn is_transient(&self) -> bool {
        match self {
            MarketError::RateLimited => true,
            MarketError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            MarketError::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

pub type MarketResult<T> = Result<T, MarketError>;
