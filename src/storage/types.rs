//! Persisted records, insert payloads and storage errors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A registered account. The password field holds an argon2 PHC string.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub password: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub email: String,
}

/// A tradable cryptocurrency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub id: i32,
    pub symbol: String,
    pub name: String,
    pub icon: Option<String>,
    pub current_price: Option<f64>,
    pub price_change_percentage_24h: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAsset {
    pub symbol: String,
    pub name: String,
    pub icon: Option<String>,
    pub current_price: Option<f64>,
    pub price_change_percentage_24h: Option<f64>,
}

/// Balance of one asset held by one user.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Wallet {
    pub id: i32,
    pub user_id: i32,
    pub asset_id: i32,
    pub balance: f64,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Send,
    Receive,
    Swap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    #[default]
    Completed,
    Failed,
}

/// A send, receive or swap record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: i32,
    pub user_id: i32,
    pub asset_id: i32,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub amount: f64,
    pub to_address: Option<String>,
    pub from_address: Option<String>,
    pub fee: Option<f64>,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTransaction {
    pub user_id: i32,
    pub asset_id: i32,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub amount: f64,
    #[serde(default)]
    pub to_address: Option<String>,
    #[serde(default)]
    pub from_address: Option<String>,
    #[serde(default)]
    pub fee: Option<f64>,
    #[serde(default)]
    pub status: TransactionStatus,
    /// Backdating, used by seed data only.
    #[serde(skip)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Price snapshot of an asset.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketData {
    pub id: i32,
    pub asset_id: i32,
    pub price: f64,
    pub volume_24h: Option<f64>,
    pub market_cap: Option<f64>,
    pub price_change_percentage_24h: Option<f64>,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewMarketData {
    pub asset_id: i32,
    pub price: f64,
    pub volume_24h: Option<f64>,
    pub market_cap: Option<f64>,
    pub price_change_percentage_24h: Option<f64>,
}

/// Total portfolio value at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioHistory {
    pub id: i32,
    pub user_id: i32,
    pub total_value: f64,
    pub timestamp: DateTime<Utc>,
}

/// On-chain address a user has connected.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletAddress {
    pub id: i32,
    pub user_id: i32,
    pub address: String,
    pub network: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewWalletAddress {
    pub user_id: i32,
    pub address: String,
    pub network: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefiPositionType {
    Liquidity,
    Staking,
    Lending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DefiPositionStatus {
    #[default]
    Active,
    Completed,
    Withdrawn,
}

/// Staking, liquidity or lending position.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DefiPosition {
    pub id: i32,
    pub user_id: i32,
    pub protocol: String,
    #[serde(rename = "type")]
    pub kind: DefiPositionType,
    pub amount: f64,
    pub asset_id: i32,
    pub apy: Option<f64>,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub status: DefiPositionStatus,
}

#[derive(Debug, Clone)]
pub struct NewDefiPosition {
    pub user_id: i32,
    pub protocol: String,
    pub kind: DefiPositionType,
    pub amount: f64,
    pub asset_id: i32,
    pub apy: Option<f64>,
}

/// Stored progress of one user towards one achievement.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAchievement {
    pub user_id: i32,
    pub achievement_id: String,
    pub progress: u8,
    pub unlocked_at: Option<DateTime<Utc>>,
}

/// Signed change to one wallet produced by the ledger.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BalanceChange {
    pub asset_id: i32,
    pub delta: f64,
}

macro_rules! text_enum {
    ($ty:ty { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = StorageError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(StorageError::Corrupt(format!(
                        "unknown {} '{}'",
                        stringify!($ty),
                        other
                    ))),
                }
            }
        }
    };
}

text_enum!(TransactionType { Send => "send", Receive => "receive", Swap => "swap" });
text_enum!(TransactionStatus { Pending => "pending", Completed => "completed", Failed => "failed" });
text_enum!(DefiPositionType { Liquidity => "liquidity", Staking => "staking", Lending => "lending" });
text_enum!(DefiPositionStatus { Active => "active", Completed => "completed", Withdrawn => "withdrawn" });

/// Errors that can occur in a storage backend.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Insufficient balance: available {available}, required {required}")]
    InsufficientBalance { available: f64, required: f64 },

    #[error("Corrupt record: {0}")]
    Corrupt(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Seed error: {0}")]
    Seed(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
