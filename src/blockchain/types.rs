//! Network identifiers, wallet keys and error definitions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Supported networks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Ethereum,
    #[serde(alias = "bsc")]
    Binance,
    Polygon,
    Solana,
}

impl Network {
    pub const ALL: [Network; 4] = [
        Network::Ethereum,
        Network::Binance,
        Network::Polygon,
        Network::Solana,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Ethereum => "ethereum",
            Network::Binance => "binance",
            Network::Polygon => "polygon",
            Network::Solana => "solana",
        }
    }

    /// Value stored in `wallet_addresses.network`.
    pub fn storage_name(&self) -> &'static str {
        match self {
            Network::Binance => "bsc",
            other => other.as_str(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Network::Ethereum => "Ethereum",
            Network::Binance => "Binance Smart Chain",
            Network::Polygon => "Polygon",
            Network::Solana => "Solana",
        }
    }

    pub fn short_name(&self) -> &'static str {
        match self {
            Network::Ethereum => "ETH",
            Network::Binance => "BSC",
            Network::Polygon => "MATIC",
            Network::Solana => "SOL",
        }
    }

    /// Native coin of the network.
    pub fn coin_symbol(&self) -> &'static str {
        match self {
            Network::Ethereum => "ETH",
            Network::Binance => "BNB",
            Network::Polygon => "MATIC",
            Network::Solana => "SOL",
        }
    }

    pub fn is_evm(&self) -> bool {
        !matches!(self, Network::Solana)
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = BlockchainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ethereum" | "eth" => Ok(Network::Ethereum),
            "binance" | "bsc" => Ok(Network::Binance),
            "polygon" | "matic" => Ok(Network::Polygon),
            "solana" | "sol" => Ok(Network::Solana),
            _ => Err(BlockchainError::UnsupportedNetwork(s.to_string())),
        }
    }
}

/// Address and private key of a wallet.
///
/// The private key is only ever returned to the caller that created or
/// imported the wallet; it is never logged or stored.
#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletKeys {
    pub address: String,
    pub private_key: String,
}

impl fmt::Debug for WalletKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletKeys")
            .field("address", &self.address)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// Entry in an address's on-chain history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxHistoryEntry {
    pub signature: String,
    pub slot: u64,
    pub err: Option<serde_json::Value>,
    pub memo: Option<String>,
    pub block_time: Option<i64>,
}

/// Entry of `GET /api/chains`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkOption {
    pub value: &'static str,
    pub label: &'static str,
    pub short_name: &'static str,
    pub coin_symbol: &'static str,
}

impl From<Network> for NetworkOption {
    fn from(network: Network) -> Self {
        Self {
            value: network.as_str(),
            label: network.name(),
            short_name: network.short_name(),
            coin_symbol: network.coin_symbol(),
        }
    }
}

/// Errors that can occur during blockchain operations.
///
/// `InvalidPrivateKey` and `TransactionFailed` are the messages shown to
/// clients; the underlying cause is logged where it happens.
#[derive(Debug, Error)]
pub enum BlockchainError {
    #[error("Invalid private key")]
    InvalidPrivateKey,

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Transaction failed")]
    TransactionFailed,

    /// RPC connection or request failed.
    #[error("RPC error: {0}")]
    Rpc(String),

    /// Transfer was sent but not confirmed in time.
    #[error("Transaction not confirmed after {0} seconds")]
    ConfirmationTimeout(u64),

    /// Chain configuration mismatch.
    #[error("Chain ID mismatch: expected {expected}, got {actual}")]
    ChainMismatch { expected: u64, actual: u64 },

    #[error("Unsupported network: {0}")]
    UnsupportedNetwork(String),

    /// Network known but disabled in configuration.
    #[error("Network not available: {0}")]
    NotAvailable(String),
}

/// Result type for blockchain operations.
pub type BlockchainResult<T> = Result<T, BlockchainError>;
