//! Per-network wallet bindings.
//!
//! # Data Flow
//! ```text
//! ChainsConfig (RPC URLs, Infura key, timeouts)
//!     → ChainRegistry::from_config
//!         → EvmChain (client.rs + wallet.rs, alloy) for ethereum / binance / polygon
//!         → SolanaChain (solana.rs, ed25519 + JSON-RPC)
//!     → handlers look up a ChainProvider by Network
//! ```
//!
//! # Security Constraints
//! - Private keys are accepted per request and never stored or logged
//! - Balance lookups degrade to 0 when a node is unreachable
//! - Send failures surface as "Transaction failed"; details go to the log

pub mod client;
pub mod evm;
pub mod solana;
pub mod transaction;
pub mod types;
pub mod wallet;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::ChainsConfig;

pub use client::EvmClient;
pub use evm::EvmChain;
pub use solana::SolanaChain;
pub use types::{BlockchainError, BlockchainResult, Network, NetworkOption, TxHistoryEntry, WalletKeys};
pub use wallet::EvmWallet;

/// Wallet operations on one network.
#[async_trait]
pub trait ChainProvider: Send + Sync {
    fn network(&self) -> Network;

    fn create_wallet(&self) -> WalletKeys;

    /// Fails with `InvalidPrivateKey` on malformed input.
    fn import_wallet(&self, private_key: &str) -> BlockchainResult<WalletKeys>;

    /// Native-unit balance; 0 when the address is invalid or the node fails.
    async fn get_balance(&self, address: &str) -> f64;

    /// Transfer `amount` native units and return the transaction hash / signature.
    async fn send_transaction(&self, private_key: &str, to: &str, amount: f64) -> BlockchainResult<String>;

    fn validate_address(&self, address: &str) -> bool;

    async fn transaction_history(&self, address: &str) -> Vec<TxHistoryEntry>;

    async fn is_healthy(&self) -> bool {
        true
    }
}

pub type SharedChain = Arc<dyn ChainProvider>;

/// Enabled networks, keyed by [`Network`].
#[derive(Clone, Default)]
pub struct ChainRegistry {
    chains: HashMap<Network, SharedChain>,
}

impl ChainRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider, replacing any previous one for its network.
    pub fn with_chain(mut self, chain: SharedChain) -> Self {
        self.chains.insert(chain.network(), chain);
        self
    }

    /// Build providers for every enabled network.
    pub fn from_config(config: &ChainsConfig) -> BlockchainResult<Self> {
        let mut registry = Self::new();

        let evm = [
            (Network::Ethereum, &config.ethereum),
            (Network::Binance, &config.binance),
            (Network::Polygon, &config.polygon),
        ];
        for (network, chain_config) in evm {
            if !chain_config.enabled {
                tracing::debug!(network = %network, "Network disabled");
                continue;
            }
            let url = match network {
                Network::Ethereum => infura_url(&chain_config.rpc_url, config.infura_api_key.as_deref()),
                _ => chain_config.rpc_url.clone(),
            };
            let client = EvmClient::new(network, chain_config, &url)?;
            tracing::info!(network = %network, chain_id = client.chain_id(), "EVM network registered");
            registry = registry.with_chain(Arc::new(EvmChain::new(client)));
        }

        if config.solana.enabled {
            let chain = SolanaChain::new(&config.solana, &config.solana.rpc_url)?;
            tracing::info!(network = %Network::Solana, "Solana network registered");
            registry = registry.with_chain(Arc::new(chain));
        }

        Ok(registry)
    }

    pub fn get(&self, network: Network) -> BlockchainResult<SharedChain> {
        self.chains
            .get(&network)
            .cloned()
            .ok_or_else(|| BlockchainError::NotAvailable(network.to_string()))
    }

    /// Parse a path segment and look the network up.
    pub fn resolve(&self, network: &str) -> BlockchainResult<SharedChain> {
        self.get(network.parse()?)
    }

    /// Enabled networks in display order.
    pub fn networks(&self) -> Vec<Network> {
        Network::ALL
            .into_iter()
            .filter(|n| self.chains.contains_key(n))
            .collect()
    }

    pub fn network_options(&self) -> Vec<NetworkOption> {
        self.networks().into_iter().map(NetworkOption::from).collect()
    }

    /// Health of every enabled network, checked concurrently.
    pub async fn health(&self) -> Vec<(Network, bool)> {
        let checks = self.networks().into_iter().map(|network| {
            let chain = self.chains[&network].clone();
            async move { (network, chain.is_healthy().await) }
        });
        let mut handles = Vec::new();
        for check in checks {
            handles.push(tokio::spawn(check));
        }
        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            if let Ok(result) = handle.await {
                results.push(result);
            }
        }
        results
    }
}

/// Append the Infura project key to an Infura base URL (`.../v3/`).
///
/// Other URLs are returned unchanged.
pub fn infura_url(rpc_url: &str, api_key: Option<&str>) -> String {
    let is_infura_base = rpc_url.contains("infura.io") && rpc_url.trim_end_matches('/').ends_with("/v3");
    match (is_infura_base, api_key) {
        (true, Some(key)) => format!("{}/{}", rpc_url.trim_end_matches('/'), key),
        (true, None) => {
            tracing::warn!("Infura URL configured without INFURA_API_KEY; Ethereum RPC calls will fail");
            rpc_url.to_string()
        }
        _ => rpc_url.to_string(),
    }
}
