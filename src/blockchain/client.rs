//! EVM JSON-RPC client with timeouts and failover endpoints.
//!
//! # Responsibilities
//! - Query native balances and the chain id
//! - Sign and broadcast value transfers
//! - Try the next endpoint when one errors or times out

use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, TxHash, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use url::Url;

use crate::blockchain::types::{BlockchainError, BlockchainResult, Network};
use crate::config::EvmChainConfig;
use crate::observability::metrics;

/// RPC client for one EVM network.
#[derive(Clone)]
pub struct EvmClient {
    network: Network,
    chain_id: u64,
    /// Primary endpoint first, then failovers.
    urls: Vec<Url>,
    providers: Vec<Arc<dyn Provider + Send + Sync>>,
    timeout_duration: Duration,
}

impl EvmClient {
    /// Build a client. No request is made until the first call.
    ///
    /// Invalid failover URLs are skipped; an invalid primary URL is an error.
    pub fn new(network: Network, config: &EvmChainConfig, rpc_url: &str) -> BlockchainResult<Self> {
        let primary: Url = rpc_url
            .parse()
            .map_err(|e| BlockchainError::Rpc(format!("Invalid RPC URL '{}': {}", rpc_url, e)))?;

        let mut urls = vec![primary];
        for url_str in &config.failover_urls {
            match url_str.parse() {
                Ok(url) => urls.push(url),
                Err(_) => tracing::warn!(network = %network, url = %url_str, "Ignoring invalid failover RPC URL"),
            }
        }

        let providers = urls
            .iter()
            .map(|url| Arc::new(ProviderBuilder::new().connect_http(url.clone())) as Arc<dyn Provider + Send + Sync>)
            .collect();

        Ok(Self {
            network,
            chain_id: config.chain_id,
            urls,
            providers,
            timeout_duration: Duration::from_secs(config.rpc_timeout_secs.max(1)),
        })
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Verify the endpoint serves the configured chain.
    pub async fn verify_chain_id(&self) -> BlockchainResult<()> {
        let actual = self.get_chain_id().await?;
        if actual != self.chain_id {
            return Err(BlockchainError::ChainMismatch {
                expected: self.chain_id,
                actual,
            });
        }
        Ok(())
    }

    pub async fn get_chain_id(&self) -> BlockchainResult<u64> {
        for (i, provider) in self.providers.iter().enumerate() {
            match timeout(self.timeout_duration, provider.get_chain_id()).await {
                Ok(Ok(result)) => {
                    metrics::record_chain_rpc(self.network.as_str(), "eth_chainId", true);
                    return Ok(result);
                }
                Ok(Err(e)) => tracing::warn!(network = %self.network, provider_idx = i, error = %e, "RPC error, trying next provider"),
                Err(_) => tracing::warn!(network = %self.network, provider_idx = i, "RPC timeout, trying next provider"),
            }
        }
        metrics::record_chain_rpc(self.network.as_str(), "eth_chainId", false);
        Err(BlockchainError::Rpc("All RPC providers failed".to_string()))
    }

    /// Balance in wei.
    pub async fn get_balance(&self, address: Address) -> BlockchainResult<U256> {
        for (i, provider) in self.providers.iter().enumerate() {
            match timeout(self.timeout_duration, provider.get_balance(address)).await {
                Ok(Ok(result)) => {
                    metrics::record_chain_rpc(self.network.as_str(), "eth_getBalance", true);
                    return Ok(result);
                }
                Ok(Err(e)) => tracing::warn!(network = %self.network, provider_idx = i, error = %e, "RPC error"),
                Err(_) => tracing::warn!(network = %self.network, provider_idx = i, "RPC timeout"),
            }
        }
        metrics::record_chain_rpc(self.network.as_str(), "eth_getBalance", false);
        Err(BlockchainError::Rpc("All providers failed to get balance".to_string()))
    }

    /// Sign and broadcast a transfer, returning the hash without waiting for inclusion.
    ///
    /// Nonce and fees are filled by the provider from the endpoint that accepts
    /// the transaction.
    pub async fn send_transfer(
        &self,
        signer: &PrivateKeySigner,
        to: Address,
        value: U256,
    ) -> BlockchainResult<TxHash> {
        let request = TransactionRequest::default()
            .with_to(to)
            .with_value(value)
            .with_chain_id(self.chain_id);

        for (i, url) in self.urls.iter().enumerate() {
            let provider = ProviderBuilder::new()
                .wallet(EthereumWallet::from(signer.clone()))
                .connect_http(url.clone());

            match timeout(self.timeout_duration, provider.send_transaction(request.clone())).await {
                Ok(Ok(pending)) => {
                    metrics::record_chain_rpc(self.network.as_str(), "eth_sendRawTransaction", true);
                    return Ok(*pending.tx_hash());
                }
                Ok(Err(e)) => tracing::warn!(network = %self.network, provider_idx = i, error = %e, "Transfer rejected"),
                Err(_) => tracing::warn!(network = %self.network, provider_idx = i, "Transfer timed out"),
            }
        }
        metrics::record_chain_rpc(self.network.as_str(), "eth_sendRawTransaction", false);
        Err(BlockchainError::Rpc("All providers failed to send transaction".to_string()))
    }
}

impl std::fmt::Debug for EvmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // URLs may embed API keys
        f.debug_struct("EvmClient")
            .field("network", &self.network)
            .field("chain_id", &self.chain_id)
            .field("endpoints", &self.urls.len())
            .field("timeout", &self.timeout_duration)
            .finish()
    }
}
