//! Ethereum, BSC and Polygon bindings.

use async_trait::async_trait;

use crate::blockchain::client::EvmClient;
use crate::blockchain::transaction::{from_wei, to_wei};
use crate::blockchain::types::{BlockchainError, BlockchainResult, Network, TxHistoryEntry, WalletKeys};
use crate::blockchain::wallet::{self, EvmWallet};
use crate::blockchain::ChainProvider;

pub struct EvmChain {
    client: EvmClient,
}

impl EvmChain {
    pub fn new(client: EvmClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ChainProvider for EvmChain {
    fn network(&self) -> Network {
        self.client.network()
    }

    fn create_wallet(&self) -> WalletKeys {
        EvmWallet::generate().keys()
    }

    fn import_wallet(&self, private_key: &str) -> BlockchainResult<WalletKeys> {
        Ok(EvmWallet::from_private_key(private_key)?.keys())
    }

    async fn get_balance(&self, address: &str) -> f64 {
        let parsed = match wallet::parse_address(address) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(network = %self.network(), error = %e, "Balance requested for invalid address");
                return 0.0;
            }
        };
        match self.client.get_balance(parsed).await {
            Ok(wei) => from_wei(wei),
            Err(e) => {
                tracing::error!(network = %self.network(), address = %address, error = %e, "Error getting balance");
                0.0
            }
        }
    }

    async fn send_transaction(&self, private_key: &str, to: &str, amount: f64) -> BlockchainResult<String> {
        let sender = EvmWallet::from_private_key(private_key)?;
        let to = wallet::parse_address(to)?;
        let value = to_wei(amount)?;

        let hash = self
            .client
            .send_transfer(sender.signer(), to, value)
            .await
            .map_err(|e| {
                tracing::error!(network = %self.network(), from = %sender.address(), error = %e, "Error sending transaction");
                BlockchainError::TransactionFailed
            })?;

        tracing::info!(network = %self.network(), from = %sender.address(), to = %to, tx_hash = %hash, "Transfer broadcast");
        Ok(hash.to_string())
    }

    fn validate_address(&self, address: &str) -> bool {
        wallet::validate_address(address)
    }

    async fn transaction_history(&self, _address: &str) -> Vec<TxHistoryEntry> {
        // No indexer is configured for EVM networks.
        Vec::new()
    }

    async fn is_healthy(&self) -> bool {
        match self.client.verify_chain_id().await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(network = %self.network(), error = %e, "Chain health check failed");
                false
            }
        }
    }
}
