//! Solana binding over JSON-RPC.
//!
//! # Data Flow
//! ```text
//! hex keypair (secret ‖ public, 64 bytes)
//!     → transfer_message (legacy message, one System Program transfer)
//!     → signed_transaction (compact-u16 signature array ‖ message)
//!     → sendTransaction (base64)
//!     → getSignatureStatuses until confirmed / finalized
//! ```

use async_trait::async_trait;
use base64::Engine;
use ed25519_dalek::{Signer, SigningKey};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::time::{interval, timeout};

use crate::blockchain::transaction::{from_lamports, to_lamports};
use crate::blockchain::types::{BlockchainError, BlockchainResult, Network, TxHistoryEntry, WalletKeys};
use crate::blockchain::ChainProvider;
use crate::config::SolanaChainConfig;
use crate::observability::metrics;

/// The System Program id, `11111111111111111111111111111111`.
pub const SYSTEM_PROGRAM_ID: [u8; 32] = [0; 32];

/// System Program instruction index for `Transfer`.
const TRANSFER_INSTRUCTION: u32 = 2;

/// Largest page `getSignaturesForAddress` accepts.
pub const MAX_HISTORY_LIMIT: usize = 1000;
const POLL_INTERVAL: Duration = Duration::from_millis(500);

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

pub fn generate_keypair() -> SigningKey {
    SigningKey::generate(&mut rand::rngs::OsRng)
}

/// Parse the hex encoding of a 64-byte keypair. The public half must match.
pub fn keypair_from_hex(private_key: &str) -> BlockchainResult<SigningKey> {
    let bytes = hex::decode(private_key.trim().trim_start_matches("0x")).map_err(|e| {
        tracing::debug!(error = %e, "Rejected Solana private key");
        BlockchainError::InvalidPrivateKey
    })?;
    let bytes: [u8; 64] = bytes.try_into().map_err(|_| BlockchainError::InvalidPrivateKey)?;
    SigningKey::from_keypair_bytes(&bytes).map_err(|e| {
        tracing::debug!(error = %e, "Rejected Solana keypair");
        BlockchainError::InvalidPrivateKey
    })
}

pub fn keys_for(keypair: &SigningKey) -> WalletKeys {
    WalletKeys {
        address: encode_address(keypair.verifying_key().as_bytes()),
        private_key: hex::encode(keypair.to_keypair_bytes()),
    }
}

pub fn encode_address(public_key: &[u8; 32]) -> String {
    bs58::encode(public_key).into_string()
}

/// Base58 that decodes to exactly 32 bytes.
pub fn decode_address(address: &str) -> BlockchainResult<[u8; 32]> {
    bs58::decode(address)
        .into_vec()
        .ok()
        .and_then(|bytes| <[u8; 32]>::try_from(bytes).ok())
        .ok_or_else(|| BlockchainError::InvalidAddress(address.to_string()))
}

pub fn validate_address(address: &str) -> bool {
    decode_address(address).is_ok()
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

/// Append `value` as a compact-u16 (7 bits per byte, high bit = continue).
pub fn encode_compact_u16(mut value: u16, out: &mut Vec<u8>) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

/// Legacy message carrying a single System Program transfer.
///
/// Accounts are `[from (signer, writable), to (writable), system program
/// (readonly)]`; a self-transfer lists `from` once.
pub fn transfer_message(from: &[u8; 32], to: &[u8; 32], lamports: u64, recent_blockhash: &[u8; 32]) -> Vec<u8> {
    let mut keys: Vec<&[u8; 32]> = vec![from];
    if to != from {
        keys.push(to);
    }
    keys.push(&SYSTEM_PROGRAM_ID);
    let program_index = (keys.len() - 1) as u8;
    let to_index = if to == from { 0u8 } else { 1u8 };

    let mut data = Vec::with_capacity(12);
    data.extend_from_slice(&TRANSFER_INSTRUCTION.to_le_bytes());
    data.extend_from_slice(&lamports.to_le_bytes());

    let mut message = Vec::with_capacity(3 + 1 + keys.len() * 32 + 32 + 1 + 1 + 1 + 2 + 1 + data.len());
    // header: required signatures, readonly signed, readonly unsigned
    message.extend_from_slice(&[1, 0, 1]);
    encode_compact_u16(keys.len() as u16, &mut message);
    for key in &keys {
        message.extend_from_slice(*key);
    }
    message.extend_from_slice(recent_blockhash);

    encode_compact_u16(1, &mut message);
    message.push(program_index);
    encode_compact_u16(2, &mut message);
    message.extend_from_slice(&[0, to_index]);
    encode_compact_u16(data.len() as u16, &mut message);
    message.extend_from_slice(&data);
    message
}

/// Signature array followed by the message. Returns the base58 signature too.
pub fn signed_transaction(keypair: &SigningKey, message: &[u8]) -> (Vec<u8>, String) {
    let signature = keypair.sign(message).to_bytes();
    let mut tx = Vec::with_capacity(1 + 64 + message.len());
    encode_compact_u16(1, &mut tx);
    tx.extend_from_slice(&signature);
    tx.extend_from_slice(message);
    (tx, bs58::encode(signature).into_string())
}

// ---------------------------------------------------------------------------
// RPC
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct RpcEnvelope<T> {
    result: Option<T>,
    error: Option<RpcErrorObject>,
}

#[derive(Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
struct WithContext<T> {
    value: T,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlockhashValue {
    blockhash: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignatureStatus {
    err: Option<Value>,
    confirmation_status: Option<String>,
}

/// Minimal JSON-RPC client for a Solana cluster.
#[derive(Debug, Clone)]
pub struct SolanaRpc {
    http: reqwest::Client,
    url: String,
}

impl SolanaRpc {
    pub fn new(url: &str, request_timeout: Duration) -> BlockchainResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| BlockchainError::Rpc(e.to_string()))?;
        Ok(Self {
            http,
            url: url.to_string(),
        })
    }

    async fn call<T: DeserializeOwned>(&self, method: &'static str, params: Value) -> BlockchainResult<T> {
        let result = self.call_inner(method, params).await;
        metrics::record_chain_rpc(Network::Solana.as_str(), method, result.is_ok());
        result
    }

    async fn call_inner<T: DeserializeOwned>(&self, method: &str, params: Value) -> BlockchainResult<T> {
        let body = json!({ "jsonrpc": "2.0", "id": 1, "method": method, "params": params });
        let response = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| BlockchainError::Rpc(format!("{}: {}", method, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BlockchainError::Rpc(format!("{}: HTTP {}", method, status)));
        }

        let envelope: RpcEnvelope<T> = response
            .json()
            .await
            .map_err(|e| BlockchainError::Rpc(format!("{}: invalid response: {}", method, e)))?;

        if let Some(error) = envelope.error {
            return Err(BlockchainError::Rpc(format!("{}: {} ({})", method, error.message, error.code)));
        }
        envelope
            .result
            .ok_or_else(|| BlockchainError::Rpc(format!("{}: empty result", method)))
    }

    pub async fn get_balance(&self, address: &str) -> BlockchainResult<u64> {
        let balance: WithContext<u64> = self
            .call("getBalance", json!([address, { "commitment": "confirmed" }]))
            .await?;
        Ok(balance.value)
    }

    pub async fn latest_blockhash(&self) -> BlockchainResult<[u8; 32]> {
        let latest: WithContext<BlockhashValue> = self
            .call("getLatestBlockhash", json!([{ "commitment": "finalized" }]))
            .await?;
        bs58::decode(&latest.value.blockhash)
            .into_vec()
            .ok()
            .and_then(|bytes| <[u8; 32]>::try_from(bytes).ok())
            .ok_or_else(|| BlockchainError::Rpc(format!("Malformed blockhash {}", latest.value.blockhash)))
    }

    pub async fn send_transaction(&self, wire: &[u8]) -> BlockchainResult<String> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(wire);
        self.call(
            "sendTransaction",
            json!([encoded, { "encoding": "base64", "preflightCommitment": "confirmed" }]),
        )
        .await
    }

    async fn signature_status(&self, signature: &str) -> BlockchainResult<Option<SignatureStatus>> {
        let statuses: WithContext<Vec<Option<SignatureStatus>>> = self
            .call("getSignatureStatuses", json!([[signature]]))
            .await?;
        Ok(statuses.value.into_iter().next().flatten())
    }

    /// Poll until the signature reaches `confirmed` or `finalized`.
    pub async fn wait_for_confirmation(&self, signature: &str, timeout_duration: Duration) -> BlockchainResult<()> {
        let result = timeout(timeout_duration, async {
            let mut ticker = interval(POLL_INTERVAL);
            loop {
                ticker.tick().await;

                let Some(status) = self.signature_status(signature).await? else {
                    tracing::debug!(signature = %signature, "Transaction pending");
                    continue;
                };
                if let Some(err) = status.err {
                    return Err(BlockchainError::Rpc(format!("Transaction {} failed: {}", signature, err)));
                }
                match status.confirmation_status.as_deref() {
                    Some("confirmed") | Some("finalized") => return Ok(()),
                    other => tracing::debug!(signature = %signature, status = ?other, "Waiting for confirmation"),
                }
            }
        })
        .await;

        match result {
            Ok(outcome) => outcome,
            Err(_) => Err(BlockchainError::ConfirmationTimeout(timeout_duration.as_secs())),
        }
    }

    pub async fn signatures_for_address(&self, address: &str, limit: usize) -> BlockchainResult<Vec<TxHistoryEntry>> {
        self.call("getSignaturesForAddress", json!([address, { "limit": limit }]))
            .await
    }

    pub async fn health(&self) -> BlockchainResult<()> {
        let status: String = self.call("getHealth", json!([])).await?;
        if status == "ok" {
            Ok(())
        } else {
            Err(BlockchainError::Rpc(format!("Node reports {}", status)))
        }
    }
}

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

pub struct SolanaChain {
    rpc: SolanaRpc,
    confirm_timeout: Duration,
    history_limit: usize,
}

impl SolanaChain {
    pub fn new(config: &SolanaChainConfig, rpc_url: &str) -> BlockchainResult<Self> {
        Ok(Self {
            rpc: SolanaRpc::new(rpc_url, Duration::from_secs(config.rpc_timeout_secs.max(1)))?,
            confirm_timeout: Duration::from_secs(config.confirm_timeout_secs.max(1)),
            history_limit: config.history_limit.clamp(1, MAX_HISTORY_LIMIT),
        })
    }

    async fn transfer(&self, keypair: &SigningKey, to: &[u8; 32], lamports: u64) -> BlockchainResult<String> {
        let blockhash = self.rpc.latest_blockhash().await?;
        let message = transfer_message(keypair.verifying_key().as_bytes(), to, lamports, &blockhash);
        let (wire, signature) = signed_transaction(keypair, &message);

        let accepted = self.rpc.send_transaction(&wire).await?;
        if accepted != signature {
            tracing::warn!(expected = %signature, returned = %accepted, "Node returned an unexpected signature");
        }
        self.rpc.wait_for_confirmation(&signature, self.confirm_timeout).await?;
        Ok(signature)
    }
}

#[async_trait]
impl ChainProvider for SolanaChain {
    fn network(&self) -> Network {
        Network::Solana
    }

    fn create_wallet(&self) -> WalletKeys {
        keys_for(&generate_keypair())
    }

    fn import_wallet(&self, private_key: &str) -> BlockchainResult<WalletKeys> {
        Ok(keys_for(&keypair_from_hex(private_key)?))
    }

    async fn get_balance(&self, address: &str) -> f64 {
        if !validate_address(address) {
            tracing::warn!(network = "solana", "Balance requested for invalid address");
            return 0.0;
        }
        match self.rpc.get_balance(address).await {
            Ok(lamports) => from_lamports(lamports),
            Err(e) => {
                tracing::error!(network = "solana", address = %address, error = %e, "Error getting balance");
                0.0
            }
        }
    }

    async fn send_transaction(&self, private_key: &str, to: &str, amount: f64) -> BlockchainResult<String> {
        let keypair = keypair_from_hex(private_key)?;
        let to_key = decode_address(to)?;
        let lamports = to_lamports(amount)?;
        let from = encode_address(keypair.verifying_key().as_bytes());

        match self.transfer(&keypair, &to_key, lamports).await {
            Ok(signature) => {
                tracing::info!(network = "solana", from = %from, to = %to, lamports, signature = %signature, "Transfer confirmed");
                Ok(signature)
            }
            Err(e) => {
                tracing::error!(network = "solana", from = %from, error = %e, "Error sending transaction");
                Err(BlockchainError::TransactionFailed)
            }
        }
    }

    fn validate_address(&self, address: &str) -> bool {
        validate_address(address)
    }

    async fn transaction_history(&self, address: &str) -> Vec<TxHistoryEntry> {
        if !validate_address(address) {
            return Vec::new();
        }
        match self.rpc.signatures_for_address(address, self.history_limit).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::error!(network = "solana", address = %address, error = %e, "Error getting transaction history");
                Vec::new()
            }
        }
    }

    async fn is_healthy(&self) -> bool {
        self.rpc.health().await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::post, Json, Router};
    use ed25519_dalek::{Signature, Verifier};
    use std::sync::{Arc, Mutex};

    fn fixed_keypair() -> SigningKey {
        SigningKey::from_bytes(&[7u8; 32])
    }

    #[test]
    fn test_compact_u16() {
        let cases: &[(u16, &[u8])] = &[
            (0, &[0x00]),
            (0x7f, &[0x7f]),
            (0x80, &[0x80, 0x01]),
            (0x3fff, &[0xff, 0x7f]),
            (0x4000, &[0x80, 0x80, 0x01]),
            (0xffff, &[0xff, 0xff, 0x03]),
        ];
        for (value, expected) in cases {
            let mut out = Vec::new();
            encode_compact_u16(*value, &mut out);
            assert_eq!(&out[..], *expected, "value {:#x}", value);
        }
    }

    #[test]
    fn test_transfer_message_layout() {
        let from = [1u8; 32];
        let to = [2u8; 32];
        let blockhash = [9u8; 32];
        let lamports: u64 = 1_500_000_000;

        let mut expected = vec![1, 0, 1, 3];
        expected.extend_from_slice(&from);
        expected.extend_from_slice(&to);
        expected.extend_from_slice(&[0u8; 32]);
        expected.extend_from_slice(&blockhash);
        expected.extend_from_slice(&[1, 2, 2, 0, 1, 12]);
        expected.extend_from_slice(&[2, 0, 0, 0]);
        expected.extend_from_slice(&[0x00, 0x2f, 0x68, 0x59, 0x00, 0x00, 0x00, 0x00]);

        let message = transfer_message(&from, &to, lamports, &blockhash);
        assert_eq!(message, expected);
        assert_eq!(message.len(), 3 + 1 + 96 + 32 + 6 + 12);
    }

    #[test]
    fn test_self_transfer_lists_sender_once() {
        let from = [5u8; 32];
        let message = transfer_message(&from, &from, 1, &[0u8; 32]);
        assert_eq!(message[3], 2);
        // program index, account count, accounts
        let ix = 4 + 64 + 32 + 1;
        assert_eq!(&message[ix..ix + 4], &[1, 2, 0, 0]);
    }

    #[test]
    fn test_signed_transaction_verifies() {
        let keypair = fixed_keypair();
        let message = transfer_message(keypair.verifying_key().as_bytes(), &[3u8; 32], 42, &[4u8; 32]);
        let (wire, signature_b58) = signed_transaction(&keypair, &message);

        assert_eq!(wire[0], 1);
        assert_eq!(&wire[65..], &message[..]);
        let signature = Signature::from_bytes(&wire[1..65].try_into().unwrap());
        assert!(keypair.verifying_key().verify(&message, &signature).is_ok());
        assert_eq!(bs58::decode(signature_b58).into_vec().unwrap(), wire[1..65].to_vec());
    }

    #[test]
    fn test_keys_round_trip() {
        let keys = keys_for(&fixed_keypair());
        assert_eq!(keys.private_key.len(), 128);
        let imported = keys_for(&keypair_from_hex(&keys.private_key).unwrap());
        assert_eq!(imported, keys);
        assert!(validate_address(&keys.address));
    }

    #[test]
    fn test_invalid_private_keys() {
        assert!(matches!(keypair_from_hex("zz"), Err(BlockchainError::InvalidPrivateKey)));
        assert!(matches!(keypair_from_hex(&"ab".repeat(32)), Err(BlockchainError::InvalidPrivateKey)));

        // public half that does not belong to the secret half
        let mut bytes = fixed_keypair().to_keypair_bytes();
        bytes[63] ^= 0xff;
        assert!(keypair_from_hex(&hex::encode(bytes)).is_err());
    }

    #[test]
    fn test_validate_address() {
        assert!(validate_address("11111111111111111111111111111111"));
        assert!(validate_address("So11111111111111111111111111111111111111112"));
        assert!(!validate_address("0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"));
        assert!(!validate_address("abc"));
        assert!(!validate_address(""));
    }

    /// JSON-RPC mock answering the calls a transfer makes.
    async fn spawn_rpc(calls: Arc<Mutex<Vec<String>>>) -> String {
        let blockhash = bs58::encode([8u8; 32]).into_string();
        let app = Router::new().route(
            "/",
            post(move |Json(body): Json<Value>| {
                let calls = calls.clone();
                let blockhash = blockhash.clone();
                async move {
                    let method = body["method"].as_str().unwrap_or_default().to_string();
                    calls.lock().unwrap().push(method.clone());
                    let result = match method.as_str() {
                        "getBalance" => json!({ "context": { "slot": 1 }, "value": 2_500_000_000u64 }),
                        "getLatestBlockhash" => json!({
                            "context": { "slot": 1 },
                            "value": { "blockhash": blockhash, "lastValidBlockHeight": 100 }
                        }),
                        "sendTransaction" => {
                            let wire = base64::engine::general_purpose::STANDARD
                                .decode(body["params"][0].as_str().unwrap())
                                .unwrap();
                            json!(bs58::encode(&wire[1..65]).into_string())
                        }
                        "getSignatureStatuses" => json!({
                            "context": { "slot": 2 },
                            "value": [{ "slot": 2, "confirmations": 0, "err": null, "confirmationStatus": "confirmed" }]
                        }),
                        "getSignaturesForAddress" => {
                            let limit = body["params"][1]["limit"].as_u64().unwrap_or(1000) as usize;
                            let entries: Vec<Value> = ["5xyz", "4abc", "3def"]
                                .iter()
                                .enumerate()
                                .take(limit)
                                .map(|(i, signature)| {
                                    json!({
                                        "signature": signature, "slot": 10 - i, "err": null,
                                        "memo": null, "blockTime": 1_700_000_000 - i as i64
                                    })
                                })
                                .collect();
                            json!(entries)
                        }
                        "getHealth" => json!("ok"),
                        _ => {
                            return Json(json!({
                                "jsonrpc": "2.0", "id": 1,
                                "error": { "code": -32601, "message": "Method not found" }
                            }))
                        }
                    };
                    Json(json!({ "jsonrpc": "2.0", "id": 1, "result": result }))
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn chain(url: &str) -> SolanaChain {
        chain_with_history(url, MAX_HISTORY_LIMIT)
    }

    fn chain_with_history(url: &str, history_limit: usize) -> SolanaChain {
        let config = SolanaChainConfig {
            enabled: true,
            rpc_url: url.to_string(),
            rpc_timeout_secs: 2,
            confirm_timeout_secs: 5,
            history_limit,
        };
        SolanaChain::new(&config, url).unwrap()
    }

    #[tokio::test]
    async fn test_send_and_confirm() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let url = spawn_rpc(calls.clone()).await;
        let chain = chain(&url);

        let sender = chain.create_wallet();
        let recipient = chain.create_wallet();
        let signature = chain
            .send_transaction(&sender.private_key, &recipient.address, 0.25)
            .await
            .unwrap();

        assert_eq!(bs58::decode(&signature).into_vec().unwrap().len(), 64);
        let calls = calls.lock().unwrap().clone();
        assert_eq!(calls, vec!["getLatestBlockhash", "sendTransaction", "getSignatureStatuses"]);
    }

    #[tokio::test]
    async fn test_balance_history_and_health() {
        let url = spawn_rpc(Arc::new(Mutex::new(Vec::new()))).await;
        let chain = chain(&url);
        let address = chain.create_wallet().address;

        assert_eq!(chain.get_balance(&address).await, 2.5);
        let history = chain.transaction_history(&address).await;
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].signature, "5xyz");
        assert_eq!(history[0].block_time, Some(1_700_000_000));
        assert!(chain.is_healthy().await);
    }

    #[tokio::test]
    async fn test_history_limit_is_sent() {
        let url = spawn_rpc(Arc::new(Mutex::new(Vec::new()))).await;
        let address = chain(&url).create_wallet().address;

        let history = chain_with_history(&url, 2).transaction_history(&address).await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].signature, "4abc");

        // zero is clamped to one
        assert_eq!(chain_with_history(&url, 0).transaction_history(&address).await.len(), 1);
    }

    #[tokio::test]
    async fn test_unreachable_node() {
        let chain = chain("http://127.0.0.1:1");
        let keys = chain.create_wallet();

        assert_eq!(chain.get_balance(&keys.address).await, 0.0);
        assert!(chain.transaction_history(&keys.address).await.is_empty());
        let err = chain.send_transaction(&keys.private_key, &keys.address, 1.0).await;
        assert!(matches!(err, Err(BlockchainError::TransactionFailed)));
        let err = chain.send_transaction("bad", &keys.address, 1.0).await;
        assert!(matches!(err, Err(BlockchainError::InvalidPrivateKey)));
    }
}
