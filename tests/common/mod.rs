//! Shared utilities for integration tests.
//!
//! The server runs in-process on an ephemeral port with in-memory storage,
//! a scripted market provider and a scripted BSC chain. Ethereum and Solana
//! keep their real providers pointed at a closed port, so key handling and
//! validation are real while node calls fail fast.

#![allow(dead_code)]

use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;

use rimtoken_wallet::blockchain::{
    wallet, BlockchainError, BlockchainResult, ChainProvider, ChainRegistry, EvmWallet, Network,
    TxHistoryEntry, WalletKeys,
};
use rimtoken_wallet::config::WalletConfig;
use rimtoken_wallet::http::{AppState, HttpServer};
use rimtoken_wallet::lifecycle::{assemble_state, Shutdown};
use rimtoken_wallet::market::{
    ApiStatus, CoinInfo, Listing, MarketDataProvider, MarketError, MarketResult, PriceQuote,
};
use rimtoken_wallet::storage::seed::{seed_demo_data, DEMO_USERNAME};
use rimtoken_wallet::storage::{MemStorage, SharedStorage, Storage};

pub const UNREACHABLE_RPC: &str = "http://127.0.0.1:1";
pub const FAKE_TX_HASH: &str = "0x5e1f0c3b6a1d2e4f5e1f0c3b6a1d2e4f5e1f0c3b6a1d2e4f5e1f0c3b6a1d2e4f";

/// Quotes BTC and ETH only; fails every call while `failing` is set.
#[derive(Default)]
pub struct FakeMarket {
    pub failing: AtomicBool,
}

impl FakeMarket {
    fn check(&self) -> MarketResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(MarketError::RateLimited);
        }
        Ok(())
    }
}

fn quote(symbol: &str, name: &str, price: f64, change_24h: f64) -> PriceQuote {
    PriceQuote {
        symbol: symbol.to_string(),
        name: name.to_string(),
        price,
        change_24h,
        market_cap: Some(price * 1_000_000.0),
        volume_24h: Some(price * 1_000.0),
        last_updated: None,
    }
}

#[async_trait]
impl MarketDataProvider for FakeMarket {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn quotes(&self, symbols: &[String]) -> MarketResult<Vec<PriceQuote>> {
        self.check()?;
        let known = [quote("BTC", "Bitcoin", 70_000.0, 2.5), quote("ETH", "Ethereum", 3_000.0, -1.0)];
        Ok(known
            .into_iter()
            .filter(|q| symbols.iter().any(|s| s.eq_ignore_ascii_case(&q.symbol)))
            .collect())
    }

    async fn top_listings(&self, limit: u32) -> MarketResult<Vec<Listing>> {
        self.check()?;
        let listings = vec![Listing {
            id: "1".to_string(),
            name: "Bitcoin".to_string(),
            symbol: "BTC".to_string(),
            price: 70_000.0,
            change_24h: 2.5,
            change_7d: None,
            market_cap: None,
            volume_24h: None,
            rank: Some(1),
        }];
        Ok(listings.into_iter().take(limit as usize).collect())
    }

    async fn coin_info(&self, symbol: &str) -> MarketResult<CoinInfo> {
        self.check()?;
        if symbol != "BTC" {
            return Err(MarketError::NotFound(symbol.to_string()));
        }
        Ok(CoinInfo {
            id: "1".to_string(),
            name: "Bitcoin".to_string(),
            symbol: "BTC".to_string(),
            description: "Peer-to-peer electronic cash".to_string(),
            website: None,
            explorer: None,
            source_code: None,
            logo: None,
        })
    }

    async fn status(&self) -> MarketResult<ApiStatus> {
        self.check()?;
        Ok(ApiStatus {
            provider: "fake",
            status: "active",
            authenticated: true,
            plan: None,
            credits_used: None,
            credits_left: None,
            message: None,
        })
    }
}

/// BSC stand-in with a fixed balance; sends succeed for valid keys.
pub struct FakeChain;

#[async_trait]
impl ChainProvider for FakeChain {
    fn network(&self) -> Network {
        Network::Binance
    }

    fn create_wallet(&self) -> WalletKeys {
        EvmWallet::generate().keys()
    }

    fn import_wallet(&self, private_key: &str) -> BlockchainResult<WalletKeys> {
        Ok(EvmWallet::from_private_key(private_key)?.keys())
    }

    async fn get_balance(&self, address: &str) -> f64 {
        if wallet::validate_address(address) {
            1.25
        } else {
            0.0
        }
    }

    async fn send_transaction(&self, private_key: &str, to: &str, _amount: f64) -> BlockchainResult<String> {
        EvmWallet::from_private_key(private_key)?;
        if !wallet::validate_address(to) {
            return Err(BlockchainError::InvalidAddress(to.to_string()));
        }
        Ok(FAKE_TX_HASH.to_string())
    }

    fn validate_address(&self, address: &str) -> bool {
        wallet::validate_address(address)
    }

    async fn transaction_history(&self, _address: &str) -> Vec<TxHistoryEntry> {
        Vec::new()
    }
}

pub struct TestServer {
    pub addr: SocketAddr,
    pub client: reqwest::Client,
    pub state: AppState,
    pub market: Arc<FakeMarket>,
    pub shutdown: Shutdown,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn storage(&self) -> &SharedStorage {
        &self.state.storage
    }

    pub async fn demo_user_id(&self) -> i32 {
        self.storage()
            .get_user_by_username(DEMO_USERNAME)
            .await
            .unwrap()
            .expect("demo user seeded")
            .id
    }

    pub async fn asset_id(&self, symbol: &str) -> i32 {
        self.storage()
            .get_asset_by_symbol(symbol)
            .await
            .unwrap()
            .expect("asset seeded")
            .id
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Config whose chains point at a closed port and whose rate limit is out of the way.
pub fn test_config() -> WalletConfig {
    let mut config = WalletConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.observability.metrics_enabled = false;
    config.rate_limit.max_requests = 10_000;
    config.market.max_attempts = 1;
    config.market.fallback_on_error = false;
    for evm in [&mut config.chains.ethereum, &mut config.chains.binance] {
        evm.rpc_url = UNREACHABLE_RPC.to_string();
        evm.rpc_timeout_secs = 1;
    }
    config.chains.solana.rpc_url = UNREACHABLE_RPC.to_string();
    config.chains.solana.rpc_timeout_secs = 1;
    config.chains.solana.confirm_timeout_secs = 1;
    config
}

pub async fn spawn_server() -> TestServer {
    spawn_server_with(test_config()).await
}

pub async fn spawn_server_with(config: WalletConfig) -> TestServer {
    let storage: SharedStorage = Arc::new(MemStorage::new());
    seed_demo_data(storage.as_ref()).await.unwrap();

    let chains = ChainRegistry::from_config(&config.chains)
        .unwrap()
        .with_chain(Arc::new(FakeChain));
    let market = Arc::new(FakeMarket::default());

    let state = assemble_state(config, storage, chains, market.clone(), market.clone()).unwrap();
    let server = HttpServer::new(state.clone());
    let shutdown = Shutdown::new();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let stop = shutdown.wait();
    tokio::spawn(async move {
        let _ = server.run(listener, stop).await;
    });

    TestServer {
        addr,
        client: reqwest::Client::builder().no_proxy().build().unwrap(),
        state,
        market,
        shutdown,
    }
}
