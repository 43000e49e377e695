//! In-process storage backend.
//!
//! All tables live behind one `RwLock`, so every trait call (including the
//! multi-wallet ledger update) is atomic with respect to the others.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use crate::storage::*;

#[derive(Default)]
struct Tables {
    users: BTreeMap<i32, User>,
    assets: BTreeMap<i32, Asset>,
    wallets: BTreeMap<i32, Wallet>,
    transactions: BTreeMap<i32, Transaction>,
    market_data: BTreeMap<i32, MarketData>,
    history: BTreeMap<i32, PortfolioHistory>,
    addresses: BTreeMap<i32, WalletAddress>,
    defi: BTreeMap<i32, DefiPosition>,
    achievements: BTreeMap<(i32, String), UserAchievement>,
    next_id: i32,
}

impl Tables {
    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }

    fn wallet_id(&self, user_id: i32, asset_id: i32) -> Option<i32> {
        self.wallets
            .values()
            .find(|w| w.user_id == user_id && w.asset_id == asset_id)
            .map(|w| w.id)
    }
}

/// Storage backed by process memory. Contents are lost on restart.
#[derive(Default)]
pub struct MemStorage {
    tables: RwLock<Tables>,
}

impl MemStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemStorage {
    async fn ping(&self) -> StorageResult<()> {
        Ok(())
    }

    async fn get_user(&self, id: i32) -> StorageResult<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn get_user_by_username(&self, username: &str) -> StorageResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.username == username).cloned())
    }

    async fn create_user(&self, user: NewUser) -> StorageResult<User> {
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|u| u.username == user.username) {
            return Err(StorageError::Conflict("Username already exists".to_string()));
        }
        let id = tables.next_id();
        let user = User {
            id,
            username: user.username,
            password: user.password_hash,
            email: user.email,
            created_at: Utc::now(),
        };
        tables.users.insert(id, user.clone());
        Ok(user)
    }

    async fn list_user_ids(&self) -> StorageResult<Vec<i32>> {
        Ok(self.tables.read().await.users.keys().copied().collect())
    }

    async fn list_assets(&self) -> StorageResult<Vec<Asset>> {
        Ok(self.tables.read().await.assets.values().cloned().collect())
    }

    async fn get_asset(&self, id: i32) -> StorageResult<Option<Asset>> {
        Ok(self.tables.read().await.assets.get(&id).cloned())
    }

    async fn get_asset_by_symbol(&self, symbol: &str) -> StorageResult<Option<Asset>> {
        let tables = self.tables.read().await;
        Ok(tables
            .assets
            .values()
            .find(|a| a.symbol.eq_ignore_ascii_case(symbol))
            .cloned())
    }

    async fn create_asset(&self, asset: NewAsset) -> StorageResult<Asset> {
        let mut tables = self.tables.write().await;
        if tables.assets.values().any(|a| a.symbol.eq_ignore_ascii_case(&asset.symbol)) {
            return Err(StorageError::Conflict(format!("Asset {} already exists", asset.symbol)));
        }
        let id = tables.next_id();
        let asset = Asset {
            id,
            symbol: asset.symbol,
            name: asset.name,
            icon: asset.icon,
            current_price: asset.current_price,
            price_change_percentage_24h: asset.price_change_percentage_24h,
        };
        tables.assets.insert(id, asset.clone());
        Ok(asset)
    }

    async fn update_asset_price(&self, id: i32, price: f64, change_24h: f64) -> StorageResult<Asset> {
        let mut tables = self.tables.write().await;
        let asset = tables
            .assets
            .get_mut(&id)
            .ok_or_else(|| StorageError::NotFound(format!("Asset {}", id)))?;
        asset.current_price = Some(price);
        asset.price_change_percentage_24h = Some(change_24h);
        Ok(asset.clone())
    }

    async fn wallets_for_user(&self, user_id: i32) -> StorageResult<Vec<Wallet>> {
        let tables = self.tables.read().await;
        Ok(tables.wallets.values().filter(|w| w.user_id == user_id).cloned().collect())
    }

    async fn wallet_for(&self, user_id: i32, asset_id: i32) -> StorageResult<Option<Wallet>> {
        let tables = self.tables.read().await;
        Ok(tables
            .wallet_id(user_id, asset_id)
            .and_then(|id| tables.wallets.get(&id))
            .cloned())
    }

    async fn create_wallet(&self, user_id: i32, asset_id: i32, balance: f64) -> StorageResult<Wallet> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&user_id) {
            return Err(StorageError::NotFound("User".to_string()));
        }
        if !tables.assets.contains_key(&asset_id) {
            return Err(StorageError::NotFound("Asset".to_string()));
        }
        if tables.wallet_id(user_id, asset_id).is_some() {
            return Err(StorageError::Conflict("Wallet already exists".to_string()));
        }
        let id = tables.next_id();
        let wallet = Wallet {
            id,
            user_id,
            asset_id,
            balance,
            last_updated: Utc::now(),
        };
        tables.wallets.insert(id, wallet.clone());
        Ok(wallet)
    }

    async fn transactions_for_user(
        &self,
        user_id: i32,
        limit: Option<usize>,
    ) -> StorageResult<Vec<Transaction>> {
        let tables = self.tables.read().await;
        let mut txs: Vec<Transaction> = tables
            .transactions
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        txs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        if let Some(limit) = limit {
            txs.truncate(limit);
        }
        Ok(txs)
    }

    async fn apply_transaction(
        &self,
        tx: NewTransaction,
        changes: &[BalanceChange],
    ) -> StorageResult<Transaction> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&tx.user_id) {
            return Err(StorageError::NotFound("User".to_string()));
        }
        if !tables.assets.contains_key(&tx.asset_id) {
            return Err(StorageError::NotFound("Asset".to_string()));
        }

        // Check every change before touching any row.
        let mut planned = Vec::with_capacity(changes.len());
        for change in changes {
            if !tables.assets.contains_key(&change.asset_id) {
                return Err(StorageError::NotFound("Asset".to_string()));
            }
            let wallet_id = tables.wallet_id(tx.user_id, change.asset_id);
            let available = wallet_id
                .and_then(|id| tables.wallets.get(&id))
                .map(|w| w.balance)
                .unwrap_or(0.0);
            let next = available + change.delta;
            if next < -BALANCE_EPSILON || (wallet_id.is_none() && change.delta < 0.0) {
                return Err(StorageError::InsufficientBalance {
                    available,
                    required: -change.delta,
                });
            }
            planned.push((wallet_id, change.asset_id, next.max(0.0)));
        }

        let now = Utc::now();
        for (wallet_id, asset_id, balance) in planned {
            match wallet_id {
                Some(id) => {
                    if let Some(wallet) = tables.wallets.get_mut(&id) {
                        wallet.balance = balance;
                        wallet.last_updated = now;
                    }
                }
                None => {
                    let id = tables.next_id();
                    tables.wallets.insert(
                        id,
                        Wallet {
                            id,
                            user_id: tx.user_id,
                            asset_id,
                            balance,
                            last_updated: now,
                        },
                    );
                }
            }
        }

        let id = tables.next_id();
        let record = Transaction {
            id,
            user_id: tx.user_id,
            asset_id: tx.asset_id,
            kind: tx.kind,
            amount: tx.amount,
            to_address: tx.to_address,
            from_address: tx.from_address,
            fee: tx.fee,
            status: tx.status,
            created_at: tx.created_at.unwrap_or(now),
        };
        tables.transactions.insert(id, record.clone());
        Ok(record)
    }

    async fn insert_market_data(&self, data: NewMarketData) -> StorageResult<MarketData> {
        let mut tables = self.tables.write().await;
        let id = tables.next_id();
        let record = MarketData {
            id,
            asset_id: data.asset_id,
            price: data.price,
            volume_24h: data.volume_24h,
            market_cap: data.market_cap,
            price_change_percentage_24h: data.price_change_percentage_24h,
            last_updated: Utc::now(),
        };
        tables.market_data.insert(id, record.clone());
        Ok(record)
    }

    async fn recent_prices(&self, asset_id: i32, limit: usize) -> StorageResult<Vec<f64>> {
        let tables = self.tables.read().await;
        let mut prices: Vec<f64> = tables
            .market_data
            .values()
            .rev()
            .filter(|m| m.asset_id == asset_id)
            .take(limit)
            .map(|m| m.price)
            .collect();
        prices.reverse();
        Ok(prices)
    }

    async fn portfolio_history(
        &self,
        user_id: i32,
        since: DateTime<Utc>,
    ) -> StorageResult<Vec<PortfolioHistory>> {
        let tables = self.tables.read().await;
        let mut entries: Vec<PortfolioHistory> = tables
            .history
            .values()
            .filter(|h| h.user_id == user_id && h.timestamp >= since)
            .cloned()
            .collect();
        entries.sort_by_key(|h| h.timestamp);
        Ok(entries)
    }

    async fn first_portfolio_value(&self, user_id: i32) -> StorageResult<Option<f64>> {
        let tables = self.tables.read().await;
        Ok(tables
            .history
            .values()
            .filter(|h| h.user_id == user_id)
            .min_by_key(|h| h.timestamp)
            .map(|h| h.total_value))
    }

    async fn add_portfolio_snapshot(
        &self,
        user_id: i32,
        total_value: f64,
        at: Option<DateTime<Utc>>,
    ) -> StorageResult<PortfolioHistory> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&user_id) {
            return Err(StorageError::NotFound("User".to_string()));
        }
        let id = tables.next_id();
        let entry = PortfolioHistory {
            id,
            user_id,
            total_value,
            timestamp: at.unwrap_or_else(Utc::now),
        };
        tables.history.insert(id, entry.clone());
        Ok(entry)
    }

    async fn wallet_addresses(&self, user_id: i32) -> StorageResult<Vec<WalletAddress>> {
        let tables = self.tables.read().await;
        Ok(tables.addresses.values().filter(|a| a.user_id == user_id).cloned().collect())
    }

    async fn add_wallet_address(&self, address: NewWalletAddress) -> StorageResult<WalletAddress> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&address.user_id) {
            return Err(StorageError::NotFound("User".to_string()));
        }
        let id = tables.next_id();
        let record = WalletAddress {
            id,
            user_id: address.user_id,
            address: address.address,
            network: address.network,
            is_active: address.is_active,
            created_at: Utc::now(),
        };
        tables.addresses.insert(id, record.clone());
        Ok(record)
    }

    async fn defi_positions(&self, user_id: i32) -> StorageResult<Vec<DefiPosition>> {
        let tables = self.tables.read().await;
        Ok(tables.defi.values().filter(|d| d.user_id == user_id).cloned().collect())
    }

    async fn create_defi_position(&self, position: NewDefiPosition) -> StorageResult<DefiPosition> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&position.user_id) {
            return Err(StorageError::NotFound("User".to_string()));
        }
        if !tables.assets.contains_key(&position.asset_id) {
            return Err(StorageError::NotFound("Asset".to_string()));
        }
        let id = tables.next_id();
        let record = DefiPosition {
            id,
            user_id: position.user_id,
            protocol: position.protocol,
            kind: position.kind,
            amount: position.amount,
            asset_id: position.asset_id,
            apy: position.apy,
            start_date: Utc::now(),
            end_date: None,
            status: DefiPositionStatus::Active,
        };
        tables.defi.insert(id, record.clone());
        Ok(record)
    }

    async fn set_defi_status(&self, id: i32, status: DefiPositionStatus) -> StorageResult<DefiPosition> {
        let mut tables = self.tables.write().await;
        let position = tables
            .defi
            .get_mut(&id)
            .ok_or_else(|| StorageError::NotFound("Position".to_string()))?;
        position.status = status;
        position.end_date = match status {
            DefiPositionStatus::Active => None,
            _ => Some(Utc::now()),
        };
        Ok(position.clone())
    }

    async fn user_achievements(&self, user_id: i32) -> StorageResult<Vec<UserAchievement>> {
        let tables = self.tables.read().await;
        Ok(tables
            .achievements
            .values()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn upsert_user_achievement(&self, record: UserAchievement) -> StorageResult<UserAchievement> {
        let mut tables = self.tables.write().await;
        let key = (record.user_id, record.achievement_id.clone());
        let stored = tables.achievements.entry(key).or_insert_with(|| record.clone());
        stored.progress = record.progress;
        if stored.unlocked_at.is_none() {
            stored.unlocked_at = record.unlocked_at;
        }
        Ok(stored.clone())
    }
}
