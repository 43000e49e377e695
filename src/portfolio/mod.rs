//! Portfolio valuation.
//!
//! Pure math over wallets, assets and transactions, plus thin async wrappers
//! that load the inputs from storage.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;

use crate::storage::{Asset, PortfolioHistory, Storage, StorageResult, Transaction, Wallet};

pub const DEFAULT_HISTORY_DAYS: i64 = 30;

/// A wallet joined with its asset.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletAsset {
    pub id: i32,
    pub symbol: String,
    pub name: String,
    pub icon: String,
    pub balance: f64,
    pub price: f64,
    pub value: f64,
    pub price_change_percentage_24h: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioSummary {
    pub total_value: f64,
    pub change_24h: f64,
    pub change_percentage_24h: f64,
    pub asset_count: usize,
    pub volume_24h: f64,
    pub total_profit: f64,
    pub transaction_count: usize,
}

/// Join wallets with their assets. Wallets whose asset is gone are skipped.
pub fn wallet_assets(wallets: &[Wallet], assets: &[Asset]) -> Vec<WalletAsset> {
    let by_id: HashMap<i32, &Asset> = assets.iter().map(|a| (a.id, a)).collect();
    wallets
        .iter()
        .filter_map(|wallet| {
            let asset = by_id.get(&wallet.asset_id)?;
            let price = asset.current_price.unwrap_or(0.0);
            Some(WalletAsset {
                id: wallet.id,
                symbol: asset.symbol.clone(),
                name: asset.name.clone(),
                icon: asset.icon.clone().unwrap_or_default(),
                balance: wallet.balance,
                price,
                value: wallet.balance * price,
                price_change_percentage_24h: asset.price_change_percentage_24h.unwrap_or(0.0),
            })
        })
        .collect()
}

/// Summarize holdings and recent activity as of `now`.
pub fn summarize(
    holdings: &[WalletAsset],
    transactions: &[Transaction],
    assets: &[Asset],
    first_history_value: Option<f64>,
    now: DateTime<Utc>,
) -> PortfolioSummary {
    let total_value: f64 = holdings.iter().map(|h| h.value).sum();
    let change_24h: f64 = holdings
        .iter()
        .map(|h| h.value * h.price_change_percentage_24h / 100.0)
        .sum();
    let change_percentage_24h = if total_value > 0.0 {
        change_24h / total_value * 100.0
    } else {
        0.0
    };

    let prices: HashMap<i32, f64> = assets
        .iter()
        .map(|a| (a.id, a.current_price.unwrap_or(0.0)))
        .collect();
    let day_ago = now - Duration::hours(24);
    let volume_24h: f64 = transactions
        .iter()
        .filter(|t| t.created_at >= day_ago)
        .map(|t| t.amount * prices.get(&t.asset_id).copied().unwrap_or(0.0))
        .sum();

    let total_profit = first_history_value.map_or(0.0, |first| total_value - first);

    PortfolioSummary {
        total_value,
        change_24h,
        change_percentage_24h,
        asset_count: holdings.len(),
        volume_24h,
        total_profit,
        transaction_count: transactions.len(),
    }
}

/// Load a user's wallets with their assets.
pub async fn load_wallet_assets(storage: &dyn Storage, user_id: i32) -> StorageResult<Vec<WalletAsset>> {
    let wallets = storage.wallets_for_user(user_id).await?;
    let assets = storage.list_assets().await?;
    Ok(wallet_assets(&wallets, &assets))
}

/// Load everything needed for a summary and compute it.
pub async fn load_summary(storage: &dyn Storage, user_id: i32) -> StorageResult<PortfolioSummary> {
    let assets = storage.list_assets().await?;
    let wallets = storage.wallets_for_user(user_id).await?;
    let transactions = storage.transactions_for_user(user_id, None).await?;
    let first = storage.first_portfolio_value(user_id).await?;

    let holdings = wallet_assets(&wallets, &assets);
    Ok(summarize(&holdings, &transactions, &assets, first, Utc::now()))
}

/// History entries from the last `days` days, ascending.
pub async fn load_history(
    storage: &dyn Storage,
    user_id: i32,
    days: i64,
) -> StorageResult<Vec<PortfolioHistory>> {
    let since = Utc::now() - Duration::days(days.max(0));
    storage.portfolio_history(user_id, since).await
}

/// Record the current total value of a user's holdings.
pub async fn snapshot(storage: &dyn Storage, user_id: i32) -> StorageResult<PortfolioHistory> {
    let holdings = load_wallet_assets(storage, user_id).await?;
    let total: f64 = holdings.iter().map(|h| h.value).sum();
    storage
        .add_portfolio_snapshot(user_id, (total * 100.0).round() / 100.0, None)
        .await
}
