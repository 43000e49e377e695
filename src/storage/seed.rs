//! Demo account and asset catalog for empty stores.

use chrono::{Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::auth::password::hash_password;
use crate::storage::{
    NewAsset, NewTransaction, NewUser, Storage, StorageError, StorageResult, TransactionStatus,
    TransactionType,
};

pub const DEMO_USERNAME: &str = "demo_user";
pub const DEMO_PASSWORD: &str = "password123";
pub const DEMO_EMAIL: &str = "demo@example.com";

/// Days of portfolio history generated for the demo user (plus today).
const HISTORY_DAYS: i64 = 30;
const HISTORY_START_VALUE: f64 = 32_000.0;

/// (symbol, name, icon, price, 24h change %)
const ASSETS: &[(&str, &str, &str, f64, f64)] = &[
    ("BTC", "Bitcoin", "₿", 42384.25, 1.8),
    ("ETH", "Ethereum", "Ξ", 2856.32, 3.2),
    ("USDC", "USD Coin", "$", 1.00, 0.0),
    ("SOL", "Solana", "S", 98.45, -1.2),
    ("DOGE", "Dogecoin", "D", 0.29, 4.5),
    ("BNB", "Binance Coin", "B", 389.21, 2.5),
];

const WALLETS: &[(&str, f64)] = &[
    ("BTC", 0.4238),
    ("ETH", 3.5029),
    ("USDC", 4210.0),
    ("SOL", 28.5),
    ("DOGE", 5280.0),
];

/// Seed the store when it has no assets yet. Returns whether anything was written.
pub async fn seed_if_empty(storage: &dyn Storage) -> StorageResult<bool> {
    if !storage.list_assets().await?.is_empty() {
        return Ok(false);
    }
    seed_demo_data(storage).await?;
    Ok(true)
}

/// Write the asset catalog and the demo account.
///
/// Wallets are created at their final balances; the seeded transactions are
/// history only and carry no balance changes.
pub async fn seed_demo_data(storage: &dyn Storage) -> StorageResult<()> {
    let mut asset_ids = Vec::with_capacity(ASSETS.len());
    for (symbol, name, icon, price, change) in ASSETS {
        let asset = storage
            .create_asset(NewAsset {
                symbol: symbol.to_string(),
                name: name.to_string(),
                icon: Some(icon.to_string()),
                current_price: Some(*price),
                price_change_percentage_24h: Some(*change),
            })
            .await?;
        asset_ids.push((*symbol, asset.id));
    }
    let id_of = |symbol: &str| -> StorageResult<i32> {
        asset_ids
            .iter()
            .find(|(s, _)| *s == symbol)
            .map(|(_, id)| *id)
            .ok_or_else(|| StorageError::Seed(format!("asset {} missing", symbol)))
    };

    let password_hash =
        hash_password(DEMO_PASSWORD).map_err(|e| StorageError::Seed(e.to_string()))?;
    let user = match storage.get_user_by_username(DEMO_USERNAME).await? {
        Some(user) => user,
        None => {
            storage
                .create_user(NewUser {
                    username: DEMO_USERNAME.to_string(),
                    password_hash,
                    email: DEMO_EMAIL.to_string(),
                })
                .await?
        }
    };

    for (symbol, balance) in WALLETS {
        storage.create_wallet(user.id, id_of(symbol)?, *balance).await?;
    }

    let now = Utc::now();
    let history = [
        (
            "BTC",
            TransactionType::Receive,
            0.0024,
            None,
            Some("1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa"),
            None,
            0,
        ),
        (
            "ETH",
            TransactionType::Send,
            0.5,
            Some("0x742d35Cc6634C0532925a3b844Bc454e4438f44e"),
            None,
            Some(0.0023),
            1,
        ),
        ("BTC", TransactionType::Swap, 0.05, Some("swap:USDC"), None, None, 2),
        (
            "SOL",
            TransactionType::Receive,
            12.0,
            None,
            Some("So11111111111111111111111111111111111111112"),
            None,
            3,
        ),
    ];
    for (symbol, kind, amount, to, from, fee, days_ago) in history {
        storage
            .apply_transaction(
                NewTransaction {
                    user_id: user.id,
                    asset_id: id_of(symbol)?,
                    kind,
                    amount,
                    to_address: to.map(str::to_string),
                    from_address: from.map(str::to_string),
                    fee,
                    status: TransactionStatus::Completed,
                    created_at: Some(now - Duration::days(days_ago)),
                },
                &[],
            )
            .await?;
    }

    // Deterministic walk of +/-2% per day.
    let mut rng = StdRng::seed_from_u64(user.id as u64);
    let mut value = HISTORY_START_VALUE;
    for days_ago in (0..=HISTORY_DAYS).rev() {
        value *= rng.gen_range(0.98..1.02);
        storage
            .add_portfolio_snapshot(user.id, round_cents(value), Some(now - Duration::days(days_ago)))
            .await?;
    }

    tracing::info!(user_id = user.id, assets = ASSETS.len(), "Seeded demo data");
    Ok(())
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemStorage;

    #[tokio::test]
    async fn test_seed_once() {
        let storage = MemStorage::new();
        assert!(seed_if_empty(&storage).await.unwrap());
        assert!(!seed_if_empty(&storage).await.unwrap());

        let user = storage.get_user_by_username(DEMO_USERNAME).await.unwrap().unwrap();
        assert_eq!(storage.list_assets().await.unwrap().len(), 6);
        assert_eq!(storage.wallets_for_user(user.id).await.unwrap().len(), 5);
        assert_eq!(storage.transactions_for_user(user.id, None).await.unwrap().len(), 4);

        let since = Utc::now() - Duration::days(40);
        let history = storage.portfolio_history(user.id, since).await.unwrap();
        assert_eq!(history.len(), 31);
        assert!(history.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[tokio::test]
    async fn test_seeded_password_is_hashed() {
        let storage = MemStorage::new();
        seed_demo_data(&storage).await.unwrap();
        let user = storage.get_user_by_username(DEMO_USERNAME).await.unwrap().unwrap();
        assert_ne!(user.password, DEMO_PASSWORD);
        assert!(user.password.starts_with("$argon2"));
    }
}
