//! Postgres storage backend (runtime queries, no compile-time checking).
//!
//! NUMERIC columns are cast to float8 on read; binds are f64 and rely on the
//! float8 → numeric assignment cast.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;

use crate::achievements::CATALOG;
use crate::storage::*;

const USER_COLUMNS: &str = "id, username, password, email, created_at";
const ASSET_COLUMNS: &str = "id, symbol, name, icon, current_price::float8 AS current_price, \
     price_change_percentage_24h::float8 AS price_change_percentage_24h";
const WALLET_COLUMNS: &str = "id, user_id, asset_id, balance::float8 AS balance, last_updated";
const TRANSACTION_COLUMNS: &str = "id, user_id, asset_id, type, amount::float8 AS amount, \
     to_address, from_address, fee::float8 AS fee, status, created_at";
const HISTORY_COLUMNS: &str = "id, user_id, total_value::float8 AS total_value, timestamp";
const ADDRESS_COLUMNS: &str = "id, user_id, address, network, is_active, created_at";
const DEFI_COLUMNS: &str = "id, user_id, protocol, type, amount::float8 AS amount, asset_id, \
     apy::float8 AS apy, start_date, end_date, status";

/// Storage backed by a Postgres connection pool.
#[derive(Clone)]
pub struct PgStorage {
    pool: PgPool,
}

impl PgStorage {
    /// Connect, apply the schema and sync the achievement catalog.
    pub async fn connect(database_url: &str, max_connections: u32) -> StorageResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        let storage = Self { pool };
        storage.migrate().await?;
        storage.sync_achievement_catalog().await?;
        tracing::info!(max_connections, "Connected to Postgres");
        Ok(storage)
    }

    async fn migrate(&self) -> StorageResult<()> {
        sqlx::raw_sql(include_str!("../../migrations/0001_init.sql"))
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Migration(e.to_string()))?;
        Ok(())
    }

    async fn sync_achievement_catalog(&self) -> StorageResult<()> {
        for achievement in CATALOG {
            sqlx::query(
                r#"
                INSERT INTO achievements (id, title, description, icon, category, tier, points, target)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                ON CONFLICT (id) DO UPDATE SET
                    title = EXCLUDED.title,
                    description = EXCLUDED.description,
                    icon = EXCLUDED.icon,
                    category = EXCLUDED.category,
                    tier = EXCLUDED.tier,
                    points = EXCLUDED.points,
                    target = EXCLUDED.target
                "#,
            )
            .bind(achievement.id)
            .bind(achievement.title)
            .bind(achievement.description)
            .bind(achievement.icon)
            .bind(achievement.category.as_str())
            .bind(achievement.tier.as_str())
            .bind(achievement.points as i32)
            .bind(achievement.target as i32)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }
}

fn user_from_row(row: &PgRow) -> User {
    User {
        id: row.get("id"),
        username: row.get("username"),
        password: row.get("password"),
        email: row.get("email"),
        created_at: row.get("created_at"),
    }
}

fn asset_from_row(row: &PgRow) -> Asset {
    Asset {
        id: row.get("id"),
        symbol: row.get("symbol"),
        name: row.get("name"),
        icon: row.get("icon"),
        current_price: row.get("current_price"),
        price_change_percentage_24h: row.get("price_change_percentage_24h"),
    }
}

fn wallet_from_row(row: &PgRow) -> Wallet {
    Wallet {
        id: row.get("id"),
        user_id: row.get("user_id"),
        asset_id: row.get("asset_id"),
        balance: row.get("balance"),
        last_updated: row.get("last_updated"),
    }
}

fn transaction_from_row(row: &PgRow) -> StorageResult<Transaction> {
    Ok(Transaction {
        id: row.get("id"),
        user_id: row.get("user_id"),
        asset_id: row.get("asset_id"),
        kind: row.get::<String, _>("type").parse()?,
        amount: row.get("amount"),
        to_address: row.get("to_address"),
        from_address: row.get("from_address"),
        fee: row.get("fee"),
        status: row.get::<String, _>("status").parse()?,
        created_at: row.get("created_at"),
    })
}

fn history_from_row(row: &PgRow) -> PortfolioHistory {
    PortfolioHistory {
        id: row.get("id"),
        user_id: row.get("user_id"),
        total_value: row.get("total_value"),
        timestamp: row.get("timestamp"),
    }
}

fn address_from_row(row: &PgRow) -> WalletAddress {
    WalletAddress {
        id: row.get("id"),
        user_id: row.get("user_id"),
        address: row.get("address"),
        network: row.get("network"),
        is_active: row.get("is_active"),
        created_at: row.get("created_at"),
    }
}

fn defi_from_row(row: &PgRow) -> StorageResult<DefiPosition> {
    Ok(DefiPosition {
        id: row.get("id"),
        user_id: row.get("user_id"),
        protocol: row.get("protocol"),
        kind: row.get::<String, _>("type").parse()?,
        amount: row.get("amount"),
        asset_id: row.get("asset_id"),
        apy: row.get("apy"),
        start_date: row.get("start_date"),
        end_date: row.get("end_date"),
        status: row.get::<String, _>("status").parse()?,
    })
}

fn achievement_from_row(row: &PgRow) -> UserAchievement {
    UserAchievement {
        user_id: row.get("user_id"),
        achievement_id: row.get("achievement_id"),
        progress: row.get::<i16, _>("progress").clamp(0, 100) as u8,
        unlocked_at: row.get("unlocked_at"),
    }
}

/// Map unique-violation errors to a conflict with the given message.
/// LIMIT bind for a caller-supplied row count; values past `i64::MAX` mean "everything".
fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

fn conflict_or(err: sqlx::Error, message: &str) -> StorageError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StorageError::Conflict(message.to_string())
        }
        _ => StorageError::Database(err),
    }
}

#[async_trait]
impl Storage for PgStorage {
    async fn ping(&self) -> StorageResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn get_user(&self, id: i32) -> StorageResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(user_from_row))
    }

    async fn get_user_by_username(&self, username: &str) -> StorageResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1"))
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(user_from_row))
    }

    async fn create_user(&self, user: NewUser) -> StorageResult<User> {
        let row = sqlx::query(&format!(
            "INSERT INTO users (username, password, email) VALUES ($1, $2, $3) RETURNING {USER_COLUMNS}"
        ))
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(&user.email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_or(e, "Username already exists"))?;
        Ok(user_from_row(&row))
    }

    async fn list_user_ids(&self) -> StorageResult<Vec<i32>> {
        let rows = sqlx::query("SELECT id FROM users ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(|r| r.get("id")).collect())
    }

    async fn list_assets(&self) -> StorageResult<Vec<Asset>> {
        let rows = sqlx::query(&format!("SELECT {ASSET_COLUMNS} FROM assets ORDER BY id"))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(asset_from_row).collect())
    }

    async fn get_asset(&self, id: i32) -> StorageResult<Option<Asset>> {
        let row = sqlx::query(&format!("SELECT {ASSET_COLUMNS} FROM assets WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(asset_from_row))
    }

    async fn get_asset_by_symbol(&self, symbol: &str) -> StorageResult<Option<Asset>> {
        let row = sqlx::query(&format!(
            "SELECT {ASSET_COLUMNS} FROM assets WHERE UPPER(symbol) = UPPER($1)"
        ))
        .bind(symbol)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(asset_from_row))
    }

    async fn create_asset(&self, asset: NewAsset) -> StorageResult<Asset> {
        let row = sqlx::query(&format!(
            "INSERT INTO assets (symbol, name, icon, current_price, price_change_percentage_24h) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {ASSET_COLUMNS}"
        ))
        .bind(&asset.symbol)
        .bind(&asset.name)
        .bind(&asset.icon)
        .bind(asset.current_price)
        .bind(asset.price_change_percentage_24h)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_or(e, &format!("Asset {} already exists", asset.symbol)))?;
        Ok(asset_from_row(&row))
    }

    async fn update_asset_price(&self, id: i32, price: f64, change_24h: f64) -> StorageResult<Asset> {
        let row = sqlx::query(&format!(
            "UPDATE assets SET current_price = $2, price_change_percentage_24h = $3 \
             WHERE id = $1 RETURNING {ASSET_COLUMNS}"
        ))
        .bind(id)
        .bind(price)
        .bind(change_24h)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StorageError::NotFound(format!("Asset {}", id)))?;
        Ok(asset_from_row(&row))
    }

    async fn wallets_for_user(&self, user_id: i32) -> StorageResult<Vec<Wallet>> {
        let rows = sqlx::query(&format!(
            "SELECT {WALLET_COLUMNS} FROM wallets WHERE user_id = $1 ORDER BY id"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(wallet_from_row).collect())
    }

    async fn wallet_for(&self, user_id: i32, asset_id: i32) -> StorageResult<Option<Wallet>> {
        let row = sqlx::query(&format!(
            "SELECT {WALLET_COLUMNS} FROM wallets WHERE user_id = $1 AND asset_id = $2"
        ))
        .bind(user_id)
        .bind(asset_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(wallet_from_row))
    }

    async fn create_wallet(&self, user_id: i32, asset_id: i32, balance: f64) -> StorageResult<Wallet> {
        let row = sqlx::query(&format!(
            "INSERT INTO wallets (user_id, asset_id, balance) VALUES ($1, $2, $3) \
             RETURNING {WALLET_COLUMNS}"
        ))
        .bind(user_id)
        .bind(asset_id)
        .bind(balance)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_or(e, "Wallet already exists"))?;
        Ok(wallet_from_row(&row))
    }

    async fn transactions_for_user(
        &self,
        user_id: i32,
        limit: Option<usize>,
    ) -> StorageResult<Vec<Transaction>> {
        let rows = sqlx::query(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE user_id = $1 \
             ORDER BY created_at DESC, id DESC LIMIT $2"
        ))
        .bind(user_id)
        .bind(limit.map(sql_limit))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(transaction_from_row).collect()
    }

    async fn apply_transaction(
        &self,
        tx: NewTransaction,
        changes: &[BalanceChange],
    ) -> StorageResult<Transaction> {
        let mut db = self.pool.begin().await?;

        let user_exists = sqlx::query("SELECT 1 FROM users WHERE id = $1")
            .bind(tx.user_id)
            .fetch_optional(&mut *db)
            .await?
            .is_some();
        if !user_exists {
            return Err(StorageError::NotFound("User".to_string()));
        }

        for change in changes {
            let asset_exists = sqlx::query("SELECT 1 FROM assets WHERE id = $1")
                .bind(change.asset_id)
                .fetch_optional(&mut *db)
                .await?
                .is_some();
            if !asset_exists {
                return Err(StorageError::NotFound("Asset".to_string()));
            }

            let current = sqlx::query(
                "SELECT id, balance::float8 AS balance FROM wallets \
                 WHERE user_id = $1 AND asset_id = $2 FOR UPDATE",
            )
            .bind(tx.user_id)
            .bind(change.asset_id)
            .fetch_optional(&mut *db)
            .await?;

            match current {
                Some(row) => {
                    let id: i32 = row.get("id");
                    let available: f64 = row.get("balance");
                    let next = available + change.delta;
                    if next < -BALANCE_EPSILON {
                        return Err(StorageError::InsufficientBalance {
                            available,
                            required: -change.delta,
                        });
                    }
                    sqlx::query("UPDATE wallets SET balance = $2, last_updated = NOW() WHERE id = $1")
                        .bind(id)
                        .bind(next.max(0.0))
                        .execute(&mut *db)
                        .await?;
                }
                None if change.delta < 0.0 => {
                    return Err(StorageError::InsufficientBalance {
                        available: 0.0,
                        required: -change.delta,
                    });
                }
                None => {
                    sqlx::query("INSERT INTO wallets (user_id, asset_id, balance) VALUES ($1, $2, $3)")
                        .bind(tx.user_id)
                        .bind(change.asset_id)
                        .bind(change.delta)
                        .execute(&mut *db)
                        .await?;
                }
            }
        }

        let row = sqlx::query(&format!(
            "INSERT INTO transactions \
             (user_id, asset_id, type, amount, to_address, from_address, fee, status, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, COALESCE($9, NOW())) \
             RETURNING {TRANSACTION_COLUMNS}"
        ))
        .bind(tx.user_id)
        .bind(tx.asset_id)
        .bind(tx.kind.as_str())
        .bind(tx.amount)
        .bind(&tx.to_address)
        .bind(&tx.from_address)
        .bind(tx.fee)
        .bind(tx.status.as_str())
        .bind(tx.created_at)
        .fetch_one(&mut *db)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(d) if d.is_foreign_key_violation() => {
                StorageError::NotFound("Asset".to_string())
            }
            _ => StorageError::Database(e),
        })?;
        let record = transaction_from_row(&row)?;

        db.commit().await?;
        Ok(record)
    }

    async fn insert_market_data(&self, data: NewMarketData) -> StorageResult<MarketData> {
        let row = sqlx::query(
            "INSERT INTO market_data (asset_id, price, volume_24h, market_cap, price_change_percentage_24h) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING id, asset_id, price::float8 AS price, volume_24h::float8 AS volume_24h, \
             market_cap::float8 AS market_cap, \
             price_change_percentage_24h::float8 AS price_change_percentage_24h, last_updated",
        )
        .bind(data.asset_id)
        .bind(data.price)
        .bind(data.volume_24h)
        .bind(data.market_cap)
        .bind(data.price_change_percentage_24h)
        .fetch_one(&self.pool)
        .await?;

        Ok(MarketData {
            id: row.get("id"),
            asset_id: row.get("asset_id"),
            price: row.get("price"),
            volume_24h: row.get("volume_24h"),
            market_cap: row.get("market_cap"),
            price_change_percentage_24h: row.get("price_change_percentage_24h"),
            last_updated: row.get("last_updated"),
        })
    }

    async fn recent_prices(&self, asset_id: i32, limit: usize) -> StorageResult<Vec<f64>> {
        let rows = sqlx::query(
            "SELECT price::float8 AS price FROM market_data WHERE asset_id = $1 \
             ORDER BY last_updated DESC, id DESC LIMIT $2",
        )
        .bind(asset_id)
        .bind(sql_limit(limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().rev().map(|r| r.get("price")).collect())
    }

    async fn portfolio_history(
        &self,
        user_id: i32,
        since: DateTime<Utc>,
    ) -> StorageResult<Vec<PortfolioHistory>> {
        let rows = sqlx::query(&format!(
            "SELECT {HISTORY_COLUMNS} FROM portfolio_history \
             WHERE user_id = $1 AND timestamp >= $2 ORDER BY timestamp ASC"
        ))
        .bind(user_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(history_from_row).collect())
    }

    async fn first_portfolio_value(&self, user_id: i32) -> StorageResult<Option<f64>> {
        let row = sqlx::query(
            "SELECT total_value::float8 AS total_value FROM portfolio_history \
             WHERE user_id = $1 ORDER BY timestamp ASC LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| r.get("total_value")))
    }

    async fn add_portfolio_snapshot(
        &self,
        user_id: i32,
        total_value: f64,
        at: Option<DateTime<Utc>>,
    ) -> StorageResult<PortfolioHistory> {
        let row = sqlx::query(&format!(
            "INSERT INTO portfolio_history (user_id, total_value, timestamp) \
             VALUES ($1, $2, COALESCE($3, NOW())) RETURNING {HISTORY_COLUMNS}"
        ))
        .bind(user_id)
        .bind(total_value)
        .bind(at)
        .fetch_one(&self.pool)
        .await?;
        Ok(history_from_row(&row))
    }

    async fn wallet_addresses(&self, user_id: i32) -> StorageResult<Vec<WalletAddress>> {
        let rows = sqlx::query(&format!(
            "SELECT {ADDRESS_COLUMNS} FROM wallet_addresses WHERE user_id = $1 ORDER BY id"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(address_from_row).collect())
    }

    async fn add_wallet_address(&self, address: NewWalletAddress) -> StorageResult<WalletAddress> {
        let row = sqlx::query(&format!(
            "INSERT INTO wallet_addresses (user_id, address, network, is_active) \
             VALUES ($1, $2, $3, $4) RETURNING {ADDRESS_COLUMNS}"
        ))
        .bind(address.user_id)
        .bind(&address.address)
        .bind(&address.network)
        .bind(address.is_active)
        .fetch_one(&self.pool)
        .await?;
        Ok(address_from_row(&row))
    }

    async fn defi_positions(&self, user_id: i32) -> StorageResult<Vec<DefiPosition>> {
        let rows = sqlx::query(&format!(
            "SELECT {DEFI_COLUMNS} FROM defi_positions WHERE user_id = $1 ORDER BY id"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(defi_from_row).collect()
    }

    async fn create_defi_position(&self, position: NewDefiPosition) -> StorageResult<DefiPosition> {
        let row = sqlx::query(&format!(
            "INSERT INTO defi_positions (user_id, protocol, type, amount, asset_id, apy) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {DEFI_COLUMNS}"
        ))
        .bind(position.user_id)
        .bind(&position.protocol)
        .bind(position.kind.as_str())
        .bind(position.amount)
        .bind(position.asset_id)
        .bind(position.apy)
        .fetch_one(&self.pool)
        .await?;
        defi_from_row(&row)
    }

    async fn set_defi_status(&self, id: i32, status: DefiPositionStatus) -> StorageResult<DefiPosition> {
        let row = sqlx::query(&format!(
            "UPDATE defi_positions SET status = $2, \
             end_date = CASE WHEN $2 = 'active' THEN NULL ELSE NOW() END \
             WHERE id = $1 RETURNING {DEFI_COLUMNS}"
        ))
        .bind(id)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StorageError::NotFound("Position".to_string()))?;
        defi_from_row(&row)
    }

    async fn user_achievements(&self, user_id: i32) -> StorageResult<Vec<UserAchievement>> {
        let rows = sqlx::query(
            "SELECT user_id, achievement_id, progress, unlocked_at FROM user_achievements \
             WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(achievement_from_row).collect())
    }

    async fn upsert_user_achievement(&self, record: UserAchievement) -> StorageResult<UserAchievement> {
        let row = sqlx::query(
            r#"
            INSERT INTO user_achievements (user_id, achievement_id, progress, unlocked_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, achievement_id) DO UPDATE SET
                progress = EXCLUDED.progress,
                unlocked_at = COALESCE(user_achievements.unlocked_at, EXCLUDED.unlocked_at)
            RETURNING user_id, achievement_id, progress, unlocked_at
            "#,
        )
        .bind(record.user_id)
        .bind(&record.achievement_id)
        .bind(record.progress as i16)
        .bind(record.unlocked_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(achievement_from_row(&row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sql_limit_saturates() {
        assert_eq!(sql_limit(25), 25);
        assert_eq!(sql_limit(usize::MAX), i64::MAX);
        assert!(sql_limit(usize::MAX) > 0);
    }
}
