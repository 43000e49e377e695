//! Balance effects of send, receive and swap transactions.
//!
//! # Data Flow
//! ```text
//! NewTransaction
//!     → validate (amount / fee ranges)
//!     → balance_changes (pure: which wallets move and by how much)
//!     → Storage::apply_transaction (atomic insert + balance updates)
//! ```
//!
//! # Rules
//! - receive: +amount on the asset
//! - send: -(amount + fee) on the asset
//! - swap: `to_address` is `swap:<SYMBOL>`; -amount on the source,
//!   +amount * price(src) / price(dst) on the target
//! - pending and failed transactions are recorded without moving balances

use thiserror::Error;

use crate::observability::metrics;
use crate::storage::{
    Asset, BalanceChange, NewTransaction, Storage, StorageError, Transaction, TransactionStatus,
    TransactionType,
};

const SWAP_PREFIX: &str = "swap:";

/// Exclusive upper bound for amounts and fees; NUMERIC(18, 8) keeps ten integer digits.
pub const MAX_AMOUNT: f64 = 1e10;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("{0}")]
    Invalid(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Reject amounts and fees that cannot be applied.
pub fn validate(tx: &NewTransaction) -> Result<(), LedgerError> {
    if !tx.amount.is_finite() || tx.amount <= 0.0 {
        return Err(LedgerError::Invalid("Amount must be a positive number".to_string()));
    }
    if let Some(fee) = tx.fee {
        if !fee.is_finite() || fee < 0.0 {
            return Err(LedgerError::Invalid("Fee must be zero or positive".to_string()));
        }
    }
    if tx.amount >= MAX_AMOUNT || tx.fee.is_some_and(|fee| fee >= MAX_AMOUNT) {
        return Err(LedgerError::Invalid("Amount is too large".to_string()));
    }
    Ok(())
}

/// Target symbol of a swap (`swap:USDC` → `USDC`).
pub fn swap_target(to_address: Option<&str>) -> Option<&str> {
    to_address
        .and_then(|addr| addr.strip_prefix(SWAP_PREFIX))
        .map(str::trim)
        .filter(|symbol| !symbol.is_empty())
}

/// Compute wallet deltas for a transaction.
///
/// `target` is only consulted for swaps.
pub fn balance_changes(
    tx: &NewTransaction,
    source: &Asset,
    target: Option<&Asset>,
) -> Result<Vec<BalanceChange>, LedgerError> {
    if tx.status != TransactionStatus::Completed {
        return Ok(Vec::new());
    }

    let changes = match tx.kind {
        TransactionType::Receive => vec![BalanceChange {
            asset_id: source.id,
            delta: tx.amount,
        }],
        TransactionType::Send => vec![BalanceChange {
            asset_id: source.id,
            delta: -(tx.amount + tx.fee.unwrap_or(0.0)),
        }],
        TransactionType::Swap => {
            let target = target.ok_or_else(|| {
                LedgerError::Invalid("Swap needs a target asset (toAddress \"swap:<SYMBOL>\")".to_string())
            })?;
            if target.id == source.id {
                return Err(LedgerError::Invalid("Cannot swap an asset into itself".to_string()));
            }
            let source_price = positive_price(source)?;
            let target_price = positive_price(target)?;
            vec![
                BalanceChange {
                    asset_id: source.id,
                    delta: -tx.amount,
                },
                BalanceChange {
                    asset_id: target.id,
                    delta: tx.amount * source_price / target_price,
                },
            ]
        }
    };

    Ok(changes)
}

fn positive_price(asset: &Asset) -> Result<f64, LedgerError> {
    match asset.current_price {
        Some(price) if price.is_finite() && price > 0.0 => Ok(price),
        _ => Err(LedgerError::Invalid(format!("No price available for {}", asset.symbol))),
    }
}

/// Validate, plan and persist a transaction.
pub async fn record(storage: &dyn Storage, tx: NewTransaction) -> Result<Transaction, LedgerError> {
    validate(&tx)?;

    if storage.get_user(tx.user_id).await?.is_none() {
        return Err(LedgerError::NotFound("User".to_string()));
    }
    let source = storage
        .get_asset(tx.asset_id)
        .await?
        .ok_or_else(|| LedgerError::NotFound("Asset".to_string()))?;

    let target = match (tx.kind, swap_target(tx.to_address.as_deref())) {
        (TransactionType::Swap, Some(symbol)) => Some(
            storage
                .get_asset_by_symbol(symbol)
                .await?
                .ok_or_else(|| LedgerError::NotFound(format!("Asset {}", symbol)))?,
        ),
        _ => None,
    };

    let changes = balance_changes(&tx, &source, target.as_ref())?;
    let kind = tx.kind;
    let recorded = storage.apply_transaction(tx, &changes).await?;

    metrics::record_ledger_transaction(kind.as_str());
    tracing::info!(
        tx_id = recorded.id,
        user_id = recorded.user_id,
        kind = %kind,
        amount = recorded.amount,
        "Transaction recorded"
    );

    Ok(recorded)
}
