//! Conversions between display amounts and on-chain base units.
//!
//! Amounts arrive as `f64` in native units (ether, SOL). They are formatted
//! with the shortest round-trip representation before scaling so that `0.1`
//! becomes exactly 10^17 wei rather than the binary approximation.

use alloy::primitives::utils::{format_ether, parse_ether};
use alloy::primitives::U256;

use crate::blockchain::types::{BlockchainError, BlockchainResult};

pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

fn check_amount(amount: f64) -> BlockchainResult<()> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(BlockchainError::InvalidAmount(format!(
            "{} is not a positive number",
            amount
        )));
    }
    Ok(())
}

/// Ether-denominated amount to wei.
pub fn to_wei(amount: f64) -> BlockchainResult<U256> {
    check_amount(amount)?;
    parse_ether(&amount.to_string())
        .map_err(|e| BlockchainError::InvalidAmount(format!("{}: {}", amount, e)))
}

/// Wei to ether, lossy.
pub fn from_wei(wei: U256) -> f64 {
    format_ether(wei).parse().unwrap_or(0.0)
}

/// SOL-denominated amount to lamports, rounded to the nearest lamport.
pub fn to_lamports(amount: f64) -> BlockchainResult<u64> {
    check_amount(amount)?;
    let lamports = (amount * LAMPORTS_PER_SOL as f64).round();
    if lamports < 1.0 || lamports >= u64::MAX as f64 {
        return Err(BlockchainError::InvalidAmount(format!(
            "{} SOL is outside the transferable range",
            amount
        )));
    }
    Ok(lamports as u64)
}

pub fn from_lamports(lamports: u64) -> f64 {
    lamports as f64 / LAMPORTS_PER_SOL as f64
}
