//! EVM key management and address validation.
//!
//! # Security
//! - Keys are never logged
//! - Parsing failures are reported as `InvalidPrivateKey` without echoing input

use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;

use crate::blockchain::types::{BlockchainError, BlockchainResult, WalletKeys};

/// A secp256k1 key pair usable on every EVM network.
#[derive(Debug, Clone)]
pub struct EvmWallet {
    signer: PrivateKeySigner,
}

impl EvmWallet {
    /// Generate a fresh random key.
    pub fn generate() -> Self {
        Self {
            signer: PrivateKeySigner::random(),
        }
    }

    /// Create a wallet from a hex-encoded private key (with or without 0x).
    pub fn from_private_key(private_key_hex: &str) -> BlockchainResult<Self> {
        let key_hex = private_key_hex.trim();
        let key_hex = key_hex.strip_prefix("0x").unwrap_or(key_hex);

        let signer: PrivateKeySigner = key_hex.parse().map_err(|e| {
            tracing::debug!(error = %e, "Rejected EVM private key");
            BlockchainError::InvalidPrivateKey
        })?;

        Ok(Self { signer })
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    pub fn signer(&self) -> &PrivateKeySigner {
        &self.signer
    }

    /// Checksummed address and 0x-prefixed private key.
    pub fn keys(&self) -> WalletKeys {
        WalletKeys {
            address: self.address().to_checksum(None),
            private_key: format!("0x{}", hex::encode(self.signer.to_bytes())),
        }
    }
}

/// `0x` + 40 hex digits; mixed-case input must carry a valid EIP-55 checksum.
pub fn validate_address(address: &str) -> bool {
    let Some(digits) = address.strip_prefix("0x") else {
        return false;
    };
    if digits.len() != 40 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return false;
    }

    let has_lower = digits.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = digits.chars().any(|c| c.is_ascii_uppercase());
    if !(has_lower && has_upper) {
        return true;
    }
    Address::parse_checksummed(format!("0x{}", digits), None).is_ok()
}

/// Parse an address that passed [`validate_address`].
pub fn parse_address(address: &str) -> BlockchainResult<Address> {
    if !validate_address(address) {
        return Err(BlockchainError::InvalidAddress(address.to_string()));
    }
    address
        .parse()
        .map_err(|_| BlockchainError::InvalidAddress(address.to_string()))
}
