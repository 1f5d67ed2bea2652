//! Local private-key signer
//!
//! Stands in for a wallet: signs personal messages (EIP-191) with a secp256k1
//! key held in memory.

use alloy_primitives::{eip191_hash_message, keccak256};
use async_trait::async_trait;
use k256::ecdsa::SigningKey;
use safe_delegator::{Address, MessageSigner, SignerError};

/// Environment variable holding the delegator's hex private key
pub const PRIVATE_KEY_ENV: &str = "DELEGATOR_PRIVATE_KEY";

pub struct LocalKeySigner {
    key: SigningKey,
    address: Address,
}

impl LocalKeySigner {
    /// Parses a 32-byte hex private key, with or without `0x`
    pub fn from_hex(private_key: &str) -> Result<Self, SignerError> {
        let trimmed = private_key.trim();
        let bytes = hex::decode(trimmed.strip_prefix("0x").unwrap_or(trimmed))
            .map_err(|e| SignerError::Failed(format!("Invalid private key hex: {e}")))?;
        let key = SigningKey::from_slice(&bytes)
            .map_err(|e| SignerError::Failed(format!("Invalid private key: {e}")))?;

        let address = address_of(&key);
        Ok(Self { key, address })
    }

    /// Reads the key from [`PRIVATE_KEY_ENV`]; `None` when unset
    pub fn from_env() -> Result<Option<Self>, SignerError> {
        match std::env::var(PRIVATE_KEY_ENV) {
            Ok(value) if !value.trim().is_empty() => Self::from_hex(&value).map(Some),
            _ => Ok(None),
        }
    }

    /// Checksummed address controlled by the key
    pub fn address(&self) -> &Address {
        &self.address
    }
}

fn address_of(key: &SigningKey) -> Address {
    let point = key.verifying_key().to_encoded_point(false);
    // Uncompressed SEC1 point: 0x04 || X || Y
    let hash = keccak256(&point.as_bytes()[1..]);
    let address = alloy_primitives::Address::from_slice(&hash[12..]);
    Address::new(address.to_checksum(None))
}

#[async_trait]
impl MessageSigner for LocalKeySigner {
    async fn sign_message(&self, message: &str) -> Result<String, SignerError> {
        let digest = eip191_hash_message(message);
        let (signature, recovery_id) = self
            .key
            .sign_prehash_recoverable(digest.as_slice())
            .map_err(|e| SignerError::Failed(e.to_string()))?;

        let mut bytes = signature.to_bytes().to_vec();
        bytes.push(27 + recovery_id.to_byte());
        Ok(format!("0x{}", hex::encode(bytes)))
    }
}
