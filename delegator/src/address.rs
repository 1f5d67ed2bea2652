//! Account identifiers as they travel to and from the transaction service
//!
//! The service returns EIP-55 checksummed addresses while users type them in
//! any case. [`Address`] normalizes on construction and compares
//! case-insensitively so the same account is never held twice.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// An owner, Safe or delegate address
///
/// Well-formed 20-byte hex addresses are stored checksummed. Any other text is
/// kept verbatim (trimmed) and treated as opaque.
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Address(String);

impl Address {
    pub fn new(raw: impl AsRef<str>) -> Self {
        let trimmed = raw.as_ref().trim();
        let normalized = match trimmed.parse::<alloy_primitives::Address>() {
            Ok(parsed) => parsed.to_checksum(None),
            Err(_) => trimmed.to_string(),
        };
        Self(normalized)
    }

    /// Normalized text, as sent to the service and used in signed messages
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the address is a well-formed 20-byte hex address
    pub fn is_checksummable(&self) -> bool {
        self.0.parse::<alloy_primitives::Address>().is_ok()
    }
}

impl PartialEq for Address {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl Hash for Address {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for byte in self.0.bytes() {
            state.write_u8(byte.to_ascii_lowercase());
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Address {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

impl From<&str> for Address {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.0
    }
}

impl AsRef<str> for Address {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A Safe (multisig contract) address
///
/// There is no public constructor: values are produced only by
/// decoding the owner's-safes response, see
/// [`SafeServiceClient::list_owner_safes`](crate::SafeServiceClient::list_owner_safes).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SafeAddress(Address);

impl SafeAddress {
    pub fn address(&self) -> &Address {
        &self.0
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for SafeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl PartialEq<Address> for SafeAddress {
    fn eq(&self, other: &Address) -> bool {
        &self.0 == other
    }
}
