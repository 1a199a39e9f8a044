//! Identifier types for ledger entities.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Transaction identifier.
///
/// Derived from the proposal nonce and the submitting creator, hex-encoded
/// SHA-256. Hashing lives in the crypto crate, so this type only carries the
/// encoded value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TxId(String);

impl TxId {
    /// Wrap an already computed transaction id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Shortened form used in log lines.
    pub fn short(&self) -> &str {
        let end = self.0.len().min(12);
        &self.0[..end]
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a chaincode deployed on a channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChaincodeId {
    /// Chaincode name.
    pub name: String,
    /// Optional version. Omitted means "whatever is instantiated".
    pub version: Option<String>,
}

impl ChaincodeId {
    /// Create a chaincode id without a version.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
        }
    }

    /// Pin a specific version.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }
}

impl fmt::Display for ChaincodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(version) => write!(f, "{}:{}", self.name, version),
            None => write!(f, "{}", self.name),
        }
    }
}

impl From<&str> for ChaincodeId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Random per-proposal nonce.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Nonce([u8; 16]);

impl Nonce {
    /// Generate a fresh random nonce.
    pub fn new() -> Self {
        Self(*uuid::Uuid::new_v4().as_bytes())
    }

    /// Create from raw bytes.
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl Default for Nonce {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Nonce({})", hex::encode(self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tx_id_short() {
        let id = TxId::new("0123456789abcdef0123");
        assert_eq!(id.short(), "0123456789ab");
        assert_eq!(TxId::new("abc").short(), "abc");
    }

    #[test]
    fn test_chaincode_display() {
        assert_eq!(ChaincodeId::new("account").to_string(), "account");
        assert_eq!(
            ChaincodeId::new("account").with_version("1.0").to_string(),
            "account:1.0"
        );
    }

    #[test]
    fn test_nonces_differ() {
        assert_ne!(Nonce::new(), Nonce::new());
    }
}
