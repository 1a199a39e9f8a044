//! Ed25519 signing for credentials and endorsements.

use ed25519_dalek::{
    Signer, SigningKey as Ed25519SigningKey, Verifier, VerifyingKey as Ed25519VerifyingKey,
};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

use crate::{CryptoError, Result};

fn key_id_of(public: &[u8; 32]) -> String {
    hex::encode(&public[..8])
}

/// A signing key (private key) for creating signatures.
pub struct SigningKey {
    inner: Ed25519SigningKey,
    key_id: String,
}

impl SigningKey {
    /// Generate a new random signing key.
    pub fn generate() -> Self {
        let inner = Ed25519SigningKey::generate(&mut OsRng);
        let key_id = key_id_of(inner.verifying_key().as_bytes());
        Self { inner, key_id }
    }

    /// Derive a key deterministically from a 32-byte seed.
    pub fn from_seed(seed: [u8; 32]) -> Self {
        let inner = Ed25519SigningKey::from_bytes(&seed);
        let key_id = key_id_of(inner.verifying_key().as_bytes());
        Self { inner, key_id }
    }

    /// Create from raw bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let seed: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidKey(format!("expected 32 bytes, got {}", bytes.len())))?;
        Ok(Self::from_seed(seed))
    }

    /// Get the corresponding verifying key.
    pub fn verifying_key(&self) -> VerifyingKey {
        VerifyingKey {
            inner: self.inner.verifying_key(),
            key_id: self.key_id.clone(),
        }
    }

    /// Get the key ID.
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Sign a message.
    pub fn sign(&self, message: &[u8]) -> Signature {
        let sig = self.inner.sign(message);
        Signature {
            bytes: sig.to_bytes().to_vec(),
            key_id: self.key_id.clone(),
        }
    }

    /// Get raw key bytes.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.inner.to_bytes()
    }
}

/// A verifying key (public key) for verifying signatures.
#[derive(Clone, Debug)]
pub struct VerifyingKey {
    inner: Ed25519VerifyingKey,
    key_id: String,
}

impl VerifyingKey {
    /// Create from raw bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidKey("Invalid key length".to_string()))?;

        let inner = Ed25519VerifyingKey::from_bytes(&bytes)
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;

        Ok(Self {
            inner,
            key_id: key_id_of(&bytes),
        })
    }

    /// Get the key ID.
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Verify a signature.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> Result<()> {
        let sig_bytes: [u8; 64] = signature
            .bytes
            .as_slice()
            .try_into()
            .map_err(|_| CryptoError::InvalidSignature)?;

        let sig = ed25519_dalek::Signature::from_bytes(&sig_bytes);

        self.inner
            .verify(message, &sig)
            .map_err(|_| CryptoError::InvalidSignature)
    }

    /// Get raw key bytes.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.inner.to_bytes()
    }
}

/// A detached Ed25519 signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// Raw signature bytes.
    pub bytes: Vec<u8>,
    /// ID of the key that created this signature.
    pub key_id: String,
}

impl Signature {
    /// Get signature as hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }

    /// Create from hex string.
    pub fn from_hex(hex_str: &str, key_id: impl Into<String>) -> Result<Self> {
        let bytes = hex::decode(hex_str).map_err(|_| CryptoError::InvalidSignature)?;

        Ok(Self {
            bytes,
            key_id: key_id.into(),
        })
    }
}
