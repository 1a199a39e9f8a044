//! Persisted identity record schema.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use ledgerlink_common::{EnrollmentMaterial, Identity, LedgerError, Result};

/// Current record schema version.
pub const RECORD_VERSION: u32 = 1;

/// Hex-encoded enrollment material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentRecord {
    /// Certificate, hex.
    pub certificate: String,
    /// Private key, hex.
    pub private_key: String,
}

/// Self-describing on-disk form of an [`Identity`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityRecord {
    /// Schema version.
    pub version: u32,
    pub name: String,
    pub affiliation: String,
    pub msp_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    /// Absent means the role set was never set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roles: Option<BTreeSet<String>>,
    pub enrolled_at: DateTime<Utc>,
    pub enrollment: EnrollmentRecord,
}

impl IdentityRecord {
    /// Capture an identity.
    pub fn from_identity(identity: &Identity) -> Self {
        Self {
            version: RECORD_VERSION,
            name: identity.name().to_string(),
            affiliation: identity.affiliation().to_string(),
            msp_id: identity.msp_id().to_string(),
            account: identity.account().map(str::to_string),
            roles: identity.roles().cloned(),
            enrolled_at: identity.enrolled_at(),
            enrollment: EnrollmentRecord {
                certificate: hex::encode(identity.enrollment().certificate()),
                private_key: hex::encode(identity.enrollment().private_key()),
            },
        }
    }

    /// Rebuild the identity.
    pub fn into_identity(self) -> Result<Identity> {
        if self.version != RECORD_VERSION {
            return Err(LedgerError::SerializationError(format!(
                "Unsupported identity record version {} for {}",
                self.version, self.name
            )));
        }

        let certificate = hex::decode(&self.enrollment.certificate).map_err(|e| {
            LedgerError::SerializationError(format!("Bad certificate encoding for {}: {}", self.name, e))
        })?;
        let private_key = hex::decode(&self.enrollment.private_key).map_err(|e| {
            LedgerError::SerializationError(format!("Bad key encoding for {}: {}", self.name, e))
        })?;

        let mut identity = Identity::new(
            self.name,
            self.affiliation,
            self.msp_id,
            EnrollmentMaterial::new(certificate, private_key),
        )
        .with_enrolled_at(self.enrolled_at);

        if let Some(account) = self.account {
            identity = identity.with_account(account);
        }
        if let Some(roles) = self.roles {
            identity = identity.with_roles(roles);
        }

        Ok(identity)
    }

    /// Encode as pretty JSON.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// Decode and check the record belongs to `expected_name`.
    pub fn from_json(bytes: &[u8], expected_name: &str) -> Result<Self> {
        let record: IdentityRecord = serde_json::from_slice(bytes)?;
        if record.name != expected_name {
            return Err(LedgerError::SerializationError(format!(
                "Record for {} stored under {}",
                record.name, expected_name
            )));
        }
        Ok(record)
    }
}
