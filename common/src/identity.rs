//! Enrolled identity types.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Signed credential issued by the certificate authority.
///
/// Both fields are opaque to this crate; the cryptographic suite that
/// produced them is the only thing that interprets them.
#[derive(Clone, PartialEq, Eq)]
pub struct EnrollmentMaterial {
    certificate: Vec<u8>,
    private_key: Vec<u8>,
}

impl EnrollmentMaterial {
    /// Create enrollment material from a certificate and its private key.
    pub fn new(certificate: Vec<u8>, private_key: Vec<u8>) -> Self {
        Self {
            certificate,
            private_key,
        }
    }

    /// The certificate bytes.
    pub fn certificate(&self) -> &[u8] {
        &self.certificate
    }

    /// The private key bytes.
    pub fn private_key(&self) -> &[u8] {
        &self.private_key
    }
}

impl fmt::Debug for EnrollmentMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnrollmentMaterial")
            .field("certificate_len", &self.certificate.len())
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// Serialized creator attached to every proposal: who is asking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Creator {
    /// Membership service provider of the creator.
    pub msp_id: String,
    /// Creator certificate.
    pub certificate: Vec<u8>,
}

impl Creator {
    /// Deterministic byte form used for transaction id derivation.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.msp_id.len() + self.certificate.len() + 1);
        bytes.extend_from_slice(self.msp_id.as_bytes());
        bytes.push(0);
        bytes.extend_from_slice(&self.certificate);
        bytes
    }
}

/// An enrolled ledger identity.
///
/// Immutable once constructed: there are no setters, and a new enrollment
/// for the same name always produces a new value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    name: String,
    affiliation: String,
    msp_id: String,
    account: Option<String>,
    roles: Option<BTreeSet<String>>,
    enrollment: EnrollmentMaterial,
    enrolled_at: DateTime<Utc>,
}

impl Identity {
    /// Create a freshly enrolled identity.
    pub fn new(
        name: impl Into<String>,
        affiliation: impl Into<String>,
        msp_id: impl Into<String>,
        enrollment: EnrollmentMaterial,
    ) -> Self {
        Self {
            name: name.into(),
            affiliation: affiliation.into(),
            msp_id: msp_id.into(),
            account: None,
            roles: None,
            enrollment,
            enrolled_at: Utc::now(),
        }
    }

    /// Set the account. Only usable while building the value.
    pub fn with_account(mut self, account: impl Into<String>) -> Self {
        self.account = Some(account.into());
        self
    }

    /// Set the role set. Only usable while building the value.
    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = Some(roles.into_iter().map(Into::into).collect());
        self
    }

    /// Override the enrollment timestamp. Used when reconstructing a
    /// persisted identity.
    pub fn with_enrolled_at(mut self, enrolled_at: DateTime<Utc>) -> Self {
        self.enrolled_at = enrolled_at;
        self
    }

    /// Identity name (unique key).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Affiliation within the organization.
    pub fn affiliation(&self) -> &str {
        &self.affiliation
    }

    /// Membership service provider id.
    pub fn msp_id(&self) -> &str {
        &self.msp_id
    }

    /// Account, if any.
    pub fn account(&self) -> Option<&str> {
        self.account.as_deref()
    }

    /// Role set. `None` means unset, which is distinct from empty.
    pub fn roles(&self) -> Option<&BTreeSet<String>> {
        self.roles.as_ref()
    }

    /// Enrollment material.
    pub fn enrollment(&self) -> &EnrollmentMaterial {
        &self.enrollment
    }

    /// When the certificate authority issued the enrollment.
    pub fn enrolled_at(&self) -> DateTime<Utc> {
        self.enrolled_at
    }

    /// The creator this identity presents on proposals.
    pub fn creator(&self) -> Creator {
        Creator {
            msp_id: self.msp_id.clone(),
            certificate: self.enrollment.certificate.clone(),
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{} ({})", self.name, self.msp_id, self.affiliation)
    }
}
