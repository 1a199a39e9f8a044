//! Certificate authority collaborator contract.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use ledgerlink_common::{EnrollmentMaterial, Identity, Result};

/// One-time secret handed out by registration and consumed by enrollment.
#[derive(Clone, PartialEq, Eq)]
pub struct EnrollmentSecret(String);

impl EnrollmentSecret {
    /// Wrap a secret.
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Expose the secret to the CA transport.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for EnrollmentSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EnrollmentSecret(<redacted>)")
    }
}

/// Attribute embedded into an issued certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub value: String,
    /// Whether enrollment puts it into the certificate by default.
    pub ecert: bool,
}

/// Registration of a new identity with the CA.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationRequest {
    /// Name the identity will enroll under.
    pub enrollment_id: String,
    /// Affiliation, e.g. `org1`.
    pub affiliation: String,
    /// Identity type, `client` unless stated otherwise.
    pub identity_type: String,
    /// How many times the secret may be used. `None` leaves it to the CA.
    pub max_enrollments: Option<u32>,
    /// Extra certificate attributes.
    pub attributes: Vec<Attribute>,
}

impl RegistrationRequest {
    /// Create a client registration.
    pub fn new(enrollment_id: impl Into<String>, affiliation: impl Into<String>) -> Self {
        Self {
            enrollment_id: enrollment_id.into(),
            affiliation: affiliation.into(),
            identity_type: "client".to_string(),
            max_enrollments: None,
            attributes: Vec::new(),
        }
    }

    /// Set the identity type.
    pub fn with_type(mut self, identity_type: impl Into<String>) -> Self {
        self.identity_type = identity_type.into();
        self
    }

    /// Limit how often the secret may be used.
    pub fn with_max_enrollments(mut self, max: u32) -> Self {
        self.max_enrollments = Some(max);
        self
    }

    /// Add a certificate attribute.
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push(Attribute {
            name: name.into(),
            value: value.into(),
            ecert: true,
        });
        self
    }
}

/// Client of a certificate authority.
///
/// Implementations own transport, retries and the crypto suite; errors come
/// back as `NetworkError` or `AuthorizationError` and are propagated as-is.
#[async_trait]
pub trait CertificateAuthority: Send + Sync {
    /// Endpoint of the CA.
    fn url(&self) -> &str;

    /// Exchange a secret for enrollment material.
    async fn enroll(&self, name: &str, secret: &EnrollmentSecret) -> Result<EnrollmentMaterial>;

    /// Register a new identity, authorized by `registrar`.
    async fn register(
        &self,
        request: &RegistrationRequest,
        registrar: &Identity,
    ) -> Result<EnrollmentSecret>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_debug_redacted() {
        let secret = EnrollmentSecret::new("hunter2");
        assert!(!format!("{:?}", secret).contains("hunter2"));
        assert_eq!(secret.expose(), "hunter2");
    }

    #[test]
    fn test_registration_builder() {
        let request = RegistrationRequest::new("wesker", "org1")
            .with_max_enrollments(1)
            .with_attribute("role", "auditor");
        assert_eq!(request.identity_type, "client");
        assert_eq!(request.max_enrollments, Some(1));
        assert_eq!(request.attributes.len(), 1);
        assert!(request.attributes[0].ecert);
    }
}
