//! Simulated certificate authority.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use ledgerlink_common::{EnrollmentMaterial, Identity, LedgerError, Result};
use ledgerlink_crypto::{Signature, SigningKey, VerifyingKey};
use ledgerlink_identity::{CertificateAuthority, EnrollmentSecret, RegistrationRequest};

/// Credential issued by the simulated CA, JSON-encoded as the certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub subject: String,
    pub affiliation: String,
    pub public_key: String,
    pub issuer: String,
    pub serial: u64,
    pub issued_at: DateTime<Utc>,
    pub signature: String,
}

impl Credential {
    fn signed_bytes(&self) -> Vec<u8> {
        format!(
            "{}|{}|{}|{}|{}",
            self.subject, self.affiliation, self.public_key, self.issuer, self.serial
        )
        .into_bytes()
    }

    /// Decode a certificate.
    pub fn parse(certificate: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(certificate)?)
    }
}

/// In-process CA with a bootstrap admin and one-time registration secrets.
pub struct SimulatedCa {
    url: String,
    key: SigningKey,
    admin_name: String,
    admin_secret: String,
    /// Outstanding one-time secrets by enrollment id.
    secrets: DashMap<String, String>,
    /// Registered identities and their affiliation.
    registered: DashMap<String, String>,
    rng: Mutex<StdRng>,
    serial: AtomicU64,
    enrolls: AtomicUsize,
    registers: AtomicUsize,
}

impl SimulatedCa {
    /// Create a CA that accepts `admin_name`/`admin_secret` as bootstrap.
    pub fn new(
        url: impl Into<String>,
        admin_name: impl Into<String>,
        admin_secret: impl Into<String>,
        seed: Option<u64>,
    ) -> Self {
        let mut rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        let key = SigningKey::from_seed(rng.gen());

        Self {
            url: url.into(),
            key,
            admin_name: admin_name.into(),
            admin_secret: admin_secret.into(),
            secrets: DashMap::new(),
            registered: DashMap::new(),
            rng: Mutex::new(rng),
            serial: AtomicU64::new(1),
            enrolls: AtomicUsize::new(0),
            registers: AtomicUsize::new(0),
        }
    }

    /// Number of enroll calls served, successful or not.
    pub fn enroll_count(&self) -> usize {
        self.enrolls.load(Ordering::SeqCst)
    }

    /// Number of register calls served.
    pub fn register_count(&self) -> usize {
        self.registers.load(Ordering::SeqCst)
    }

    /// Key that signs issued credentials.
    pub fn verifying_key(&self) -> VerifyingKey {
        self.key.verifying_key()
    }

    /// Check that a certificate was issued by this CA.
    pub fn verify(&self, certificate: &[u8]) -> bool {
        let Ok(credential) = Credential::parse(certificate) else {
            return false;
        };
        let Ok(signature) = Signature::from_hex(&credential.signature, self.key.key_id()) else {
            return false;
        };
        self.key
            .verifying_key()
            .verify(&credential.signed_bytes(), &signature)
            .is_ok()
    }

    fn issue(&self, subject: &str, affiliation: &str) -> Result<EnrollmentMaterial> {
        let holder = SigningKey::from_seed(self.rng.lock().gen());

        let mut credential = Credential {
            subject: subject.to_string(),
            affiliation: affiliation.to_string(),
            public_key: hex::encode(holder.verifying_key().to_bytes()),
            issuer: self.url.clone(),
            serial: self.serial.fetch_add(1, Ordering::SeqCst),
            issued_at: Utc::now(),
            signature: String::new(),
        };
        credential.signature = self.key.sign(&credential.signed_bytes()).to_hex();

        Ok(EnrollmentMaterial::new(
            serde_json::to_vec(&credential)?,
            holder.to_bytes().to_vec(),
        ))
    }
}

#[async_trait]
impl CertificateAuthority for SimulatedCa {
    fn url(&self) -> &str {
        &self.url
    }

    async fn enroll(&self, name: &str, secret: &EnrollmentSecret) -> Result<EnrollmentMaterial> {
        self.enrolls.fetch_add(1, Ordering::SeqCst);

        let affiliation = if name == self.admin_name {
            (secret.expose() == self.admin_secret).then(String::new)
        } else {
            self.secrets
                .remove_if(name, |_, expected| expected == secret.expose())
                .and_then(|_| self.registered.get(name).map(|a| a.clone()))
        };

        let Some(affiliation) = affiliation else {
            warn!(identity = %name, "Enrollment refused");
            return Err(LedgerError::AuthorizationError(format!(
                "Invalid enrollment secret for {}",
                name
            )));
        };

        debug!(identity = %name, "Issuing credential");
        self.issue(name, &affiliation)
    }

    async fn register(
        &self,
        request: &RegistrationRequest,
        registrar: &Identity,
    ) -> Result<EnrollmentSecret> {
        self.registers.fetch_add(1, Ordering::SeqCst);

        if registrar.name() != self.admin_name || !self.verify(registrar.enrollment().certificate()) {
            return Err(LedgerError::AuthorizationError(format!(
                "{} is not a registrar",
                registrar.name()
            )));
        }

        if self.registered.contains_key(&request.enrollment_id) {
            return Err(LedgerError::AuthorizationError(format!(
                "Identity {} is already registered",
                request.enrollment_id
            )));
        }

        let secret = hex::encode(self.rng.lock().gen::<[u8; 12]>());
        self.registered
            .insert(request.enrollment_id.clone(), request.affiliation.clone());
        self.secrets
            .insert(request.enrollment_id.clone(), secret.clone());

        Ok(EnrollmentSecret::new(secret))
    }
}
