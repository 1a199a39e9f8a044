//! Get-or-create identity enrollment.

use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

use ledgerlink_common::{Identity, LedgerError, Result};

use crate::authority::{CertificateAuthority, EnrollmentSecret, RegistrationRequest};
use crate::config::IdentityConfig;
use crate::store::IdentityStore;

/// Produces enrolled identities, consulting the store before the CA.
///
/// Enrollment is a rate-limited remote call, so each name is enrolled at
/// most once per store: a cached record always wins, and concurrent callers
/// asking for the same name wait for the first one instead of enrolling
/// again.
pub struct IdentityProvider {
    ca: Arc<dyn CertificateAuthority>,
    store: Arc<dyn IdentityStore>,
    config: IdentityConfig,
    inflight: DashMap<String, Arc<Mutex<()>>>,
}

impl IdentityProvider {
    /// Create a new provider.
    pub fn new(
        ca: Arc<dyn CertificateAuthority>,
        store: Arc<dyn IdentityStore>,
        config: IdentityConfig,
    ) -> Self {
        Self {
            ca,
            store,
            config,
            inflight: DashMap::new(),
        }
    }

    /// Configuration in use.
    pub fn config(&self) -> &IdentityConfig {
        &self.config
    }

    /// Endpoint of the underlying CA.
    pub fn ca_url(&self) -> &str {
        self.ca.url()
    }

    /// Load or enroll the bootstrap admin identity.
    #[instrument(skip(self), fields(ca = %self.ca.url()))]
    pub async fn enroll_admin(&self) -> Result<Identity> {
        let name = self.config.admin_name.as_str();

        self.get_or_create(name, || async move {
            let secret = EnrollmentSecret::new(self.config.admin_secret.clone());
            let material = self.ca.enroll(name, &secret).await?;
            Ok(Identity::new(
                name,
                self.config.affiliation.clone(),
                self.config.msp_id.clone(),
                material,
            ))
        })
        .await
    }

    /// Load or register-then-enroll a user, authorized by `registrar`.
    #[instrument(skip(self, registrar), fields(ca = %self.ca.url(), registrar = %registrar.name()))]
    pub async fn register_and_enroll(
        &self,
        registrar: &Identity,
        name: &str,
        affiliation: &str,
    ) -> Result<Identity> {
        self.get_or_create(name, || async move {
            let request = RegistrationRequest::new(name, affiliation);
            let secret = self.ca.register(&request, registrar).await?;
            let material = self.ca.enroll(name, &secret).await?;
            Ok(Identity::new(
                name,
                affiliation,
                self.config.msp_id.clone(),
                material,
            ))
        })
        .await
    }

    /// Load a cached identity without contacting the CA.
    pub async fn load(&self, name: &str) -> Result<Identity> {
        self.store
            .load(name)
            .await?
            .ok_or_else(|| LedgerError::IdentityNotFound(name.to_string()))
    }

    async fn get_or_create<F, Fut>(&self, name: &str, create: F) -> Result<Identity>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Identity>>,
    {
        if let Some(identity) = self.store.load(name).await? {
            info!(identity = %name, "Loaded cached identity");
            return Ok(identity);
        }

        let lock = self.inflight.entry(name.to_string()).or_default().clone();
        let _guard = lock.lock().await;

        // Another caller may have enrolled while we waited.
        if let Some(identity) = self.store.load(name).await? {
            info!(identity = %name, "Loaded identity enrolled by concurrent caller");
            return Ok(identity);
        }

        info!(identity = %name, "Identity not cached, enrolling with CA");
        let identity = create().await.map_err(|e| {
            warn!(identity = %name, error = %e, "Enrollment failed");
            e
        })?;

        self.store.save(&identity).await?;
        info!(identity = %name, msp_id = %identity.msp_id(), "Identity enrolled and cached");

        Ok(identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use ledgerlink_common::EnrollmentMaterial;

    use crate::store::{FileIdentityStore, MemoryIdentityStore};

    #[derive(Default)]
    struct MockCa {
        enrolls: AtomicUsize,
        registers: AtomicUsize,
        fail_enroll: bool,
        fail_register: bool,
    }

    #[async_trait]
    impl CertificateAuthority for MockCa {
        fn url(&self) -> &str {
            "http://ca.test:7054"
        }

        async fn enroll(&self, name: &str, secret: &EnrollmentSecret) -> Result<EnrollmentMaterial> {
            tokio::task::yield_now().await;
            self.enrolls.fetch_add(1, Ordering::SeqCst);
            if self.fail_enroll {
                return Err(LedgerError::NetworkError("ca unreachable".to_string()));
            }
            Ok(EnrollmentMaterial::new(
                format!("cert:{}:{}", name, secret.expose()).into_bytes(),
                vec![1; 32],
            ))
        }

        async fn register(
            &self,
            request: &RegistrationRequest,
            registrar: &Identity,
        ) -> Result<EnrollmentSecret> {
            self.registers.fetch_add(1, Ordering::SeqCst);
            if self.fail_register {
                return Err(LedgerError::AuthorizationError(format!(
                    "{} may not register",
                    registrar.name()
                )));
            }
            Ok(EnrollmentSecret::new(format!("otp-{}", request.enrollment_id)))
        }
    }

    fn provider(ca: Arc<MockCa>, store: Arc<dyn IdentityStore>) -> IdentityProvider {
        IdentityProvider::new(ca, store, IdentityConfig::default())
    }

    #[tokio::test]
    async fn test_enroll_admin_on_empty_store() {
        let ca = Arc::new(MockCa::default());
        let store = Arc::new(MemoryIdentityStore::new());
        let provider = provider(ca.clone(), store.clone());

        let admin = provider.enroll_admin().await.unwrap();

        assert_eq!(admin.name(), "admin");
        assert_eq!(admin.enrollment().certificate(), b"cert:admin:adminpw");
        assert_eq!(admin.msp_id(), "Org1MSP");
        assert_eq!(store.load("admin").await.unwrap(), Some(admin));
    }

    #[tokio::test]
    async fn test_second_call_hits_cache() {
        let ca = Arc::new(MockCa::default());
        let provider = provider(ca.clone(), Arc::new(MemoryIdentityStore::new()));

        let first = provider.enroll_admin().await.unwrap();
        let second = provider.enroll_admin().await.unwrap();

        assert_eq!(first, second);
        assert_eq!(ca.enrolls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cache_survives_new_provider_on_same_files() {
        let dir = tempfile::tempdir().unwrap();
        let ca = Arc::new(MockCa::default());

        let first = {
            let store = Arc::new(FileIdentityStore::open(dir.path()).await.unwrap());
            provider(ca.clone(), store).enroll_admin().await.unwrap()
        };

        let store = Arc::new(FileIdentityStore::open(dir.path()).await.unwrap());
        let second = provider(ca.clone(), store).enroll_admin().await.unwrap();

        assert_eq!(first, second);
        assert_eq!(ca.enrolls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_register_and_enroll_user() {
        let ca = Arc::new(MockCa::default());
        let provider = provider(ca.clone(), Arc::new(MemoryIdentityStore::new()));
        let admin = provider.enroll_admin().await.unwrap();

        let user = provider
            .register_and_enroll(&admin, "wesker", "org1")
            .await
            .unwrap();
        assert_eq!(user.enrollment().certificate(), b"cert:wesker:otp-wesker");

        let again = provider
            .register_and_enroll(&admin, "wesker", "org1")
            .await
            .unwrap();
        assert_eq!(user, again);
        assert_eq!(ca.registers.load(Ordering::SeqCst), 1);
        assert_eq!(ca.enrolls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_enroll_persists_nothing() {
        let ca = Arc::new(MockCa {
            fail_enroll: true,
            ..Default::default()
        });
        let store = Arc::new(MemoryIdentityStore::new());
        let provider = provider(ca, store.clone());

        let err = provider.enroll_admin().await.unwrap_err();
        assert!(matches!(err, LedgerError::NetworkError(_)));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_failed_register_propagates_verbatim() {
        let ca = Arc::new(MockCa {
            fail_register: true,
            ..Default::default()
        });
        let store = Arc::new(MemoryIdentityStore::new());
        let provider = provider(ca.clone(), store.clone());
        let admin = provider.enroll_admin().await.unwrap();

        let err = provider
            .register_and_enroll(&admin, "wesker", "org1")
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::AuthorizationError(_)));
        assert!(store.load("wesker").await.unwrap().is_none());
        assert_eq!(ca.enrolls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_callers_enroll_once() {
        let ca = Arc::new(MockCa::default());
        let provider = provider(ca.clone(), Arc::new(MemoryIdentityStore::new()));

        let (a, b, c) = tokio::join!(
            provider.enroll_admin(),
            provider.enroll_admin(),
            provider.enroll_admin()
        );

        assert_eq!(a.unwrap(), b.unwrap());
        assert!(c.is_ok());
        assert_eq!(ca.enrolls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_load_without_enrollment() {
        let ca = Arc::new(MockCa::default());
        let provider = provider(ca.clone(), Arc::new(MemoryIdentityStore::new()));

        assert!(provider.load("admin").await.unwrap_err().is_not_found());
        assert_eq!(ca.enrolls.load(Ordering::SeqCst), 0);
    }
}
