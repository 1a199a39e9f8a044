//! LedgerLink Identity
//!
//! Enrollment and caching of ledger identities.
//!
//! # Features
//!
//! - Durable identity cache with atomic writes
//! - Get-or-create enrollment against a certificate authority
//! - At most one enrollment per identity name per store
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ledgerlink_identity::{FileIdentityStore, IdentityConfig, IdentityProvider};
//!
//! let store = Arc::new(FileIdentityStore::open("./identities").await?);
//! let provider = IdentityProvider::new(ca, store, IdentityConfig::default());
//!
//! let admin = provider.enroll_admin().await?;
//! let user = provider.register_and_enroll(&admin, "wesker", "org1").await?;
//! ```

pub mod authority;
pub mod config;
pub mod provider;
pub mod record;
pub mod store;

pub use authority::{Attribute, CertificateAuthority, EnrollmentSecret, RegistrationRequest};
pub use config::IdentityConfig;
pub use provider::IdentityProvider;
pub use record::IdentityRecord;
pub use store::{FileIdentityStore, IdentityStore, MemoryIdentityStore};
