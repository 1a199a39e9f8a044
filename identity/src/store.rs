//! Durable identity cache.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use ledgerlink_common::{Identity, LedgerError, Result};

use crate::record::IdentityRecord;

/// Storage for enrolled identities, keyed by identity name.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Load the identity stored under `name`.
    ///
    /// `Ok(None)` is the cache-miss signal, not a failure.
    async fn load(&self, name: &str) -> Result<Option<Identity>>;

    /// Persist an identity under its own name, replacing any previous record.
    ///
    /// A subsequent `load` observes either the old record or the new one,
    /// never a partial write.
    async fn save(&self, identity: &Identity) -> Result<()>;

    /// Delete the record for `name`. Returns whether one existed.
    async fn remove(&self, name: &str) -> Result<bool>;

    /// Check whether a record exists for `name`.
    async fn contains(&self, name: &str) -> Result<bool> {
        Ok(self.load(name).await?.is_some())
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(LedgerError::ConfigurationError(
            "Identity name cannot be empty".to_string(),
        ));
    }

    if name.len() > 255 {
        return Err(LedgerError::ConfigurationError(
            "Identity name too long (max 255 characters)".to_string(),
        ));
    }

    if name.contains("..") || name.contains('\0') || name.contains('/') || name.contains('\\') {
        return Err(LedgerError::ConfigurationError(format!(
            "Identity name contains invalid characters: {:?}",
            name
        )));
    }

    Ok(())
}

/// One JSON file per identity in a directory.
pub struct FileIdentityStore {
    dir: PathBuf,
}

const RECORD_SUFFIX: &str = ".identity.json";

impl FileIdentityStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await.map_err(|e| {
            LedgerError::IoError(format!("Failed to create identity directory {:?}: {}", dir, e))
        })?;
        Ok(Self { dir })
    }

    /// Directory backing this store.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}{}", name, RECORD_SUFFIX))
    }

    fn temp_path(&self, name: &str) -> PathBuf {
        self.dir
            .join(format!(".{}{}.{}.tmp", name, RECORD_SUFFIX, uuid::Uuid::new_v4()))
    }
}

/// Removes the temp file unless the write was committed by a rename.
struct TempFileGuard {
    path: PathBuf,
    committed: bool,
}

impl TempFileGuard {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            committed: false,
        }
    }

    fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if !self.committed {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

#[async_trait]
impl IdentityStore for FileIdentityStore {
    async fn load(&self, name: &str) -> Result<Option<Identity>> {
        validate_name(name)?;
        let path = self.record_path(name);

        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(identity = %name, "Identity cache miss");
                return Ok(None);
            }
            Err(e) => {
                return Err(LedgerError::IoError(format!("Failed to read {:?}: {}", path, e)));
            }
        };

        debug!(identity = %name, "Identity cache hit");
        let identity = IdentityRecord::from_json(&bytes, name)?.into_identity()?;
        Ok(Some(identity))
    }

    async fn save(&self, identity: &Identity) -> Result<()> {
        validate_name(identity.name())?;
        let bytes = IdentityRecord::from_identity(identity).to_json()?;

        let target = self.record_path(identity.name());
        let guard = TempFileGuard::new(self.temp_path(identity.name()));

        let mut file = fs::File::create(&guard.path).await.map_err(|e| {
            LedgerError::IoError(format!("Failed to create temp file: {}", e))
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&guard.path, std::fs::Permissions::from_mode(0o600))
                .await
                .map_err(|e| LedgerError::IoError(format!("Failed to set permissions: {}", e)))?;
        }

        file.write_all(&bytes)
            .await
            .map_err(|e| LedgerError::IoError(format!("Failed to write record: {}", e)))?;
        file.sync_all()
            .await
            .map_err(|e| LedgerError::IoError(format!("Failed to sync record: {}", e)))?;
        drop(file);

        fs::rename(&guard.path, &target)
            .await
            .map_err(|e| LedgerError::IoError(format!("Failed to commit record: {}", e)))?;
        guard.commit();

        debug!(identity = %identity.name(), path = ?target, "Identity persisted");
        Ok(())
    }

    async fn remove(&self, name: &str) -> Result<bool> {
        validate_name(name)?;
        match fs::remove_file(self.record_path(name)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory store holding serialized records.
///
/// Records go through the same encoding as the file store so a round trip
/// through either behaves identically.
#[derive(Default)]
pub struct MemoryIdentityStore {
    records: DashMap<String, Vec<u8>>,
}

impl MemoryIdentityStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored identities.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn load(&self, name: &str) -> Result<Option<Identity>> {
        validate_name(name)?;
        match self.records.get(name) {
            Some(bytes) => Ok(Some(IdentityRecord::from_json(&bytes, name)?.into_identity()?)),
            None => Ok(None),
        }
    }

    async fn save(&self, identity: &Identity) -> Result<()> {
        validate_name(identity.name())?;
        let bytes = IdentityRecord::from_identity(identity).to_json()?;
        self.records.insert(identity.name().to_string(), bytes);
        Ok(())
    }

    async fn remove(&self, name: &str) -> Result<bool> {
        validate_name(name)?;
        Ok(self.records.remove(name).is_some())
    }
}
