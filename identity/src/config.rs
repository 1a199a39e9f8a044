//! Identity configuration.

use std::path::PathBuf;

/// Configuration for enrollment and the identity cache.
#[derive(Debug, Clone)]
pub struct IdentityConfig {
    /// Directory holding persisted identity records.
    pub store_dir: PathBuf,
    /// Name of the bootstrap admin identity.
    pub admin_name: String,
    /// Bootstrap enrollment secret of the admin.
    pub admin_secret: String,
    /// Affiliation assigned to enrolled identities.
    pub affiliation: String,
    /// Membership service provider of this organization.
    pub msp_id: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            store_dir: PathBuf::from("./identities"),
            admin_name: "admin".to_string(),
            admin_secret: "adminpw".to_string(),
            affiliation: "org1".to_string(),
            msp_id: "Org1MSP".to_string(),
        }
    }
}

impl IdentityConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("LEDGER_IDENTITY_DIR") {
            config.store_dir = PathBuf::from(dir);
        }

        if let Ok(name) = std::env::var("LEDGER_ADMIN_NAME") {
            config.admin_name = name;
        }

        if let Ok(secret) = std::env::var("LEDGER_ADMIN_SECRET") {
            config.admin_secret = secret;
        }

        if let Ok(affiliation) = std::env::var("LEDGER_AFFILIATION") {
            config.affiliation = affiliation;
        }

        if let Ok(msp_id) = std::env::var("LEDGER_MSP_ID") {
            config.msp_id = msp_id;
        }

        config
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.admin_name.is_empty() {
            return Err("Admin name cannot be empty".to_string());
        }

        if self.admin_secret.is_empty() {
            return Err("Admin secret cannot be empty".to_string());
        }

        if self.msp_id.is_empty() {
            return Err("MSP id cannot be empty".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = IdentityConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.admin_name, "admin");
        assert_eq!(config.msp_id, "Org1MSP");
    }

    #[test]
    fn test_invalid_config() {
        let mut config = IdentityConfig::default();
        config.msp_id.clear();
        assert!(config.validate().is_err());
    }
}
