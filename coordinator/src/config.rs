//! Coordinator configuration.

use std::time::Duration;

/// Timeouts governing one coordinator operation.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// How long a single peer may take to answer a proposal.
    pub peer_timeout: Duration,
    /// Deadline for the whole endorsement fan-out.
    pub operation_timeout: Duration,
    /// How long to wait for an orderer acknowledgment.
    pub orderer_timeout: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            peer_timeout: Duration::from_secs(5),
            operation_timeout: Duration::from_secs(10),
            orderer_timeout: Duration::from_secs(5),
        }
    }
}

fn millis_from_env(key: &str) -> Option<Duration> {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_millis)
}

impl CoordinatorConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(timeout) = millis_from_env("LEDGER_PEER_TIMEOUT_MS") {
            config.peer_timeout = timeout;
        }

        if let Some(timeout) = millis_from_env("LEDGER_OPERATION_TIMEOUT_MS") {
            config.operation_timeout = timeout;
        }

        if let Some(timeout) = millis_from_env("LEDGER_ORDERER_TIMEOUT_MS") {
            config.orderer_timeout = timeout;
        }

        config
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.peer_timeout.is_zero() {
            return Err("Peer timeout cannot be zero".to_string());
        }

        if self.operation_timeout.is_zero() {
            return Err("Operation timeout cannot be zero".to_string());
        }

        if self.orderer_timeout.is_zero() {
            return Err("Orderer timeout cannot be zero".to_string());
        }

        if self.peer_timeout > self.operation_timeout {
            return Err("Peer timeout cannot exceed operation timeout".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CoordinatorConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_config() {
        let mut config = CoordinatorConfig::default();
        config.peer_timeout = Duration::from_secs(30);
        assert!(config.validate().is_err());

        config.peer_timeout = Duration::ZERO;
        assert!(config.validate().is_err());
    }
}
