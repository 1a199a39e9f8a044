//! Client configuration.

use tracing::warn;

use ledgerlink_coordinator::{CoordinatorConfig, EndpointSpec};
use ledgerlink_identity::IdentityConfig;

/// Configuration for the client gateway.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Certificate authority endpoint.
    pub ca_url: String,
    /// Channel to join.
    pub channel: String,
    /// Endorsing peers.
    pub peers: Vec<EndpointSpec>,
    /// Ordering service nodes.
    pub orderers: Vec<EndpointSpec>,
    /// Chaincode targeted by `invoke` and `query`.
    pub chaincode: String,
    /// User identity transactions are submitted as.
    pub user_name: String,
    /// Enrollment and identity cache settings.
    pub identity: IdentityConfig,
    /// Protocol timeouts.
    pub coordinator: CoordinatorConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            ca_url: "http://localhost:7054".to_string(),
            channel: "mychannel".to_string(),
            peers: vec![EndpointSpec::new("peer0", "grpc://localhost:7051")],
            orderers: vec![EndpointSpec::new("orderer0", "grpc://localhost:7050")],
            chaincode: "account".to_string(),
            user_name: "wesker".to_string(),
            identity: IdentityConfig::default(),
            coordinator: CoordinatorConfig::default(),
        }
    }
}

fn endpoints_from_env(key: &str, prefix: &str) -> Option<Vec<EndpointSpec>> {
    let raw = std::env::var(key).ok()?;
    match EndpointSpec::parse_list(&raw, prefix) {
        Ok(specs) => Some(specs),
        Err(e) => {
            warn!(variable = key, error = %e, "Ignoring malformed endpoint list");
            None
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self {
            identity: IdentityConfig::from_env(),
            coordinator: CoordinatorConfig::from_env(),
            ..Self::default()
        };

        if let Ok(url) = std::env::var("LEDGER_CA_URL") {
            config.ca_url = url;
        }

        if let Ok(channel) = std::env::var("LEDGER_CHANNEL") {
            config.channel = channel;
        }

        if let Some(peers) = endpoints_from_env("LEDGER_PEERS", "peer") {
            config.peers = peers;
        }

        if let Some(orderers) = endpoints_from_env("LEDGER_ORDERERS", "orderer") {
            config.orderers = orderers;
        }

        if let Ok(chaincode) = std::env::var("LEDGER_CHAINCODE") {
            config.chaincode = chaincode;
        }

        if let Ok(user) = std::env::var("LEDGER_USER") {
            config.user_name = user;
        }

        config
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.ca_url.is_empty() {
            return Err("CA URL cannot be empty".to_string());
        }

        if self.channel.is_empty() {
            return Err("Channel name cannot be empty".to_string());
        }

        if self.peers.is_empty() {
            return Err("At least one peer is required".to_string());
        }

        if self.orderers.is_empty() {
            return Err("At least one orderer is required".to_string());
        }

        if self.chaincode.is_empty() {
            return Err("Chaincode name cannot be empty".to_string());
        }

        if self.user_name.is_empty() {
            return Err("User name cannot be empty".to_string());
        }

        if self.user_name == self.identity.admin_name {
            return Err("User name must differ from the admin name".to_string());
        }

        self.identity.validate()?;
        self.coordinator.validate()?;

        Ok(())
    }
}
