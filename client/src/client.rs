//! Client gateway tying identities, channel and coordinator together.

use std::sync::Arc;

use tracing::{info, instrument};

use ledgerlink_common::{Identity, LedgerError, QueryOutcome, Result, TransactionOutcome};
use ledgerlink_coordinator::{
    ChannelConnector, ChannelHandle, ChannelTopology, CoordinatorMetrics, TransactionCoordinator,
};
use ledgerlink_identity::{CertificateAuthority, FileIdentityStore, IdentityProvider, IdentityStore};

use crate::config::ClientConfig;

/// Builder for [`LedgerClient`].
pub struct LedgerClientBuilder {
    config: ClientConfig,
    ca: Option<Arc<dyn CertificateAuthority>>,
    connector: Option<Arc<dyn ChannelConnector>>,
    store: Option<Arc<dyn IdentityStore>>,
}

impl LedgerClientBuilder {
    /// Start from a configuration.
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            ca: None,
            connector: None,
            store: None,
        }
    }

    /// Certificate authority used for enrollment.
    pub fn ca(mut self, ca: Arc<dyn CertificateAuthority>) -> Self {
        self.ca = Some(ca);
        self
    }

    /// Transport used to reach channel members.
    pub fn connector(mut self, connector: Arc<dyn ChannelConnector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Identity store. Defaults to a file store in the configured directory.
    pub fn store(mut self, store: Arc<dyn IdentityStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Enroll the admin, enroll the user, and join the channel.
    #[instrument(skip(self), fields(channel = %self.config.channel, user = %self.config.user_name))]
    pub async fn build(self) -> Result<LedgerClient> {
        self.config
            .validate()
            .map_err(LedgerError::ConfigurationError)?;

        let ca = self
            .ca
            .ok_or_else(|| LedgerError::ConfigurationError("No certificate authority".to_string()))?;
        let connector = self
            .connector
            .ok_or_else(|| LedgerError::ConfigurationError("No channel connector".to_string()))?;
        let store: Arc<dyn IdentityStore> = match self.store {
            Some(store) => store,
            None => Arc::new(FileIdentityStore::open(&self.config.identity.store_dir).await?),
        };

        let provider = IdentityProvider::new(ca, store, self.config.identity.clone());
        let admin = provider.enroll_admin().await?;
        let user = provider
            .register_and_enroll(&admin, &self.config.user_name, &self.config.identity.affiliation)
            .await?;

        let channel = ChannelTopology::build(
            connector.as_ref(),
            &self.config.channel,
            &self.config.peers,
            &self.config.orderers,
        )
        .await?;

        let coordinator = TransactionCoordinator::new(self.config.coordinator.clone());

        info!(
            channel = %channel.name(),
            peers = channel.peers().len(),
            orderers = channel.orderers().len(),
            user = %user,
            "Ledger client ready"
        );

        Ok(LedgerClient {
            config: self.config,
            provider,
            coordinator,
            channel: Arc::new(channel),
            admin,
            user,
        })
    }
}

/// Ready-to-use client: enrolled identities plus an initialized channel.
pub struct LedgerClient {
    config: ClientConfig,
    provider: IdentityProvider,
    coordinator: TransactionCoordinator,
    channel: Arc<ChannelHandle>,
    admin: Identity,
    user: Identity,
}

impl LedgerClient {
    /// Create a builder.
    pub fn builder(config: ClientConfig) -> LedgerClientBuilder {
        LedgerClientBuilder::new(config)
    }

    /// Configuration in use.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The user context transactions run as.
    pub fn user(&self) -> &Identity {
        &self.user
    }

    /// The bootstrap admin.
    pub fn admin(&self) -> &Identity {
        &self.admin
    }

    /// The joined channel.
    pub fn channel(&self) -> Arc<ChannelHandle> {
        Arc::clone(&self.channel)
    }

    /// Identity provider, for enrolling further users.
    pub fn provider(&self) -> &IdentityProvider {
        &self.provider
    }

    /// Coordinator metrics.
    pub fn metrics(&self) -> Arc<CoordinatorMetrics> {
        self.coordinator.metrics()
    }

    /// Invoke the configured chaincode as the user.
    pub async fn invoke<I, S>(&self, function: &str, args: I) -> Result<TransactionOutcome>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.invoke_as(&self.user, function, args).await
    }

    /// Query the configured chaincode as the user.
    pub async fn query<I, S>(&self, function: &str, args: I) -> Result<QueryOutcome>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.query_as(&self.user, function, args).await
    }

    /// Invoke the configured chaincode as `identity`.
    pub async fn invoke_as<I, S>(
        &self,
        identity: &Identity,
        function: &str,
        args: I,
    ) -> Result<TransactionOutcome>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.coordinator
            .invoke(identity, &self.channel, self.config.chaincode.as_str(), function, args)
            .await
    }

    /// Query the configured chaincode as `identity`.
    pub async fn query_as<I, S>(
        &self,
        identity: &Identity,
        function: &str,
        args: I,
    ) -> Result<QueryOutcome>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.coordinator
            .query(identity, &self.channel, self.config.chaincode.as_str(), function, args)
            .await
    }
}
