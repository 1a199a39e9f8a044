//! Channel topology: named set of peers and orderers.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use ledgerlink_common::{LedgerError, Result};

use crate::transport::{ChannelConnector, EndorsingPeer, OrderingService};

/// Name and locator of one channel member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointSpec {
    pub name: String,
    pub url: String,
}

impl EndpointSpec {
    /// Create a spec.
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }

    /// Parse `name=url` pairs separated by commas.
    ///
    /// A bare URL is named by position, `{prefix}{index}`.
    pub fn parse_list(input: &str, prefix: &str) -> Result<Vec<EndpointSpec>> {
        input
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .enumerate()
            .map(|(index, item)| {
                // `grpc://host` contains no '=' before the scheme separator.
                match item.split_once('=') {
                    Some((name, url)) if !name.contains("://") => {
                        let (name, url) = (name.trim(), url.trim());
                        if name.is_empty() || url.is_empty() {
                            return Err(LedgerError::ConfigurationError(format!(
                                "Malformed endpoint entry: {:?}",
                                item
                            )));
                        }
                        Ok(EndpointSpec::new(name, url))
                    }
                    _ => Ok(EndpointSpec::new(format!("{}{}", prefix, index), item)),
                }
            })
            .collect()
    }
}

impl fmt::Display for EndpointSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.url)
    }
}

/// A ready-to-use channel. Read-only once built.
pub struct ChannelHandle {
    name: String,
    peers: Vec<Arc<dyn EndorsingPeer>>,
    orderers: Vec<Arc<dyn OrderingService>>,
}

impl ChannelHandle {
    /// Assemble a handle from already connected members.
    ///
    /// Fails when either member set is empty.
    pub fn from_parts(
        name: impl Into<String>,
        peers: Vec<Arc<dyn EndorsingPeer>>,
        orderers: Vec<Arc<dyn OrderingService>>,
    ) -> Result<Self> {
        let name = name.into();
        if peers.is_empty() {
            return Err(LedgerError::ConfigurationError(format!(
                "Channel {} has no peers",
                name
            )));
        }
        if orderers.is_empty() {
            return Err(LedgerError::ConfigurationError(format!(
                "Channel {} has no orderers",
                name
            )));
        }
        Ok(Self {
            name,
            peers,
            orderers,
        })
    }

    /// Channel name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Peers in configuration order.
    pub fn peers(&self) -> &[Arc<dyn EndorsingPeer>] {
        &self.peers
    }

    /// Orderers in configuration order.
    pub fn orderers(&self) -> &[Arc<dyn OrderingService>] {
        &self.orderers
    }

    /// Peer names in configuration order.
    pub fn peer_names(&self) -> Vec<&str> {
        self.peers.iter().map(|p| p.name()).collect()
    }
}

impl fmt::Debug for ChannelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelHandle")
            .field("name", &self.name)
            .field("peers", &self.peer_names())
            .field(
                "orderers",
                &self.orderers.iter().map(|o| o.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Builds channel handles from configuration.
pub struct ChannelTopology;

impl ChannelTopology {
    /// Check names and member lists without touching the network.
    pub fn validate(
        channel_name: &str,
        peer_specs: &[EndpointSpec],
        orderer_specs: &[EndpointSpec],
    ) -> Result<()> {
        validate_channel_name(channel_name)?;

        if peer_specs.is_empty() {
            return Err(LedgerError::ConfigurationError(format!(
                "Channel {} needs at least one peer",
                channel_name
            )));
        }
        if orderer_specs.is_empty() {
            return Err(LedgerError::ConfigurationError(format!(
                "Channel {} needs at least one orderer",
                channel_name
            )));
        }

        validate_specs("peer", peer_specs)?;
        validate_specs("orderer", orderer_specs)?;
        Ok(())
    }

    /// Connect every member and run the channel handshake.
    ///
    /// Returns a fully initialized handle or an error; never anything in
    /// between.
    #[instrument(skip(connector, peer_specs, orderer_specs), fields(peers = peer_specs.len(), orderers = orderer_specs.len()))]
    pub async fn build(
        connector: &dyn ChannelConnector,
        channel_name: &str,
        peer_specs: &[EndpointSpec],
        orderer_specs: &[EndpointSpec],
    ) -> Result<ChannelHandle> {
        Self::validate(channel_name, peer_specs, orderer_specs)?;

        let init_error = |reason: String| {
            warn!(channel = %channel_name, reason = %reason, "Channel initialization failed");
            LedgerError::InitializationError {
                channel: channel_name.to_string(),
                reason,
            }
        };

        let mut peers = Vec::with_capacity(peer_specs.len());
        for spec in peer_specs {
            let peer = connector
                .connect_peer(spec)
                .await
                .map_err(|e| init_error(format!("peer {}: {}", spec, e)))?;
            peers.push(peer);
        }

        let mut orderers = Vec::with_capacity(orderer_specs.len());
        for spec in orderer_specs {
            let orderer = connector
                .connect_orderer(spec)
                .await
                .map_err(|e| init_error(format!("orderer {}: {}", spec, e)))?;
            orderers.push(orderer);
        }

        connector
            .initialize(channel_name, &peers)
            .await
            .map_err(|e| init_error(format!("handshake: {}", e)))?;

        let handle = ChannelHandle::from_parts(channel_name, peers, orderers)?;
        info!(channel = %channel_name, "Channel initialized");
        Ok(handle)
    }
}

fn validate_channel_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let starts_with_letter = chars.next().map_or(false, |c| c.is_ascii_lowercase());
    let rest_ok = chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '.' || c == '-');

    if !starts_with_letter || !rest_ok || name.len() > 249 {
        return Err(LedgerError::ConfigurationError(format!(
            "Invalid channel name {:?}: lowercase letters, digits, '.' and '-', starting with a letter",
            name
        )));
    }
    Ok(())
}

fn validate_specs(kind: &str, specs: &[EndpointSpec]) -> Result<()> {
    let mut seen = HashSet::new();
    for spec in specs {
        if spec.name.is_empty() || spec.url.is_empty() {
            return Err(LedgerError::ConfigurationError(format!(
                "Incomplete {} spec: {:?}",
                kind, spec
            )));
        }
        if !seen.insert(spec.name.as_str()) {
            return Err(LedgerError::ConfigurationError(format!(
                "Duplicate {} name: {}",
                kind, spec.name
            )));
        }
    }
    Ok(())
}
