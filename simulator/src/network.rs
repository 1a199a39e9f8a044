//! In-process network: hands out simulated peers and orderers.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

use ledgerlink_common::{LedgerError, Result};
use ledgerlink_coordinator::{ChannelConnector, EndorsingPeer, EndpointSpec, OrderingService};
use ledgerlink_crypto::SigningKey;

use crate::chaincode::{self, WorldState};
use crate::orderer::SimulatedOrderer;
use crate::peer::{Fault, SimulatedPeer};

/// A single-channel network with one shared world state.
pub struct SimulatedNetwork {
    channel: String,
    state: WorldState,
    peers: DashMap<String, Arc<SimulatedPeer>>,
    orderers: DashMap<String, Arc<SimulatedOrderer>>,
    rng: Mutex<StdRng>,
}

impl SimulatedNetwork {
    /// Create a network hosting `channel`.
    pub fn new(channel: impl Into<String>, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };

        Self {
            channel: channel.into(),
            state: chaincode::seeded_state(),
            peers: DashMap::new(),
            orderers: DashMap::new(),
            rng: Mutex::new(rng),
        }
    }

    /// Look up a connected peer.
    pub fn peer(&self, name: &str) -> Option<Arc<SimulatedPeer>> {
        self.peers.get(name).map(|p| Arc::clone(p.value()))
    }

    /// Look up a connected orderer.
    pub fn orderer(&self, name: &str) -> Option<Arc<SimulatedOrderer>> {
        self.orderers.get(name).map(|o| Arc::clone(o.value()))
    }

    /// Inject a fault into a peer, or take an orderer offline.
    pub fn inject(&self, target: &str, fault: Fault) -> Result<()> {
        if let Some(peer) = self.peer(target) {
            peer.inject(fault);
        } else if let Some(orderer) = self.orderer(target) {
            if fault != Fault::Offline {
                return Err(LedgerError::ConfigurationError(format!(
                    "Orderers only support the offline fault, got {:?}",
                    fault
                )));
            }
            orderer.set_offline(true);
        } else {
            return Err(LedgerError::ConfigurationError(format!("Unknown node: {}", target)));
        }
        info!(target = %target, fault = ?fault, "Fault injected");
        Ok(())
    }

    /// Clear any fault on a node.
    pub fn clear(&self, target: &str) -> Result<()> {
        if let Some(peer) = self.peer(target) {
            peer.clear();
        } else if let Some(orderer) = self.orderer(target) {
            orderer.set_offline(false);
        } else {
            return Err(LedgerError::ConfigurationError(format!("Unknown node: {}", target)));
        }
        info!(target = %target, "Fault cleared");
        Ok(())
    }

    /// Committed value of a world-state key.
    pub fn value(&self, key: &str) -> Option<String> {
        self.state.read().get(key).cloned()
    }

    fn next_key(&self) -> SigningKey {
        SigningKey::from_seed(self.rng.lock().gen())
    }
}

#[async_trait]
impl ChannelConnector for SimulatedNetwork {
    async fn connect_peer(&self, spec: &EndpointSpec) -> Result<Arc<dyn EndorsingPeer>> {
        let peer = self
            .peers
            .entry(spec.name.clone())
            .or_insert_with(|| {
                Arc::new(SimulatedPeer::new(
                    &spec.name,
                    &spec.url,
                    Arc::clone(&self.state),
                    self.next_key(),
                ))
            })
            .clone();

        if peer.fault() == Some(Fault::Offline) {
            return Err(LedgerError::NetworkError(format!("{} refused connection", spec)));
        }
        Ok(peer)
    }

    async fn connect_orderer(&self, spec: &EndpointSpec) -> Result<Arc<dyn OrderingService>> {
        let orderer = self
            .orderers
            .entry(spec.name.clone())
            .or_insert_with(|| {
                Arc::new(SimulatedOrderer::new(
                    &spec.name,
                    &spec.url,
                    &self.channel,
                    Arc::clone(&self.state),
                ))
            })
            .clone();
        Ok(orderer)
    }

    async fn initialize(&self, channel: &str, peers: &[Arc<dyn EndorsingPeer>]) -> Result<()> {
        if channel != self.channel {
            return Err(LedgerError::NetworkError(format!(
                "Channel {} does not exist",
                channel
            )));
        }
        info!(channel = %channel, peers = peers.len(), "Channel configuration fetched");
        Ok(())
    }
}
