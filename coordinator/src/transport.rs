//! Transport collaborator contracts.
//!
//! Wire protocols, TLS and signing live behind these traits; the coordinator
//! only sees proposals going out and responses coming back.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use ledgerlink_common::{EndorsementResponse, ProposalEnvelope, Result, TransactionEnvelope};

use crate::channel::EndpointSpec;

/// A peer that simulates and endorses proposals.
#[async_trait]
pub trait EndorsingPeer: Send + Sync {
    /// Configured peer name.
    fn name(&self) -> &str;

    /// Network locator.
    fn url(&self) -> &str;

    /// Send a proposal and wait for the endorsement response.
    ///
    /// `Err` means the transport failed; a peer that processed the proposal
    /// and refused it answers `Ok` with a non-VALID status.
    async fn process_proposal(&self, proposal: &ProposalEnvelope) -> Result<EndorsementResponse>;
}

/// Orderer acknowledgment status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BroadcastStatus {
    Success,
    BadRequest,
    Forbidden,
    ServiceUnavailable,
}

impl fmt::Display for BroadcastStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BroadcastStatus::Success => "SUCCESS",
            BroadcastStatus::BadRequest => "BAD_REQUEST",
            BroadcastStatus::Forbidden => "FORBIDDEN",
            BroadcastStatus::ServiceUnavailable => "SERVICE_UNAVAILABLE",
        };
        f.write_str(s)
    }
}

/// Orderer answer to a broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastAck {
    pub status: BroadcastStatus,
    pub info: String,
}

impl BroadcastAck {
    /// A successful acknowledgment.
    pub fn success() -> Self {
        Self {
            status: BroadcastStatus::Success,
            info: String::new(),
        }
    }

    /// A refusal.
    pub fn refused(status: BroadcastStatus, info: impl Into<String>) -> Self {
        Self {
            status,
            info: info.into(),
        }
    }
}

/// An ordering service node.
#[async_trait]
pub trait OrderingService: Send + Sync {
    /// Configured orderer name.
    fn name(&self) -> &str;

    /// Network locator.
    fn url(&self) -> &str;

    /// Hand an endorsed transaction over for ordering.
    async fn broadcast(&self, envelope: &TransactionEnvelope) -> Result<BroadcastAck>;
}

/// Opens connections to channel members and performs the channel handshake.
#[async_trait]
pub trait ChannelConnector: Send + Sync {
    /// Connect to a peer.
    async fn connect_peer(&self, spec: &EndpointSpec) -> Result<Arc<dyn EndorsingPeer>>;

    /// Connect to an orderer.
    async fn connect_orderer(&self, spec: &EndpointSpec) -> Result<Arc<dyn OrderingService>>;

    /// Fetch and apply the channel configuration.
    async fn initialize(&self, channel: &str, peers: &[Arc<dyn EndorsingPeer>]) -> Result<()>;
}
