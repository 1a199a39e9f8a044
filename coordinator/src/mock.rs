//! In-memory peers, orderers and connector for tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use ledgerlink_common::{
    EndorsementResponse, LedgerError, ProposalEnvelope, Result, TransactionEnvelope, TxId,
};

use crate::channel::EndpointSpec;
use crate::transport::{BroadcastAck, ChannelConnector, EndorsingPeer, OrderingService};

/// How a mock peer answers.
#[derive(Debug, Clone)]
pub enum PeerReply {
    Valid(Vec<u8>),
    Invalid(String),
    Error(String),
    /// Transport failure.
    Fail(String),
    /// Never answers.
    Hang,
}

/// Scripted endorsing peer.
pub struct MockPeer {
    name: String,
    url: String,
    reply: PeerReply,
    delay: Option<Duration>,
    calls: AtomicUsize,
    seen: Mutex<Vec<TxId>>,
}

impl MockPeer {
    /// Create a peer with a fixed reply.
    pub fn new(name: impl Into<String>, reply: PeerReply) -> Self {
        let name = name.into();
        Self {
            url: format!("mock://{}", name),
            name,
            reply,
            delay: None,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Peer endorsing `payload`.
    pub fn valid(name: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self::new(name, PeerReply::Valid(payload.into()))
    }

    /// Peer refusing with `message`.
    pub fn invalid(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(name, PeerReply::Invalid(message.into()))
    }

    /// Peer that never answers.
    pub fn hanging(name: impl Into<String>) -> Self {
        Self::new(name, PeerReply::Hang)
    }

    /// Answer only after `delay`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of proposals received.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Transaction ids of received proposals.
    pub fn seen(&self) -> Vec<TxId> {
        self.seen.lock().clone()
    }
}

#[async_trait]
impl EndorsingPeer for MockPeer {
    fn name(&self) -> &str {
        &self.name
    }

    fn url(&self) -> &str {
        &self.url
    }

    async fn process_proposal(&self, proposal: &ProposalEnvelope) -> Result<EndorsementResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().push(proposal.tx_id.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match &self.reply {
            PeerReply::Valid(payload) => Ok(EndorsementResponse::valid(
                &self.name,
                payload.clone(),
                format!("sig:{}", self.name).into_bytes(),
            )),
            PeerReply::Invalid(message) => Ok(EndorsementResponse::invalid(&self.name, message)),
            PeerReply::Error(message) => Ok(EndorsementResponse::error(&self.name, message)),
            PeerReply::Fail(reason) => Err(LedgerError::NetworkError(reason.clone())),
            PeerReply::Hang => std::future::pending().await,
        }
    }
}

/// How a mock orderer answers.
#[derive(Debug, Clone)]
pub enum OrdererReply {
    Ack(BroadcastAck),
    Fail(String),
    Hang,
}

/// Scripted orderer recording what it was sent.
pub struct MockOrderer {
    name: String,
    url: String,
    reply: OrdererReply,
    delay: Option<Duration>,
    received: Mutex<Vec<TransactionEnvelope>>,
}

impl MockOrderer {
    /// Create an orderer with a fixed reply.
    pub fn new(name: impl Into<String>, reply: OrdererReply) -> Self {
        let name = name.into();
        Self {
            url: format!("mock://{}", name),
            name,
            reply,
            delay: None,
            received: Mutex::new(Vec::new()),
        }
    }

    /// Orderer that accepts everything.
    pub fn accepting(name: impl Into<String>) -> Self {
        Self::new(name, OrdererReply::Ack(BroadcastAck::success()))
    }

    /// Answer only after `delay`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Envelopes received so far.
    pub fn received(&self) -> Vec<TransactionEnvelope> {
        self.received.lock().clone()
    }
}

#[async_trait]
impl OrderingService for MockOrderer {
    fn name(&self) -> &str {
        &self.name
    }

    fn url(&self) -> &str {
        &self.url
    }

    async fn broadcast(&self, envelope: &TransactionEnvelope) -> Result<BroadcastAck> {
        self.received.lock().push(envelope.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match &self.reply {
            OrdererReply::Ack(ack) => Ok(ack.clone()),
            OrdererReply::Fail(reason) => Err(LedgerError::NetworkError(reason.clone())),
            OrdererReply::Hang => std::future::pending().await,
        }
    }
}

/// Connector handing out accepting mock members.
#[derive(Default)]
pub struct MockConnector {
    unreachable: HashSet<String>,
    fail_handshake: bool,
    handshakes: AtomicUsize,
}

impl MockConnector {
    /// Create a connector where everything is reachable.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make connecting to `name` fail.
    pub fn unreachable(mut self, name: impl Into<String>) -> Self {
        self.unreachable.insert(name.into());
        self
    }

    /// Make the channel handshake fail.
    pub fn failing_handshake(mut self) -> Self {
        self.fail_handshake = true;
        self
    }

    /// Completed handshakes.
    pub fn handshakes(&self) -> usize {
        self.handshakes.load(Ordering::SeqCst)
    }

    fn reach(&self, spec: &EndpointSpec) -> Result<()> {
        if self.unreachable.contains(&spec.name) {
            return Err(LedgerError::NetworkError(format!(
                "connection refused: {}",
                spec.url
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ChannelConnector for MockConnector {
    async fn connect_peer(&self, spec: &EndpointSpec) -> Result<Arc<dyn EndorsingPeer>> {
        self.reach(spec)?;
        Ok(Arc::new(MockPeer::valid(&spec.name, b"ok".to_vec())))
    }

    async fn connect_orderer(&self, spec: &EndpointSpec) -> Result<Arc<dyn OrderingService>> {
        self.reach(spec)?;
        Ok(Arc::new(MockOrderer::accepting(&spec.name)))
    }

    async fn initialize(&self, channel: &str, _peers: &[Arc<dyn EndorsingPeer>]) -> Result<()> {
        if self.fail_handshake {
            return Err(LedgerError::NetworkError(format!(
                "no configuration block for {}",
                channel
            )));
        }
        self.handshakes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
