//! Simulated ordering service node.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::info;

use ledgerlink_common::{LedgerError, Result, TransactionEnvelope, TxId};
use ledgerlink_coordinator::{BroadcastAck, BroadcastStatus, OrderingService};

use crate::chaincode::{self, WorldState};

/// Orderer that commits accepted transactions straight into the world state.
pub struct SimulatedOrderer {
    name: String,
    url: String,
    channel: String,
    state: WorldState,
    offline: AtomicBool,
    committed: Mutex<Vec<TxId>>,
}

impl SimulatedOrderer {
    /// Create a new orderer serving `channel`.
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        channel: impl Into<String>,
        state: WorldState,
    ) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            channel: channel.into(),
            state,
            offline: AtomicBool::new(false),
            committed: Mutex::new(Vec::new()),
        }
    }

    /// Take the orderer off the network or bring it back.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Transactions committed so far, in order.
    pub fn committed(&self) -> Vec<TxId> {
        self.committed.lock().clone()
    }
}

#[async_trait]
impl OrderingService for SimulatedOrderer {
    fn name(&self) -> &str {
        &self.name
    }

    fn url(&self) -> &str {
        &self.url
    }

    async fn broadcast(&self, envelope: &TransactionEnvelope) -> Result<BroadcastAck> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(LedgerError::NetworkError(format!(
                "{} unreachable at {}",
                self.name, self.url
            )));
        }

        if envelope.channel != self.channel {
            return Ok(BroadcastAck::refused(
                BroadcastStatus::Forbidden,
                format!("not serving channel {}", envelope.channel),
            ));
        }

        if envelope.endorsements.is_empty() || envelope.endorsements.iter().any(|e| !e.is_valid()) {
            return Ok(BroadcastAck::refused(
                BroadcastStatus::BadRequest,
                "transaction lacks valid endorsements",
            ));
        }

        let mut committed = self.committed.lock();
        if committed.contains(&envelope.tx_id) {
            return Ok(BroadcastAck::refused(BroadcastStatus::BadRequest, "duplicate transaction"));
        }

        let changed = chaincode::commit(&mut self.state.write(), &envelope.request);
        committed.push(envelope.tx_id.clone());
        info!(orderer = %self.name, tx_id = %envelope.tx_id.short(), changed, "Transaction committed");

        Ok(BroadcastAck::success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledgerlink_common::{Creator, EndorsementResponse, ProposalRequest};

    use crate::chaincode::seeded_state;

    fn envelope(tx_id: &str, endorsements: Vec<EndorsementResponse>) -> TransactionEnvelope {
        TransactionEnvelope {
            tx_id: TxId::new(tx_id),
            channel: "mychannel".to_string(),
            creator: Creator {
                msp_id: "Org1MSP".to_string(),
                certificate: b"cert".to_vec(),
            },
            request: ProposalRequest::new("account", "update", ["ACCOUNT1", "jill_1"]),
            payload: b"{}".to_vec(),
            endorsements,
        }
    }

    #[tokio::test]
    async fn test_commit_update() {
        let state = seeded_state();
        let orderer = SimulatedOrderer::new("orderer0", "sim://orderer0:7050", "mychannel", state.clone());
        let endorsed = vec![EndorsementResponse::valid("peer0", b"{}".to_vec(), vec![1])];

        let ack = orderer.broadcast(&envelope("tx1", endorsed.clone())).await.unwrap();
        assert_eq!(ack.status, BroadcastStatus::Success);
        assert_eq!(state.read()["ACCOUNT1"], "jill_1");

        let again = orderer.broadcast(&envelope("tx1", endorsed)).await.unwrap();
        assert_eq!(again.status, BroadcastStatus::BadRequest);
        assert_eq!(orderer.committed().len(), 1);
    }

    #[tokio::test]
    async fn test_refuses_unendorsed_and_offline() {
        let orderer = SimulatedOrderer::new("orderer0", "sim://orderer0:7050", "mychannel", seeded_state());

        let ack = orderer.broadcast(&envelope("tx1", vec![])).await.unwrap();
        assert_eq!(ack.status, BroadcastStatus::BadRequest);

        orderer.set_offline(true);
        let endorsed = vec![EndorsementResponse::valid("peer0", b"{}".to_vec(), vec![1])];
        assert!(orderer.broadcast(&envelope("tx2", endorsed)).await.is_err());
    }
}
