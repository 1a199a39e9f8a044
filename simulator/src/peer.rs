//! Simulated endorsing peer with fault injection.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use ledgerlink_common::{EndorsementResponse, LedgerError, ProposalEnvelope, Result};
use ledgerlink_coordinator::EndorsingPeer;
use ledgerlink_crypto::{SigningKey, VerifyingKey};

use crate::chaincode::{self, WorldState};

/// Faults that can be injected into a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Fault {
    /// Transport fails.
    Offline,
    /// Answers only after a delay.
    Latency { millis: u64 },
    /// Endorses output no other peer produces.
    Divergent,
    /// Refuses every proposal.
    Reject,
}

/// A peer running the `account` chaincode over the network's world state.
pub struct SimulatedPeer {
    name: String,
    url: String,
    state: WorldState,
    key: SigningKey,
    fault: RwLock<Option<Fault>>,
    proposals: AtomicUsize,
}

impl SimulatedPeer {
    /// Create a new peer.
    pub fn new(name: impl Into<String>, url: impl Into<String>, state: WorldState, key: SigningKey) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            state,
            key,
            fault: RwLock::new(None),
            proposals: AtomicUsize::new(0),
        }
    }

    /// Inject a fault, replacing any previous one.
    pub fn inject(&self, fault: Fault) {
        *self.fault.write() = Some(fault);
    }

    /// Clear the active fault.
    pub fn clear(&self) {
        *self.fault.write() = None;
    }

    /// Active fault.
    pub fn fault(&self) -> Option<Fault> {
        *self.fault.read()
    }

    /// Proposals received.
    pub fn proposals(&self) -> usize {
        self.proposals.load(Ordering::SeqCst)
    }

    /// Key verifying this peer's endorsements.
    pub fn verifying_key(&self) -> VerifyingKey {
        self.key.verifying_key()
    }
}

#[async_trait]
impl EndorsingPeer for SimulatedPeer {
    fn name(&self) -> &str {
        &self.name
    }

    fn url(&self) -> &str {
        &self.url
    }

    async fn process_proposal(&self, proposal: &ProposalEnvelope) -> Result<EndorsementResponse> {
        self.proposals.fetch_add(1, Ordering::SeqCst);
        let fault = self.fault();
        debug!(peer = %self.name, tx_id = %proposal.tx_id.short(), fault = ?fault, "Proposal received");

        match fault {
            Some(Fault::Offline) => {
                return Err(LedgerError::NetworkError(format!(
                    "{} unreachable at {}",
                    self.name, self.url
                )));
            }
            Some(Fault::Latency { millis }) => {
                tokio::time::sleep(Duration::from_millis(millis)).await;
            }
            Some(Fault::Reject) => {
                return Ok(EndorsementResponse::invalid(
                    &self.name,
                    "Endorsement refused by peer policy",
                ));
            }
            Some(Fault::Divergent) | None => {}
        }

        let simulated = chaincode::execute(&self.state.read(), &proposal.request);
        match simulated {
            Ok(mut payload) => {
                if fault == Some(Fault::Divergent) {
                    payload.extend_from_slice(format!("#{}", self.name).as_bytes());
                }
                let signature = self.key.sign(&payload);
                Ok(EndorsementResponse::valid(&self.name, payload, signature.bytes))
            }
            Err(message) => Ok(EndorsementResponse::invalid(&self.name, message)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ledgerlink_common::{
        Creator, EndorsementStatus, Nonce, ProposalRequest, TxId,
    };
    use ledgerlink_crypto::Signature;

    use crate::chaincode::seeded_state;

    fn proposal(function: &str, args: &[&str]) -> ProposalEnvelope {
        ProposalEnvelope {
            tx_id: TxId::new("0123456789abcdef"),
            channel: "mychannel".to_string(),
            creator: Creator {
                msp_id: "Org1MSP".to_string(),
                certificate: b"cert".to_vec(),
            },
            nonce: Nonce::new(),
            request: ProposalRequest::new("account", function, args.iter().copied()),
            timestamp: Utc::now(),
        }
    }

    fn peer() -> SimulatedPeer {
        SimulatedPeer::new("peer0", "sim://peer0:7051", seeded_state(), SigningKey::from_seed([3; 32]))
    }

    #[tokio::test]
    async fn test_endorsement_is_signed() {
        let peer = peer();
        let response = peer.process_proposal(&proposal("query", &["ACCOUNT0"])).await.unwrap();

        assert!(response.is_valid());
        assert_eq!(response.payload, b"jill");
        let signature = Signature {
            bytes: response.endorsement.clone(),
            key_id: peer.verifying_key().key_id().to_string(),
        };
        assert!(peer.verifying_key().verify(&response.payload, &signature).is_ok());
    }

    #[tokio::test]
    async fn test_chaincode_error_is_invalid() {
        let response = peer()
            .process_proposal(&proposal("query", &["ACCOUNT42"]))
            .await
            .unwrap();
        assert_eq!(response.status, EndorsementStatus::Invalid);
        assert!(response.message.contains("ACCOUNT42"));
    }

    #[tokio::test]
    async fn test_faults() {
        let peer = peer();

        peer.inject(Fault::Offline);
        assert!(peer.process_proposal(&proposal("list", &[])).await.is_err());

        peer.inject(Fault::Divergent);
        let response = peer.process_proposal(&proposal("query", &["ACCOUNT0"])).await.unwrap();
        assert_eq!(response.payload, b"jill#peer0");

        peer.inject(Fault::Reject);
        let response = peer.process_proposal(&proposal("query", &["ACCOUNT0"])).await.unwrap();
        assert_eq!(response.status, EndorsementStatus::Invalid);

        peer.clear();
        assert!(peer.process_proposal(&proposal("query", &["ACCOUNT0"])).await.unwrap().is_valid());
        assert_eq!(peer.proposals(), 4);
    }

    #[test]
    fn test_fault_serialization() {
        let json = serde_json::to_string(&Fault::Latency { millis: 250 }).unwrap();
        assert_eq!(json, r#"{"kind":"latency","millis":250}"#);
    }
}
