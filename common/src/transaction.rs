//! Proposal, endorsement and outcome types plus the per-operation state machine.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ChaincodeId, Creator, Nonce, TxId};

/// A chaincode call: which chaincode, which function, which arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalRequest {
    /// Target chaincode.
    pub chaincode: ChaincodeId,
    /// Function name.
    pub function: String,
    /// Ordered string arguments.
    pub args: Vec<String>,
}

impl ProposalRequest {
    /// Build a new request.
    pub fn new<I, S>(chaincode: impl Into<ChaincodeId>, function: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            chaincode: chaincode.into(),
            function: function.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

impl fmt::Display for ProposalRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}({})", self.chaincode, self.function, self.args.join(", "))
    }
}

/// A proposal as sent to endorsing peers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposalEnvelope {
    /// Transaction id.
    pub tx_id: TxId,
    /// Channel name.
    pub channel: String,
    /// Who is proposing.
    pub creator: Creator,
    /// Random nonce the transaction id is derived from.
    pub nonce: Nonce,
    /// The call itself.
    pub request: ProposalRequest,
    /// Creation timestamp.
    pub timestamp: DateTime<Utc>,
}

/// Endorsement verdict of a single peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EndorsementStatus {
    /// Simulated successfully and signed.
    Valid,
    /// Processed, but the chaincode or peer validation rejected it.
    Invalid,
    /// The peer failed to process the proposal.
    Error,
}

impl fmt::Display for EndorsementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EndorsementStatus::Valid => "VALID",
            EndorsementStatus::Invalid => "INVALID",
            EndorsementStatus::Error => "ERROR",
        };
        f.write_str(s)
    }
}

/// One peer's answer to a proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndorsementResponse {
    /// Originating peer.
    pub peer: String,
    /// Verdict.
    pub status: EndorsementStatus,
    /// Human readable status message.
    pub message: String,
    /// Chaincode output.
    pub payload: Vec<u8>,
    /// Endorser signature over the payload.
    pub endorsement: Vec<u8>,
}

impl EndorsementResponse {
    /// A VALID endorsement.
    pub fn valid(peer: impl Into<String>, payload: Vec<u8>, endorsement: Vec<u8>) -> Self {
        Self {
            peer: peer.into(),
            status: EndorsementStatus::Valid,
            message: "OK".to_string(),
            payload,
            endorsement,
        }
    }

    /// An INVALID response with a reason.
    pub fn invalid(peer: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            peer: peer.into(),
            status: EndorsementStatus::Invalid,
            message: message.into(),
            payload: Vec::new(),
            endorsement: Vec::new(),
        }
    }

    /// An ERROR response with a reason.
    pub fn error(peer: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            peer: peer.into(),
            status: EndorsementStatus::Error,
            message: message.into(),
            payload: Vec::new(),
            endorsement: Vec::new(),
        }
    }

    /// Check if the response is a VALID endorsement.
    pub fn is_valid(&self) -> bool {
        self.status == EndorsementStatus::Valid
    }
}

/// Endorsed transaction forwarded to the ordering service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionEnvelope {
    /// Transaction id.
    pub tx_id: TxId,
    /// Channel name.
    pub channel: String,
    /// Who proposed it.
    pub creator: Creator,
    /// The endorsed call.
    pub request: ProposalRequest,
    /// Payload every endorser agreed on.
    pub payload: Vec<u8>,
    /// VALID endorsements only.
    pub endorsements: Vec<EndorsementResponse>,
}

/// Acknowledgment from an orderer that it accepted a transaction.
///
/// Acceptance into a batch, not final commitment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    /// Transaction id.
    pub tx_id: TxId,
    /// Orderer that acknowledged.
    pub orderer: String,
    /// Orderer status text.
    pub status: String,
    /// When the acknowledgment was received.
    pub acknowledged_at: DateTime<Utc>,
}

/// What became of one peer during fan-out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PeerOutcome {
    /// The peer answered.
    Responded {
        status: EndorsementStatus,
        message: String,
        payload_len: usize,
    },
    /// No answer before the deadline.
    TimedOut,
    /// The transport failed to reach the peer.
    Failed(String),
}

/// Per-peer diagnostic carried by errors and outcomes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerDiagnostic {
    /// Peer name.
    pub peer: String,
    /// What happened.
    pub outcome: PeerOutcome,
}

impl PeerDiagnostic {
    /// Diagnostic for a peer that answered.
    pub fn responded(response: &EndorsementResponse) -> Self {
        Self {
            peer: response.peer.clone(),
            outcome: PeerOutcome::Responded {
                status: response.status,
                message: response.message.clone(),
                payload_len: response.payload.len(),
            },
        }
    }

    /// Diagnostic for a peer that never answered.
    pub fn timed_out(peer: impl Into<String>) -> Self {
        Self {
            peer: peer.into(),
            outcome: PeerOutcome::TimedOut,
        }
    }

    /// Diagnostic for a peer whose transport failed.
    pub fn failed(peer: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            peer: peer.into(),
            outcome: PeerOutcome::Failed(reason.into()),
        }
    }
}

impl fmt::Display for PeerDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            PeerOutcome::Responded {
                status, message, ..
            } => write!(f, "{}: {} ({})", self.peer, status, message),
            PeerOutcome::TimedOut => write!(f, "{}: timed out", self.peer),
            PeerOutcome::Failed(reason) => write!(f, "{}: failed ({})", self.peer, reason),
        }
    }
}

/// Digest of one VALID payload, reported on endorsement mismatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadDigest {
    /// Peer name.
    pub peer: String,
    /// Hex SHA-256 of the payload.
    pub sha256: String,
}

/// A payload returned by one peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerPayload {
    /// Peer name.
    pub peer: String,
    /// Status the peer reported.
    pub status: EndorsementStatus,
    /// Payload exactly as received.
    pub payload: Vec<u8>,
}

/// Terminal result of an invoke.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionOutcome {
    /// Transaction id.
    pub tx_id: TxId,
    /// Whether the transaction was accepted for ordering.
    pub accepted: bool,
    /// Agreed payload per endorsing peer, in peer order.
    pub payloads: Vec<PeerPayload>,
    /// Orderer acknowledgment.
    pub receipt: Option<SubmissionReceipt>,
    /// Per-peer diagnostics, in peer order.
    pub diagnostics: Vec<PeerDiagnostic>,
}

impl TransactionOutcome {
    /// The agreed chaincode output.
    pub fn payload(&self) -> Option<&[u8]> {
        self.payloads.first().map(|p| p.payload.as_slice())
    }
}

/// Result of a read-only query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryOutcome {
    /// Transaction id of the query proposal.
    pub tx_id: TxId,
    /// One payload per responding peer, in peer order. Never deduplicated.
    pub payloads: Vec<PeerPayload>,
    /// Markers for peers that timed out or could not be reached.
    pub unanswered: Vec<PeerDiagnostic>,
}

impl QueryOutcome {
    /// The raw payload bytes, in peer order.
    pub fn payload_bytes(&self) -> Vec<Vec<u8>> {
        self.payloads.iter().map(|p| p.payload.clone()).collect()
    }

    /// Check whether any peer failed to answer.
    pub fn is_partial(&self) -> bool {
        !self.unanswered.is_empty()
    }
}

/// Which coordinator operation a state machine run belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    /// State-changing call, ordered after endorsement.
    Invoke,
    /// Read-only call, no ordering step.
    Query,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Invoke => f.write_str("invoke"),
            OperationKind::Query => f.write_str("query"),
        }
    }
}

/// Lifecycle phase of one coordinator operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TxPhase {
    /// Proposal constructed.
    Built,
    /// Proposal sent to peers.
    Proposed,
    /// Endorsement policy satisfied.
    Endorsed,
    /// Endorsement failed. Terminal.
    Rejected,
    /// Accepted by the ordering service. Terminal.
    Submitted,
}

impl TxPhase {
    /// Get valid next phases for an operation kind.
    pub fn valid_transitions(&self, kind: OperationKind) -> &'static [TxPhase] {
        match (self, kind) {
            (TxPhase::Built, _) => &[TxPhase::Proposed],
            (TxPhase::Proposed, _) => &[TxPhase::Endorsed, TxPhase::Rejected],
            (TxPhase::Endorsed, OperationKind::Invoke) => &[TxPhase::Submitted],
            (TxPhase::Endorsed, OperationKind::Query) => &[],
            (TxPhase::Rejected, _) => &[],
            (TxPhase::Submitted, _) => &[],
        }
    }

    /// Check if transition to the given phase is valid.
    pub fn can_transition_to(&self, next: TxPhase, kind: OperationKind) -> bool {
        self.valid_transitions(kind).contains(&next)
    }

    /// Check if this is a final phase for the operation kind.
    pub fn is_terminal(&self, kind: OperationKind) -> bool {
        self.valid_transitions(kind).is_empty()
    }
}
