//! Error types for LedgerLink operations.

use crate::{OperationKind, PayloadDigest, PeerDiagnostic, TxId, TxPhase};
use thiserror::Error;

/// Main error type for LedgerLink operations.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// No persisted identity under this name.
    #[error("Identity not found: {0}")]
    IdentityNotFound(String),

    /// Malformed configuration or topology.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Channel or network setup failed.
    #[error("Channel {channel} failed to initialize: {reason}")]
    InitializationError { channel: String, reason: String },

    /// No peer produced a valid endorsement.
    #[error("Proposal {tx_id} rejected by all peers: {}", render(.responses))]
    ProposalRejected {
        tx_id: TxId,
        responses: Vec<PeerDiagnostic>,
    },

    /// Valid endorsements disagree on the chaincode output.
    #[error("Endorsement mismatch for {tx_id}: {} distinct payloads", distinct(.payloads))]
    EndorsementMismatch {
        tx_id: TxId,
        payloads: Vec<PayloadDigest>,
    },

    /// Not enough answers before the deadline.
    #[error("{operation} {tx_id} timed out: {}", render(.responses))]
    Timeout {
        tx_id: TxId,
        operation: OperationKind,
        responses: Vec<PeerDiagnostic>,
    },

    /// Every orderer refused or failed the broadcast.
    #[error("Submission of {tx_id} failed on every orderer: {}", .failures.join("; "))]
    SubmissionFailed { tx_id: TxId, failures: Vec<String> },

    /// Storage I/O failure.
    #[error("I/O error: {0}")]
    IoError(String),

    /// A persisted record could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Transport failure talking to a remote collaborator.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// A remote collaborator refused the caller's credentials.
    #[error("Authorization error: {0}")]
    AuthorizationError(String),

    /// Illegal operation state transition.
    #[error("Invalid transition from {from:?} to {to:?}")]
    InvalidTransition { from: TxPhase, to: TxPhase },

    /// Internal error.
    #[error("Internal error: {0}")]
    InternalError(String),
}

fn render(responses: &[PeerDiagnostic]) -> String {
    responses
        .iter()
        .map(|r| r.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

fn distinct(payloads: &[PayloadDigest]) -> usize {
    let mut hashes: Vec<&str> = payloads.iter().map(|p| p.sha256.as_str()).collect();
    hashes.sort_unstable();
    hashes.dedup();
    hashes.len()
}

impl LedgerError {
    /// Check if a caller-side retry could plausibly succeed.
    ///
    /// The core never retries; this only classifies.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LedgerError::NetworkError(_)
                | LedgerError::Timeout { .. }
                | LedgerError::SubmissionFailed { .. }
        )
    }

    /// Check if this is the identity cache-miss signal.
    pub fn is_not_found(&self) -> bool {
        matches!(self, LedgerError::IdentityNotFound(_))
    }

    /// Per-peer diagnostics, when the error carries them.
    pub fn peer_diagnostics(&self) -> &[PeerDiagnostic] {
        match self {
            LedgerError::ProposalRejected { responses, .. }
            | LedgerError::Timeout { responses, .. } => responses,
            _ => &[],
        }
    }

    /// Get a stable error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            LedgerError::IdentityNotFound(_) => "IDENTITY_NOT_FOUND",
            LedgerError::ConfigurationError(_) => "CONFIGURATION_ERROR",
            LedgerError::InitializationError { .. } => "INITIALIZATION_ERROR",
            LedgerError::ProposalRejected { .. } => "PROPOSAL_REJECTED",
            LedgerError::EndorsementMismatch { .. } => "ENDORSEMENT_MISMATCH",
            LedgerError::Timeout { .. } => "TIMEOUT",
            LedgerError::SubmissionFailed { .. } => "SUBMISSION_FAILED",
            LedgerError::IoError(_) => "IO_ERROR",
            LedgerError::SerializationError(_) => "SERIALIZATION_ERROR",
            LedgerError::NetworkError(_) => "NETWORK_ERROR",
            LedgerError::AuthorizationError(_) => "AUTHORIZATION_ERROR",
            LedgerError::InvalidTransition { .. } => "INVALID_TRANSITION",
            LedgerError::InternalError(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<std::io::Error> for LedgerError {
    fn from(e: std::io::Error) -> Self {
        LedgerError::IoError(e.to_string())
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(e: serde_json::Error) -> Self {
        LedgerError::SerializationError(e.to_string())
    }
}

/// Result type alias for LedgerLink operations.
pub type Result<T> = std::result::Result<T, LedgerError>;
