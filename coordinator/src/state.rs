//! Per-operation lifecycle tracking.

use chrono::{DateTime, Utc};
use tracing::debug;

use ledgerlink_common::{LedgerError, OperationKind, Result, TxId, TxPhase};

/// Lifecycle of one invoke or query run.
///
/// Every call starts a fresh state; nothing is reused or retried.
#[derive(Debug, Clone)]
pub struct OperationState {
    tx_id: TxId,
    kind: OperationKind,
    phase: TxPhase,
    history: Vec<(TxPhase, DateTime<Utc>)>,
}

impl OperationState {
    /// Start a run in the BUILT phase.
    pub fn new(tx_id: TxId, kind: OperationKind) -> Self {
        Self {
            tx_id,
            kind,
            phase: TxPhase::Built,
            history: vec![(TxPhase::Built, Utc::now())],
        }
    }

    /// Transaction id.
    pub fn tx_id(&self) -> &TxId {
        &self.tx_id
    }

    /// Operation kind.
    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    /// Current phase.
    pub fn phase(&self) -> TxPhase {
        self.phase
    }

    /// Phases visited so far, oldest first.
    pub fn history(&self) -> &[(TxPhase, DateTime<Utc>)] {
        &self.history
    }

    /// Check whether the run has finished.
    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal(self.kind)
    }

    /// Move to `next`.
    pub fn advance(&mut self, next: TxPhase) -> Result<()> {
        if !self.phase.can_transition_to(next, self.kind) {
            return Err(LedgerError::InvalidTransition {
                from: self.phase,
                to: next,
            });
        }

        debug!(
            tx_id = %self.tx_id.short(),
            kind = %self.kind,
            from = ?self.phase,
            to = ?next,
            "Operation phase change"
        );
        self.phase = next;
        self.history.push((next, Utc::now()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invoke_happy_path() {
        let mut state = OperationState::new(TxId::new("tx"), OperationKind::Invoke);
        state.advance(TxPhase::Proposed).unwrap();
        state.advance(TxPhase::Endorsed).unwrap();
        assert!(!state.is_terminal());
        state.advance(TxPhase::Submitted).unwrap();
        assert!(state.is_terminal());

        let phases: Vec<_> = state.history().iter().map(|(p, _)| *p).collect();
        assert_eq!(
            phases,
            vec![TxPhase::Built, TxPhase::Proposed, TxPhase::Endorsed, TxPhase::Submitted]
        );
    }

    #[test]
    fn test_query_cannot_submit() {
        let mut state = OperationState::new(TxId::new("tx"), OperationKind::Query);
        state.advance(TxPhase::Proposed).unwrap();
        state.advance(TxPhase::Endorsed).unwrap();
        assert!(state.is_terminal());

        let err = state.advance(TxPhase::Submitted).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InvalidTransition {
                from: TxPhase::Endorsed,
                to: TxPhase::Submitted
            }
        ));
    }

    #[test]
    fn test_rejected_is_final() {
        let mut state = OperationState::new(TxId::new("tx"), OperationKind::Invoke);
        assert!(state.advance(TxPhase::Endorsed).is_err());
        state.advance(TxPhase::Proposed).unwrap();
        state.advance(TxPhase::Rejected).unwrap();
        assert!(state.is_terminal());
        assert!(state.advance(TxPhase::Submitted).is_err());
        assert_eq!(state.phase(), TxPhase::Rejected);
    }
}
