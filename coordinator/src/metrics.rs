//! Metrics collection for coordinator monitoring.

use std::sync::atomic::{AtomicU64, Ordering};

use ledgerlink_common::EndorsementStatus;

/// Coordinator metrics.
pub struct CoordinatorMetrics {
    /// Proposals fanned out (invokes and queries).
    pub proposals_total: AtomicU64,
    /// Queries among them.
    pub queries_total: AtomicU64,
    /// VALID endorsements received.
    pub endorsements_valid: AtomicU64,
    /// INVALID endorsements received.
    pub endorsements_invalid: AtomicU64,
    /// ERROR endorsements and transport failures.
    pub endorsements_error: AtomicU64,
    /// Peers that did not answer in time.
    pub peer_timeouts: AtomicU64,
    /// Transactions acknowledged by an orderer.
    pub submissions_total: AtomicU64,
    /// Transactions refused by every orderer.
    pub submissions_failed: AtomicU64,
    /// Endorsement mismatches.
    pub mismatches_total: AtomicU64,
    /// Proposals rejected by all peers.
    pub rejections_total: AtomicU64,
    /// Operations that timed out.
    pub timeouts_total: AtomicU64,
}

impl CoordinatorMetrics {
    /// Create new metrics instance.
    pub fn new() -> Self {
        Self {
            proposals_total: AtomicU64::new(0),
            queries_total: AtomicU64::new(0),
            endorsements_valid: AtomicU64::new(0),
            endorsements_invalid: AtomicU64::new(0),
            endorsements_error: AtomicU64::new(0),
            peer_timeouts: AtomicU64::new(0),
            submissions_total: AtomicU64::new(0),
            submissions_failed: AtomicU64::new(0),
            mismatches_total: AtomicU64::new(0),
            rejections_total: AtomicU64::new(0),
            timeouts_total: AtomicU64::new(0),
        }
    }

    /// Record a proposal fan-out.
    pub fn proposal_sent(&self, is_query: bool) {
        self.proposals_total.fetch_add(1, Ordering::Relaxed);
        if is_query {
            self.queries_total.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record one peer answer.
    pub fn endorsement_received(&self, status: EndorsementStatus) {
        let counter = match status {
            EndorsementStatus::Valid => &self.endorsements_valid,
            EndorsementStatus::Invalid => &self.endorsements_invalid,
            EndorsementStatus::Error => &self.endorsements_error,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a peer transport failure.
    pub fn peer_failed(&self) {
        self.endorsements_error.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a peer that never answered.
    pub fn peer_timed_out(&self) {
        self.peer_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an orderer acknowledgment.
    pub fn submission_acknowledged(&self) {
        self.submissions_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a submission no orderer accepted.
    pub fn submission_failed(&self) {
        self.submissions_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an endorsement mismatch.
    pub fn mismatch(&self) {
        self.mismatches_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a rejected proposal.
    pub fn rejected(&self) {
        self.rejections_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a timed out operation.
    pub fn timed_out(&self) {
        self.timeouts_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            proposals_total: self.proposals_total.load(Ordering::Relaxed),
            queries_total: self.queries_total.load(Ordering::Relaxed),
            endorsements_valid: self.endorsements_valid.load(Ordering::Relaxed),
            endorsements_invalid: self.endorsements_invalid.load(Ordering::Relaxed),
            endorsements_error: self.endorsements_error.load(Ordering::Relaxed),
            peer_timeouts: self.peer_timeouts.load(Ordering::Relaxed),
            submissions_total: self.submissions_total.load(Ordering::Relaxed),
            submissions_failed: self.submissions_failed.load(Ordering::Relaxed),
            mismatches_total: self.mismatches_total.load(Ordering::Relaxed),
            rejections_total: self.rejections_total.load(Ordering::Relaxed),
            timeouts_total: self.timeouts_total.load(Ordering::Relaxed),
        }
    }
}

impl Default for CoordinatorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    pub proposals_total: u64,
    pub queries_total: u64,
    pub endorsements_valid: u64,
    pub endorsements_invalid: u64,
    pub endorsements_error: u64,
    pub peer_timeouts: u64,
    pub submissions_total: u64,
    pub submissions_failed: u64,
    pub mismatches_total: u64,
    pub rejections_total: u64,
    pub timeouts_total: u64,
}
