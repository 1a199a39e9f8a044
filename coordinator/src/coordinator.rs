//! Core coordinator implementation.

use std::sync::Arc;

use chrono::Utc;
use tokio::task::JoinSet;
use tokio::time::{self, Instant};
use tracing::{debug, debug_span, error, info, instrument, warn, Instrument};

use ledgerlink_common::{
    ChaincodeId, EndorsementResponse, EndorsementStatus, Identity, LedgerError, Nonce,
    OperationKind, PeerDiagnostic, PeerPayload, ProposalEnvelope, ProposalRequest, QueryOutcome,
    Result, SubmissionReceipt, TransactionEnvelope, TransactionOutcome, TxId, TxPhase,
};
use ledgerlink_crypto::sha256_parts;

use crate::channel::ChannelHandle;
use crate::config::CoordinatorConfig;
use crate::metrics::CoordinatorMetrics;
use crate::policy::{self, Verdict};
use crate::state::OperationState;
use crate::transport::BroadcastStatus;

/// What one peer's slot holds once collection is over.
#[derive(Debug, Clone)]
enum Slot {
    Pending,
    Answered(EndorsementResponse),
    TimedOut,
    Failed(String),
}

/// Runs invokes and queries against a channel.
///
/// Stateless between calls apart from metrics; every call is an independent
/// run of the proposal state machine.
pub struct TransactionCoordinator {
    config: CoordinatorConfig,
    metrics: Arc<CoordinatorMetrics>,
}

impl TransactionCoordinator {
    /// Create a new coordinator.
    pub fn new(config: CoordinatorConfig) -> Self {
        Self {
            config,
            metrics: Arc::new(CoordinatorMetrics::new()),
        }
    }

    /// Configuration in use.
    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Shared metrics handle.
    pub fn metrics(&self) -> Arc<CoordinatorMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Endorse a state-changing call and hand it to the ordering service.
    pub async fn invoke<I, S>(
        &self,
        identity: &Identity,
        channel: &ChannelHandle,
        chaincode: impl Into<ChaincodeId>,
        function: &str,
        args: I,
    ) -> Result<TransactionOutcome>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let request = ProposalRequest::new(chaincode, function, args);
        self.invoke_request(identity, channel, request).await
    }

    /// Run a read-only call on every peer.
    pub async fn query<I, S>(
        &self,
        identity: &Identity,
        channel: &ChannelHandle,
        chaincode: impl Into<ChaincodeId>,
        function: &str,
        args: I,
    ) -> Result<QueryOutcome>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let request = ProposalRequest::new(chaincode, function, args);
        self.query_request(identity, channel, request).await
    }

    /// Invoke with a prepared request.
    #[instrument(skip(self, identity, channel, request), fields(channel = %channel.name(), request = %request, creator = %identity.name()))]
    pub async fn invoke_request(
        &self,
        identity: &Identity,
        channel: &ChannelHandle,
        request: ProposalRequest,
    ) -> Result<TransactionOutcome> {
        let proposal = Arc::new(self.build_proposal(identity, channel, request));
        let tx_id = proposal.tx_id.clone();
        let mut state = OperationState::new(tx_id.clone(), OperationKind::Invoke);

        state.advance(TxPhase::Proposed)?;
        self.metrics.proposal_sent(false);
        let slots = self.collect_endorsements(channel, Arc::clone(&proposal)).await;
        let diagnostics = diagnostics(channel, &slots);

        match policy::evaluate(answered(&slots)) {
            Verdict::Endorsed {
                payload,
                endorsements,
            } => {
                state.advance(TxPhase::Endorsed)?;
                info!(tx_id = %tx_id.short(), endorsements = endorsements.len(), "Proposal endorsed");

                let payloads = endorsements
                    .iter()
                    .map(|r| PeerPayload {
                        peer: r.peer.clone(),
                        status: r.status,
                        payload: r.payload.clone(),
                    })
                    .collect();

                let envelope = TransactionEnvelope {
                    tx_id: tx_id.clone(),
                    channel: proposal.channel.clone(),
                    creator: proposal.creator.clone(),
                    request: proposal.request.clone(),
                    payload,
                    endorsements,
                };

                let receipt = self.submit(channel, envelope).await?;
                state.advance(TxPhase::Submitted)?;
                info!(tx_id = %tx_id.short(), orderer = %receipt.orderer, "Transaction submitted");

                Ok(TransactionOutcome {
                    tx_id,
                    accepted: true,
                    payloads,
                    receipt: Some(receipt),
                    diagnostics,
                })
            }
            Verdict::Mismatch(payloads) => {
                state.advance(TxPhase::Rejected)?;
                self.metrics.mismatch();
                error!(tx_id = %tx_id.short(), endorsers = payloads.len(), "Endorsement mismatch");
                Err(LedgerError::EndorsementMismatch { tx_id, payloads })
            }
            Verdict::NoValid => {
                state.advance(TxPhase::Rejected)?;
                Err(self.no_quorum(tx_id, OperationKind::Invoke, &slots, diagnostics))
            }
        }
    }

    /// Query with a prepared request.
    #[instrument(skip(self, identity, channel, request), fields(channel = %channel.name(), request = %request, creator = %identity.name()))]
    pub async fn query_request(
        &self,
        identity: &Identity,
        channel: &ChannelHandle,
        request: ProposalRequest,
    ) -> Result<QueryOutcome> {
        let proposal = Arc::new(self.build_proposal(identity, channel, request));
        let tx_id = proposal.tx_id.clone();
        let mut state = OperationState::new(tx_id.clone(), OperationKind::Query);

        state.advance(TxPhase::Proposed)?;
        self.metrics.proposal_sent(true);
        let slots = self.collect_endorsements(channel, proposal).await;

        let processed = answered(&slots).any(|r| r.status != EndorsementStatus::Error);
        if !processed {
            state.advance(TxPhase::Rejected)?;
            let diagnostics = diagnostics(channel, &slots);
            return Err(self.no_quorum(tx_id, OperationKind::Query, &slots, diagnostics));
        }

        let mut payloads = Vec::new();
        let mut unanswered = Vec::new();
        for (peer, slot) in channel.peers().iter().zip(&slots) {
            match slot {
                Slot::Answered(response) => payloads.push(PeerPayload {
                    peer: response.peer.clone(),
                    status: response.status,
                    payload: response.payload.clone(),
                }),
                other => unanswered.push(diagnostic(peer.name(), other)),
            }
        }

        state.advance(TxPhase::Endorsed)?;
        if !unanswered.is_empty() {
            warn!(tx_id = %tx_id.short(), missing = unanswered.len(), "Partial query result");
        }

        Ok(QueryOutcome {
            tx_id,
            payloads,
            unanswered,
        })
    }

    fn build_proposal(
        &self,
        identity: &Identity,
        channel: &ChannelHandle,
        request: ProposalRequest,
    ) -> ProposalEnvelope {
        let creator = identity.creator();
        let nonce = Nonce::new();
        let digest = sha256_parts(&[nonce.as_bytes(), &creator.to_bytes()]);

        ProposalEnvelope {
            tx_id: TxId::new(hex::encode(digest)),
            channel: channel.name().to_string(),
            creator,
            nonce,
            request,
            timestamp: Utc::now(),
        }
    }

    /// Fan the proposal out, one task per peer, each writing its own slot.
    async fn collect_endorsements(
        &self,
        channel: &ChannelHandle,
        proposal: Arc<ProposalEnvelope>,
    ) -> Vec<Slot> {
        let peers = channel.peers();
        let mut slots = vec![Slot::Pending; peers.len()];
        let mut tasks = JoinSet::new();
        let peer_timeout = self.config.peer_timeout;

        for (index, peer) in peers.iter().enumerate() {
            let peer = Arc::clone(peer);
            let proposal = Arc::clone(&proposal);
            let span = debug_span!("endorse", peer = %peer.name());
            tasks.spawn(
                async move {
                    let result = time::timeout(peer_timeout, peer.process_proposal(&proposal)).await;
                    (index, result)
                }
                .instrument(span),
            );
        }

        let deadline = Instant::now() + self.config.operation_timeout;
        loop {
            match time::timeout_at(deadline, tasks.join_next()).await {
                Ok(Some(Ok((index, result)))) => {
                    slots[index] = match result {
                        Ok(Ok(response)) => {
                            self.metrics.endorsement_received(response.status);
                            debug!(peer = %response.peer, status = %response.status, "Endorsement received");
                            Slot::Answered(response)
                        }
                        Ok(Err(e)) => {
                            self.metrics.peer_failed();
                            warn!(peer = %peers[index].name(), error = %e, "Peer failed");
                            Slot::Failed(e.to_string())
                        }
                        Err(_) => {
                            self.metrics.peer_timed_out();
                            warn!(peer = %peers[index].name(), "Peer timed out");
                            Slot::TimedOut
                        }
                    };
                }
                Ok(Some(Err(join_error))) => {
                    error!(error = %join_error, "Endorsement task failed");
                }
                Ok(None) => break,
                Err(_) => {
                    warn!(outstanding = tasks.len(), "Operation deadline reached, cancelling peers");
                    tasks.abort_all();
                    for slot in slots.iter_mut().filter(|s| matches!(s, Slot::Pending)) {
                        self.metrics.peer_timed_out();
                        *slot = Slot::TimedOut;
                    }
                    break;
                }
            }
        }

        // Only a panicked task leaves its slot pending.
        for slot in slots.iter_mut().filter(|s| matches!(s, Slot::Pending)) {
            *slot = Slot::Failed("endorsement task aborted".to_string());
        }

        slots
    }

    /// Broadcast to every orderer; the first acknowledgment wins.
    #[instrument(skip(self, channel, envelope), fields(tx_id = %envelope.tx_id.short()))]
    async fn submit(
        &self,
        channel: &ChannelHandle,
        envelope: TransactionEnvelope,
    ) -> Result<SubmissionReceipt> {
        let envelope = Arc::new(envelope);
        let tx_id = envelope.tx_id.clone();
        let orderer_timeout = self.config.orderer_timeout;
        let mut tasks = JoinSet::new();

        for orderer in channel.orderers() {
            let orderer = Arc::clone(orderer);
            let envelope = Arc::clone(&envelope);
            tasks.spawn(async move {
                let result = time::timeout(orderer_timeout, orderer.broadcast(&envelope)).await;
                (orderer.name().to_string(), result)
            });
        }

        let mut failures = Vec::new();
        let mut silent = Vec::new();

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((orderer, Ok(Ok(ack)))) if ack.status == BroadcastStatus::Success => {
                    tasks.abort_all();
                    self.metrics.submission_acknowledged();
                    return Ok(SubmissionReceipt {
                        tx_id,
                        orderer,
                        status: ack.status.to_string(),
                        acknowledged_at: Utc::now(),
                    });
                }
                Ok((orderer, Ok(Ok(ack)))) => {
                    warn!(orderer = %orderer, status = %ack.status, info = %ack.info, "Orderer refused transaction");
                    failures.push(format!("{}: {} {}", orderer, ack.status, ack.info));
                }
                Ok((orderer, Ok(Err(e)))) => {
                    warn!(orderer = %orderer, error = %e, "Broadcast failed");
                    failures.push(format!("{}: {}", orderer, e));
                }
                Ok((orderer, Err(_))) => {
                    warn!(orderer = %orderer, "Orderer timed out");
                    silent.push(PeerDiagnostic::timed_out(orderer));
                }
                Err(join_error) => {
                    error!(error = %join_error, "Broadcast task failed");
                    failures.push(join_error.to_string());
                }
            }
        }

        self.metrics.submission_failed();
        if failures.is_empty() {
            self.metrics.timed_out();
            return Err(LedgerError::Timeout {
                tx_id,
                operation: OperationKind::Invoke,
                responses: silent,
            });
        }

        failures.extend(silent.iter().map(|d| d.to_string()));
        Err(LedgerError::SubmissionFailed { tx_id, failures })
    }

    /// Error for a run where no peer gave a usable answer.
    fn no_quorum(
        &self,
        tx_id: TxId,
        operation: OperationKind,
        slots: &[Slot],
        responses: Vec<PeerDiagnostic>,
    ) -> LedgerError {
        if slots.iter().any(|s| matches!(s, Slot::TimedOut)) {
            self.metrics.timed_out();
            warn!(tx_id = %tx_id.short(), operation = %operation, "Not enough answers before deadline");
            LedgerError::Timeout {
                tx_id,
                operation,
                responses,
            }
        } else {
            self.metrics.rejected();
            warn!(tx_id = %tx_id.short(), operation = %operation, "Proposal rejected by all peers");
            LedgerError::ProposalRejected { tx_id, responses }
        }
    }
}

fn answered(slots: &[Slot]) -> impl Iterator<Item = &EndorsementResponse> {
    slots.iter().filter_map(|slot| match slot {
        Slot::Answered(response) => Some(response),
        _ => None,
    })
}

fn diagnostic(peer: &str, slot: &Slot) -> PeerDiagnostic {
    match slot {
        Slot::Answered(response) => PeerDiagnostic::responded(response),
        Slot::TimedOut | Slot::Pending => PeerDiagnostic::timed_out(peer),
        Slot::Failed(reason) => PeerDiagnostic::failed(peer, reason.clone()),
    }
}

fn diagnostics(channel: &ChannelHandle, slots: &[Slot]) -> Vec<PeerDiagnostic> {
    channel
        .peers()
        .iter()
        .zip(slots)
        .map(|(peer, slot)| diagnostic(peer.name(), slot))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use ledgerlink_common::{EnrollmentMaterial, PeerOutcome};

    use crate::mock::{MockOrderer, MockPeer, OrdererReply, PeerReply};
    use crate::transport::{BroadcastAck, EndorsingPeer, OrderingService};

    fn identity() -> Identity {
        Identity::new(
            "wesker",
            "org1",
            "Org1MSP",
            EnrollmentMaterial::new(b"cert-wesker".to_vec(), vec![7; 32]),
        )
    }

    fn channel(peers: Vec<Arc<MockPeer>>, orderers: Vec<Arc<MockOrderer>>) -> ChannelHandle {
        let peers: Vec<Arc<dyn EndorsingPeer>> = peers.into_iter().map(|p| p as Arc<dyn EndorsingPeer>).collect();
        let orderers: Vec<Arc<dyn OrderingService>> = orderers
            .into_iter()
            .map(|o| o as Arc<dyn OrderingService>)
            .collect();
        ChannelHandle::from_parts("mychannel", peers, orderers).unwrap()
    }

    fn coordinator() -> TransactionCoordinator {
        TransactionCoordinator::new(CoordinatorConfig {
            peer_timeout: Duration::from_secs(2),
            operation_timeout: Duration::from_secs(5),
            orderer_timeout: Duration::from_secs(2),
        })
    }

    #[tokio::test]
    async fn test_invoke_identical_payloads_submitted() {
        let p0 = Arc::new(MockPeer::valid("peer0", b"P".to_vec()));
        let p1 = Arc::new(MockPeer::valid("peer1", b"P".to_vec()));
        let orderer = Arc::new(MockOrderer::accepting("orderer0"));
        let channel = channel(vec![p0.clone(), p1.clone()], vec![orderer.clone()]);
        let coordinator = coordinator();

        let outcome = coordinator
            .invoke(&identity(), &channel, "account", "update", ["ACCOUNT1", "jill_1"])
            .await
            .unwrap();

        assert!(outcome.accepted);
        assert_eq!(outcome.payload(), Some(&b"P"[..]));
        assert_eq!(outcome.payloads.len(), 2);
        assert_eq!(outcome.receipt.as_ref().unwrap().orderer, "orderer0");

        let received = orderer.received();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].tx_id, outcome.tx_id);
        assert_eq!(received[0].endorsements.len(), 2);
        assert_eq!(received[0].request.args, vec!["ACCOUNT1", "jill_1"]);

        assert_eq!(p0.seen(), vec![outcome.tx_id.clone()]);
        assert_eq!(p1.seen(), vec![outcome.tx_id.clone()]);

        let snapshot = coordinator.metrics().snapshot();
        assert_eq!(snapshot.submissions_total, 1);
        assert_eq!(snapshot.endorsements_valid, 2);
    }

    #[tokio::test]
    async fn test_invoke_divergent_payloads_never_submitted() {
        let orderer = Arc::new(MockOrderer::accepting("orderer0"));
        let channel = channel(
            vec![
                Arc::new(MockPeer::valid("peer0", b"P1".to_vec())),
                Arc::new(MockPeer::valid("peer1", b"P2".to_vec())),
            ],
            vec![orderer.clone()],
        );
        let coordinator = coordinator();

        let err = coordinator
            .invoke(&identity(), &channel, "account", "update", ["ACCOUNT1", "jill_1"])
            .await
            .unwrap_err();

        match err {
            LedgerError::EndorsementMismatch { payloads, .. } => {
                assert_eq!(payloads.len(), 2);
                assert_eq!(payloads[1].peer, "peer1");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(orderer.received().is_empty());
        assert_eq!(coordinator.metrics().snapshot().mismatches_total, 1);
    }

    #[tokio::test]
    async fn test_invoke_all_invalid_rejected_with_diagnostics() {
        let orderer = Arc::new(MockOrderer::accepting("orderer0"));
        let channel = channel(
            vec![
                Arc::new(MockPeer::invalid("peer0", "chaincode error")),
                Arc::new(MockPeer::new("peer1", PeerReply::Error("unavailable".into()))),
            ],
            vec![orderer.clone()],
        );

        let err = coordinator()
            .invoke(&identity(), &channel, "account", "update", ["ACCOUNT1"])
            .await
            .unwrap_err();

        assert!(matches!(err, LedgerError::ProposalRejected { .. }));
        let diagnostics = err.peer_diagnostics();
        assert_eq!(diagnostics.len(), 2);
        assert_eq!(diagnostics[0].peer, "peer0");
        assert!(matches!(
            diagnostics[1].outcome,
            PeerOutcome::Responded {
                status: EndorsementStatus::Error,
                ..
            }
        ));
        assert!(orderer.received().is_empty());
    }

    #[tokio::test]
    async fn test_invoke_forwards_only_valid_endorsements() {
        let orderer = Arc::new(MockOrderer::accepting("orderer0"));
        let channel = channel(
            vec![
                Arc::new(MockPeer::invalid("peer0", "endorsement policy failure")),
                Arc::new(MockPeer::valid("peer1", b"P".to_vec())),
                Arc::new(MockPeer::new("peer2", PeerReply::Fail("connection reset".into()))),
            ],
            vec![orderer.clone()],
        );

        let outcome = coordinator()
            .invoke(&identity(), &channel, "account", "update", ["ACCOUNT1", "jill_1"])
            .await
            .unwrap();

        assert_eq!(outcome.payloads.len(), 1);
        assert_eq!(outcome.diagnostics.len(), 3);
        assert!(matches!(outcome.diagnostics[2].outcome, PeerOutcome::Failed(_)));

        let received = orderer.received();
        assert_eq!(received[0].endorsements.len(), 1);
        assert_eq!(received[0].endorsements[0].peer, "peer1");
    }

    #[tokio::test(start_paused = true)]
    async fn test_invoke_silent_peers_time_out_not_rejected() {
        let channel = channel(
            vec![
                Arc::new(MockPeer::invalid("peer0", "chaincode error")),
                Arc::new(MockPeer::hanging("peer1")),
            ],
            vec![Arc::new(MockOrderer::accepting("orderer0"))],
        );

        let err = coordinator()
            .invoke(&identity(), &channel, "account", "update", ["ACCOUNT1"])
            .await
            .unwrap_err();

        match err {
            LedgerError::Timeout {
                operation,
                responses,
                ..
            } => {
                assert_eq!(operation, OperationKind::Invoke);
                assert_eq!(responses[1], PeerDiagnostic::timed_out("peer1"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_operation_deadline_cancels_slow_peers() {
        let coordinator = TransactionCoordinator::new(CoordinatorConfig {
            peer_timeout: Duration::from_secs(5),
            operation_timeout: Duration::from_secs(5),
            orderer_timeout: Duration::from_secs(2),
        });
        let channel = channel(
            vec![
                Arc::new(MockPeer::valid("peer0", b"P".to_vec()).with_delay(Duration::from_secs(60))),
                Arc::new(MockPeer::hanging("peer1")),
            ],
            vec![Arc::new(MockOrderer::accepting("orderer0"))],
        );

        let started = Instant::now();
        let err = coordinator
            .invoke(&identity(), &channel, "account", "update", ["ACCOUNT1"])
            .await
            .unwrap_err();

        assert!(matches!(err, LedgerError::Timeout { .. }));
        assert!(started.elapsed() <= Duration::from_secs(6));
        assert_eq!(coordinator.metrics().snapshot().peer_timeouts, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_query_one_peer_times_out() {
        let channel = channel(
            vec![
                Arc::new(MockPeer::valid("peer0", b"100".to_vec())),
                Arc::new(MockPeer::hanging("peer1")),
                Arc::new(MockPeer::valid("peer2", b"100".to_vec())),
            ],
            vec![Arc::new(MockOrderer::accepting("orderer0"))],
        );

        let started = Instant::now();
        let outcome = coordinator()
            .query(&identity(), &channel, "account", "query", ["ACCOUNT1"])
            .await
            .unwrap();

        assert!(started.elapsed() <= Duration::from_secs(3));
        assert_eq!(outcome.payload_bytes(), vec![b"100".to_vec(), b"100".to_vec()]);
        assert_eq!(outcome.payloads[0].peer, "peer0");
        assert_eq!(outcome.payloads[1].peer, "peer2");
        assert!(outcome.is_partial());
        assert_eq!(outcome.unanswered, vec![PeerDiagnostic::timed_out("peer1")]);
    }

    #[tokio::test]
    async fn test_query_keeps_duplicates_in_peer_order() {
        let orderer = Arc::new(MockOrderer::accepting("orderer0"));
        let channel = channel(
            vec![
                Arc::new(MockPeer::valid("peer0", b"same".to_vec()).with_delay(Duration::from_millis(30))),
                Arc::new(MockPeer::valid("peer1", b"same".to_vec())),
                Arc::new(MockPeer::invalid("peer2", "no such key")),
            ],
            vec![orderer.clone()],
        );

        let outcome = coordinator()
            .query(&identity(), &channel, "account", "list", Vec::<String>::new())
            .await
            .unwrap();

        let peers: Vec<_> = outcome.payloads.iter().map(|p| p.peer.as_str()).collect();
        assert_eq!(peers, vec!["peer0", "peer1", "peer2"]);
        assert_eq!(outcome.payloads[2].status, EndorsementStatus::Invalid);
        assert!(!outcome.is_partial());
        assert!(orderer.received().is_empty());
    }

    #[tokio::test]
    async fn test_query_all_error_rejected() {
        let channel = channel(
            vec![
                Arc::new(MockPeer::new("peer0", PeerReply::Error("unavailable".into()))),
                Arc::new(MockPeer::new("peer1", PeerReply::Error("unavailable".into()))),
            ],
            vec![Arc::new(MockOrderer::accepting("orderer0"))],
        );

        let err = coordinator()
            .query(&identity(), &channel, "account", "query", ["ACCOUNT1"])
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::ProposalRejected { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_query_nobody_answers_times_out() {
        let channel = channel(
            vec![Arc::new(MockPeer::hanging("peer0"))],
            vec![Arc::new(MockOrderer::accepting("orderer0"))],
        );

        let err = coordinator()
            .query(&identity(), &channel, "account", "query", ["ACCOUNT1"])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Timeout {
                operation: OperationKind::Query,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_first_orderer_ack_wins() {
        let refusing = Arc::new(MockOrderer::new(
            "orderer0",
            OrdererReply::Ack(BroadcastAck::refused(BroadcastStatus::ServiceUnavailable, "no leader")),
        ));
        let accepting = Arc::new(MockOrderer::accepting("orderer1"));
        let channel = channel(
            vec![Arc::new(MockPeer::valid("peer0", b"P".to_vec()))],
            vec![refusing, accepting],
        );

        let outcome = coordinator()
            .invoke(&identity(), &channel, "account", "update", ["ACCOUNT1", "jill_1"])
            .await
            .unwrap();
        assert_eq!(outcome.receipt.unwrap().orderer, "orderer1");
    }

    #[tokio::test]
    async fn test_all_orderers_refuse() {
        let channel = channel(
            vec![Arc::new(MockPeer::valid("peer0", b"P".to_vec()))],
            vec![
                Arc::new(MockOrderer::new(
                    "orderer0",
                    OrdererReply::Ack(BroadcastAck::refused(BroadcastStatus::BadRequest, "malformed")),
                )),
                Arc::new(MockOrderer::new("orderer1", OrdererReply::Fail("connection refused".into()))),
            ],
        );

        let err = coordinator()
            .invoke(&identity(), &channel, "account", "update", ["ACCOUNT1", "jill_1"])
            .await
            .unwrap_err();

        match err {
            LedgerError::SubmissionFailed { failures, .. } => assert_eq!(failures.len(), 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_orderers_time_out() {
        let channel = channel(
            vec![Arc::new(MockPeer::valid("peer0", b"P".to_vec()))],
            vec![Arc::new(MockOrderer::new("orderer0", OrdererReply::Hang))],
        );

        let err = coordinator()
            .invoke(&identity(), &channel, "account", "update", ["ACCOUNT1", "jill_1"])
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Timeout { .. }));
    }

    #[test]
    fn test_tx_id_binds_nonce_and_creator() {
        let channel = channel(
            vec![Arc::new(MockPeer::valid("peer0", b"P".to_vec()))],
            vec![Arc::new(MockOrderer::accepting("orderer0"))],
        );
        let coordinator = coordinator();
        let identity = identity();

        let request = ProposalRequest::new("account", "list", Vec::<String>::new());
        let first = coordinator.build_proposal(&identity, &channel, request.clone());
        let second = coordinator.build_proposal(&identity, &channel, request);

        let expected = hex::encode(sha256_parts(&[
            first.nonce.as_bytes(),
            &identity.creator().to_bytes(),
        ]));
        assert_eq!(first.tx_id.as_str(), expected);
        assert_eq!(first.tx_id.as_str().len(), 64);
        assert_ne!(first.tx_id, second.tx_id);
        assert_eq!(first.channel, "mychannel");
    }
}
