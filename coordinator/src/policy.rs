//! Endorsement policy.
//!
//! A proposal is endorsed when at least one peer answered VALID and every
//! VALID answer carries byte-identical chaincode output. Divergent output is
//! reported, never resolved by majority.

use ledgerlink_common::{EndorsementResponse, PayloadDigest};
use ledgerlink_crypto::sha256_hex;

/// Result of applying the policy to a response set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Every VALID response agrees.
    Endorsed {
        /// The agreed payload.
        payload: Vec<u8>,
        /// VALID responses only, in input order.
        endorsements: Vec<EndorsementResponse>,
    },
    /// VALID responses disagree. One digest per VALID response.
    Mismatch(Vec<PayloadDigest>),
    /// Nothing VALID.
    NoValid,
}

/// Apply the endorsement policy.
pub fn evaluate<'a, I>(responses: I) -> Verdict
where
    I: IntoIterator<Item = &'a EndorsementResponse>,
{
    let endorsements: Vec<EndorsementResponse> = responses
        .into_iter()
        .filter(|r| r.is_valid())
        .cloned()
        .collect();

    let Some(first) = endorsements.first() else {
        return Verdict::NoValid;
    };

    let reference = sha256_hex(&first.payload);
    let digests: Vec<PayloadDigest> = endorsements
        .iter()
        .map(|r| PayloadDigest {
            peer: r.peer.clone(),
            sha256: sha256_hex(&r.payload),
        })
        .collect();

    if digests.iter().any(|d| d.sha256 != reference) {
        return Verdict::Mismatch(digests);
    }

    Verdict::Endorsed {
        payload: first.payload.clone(),
        endorsements,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledgerlink_common::EndorsementStatus;
    use proptest::prelude::*;

    fn response(index: usize, status: EndorsementStatus, payload: Vec<u8>) -> EndorsementResponse {
        let peer = format!("peer{}", index);
        match status {
            EndorsementStatus::Valid => EndorsementResponse::valid(peer, payload, vec![0xAB]),
            EndorsementStatus::Invalid => EndorsementResponse::invalid(peer, "chaincode error"),
            EndorsementStatus::Error => EndorsementResponse::error(peer, "unavailable"),
        }
    }

    fn status_strategy() -> impl Strategy<Value = EndorsementStatus> {
        prop_oneof![
            Just(EndorsementStatus::Valid),
            Just(EndorsementStatus::Invalid),
            Just(EndorsementStatus::Error),
        ]
    }

    #[test]
    fn test_identical_payloads_endorsed() {
        let responses = vec![
            response(0, EndorsementStatus::Valid, b"P".to_vec()),
            response(1, EndorsementStatus::Valid, b"P".to_vec()),
        ];
        match evaluate(&responses) {
            Verdict::Endorsed {
                payload,
                endorsements,
            } => {
                assert_eq!(payload, b"P");
                assert_eq!(endorsements.len(), 2);
            }
            other => panic!("unexpected verdict: {other:?}"),
        }
    }

    #[test]
    fn test_divergent_payloads_mismatch() {
        let responses = vec![
            response(0, EndorsementStatus::Valid, b"P1".to_vec()),
            response(1, EndorsementStatus::Valid, b"P2".to_vec()),
        ];
        match evaluate(&responses) {
            Verdict::Mismatch(digests) => {
                assert_eq!(digests.len(), 2);
                assert_eq!(digests[0].peer, "peer0");
                assert_ne!(digests[0].sha256, digests[1].sha256);
            }
            other => panic!("unexpected verdict: {other:?}"),
        }
    }

    #[test]
    fn test_invalid_responses_ignored_when_one_valid() {
        let responses = vec![
            response(0, EndorsementStatus::Invalid, vec![]),
            response(1, EndorsementStatus::Valid, b"P".to_vec()),
            response(2, EndorsementStatus::Error, vec![]),
        ];
        assert!(matches!(evaluate(&responses), Verdict::Endorsed { .. }));
    }

    #[test]
    fn test_empty_is_no_valid() {
        assert_eq!(evaluate(&Vec::<EndorsementResponse>::new()), Verdict::NoValid);
    }

    proptest! {
        #[test]
        fn prop_agreeing_valid_set_is_endorsed(
            payload in proptest::collection::vec(any::<u8>(), 0..64),
            statuses in proptest::collection::vec(status_strategy(), 1..8),
        ) {
            prop_assume!(statuses.contains(&EndorsementStatus::Valid));
            let responses: Vec<_> = statuses
                .iter()
                .enumerate()
                .map(|(i, s)| response(i, *s, payload.clone()))
                .collect();

            let valid = statuses.iter().filter(|s| **s == EndorsementStatus::Valid).count();
            match evaluate(&responses) {
                Verdict::Endorsed { payload: agreed, endorsements } => {
                    prop_assert_eq!(agreed, payload);
                    prop_assert_eq!(endorsements.len(), valid);
                }
                other => prop_assert!(false, "unexpected verdict: {:?}", other),
            }
        }

        #[test]
        fn prop_divergent_valid_set_is_mismatch(
            payloads in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 0..16), 2..8),
        ) {
            let first = payloads[0].clone();
            prop_assume!(payloads.iter().any(|p| *p != first));
            let responses: Vec<_> = payloads
                .iter()
                .enumerate()
                .map(|(i, p)| response(i, EndorsementStatus::Valid, p.clone()))
                .collect();

            match evaluate(&responses) {
                Verdict::Mismatch(digests) => {
                    prop_assert_eq!(digests.len(), payloads.len());
                }
                other => prop_assert!(false, "unexpected verdict: {:?}", other),
            }
        }

        #[test]
        fn prop_no_valid_response_is_no_valid(
            statuses in proptest::collection::vec(
                prop_oneof![Just(EndorsementStatus::Invalid), Just(EndorsementStatus::Error)],
                0..8,
            ),
        ) {
            let responses: Vec<_> = statuses
                .iter()
                .enumerate()
                .map(|(i, s)| response(i, *s, vec![]))
                .collect();
            prop_assert_eq!(evaluate(&responses), Verdict::NoValid);
        }
    }
}
