//! Simulation scenarios.

use serde::{Deserialize, Serialize};

use crate::peer::Fault;

/// Names accepted by [`Scenario::load`].
pub const SCENARIOS: &[&str] = &[
    "demo",
    "identity-cache",
    "endorsement-mismatch",
    "peer-timeout",
    "all-rejected",
];

/// A simulation scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Description.
    pub description: String,
    /// Steps in the scenario.
    pub steps: Vec<ScenarioStep>,
}

/// What a transaction step is expected to produce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Expectation {
    /// `Ok` with every peer answering.
    Success,
    /// `Ok` with exactly this many peers missing.
    Partial { unanswered: usize },
    /// An error with this code.
    Failure { code: String },
}

impl Expectation {
    fn failure(code: &str) -> Self {
        Expectation::Failure {
            code: code.to_string(),
        }
    }
}

/// A step in a scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "kebab-case")]
pub enum ScenarioStep {
    /// Read-only chaincode call.
    Query {
        function: String,
        args: Vec<String>,
        expect: Expectation,
    },
    /// State-changing chaincode call.
    Invoke {
        function: String,
        args: Vec<String>,
        expect: Expectation,
    },
    /// The same query issued concurrently.
    QueryBurst {
        function: String,
        args: Vec<String>,
        count: usize,
        expect: Expectation,
    },
    /// Inject a fault.
    InjectFault { target: String, fault: Fault },
    /// Clear a fault.
    ClearFault { target: String },
    /// Build a fresh client against the same CA and identity store.
    Reconnect,
    /// Total enroll calls the CA has served.
    AssertEnrollments { count: usize },
    /// Committed world-state value.
    AssertValue { key: String, value: String },
}

fn strings(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

fn query(function: &str, args: &[&str], expect: Expectation) -> ScenarioStep {
    ScenarioStep::Query {
        function: function.to_string(),
        args: strings(args),
        expect,
    }
}

fn invoke(function: &str, args: &[&str], expect: Expectation) -> ScenarioStep {
    ScenarioStep::Invoke {
        function: function.to_string(),
        args: strings(args),
        expect,
    }
}

impl Scenario {
    /// Load a scenario by name for a network with `peers` peers.
    pub fn load(name: &str, peers: usize) -> anyhow::Result<Self> {
        let last_peer = format!("peer{}", peers.saturating_sub(1));
        match name {
            "demo" => Ok(Self::demo()),
            "identity-cache" => Ok(Self::identity_cache()),
            "endorsement-mismatch" if peers < 2 => {
                Err(anyhow::anyhow!("{} needs at least 2 peers", name))
            }
            "endorsement-mismatch" => Ok(Self::endorsement_mismatch(&last_peer)),
            "peer-timeout" if peers < 2 => Err(anyhow::anyhow!("{} needs at least 2 peers", name)),
            "peer-timeout" => Ok(Self::peer_timeout(&last_peer)),
            "all-rejected" => Ok(Self::all_rejected(peers)),
            _ => Err(anyhow::anyhow!(
                "Unknown scenario: {} (expected one of {})",
                name,
                SCENARIOS.join(", ")
            )),
        }
    }

    /// List, update, read back.
    fn demo() -> Self {
        Self {
            name: "demo".to_string(),
            description: "Enroll admin and user, list accounts, update ACCOUNT1, read it back".to_string(),
            steps: vec![
                query("list", &[], Expectation::Success),
                invoke("update", &["ACCOUNT1", "jill_1"], Expectation::Success),
                ScenarioStep::AssertValue {
                    key: "ACCOUNT1".to_string(),
                    value: "jill_1".to_string(),
                },
                query("query", &["ACCOUNT1"], Expectation::Success),
            ],
        }
    }

    /// Reconnecting reuses cached identities.
    fn identity_cache() -> Self {
        Self {
            name: "identity-cache".to_string(),
            description: "A second client start-up loads identities without enrolling again".to_string(),
            steps: vec![
                ScenarioStep::AssertEnrollments { count: 2 },
                ScenarioStep::Reconnect,
                ScenarioStep::AssertEnrollments { count: 2 },
                query("query", &["ACCOUNT0"], Expectation::Success),
            ],
        }
    }

    /// One peer endorses different output.
    fn endorsement_mismatch(target: &str) -> Self {
        Self {
            name: "endorsement-mismatch".to_string(),
            description: "Divergent endorsements are reported and never ordered".to_string(),
            steps: vec![
                ScenarioStep::InjectFault {
                    target: target.to_string(),
                    fault: Fault::Divergent,
                },
                invoke(
                    "update",
                    &["ACCOUNT2", "claire_1"],
                    Expectation::failure("ENDORSEMENT_MISMATCH"),
                ),
                ScenarioStep::AssertValue {
                    key: "ACCOUNT2".to_string(),
                    value: "claire".to_string(),
                },
                ScenarioStep::ClearFault {
                    target: target.to_string(),
                },
                invoke("update", &["ACCOUNT2", "claire_1"], Expectation::Success),
                ScenarioStep::AssertValue {
                    key: "ACCOUNT2".to_string(),
                    value: "claire_1".to_string(),
                },
            ],
        }
    }

    /// One peer stops answering in time.
    fn peer_timeout(target: &str) -> Self {
        Self {
            name: "peer-timeout".to_string(),
            description: "A slow peer yields partial query results and does not block invokes".to_string(),
            steps: vec![
                ScenarioStep::InjectFault {
                    target: target.to_string(),
                    fault: Fault::Latency { millis: 10_000 },
                },
                query("query", &["ACCOUNT1"], Expectation::Partial { unanswered: 1 }),
                ScenarioStep::QueryBurst {
                    function: "query".to_string(),
                    args: strings(&["ACCOUNT3"]),
                    count: 4,
                    expect: Expectation::Partial { unanswered: 1 },
                },
                invoke("update", &["ACCOUNT3", "leon_1"], Expectation::Success),
                ScenarioStep::ClearFault {
                    target: target.to_string(),
                },
                query("query", &["ACCOUNT3"], Expectation::Success),
            ],
        }
    }

    /// Every peer refuses.
    fn all_rejected(peers: usize) -> Self {
        let mut steps: Vec<ScenarioStep> = (0..peers)
            .map(|i| ScenarioStep::InjectFault {
                target: format!("peer{}", i),
                fault: Fault::Reject,
            })
            .collect();
        steps.push(invoke(
            "update",
            &["ACCOUNT4", "ada_1"],
            Expectation::failure("PROPOSAL_REJECTED"),
        ));
        steps.push(ScenarioStep::AssertValue {
            key: "ACCOUNT4".to_string(),
            value: "ada".to_string(),
        });

        Self {
            name: "all-rejected".to_string(),
            description: "Explicit refusals by every peer surface as a rejection".to_string(),
            steps,
        }
    }
}
