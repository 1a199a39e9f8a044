//! Simulation controller.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use serde::Serialize;
use tracing::{info, warn};

use ledgerlink_client::{ClientConfig, LedgerClient};
use ledgerlink_common::{LedgerError, QueryOutcome};
use ledgerlink_coordinator::{CoordinatorConfig, EndpointSpec};
use ledgerlink_identity::{FileIdentityStore, IdentityStore, MemoryIdentityStore};

use crate::ca::SimulatedCa;
use crate::metrics::SimulationMetrics;
use crate::network::SimulatedNetwork;
use crate::scenario::{Expectation, Scenario, ScenarioStep};

/// How to lay out the simulated network.
#[derive(Debug, Clone)]
pub struct SimulationOptions {
    pub peers: usize,
    pub orderers: usize,
    pub identity_dir: Option<PathBuf>,
    pub seed: Option<u64>,
}

impl Default for SimulationOptions {
    fn default() -> Self {
        Self {
            peers: 2,
            orderers: 1,
            identity_dir: None,
            seed: None,
        }
    }
}

/// Result of one step.
#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub step: String,
    pub passed: bool,
    pub detail: String,
}

/// Result of a whole scenario.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub scenario: String,
    pub passed: bool,
    pub steps: Vec<StepReport>,
    pub metrics: SimulationMetrics,
    pub ca_enrollments: usize,
}

/// Owns the simulated network and the client under test.
pub struct SimulationController {
    config: ClientConfig,
    ca: Arc<SimulatedCa>,
    network: Arc<SimulatedNetwork>,
    store: Arc<dyn IdentityStore>,
    client: Option<LedgerClient>,
    metrics: SimulationMetrics,
}

impl SimulationController {
    /// Create a controller and its network. No identity is enrolled yet.
    pub async fn new(options: SimulationOptions) -> anyhow::Result<Self> {
        anyhow::ensure!(options.peers > 0, "at least one peer is required");
        anyhow::ensure!(options.orderers > 0, "at least one orderer is required");

        let mut config = ClientConfig {
            ca_url: "sim://ca.org1:7054".to_string(),
            peers: (0..options.peers)
                .map(|i| EndpointSpec::new(format!("peer{}", i), format!("sim://peer{}.org1:{}", i, 7051 + i * 1000)))
                .collect(),
            orderers: (0..options.orderers)
                .map(|i| EndpointSpec::new(format!("orderer{}", i), format!("sim://orderer{}:{}", i, 7050 + i * 1000)))
                .collect(),
            coordinator: CoordinatorConfig {
                peer_timeout: Duration::from_millis(500),
                operation_timeout: Duration::from_secs(2),
                orderer_timeout: Duration::from_secs(1),
            },
            ..ClientConfig::default()
        };

        let store: Arc<dyn IdentityStore> = match &options.identity_dir {
            Some(dir) => {
                config.identity.store_dir = dir.clone();
                Arc::new(FileIdentityStore::open(dir).await?)
            }
            None => Arc::new(MemoryIdentityStore::new()),
        };

        let ca = Arc::new(SimulatedCa::new(
            config.ca_url.clone(),
            config.identity.admin_name.clone(),
            config.identity.admin_secret.clone(),
            options.seed,
        ));
        let network = Arc::new(SimulatedNetwork::new(
            config.channel.clone(),
            options.seed.map(|s| s.wrapping_add(1)),
        ));

        Ok(Self {
            config,
            ca,
            network,
            store,
            client: None,
            metrics: SimulationMetrics::new(),
        })
    }

    /// Run the client start-up sequence.
    pub async fn initialize(&mut self) -> anyhow::Result<()> {
        let client = LedgerClient::builder(self.config.clone())
            .ca(self.ca.clone())
            .connector(self.network.clone())
            .store(Arc::clone(&self.store))
            .build()
            .await?;

        info!(
            admin = %client.admin(),
            user = %client.user(),
            channel = %client.channel().name(),
            "Client initialized"
        );
        self.client = Some(client);
        Ok(())
    }

    /// Run a scenario.
    pub async fn run_scenario(&mut self, scenario: &Scenario) -> anyhow::Result<ScenarioReport> {
        info!("Running scenario: {} - {}", scenario.name, scenario.description);

        if self.client.is_none() {
            self.initialize().await?;
        }

        let mut steps = Vec::with_capacity(scenario.steps.len());
        for step in &scenario.steps {
            let report = self.execute_step(step).await?;
            if report.passed {
                info!(step = %report.step, detail = %report.detail, "Step passed");
            } else {
                warn!(step = %report.step, detail = %report.detail, "Step failed");
            }
            steps.push(report);
        }

        Ok(ScenarioReport {
            scenario: scenario.name.clone(),
            passed: steps.iter().all(|s| s.passed),
            steps,
            metrics: self.metrics.clone(),
            ca_enrollments: self.ca.enroll_count(),
        })
    }

    /// Get simulation metrics.
    pub fn metrics(&self) -> &SimulationMetrics {
        &self.metrics
    }

    fn client(&self) -> anyhow::Result<&LedgerClient> {
        self.client
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("client not initialized"))
    }

    /// Execute a single scenario step.
    async fn execute_step(&mut self, step: &ScenarioStep) -> anyhow::Result<StepReport> {
        let report = match step {
            ScenarioStep::Query {
                function,
                args,
                expect,
            } => {
                let label = format!("query {}({})", function, args.join(", "));
                let started = Instant::now();
                let result = self.client()?.query(function, args.iter().cloned()).await;
                self.record(started, result.is_ok());
                if let Ok(outcome) = &result {
                    log_payloads(outcome);
                }
                check_query(label, &result, expect)
            }
            ScenarioStep::Invoke {
                function,
                args,
                expect,
            } => {
                let label = format!("invoke {}({})", function, args.join(", "));
                let started = Instant::now();
                let result = self.client()?.invoke(function, args.iter().cloned()).await;
                self.record(started, result.is_ok());
                let result = result.map(|outcome| {
                    format!(
                        "tx {} accepted by {}",
                        outcome.tx_id.short(),
                        outcome
                            .receipt
                            .map(|r| r.orderer)
                            .unwrap_or_default()
                    )
                });
                check(label, result, expect, |_| Ok(()))
            }
            ScenarioStep::QueryBurst {
                function,
                args,
                count,
                expect,
            } => {
                let label = format!("{} x query {}({})", count, function, args.join(", "));
                let client = self.client()?;
                let started = Instant::now();
                let results = join_all(
                    (0..*count).map(|_| client.query(function, args.iter().cloned())),
                )
                .await;
                let elapsed = started.elapsed();

                let mut failures = Vec::new();
                for result in &results {
                    let report = check_query(label.clone(), result, expect);
                    if !report.passed {
                        failures.push(report.detail);
                    }
                }
                for result in &results {
                    self.record_latency(elapsed, result.is_ok());
                }

                StepReport {
                    passed: failures.is_empty(),
                    detail: if failures.is_empty() {
                        format!("{} concurrent queries in {}ms", count, elapsed.as_millis())
                    } else {
                        failures.join("; ")
                    },
                    step: label,
                }
            }
            ScenarioStep::InjectFault { target, fault } => {
                self.network.inject(target, *fault)?;
                StepReport {
                    step: format!("inject {:?} on {}", fault, target),
                    passed: true,
                    detail: String::new(),
                }
            }
            ScenarioStep::ClearFault { target } => {
                self.network.clear(target)?;
                StepReport {
                    step: format!("clear fault on {}", target),
                    passed: true,
                    detail: String::new(),
                }
            }
            ScenarioStep::Reconnect => {
                self.client = None;
                self.initialize().await?;
                StepReport {
                    step: "reconnect".to_string(),
                    passed: true,
                    detail: String::new(),
                }
            }
            ScenarioStep::AssertEnrollments { count } => {
                let actual = self.ca.enroll_count();
                StepReport {
                    step: format!("assert {} CA enrollments", count),
                    passed: actual == *count,
                    detail: format!("CA served {} enrollments", actual),
                }
            }
            ScenarioStep::AssertValue { key, value } => {
                let actual = self.network.value(key);
                StepReport {
                    step: format!("assert {} = {}", key, value),
                    passed: actual.as_deref() == Some(value.as_str()),
                    detail: format!("committed value {:?}", actual),
                }
            }
        };

        Ok(report)
    }

    fn record(&mut self, started: Instant, ok: bool) {
        self.record_latency(started.elapsed(), ok);
    }

    fn record_latency(&mut self, elapsed: Duration, ok: bool) {
        let latency = elapsed.as_millis() as u64;
        if ok {
            self.metrics.record_success(latency);
        } else {
            self.metrics.record_failure(latency);
        }
    }
}

fn log_payloads(outcome: &QueryOutcome) {
    for payload in &outcome.payloads {
        info!(
            peer = %payload.peer,
            status = %payload.status,
            "{}",
            String::from_utf8_lossy(&payload.payload)
        );
    }
}

fn check_query(label: String, result: &Result<QueryOutcome, LedgerError>, expect: &Expectation) -> StepReport {
    let summary = result.as_ref().map(|outcome| {
        (
            outcome.unanswered.len(),
            format!(
                "{} payloads, {} unanswered",
                outcome.payloads.len(),
                outcome.unanswered.len()
            ),
        )
    });
    let (missing, detail) = match summary {
        Ok((missing, detail)) => (missing, Ok(detail)),
        Err(e) => (0, Err(e)),
    };

    check(label, detail, expect, |_| match expect {
        Expectation::Success if missing > 0 => Err(format!("{} peers did not answer", missing)),
        Expectation::Partial { unanswered } if missing != *unanswered => Err(format!(
            "expected {} unanswered peers, got {}",
            unanswered, missing
        )),
        _ => Ok(()),
    })
}

fn check<E, F>(label: String, result: Result<String, E>, expect: &Expectation, extra: F) -> StepReport
where
    E: std::borrow::Borrow<LedgerError>,
    F: FnOnce(&str) -> Result<(), String>,
{
    let (passed, detail) = match (result, expect) {
        (Ok(detail), Expectation::Success | Expectation::Partial { .. }) => match extra(&detail) {
            Ok(()) => (true, detail),
            Err(reason) => (false, reason),
        },
        (Ok(detail), Expectation::Failure { code }) => {
            (false, format!("expected {} but succeeded: {}", code, detail))
        }
        (Err(e), Expectation::Failure { code }) => {
            let e = e.borrow();
            (e.error_code() == code, e.to_string())
        }
        (Err(e), _) => (false, e.borrow().to_string()),
    };

    StepReport {
        step: label,
        passed,
        detail,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn run(name: &str, options: SimulationOptions) -> ScenarioReport {
        let scenario = Scenario::load(name, options.peers).unwrap();
        let mut controller = SimulationController::new(options).await.unwrap();
        controller.run_scenario(&scenario).await.unwrap()
    }

    fn options(peers: usize) -> SimulationOptions {
        SimulationOptions {
            peers,
            seed: Some(42),
            ..SimulationOptions::default()
        }
    }

    #[tokio::test]
    async fn test_demo_scenario() {
        let report = run("demo", options(2)).await;
        assert!(report.passed, "{:?}", report.steps);
        assert_eq!(report.metrics.successful_operations, 3);
        assert_eq!(report.ca_enrollments, 2);
    }

    #[tokio::test]
    async fn test_mismatch_scenario() {
        let report = run("endorsement-mismatch", options(3)).await;
        assert!(report.passed, "{:?}", report.steps);
        assert_eq!(report.metrics.failed_operations, 1);
    }

    #[tokio::test]
    async fn test_all_rejected_scenario() {
        let report = run("all-rejected", options(2)).await;
        assert!(report.passed, "{:?}", report.steps);
    }

    #[tokio::test]
    async fn test_peer_timeout_scenario() {
        let report = run("peer-timeout", options(3)).await;
        assert!(report.passed, "{:?}", report.steps);
    }

    #[tokio::test]
    async fn test_identity_cache_survives_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let report = run(
            "identity-cache",
            SimulationOptions {
                identity_dir: Some(dir.path().to_path_buf()),
                ..options(2)
            },
        )
        .await;
        assert!(report.passed, "{:?}", report.steps);
        assert!(dir.path().join("admin.identity.json").exists());
        assert!(dir.path().join("wesker.identity.json").exists());
    }

    #[test]
    fn test_expectation_checks() {
        let rejected: Result<String, LedgerError> = Err(LedgerError::ProposalRejected {
            tx_id: ledgerlink_common::TxId::new("tx"),
            responses: vec![],
        });
        let report = check(
            "invoke".to_string(),
            rejected,
            &Expectation::Failure {
                code: "PROPOSAL_REJECTED".to_string(),
            },
            |_| Ok(()),
        );
        assert!(report.passed);

        let ok: Result<String, LedgerError> = Ok("done".to_string());
        let report = check(
            "invoke".to_string(),
            ok,
            &Expectation::Failure {
                code: "TIMEOUT".to_string(),
            },
            |_| Ok(()),
        );
        assert!(!report.passed);
    }
}
