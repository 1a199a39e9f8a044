//! LedgerLink Simulator
//!
//! Runs the client against an in-process CA, peers and orderers.

use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod ca;
mod chaincode;
mod controller;
mod metrics;
mod network;
mod orderer;
mod peer;
mod scenario;

use controller::{ScenarioReport, SimulationController, SimulationOptions};
use scenario::{Scenario, SCENARIOS};

/// LedgerLink Simulator CLI
#[derive(Parser, Debug)]
#[command(name = "ledgerlink-sim")]
#[command(about = "In-process ledger network for exercising the LedgerLink client")]
struct Args {
    /// Number of endorsing peers
    #[arg(short, long, default_value = "2")]
    peers: usize,

    /// Number of orderers
    #[arg(short, long, default_value = "1")]
    orderers: usize,

    /// Scenario to run, or "all"
    #[arg(short, long, default_value = "demo")]
    scenario: String,

    /// Persist identities in this directory instead of memory
    #[arg(long)]
    identity_dir: Option<PathBuf>,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,

    /// Print reports as JSON on stdout and log as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
    );
    if args.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    info!("Starting LedgerLink Simulator");
    info!("Peers: {}, orderers: {}", args.peers, args.orderers);

    let names: Vec<&str> = if args.scenario == "all" {
        SCENARIOS.to_vec()
    } else {
        vec![args.scenario.as_str()]
    };

    let mut reports = Vec::with_capacity(names.len());
    for name in names {
        let scenario = Scenario::load(name, args.peers)?;
        let mut controller = SimulationController::new(SimulationOptions {
            peers: args.peers,
            orderers: args.orderers,
            identity_dir: args.identity_dir.clone(),
            seed: args.seed,
        })
        .await?;
        controller.initialize().await?;

        let report = controller.run_scenario(&scenario).await?;
        print_summary(&report, controller.metrics());
        reports.push(report);
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    }

    let failed: Vec<&str> = reports
        .iter()
        .filter(|r| !r.passed)
        .map(|r| r.scenario.as_str())
        .collect();
    if !failed.is_empty() {
        anyhow::bail!("Scenarios failed: {}", failed.join(", "));
    }

    info!("Simulation complete");
    Ok(())
}

fn print_summary(report: &ScenarioReport, metrics: &metrics::SimulationMetrics) {
    info!(
        scenario = %report.scenario,
        passed = report.passed,
        "Scenario finished"
    );
    info!("Total operations: {}", metrics.total_operations);
    info!("Successful: {}", metrics.successful_operations);
    info!("Failed: {}", metrics.failed_operations);
    info!("Success rate: {:.2}", metrics.success_rate());
    info!("Average latency: {}ms", metrics.average_latency_ms());
    info!("p50 latency: {}ms", metrics.p50_latency_ms());
    info!("p99 latency: {}ms", metrics.p99_latency_ms());
    info!("CA enrollments: {}", report.ca_enrollments);
}
