// Copyright (c) 2025 - Cowboy AI, Inc.
//! Deployment Planner
//!
//! Assembles the environment and materializes it against the in-memory
//! provisioner, then prints the resulting plan as JSON: the materialization
//! order, every component's outputs and every recorded provisioning call.
//!
//! Run with: cargo run --bin deployment-planner
//!
//! Configuration:
//! 1. `DEPLOY_CONFIG` names a JSON configuration file, or
//! 2. `DEPLOY_*` variables override the defaults (see `environment`)
//!
//! Templates are read from `DEPLOY_TEMPLATE_DIR` (default: `data`).

use anyhow::{Context, Result};
use cim_deployment::{
    assemble, AssemblyReport, DeploymentError, DirectoryTemplateSource, EnvironmentConfig,
    InMemoryProvisioner,
};
use cim_deployment::provisioner::ProvisionCall;
use serde::Serialize;
use tracing::info;

#[derive(Serialize)]
struct Plan {
    #[serde(flatten)]
    report: AssemblyReport,
    calls: Vec<ProvisionCall>,
}

/// Graph errors mean the wiring is wrong; anything else failed during the run
fn run_error(err: DeploymentError) -> anyhow::Error {
    let what = if err.is_graph_error() {
        "Invalid component graph"
    } else {
        "Dry run failed"
    };
    anyhow::Error::new(err).context(what)
}

fn load_config() -> Result<EnvironmentConfig> {
    match std::env::var("DEPLOY_CONFIG") {
        Ok(path) => {
            info!("Loading configuration from {}", path);
            EnvironmentConfig::from_json_file(&path)
                .with_context(|| format!("Failed to load configuration from {}", path))
        }
        Err(_) => EnvironmentConfig::from_env().context("Invalid DEPLOY_* environment"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("Starting deployment planner");

    let config = load_config()?;
    info!("Configuration loaded:");
    info!("  - Prefix: {}", config.prefix);
    info!("  - Region: {}", config.network.region);
    info!("  - Network: {}", config.network.cidr);
    info!("  - Database nodes: {}", config.database.cluster_size);

    let template_dir =
        std::env::var("DEPLOY_TEMPLATE_DIR").unwrap_or_else(|_| "data".to_string());
    let templates = DirectoryTemplateSource::new(&template_dir);

    let mut assembler =
        assemble(&config, &templates).context("Failed to assemble environment")?;
    let order = assembler.materialization_order().map_err(run_error)?;
    info!(
        "Materialization order: {}",
        order
            .iter()
            .map(|id| id.as_str())
            .collect::<Vec<_>>()
            .join(" → ")
    );

    let provisioner = InMemoryProvisioner::new();
    let report = assembler
        .materialize_all(&provisioner)
        .await
        .map_err(run_error)?;
    info!("Dry run {} complete", report.run_id);

    let plan = Plan {
        report,
        calls: provisioner.calls(),
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&plan).context("Failed to serialize plan")?
    );

    Ok(())
}
