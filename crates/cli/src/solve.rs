//! Caller-side commands: solve, validate and plan.

use std::path::Path;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use odgrid_core::{
    engine::build_strategy,
    load_config, load_records,
    orchestrator::{MessageSink, TracingSink, EXIT_ABORTED},
    resolve_config, EventHandle, Orchestrator, OrchestratorError, RunConfig,
};

/// Loads, validates and applies service caps.
fn load(path: &Path) -> Result<RunConfig> {
    info!("Loading configuration from {:?}", path);
    let config =
        load_config(path).with_context(|| format!("Failed to load config from {:?}", path))?;
    resolve_config(config).context("Configuration validation failed")
}

/// Runs the analysis in a worker process and prints the summary as JSON.
pub async fn solve(config_path: &Path) -> Result<i32> {
    let config = load(config_path)?;
    let orchestrator = Orchestrator::new(config.orchestrator.clone());

    match orchestrator.run(&config).await {
        Ok(report) => {
            info!(
                run_id = %report.run_id,
                events = report.events_relayed,
                "Run completed"
            );
            if report.malformed_lines > 0 {
                info!(
                    "{} worker output lines were not events",
                    report.malformed_lines
                );
            }
            if let Some(summary) = report.summary {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            }
            Ok(0)
        }
        Err(OrchestratorError::Aborted { summary, .. }) => {
            error!("Run aborted after a fatal chunk failure");
            if let Some(summary) = summary {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            }
            Ok(EXIT_ABORTED)
        }
        Err(e) => Err(e).context("Run failed"),
    }
}

/// Prints the resolved configuration.
pub fn validate(config_path: &Path) -> Result<i32> {
    let config = load(config_path)?;
    info!("Configuration is valid");
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(0)
}

/// Prints the chunk plan without solving anything.
pub async fn plan(config_path: &Path) -> Result<i32> {
    let config = load(config_path)?;
    let origins = load_records(&config.inputs.origins).context("Failed to load origins")?;
    let destinations =
        load_records(&config.inputs.destinations).context("Failed to load destinations")?;

    // Skipped-origin warnings from known-pairs derivation go to the log.
    let (tx, mut rx) = mpsc::channel(16);
    let relay = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            TracingSink.relay(&event);
        }
    });
    let strategy = build_strategy(&config, &origins, &destinations, &EventHandle::new(tx)).await;
    finish_relay(relay).await;

    let chunks = strategy.plan().context("Failed to plan chunks")?;
    for chunk in &chunks {
        println!("{}\t{} pairs", chunk, chunk.pair_count());
    }
    println!(
        "{} chunks, {} requested pairs ({})",
        chunks.len(),
        strategy.requested_pairs(),
        strategy.name()
    );
    Ok(0)
}

/// Waits for the log relay; a failed relay only loses log lines.
async fn finish_relay(relay: JoinHandle<()>) -> bool {
    match relay.await {
        Ok(()) => true,
        Err(e) => {
            warn!("Event relay task failed: {}", e);
            false
        }
    }
}
