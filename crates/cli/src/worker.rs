//! The child side of a run: executes one bundle and streams events to stdout.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, error, info, warn};

use odgrid_core::{
    create_event_stream, metrics, orchestrator::WorkerBundle, orchestrator::EXIT_ABORTED,
    CommandSolver, Engine, EngineError, RunState,
};

/// Buffer size for the event channel
const EVENT_BUFFER_SIZE: usize = 256;

/// Runs the bundle and returns the process exit code.
pub async fn run(bundle_path: &Path, metrics_file: Option<&Path>) -> Result<i32> {
    let bundle = WorkerBundle::read(bundle_path)
        .await
        .with_context(|| format!("Failed to read bundle {:?}", bundle_path))?;
    info!(run_id = %bundle.run_id, "Worker started");

    let config = Arc::new(bundle.config);
    let solver = CommandSolver::new(config.solver.clone());

    let (events, writer) = create_event_stream(tokio::io::stdout(), EVENT_BUFFER_SIZE);
    let writer_handle = tokio::spawn(writer.run());

    let engine = Engine::new(Arc::clone(&config), solver, events.clone())
        .with_run_id(bundle.run_id);
    let result = engine.run().await;

    if let Err(e) = &result {
        // Merge failures were already reported by the engine.
        if !matches!(e, EngineError::Merge { .. }) {
            events.error(format!("Run failed: {}", e)).await;
        }
    }

    // Closing every handle ends the writer once the queue is flushed.
    drop(engine);
    drop(events);
    match writer_handle.await {
        Ok(Ok(written)) => debug!(events = written, "Event stream closed"),
        Ok(Err(e)) => warn!("Event stream failed: {}", e),
        Err(e) => warn!("Event writer task failed: {}", e),
    }

    if let Some(path) = metrics_file {
        if let Err(e) = std::fs::write(path, metrics::render_metrics()) {
            warn!("Failed to write metrics to {:?}: {}", path, e);
        }
    }

    Ok(match result {
        Ok(summary) if summary.run_state == RunState::Completed => 0,
        Ok(_) => EXIT_ABORTED,
        Err(e) => {
            error!("Run failed: {}", e);
            1
        }
    })
}
