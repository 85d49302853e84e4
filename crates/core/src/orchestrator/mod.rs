//! Run orchestration.
//!
//! The caller side of a run:
//! - Writes the configuration as a [`WorkerBundle`] file
//! - Spawns the worker process (`odgrid worker --bundle <file>` by default)
//! - Relays the worker's event stream to a [`MessageSink`] line by line
//! - Decides success from the exit code and the presence of the outputs

mod bundle;
mod config;
mod runner;
mod sink;

pub use bundle::{WorkerBundle, BUNDLE_VERSION};
pub use config::OrchestratorConfig;
pub use runner::{Orchestrator, EXIT_ABORTED};
pub use sink::{MessageSink, TracingSink};

use std::path::PathBuf;
use thiserror::Error;

use crate::events::RunSummary;

/// Outcome of a run that completed.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: String,
    /// Summary carried by the worker's final event, if it sent one.
    pub summary: Option<RunSummary>,
    pub events_relayed: usize,
    pub malformed_lines: usize,
    pub stderr_tail: Vec<String>,
}

/// Errors that can occur while orchestrating a run.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The bundle could not be built, written or read back.
    #[error("Invalid worker bundle: {0}")]
    Bundle(String),

    /// The worker process could not be started.
    #[error("Failed to start worker: {0}")]
    Spawn(#[source] std::io::Error),

    /// The worker exited with a failure.
    #[error("Worker failed with exit code {code:?}: {stderr_tail}")]
    WorkerFailed {
        code: Option<i32>,
        stderr_tail: String,
    },

    /// The worker stopped the run after a fatal chunk failure.
    #[error("Run aborted after a fatal chunk failure")]
    Aborted {
        summary: Option<Box<RunSummary>>,
        stderr_tail: String,
    },

    /// The worker reported success but an output is missing.
    #[error("Worker succeeded but output is missing: {0}")]
    MissingOutput(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
