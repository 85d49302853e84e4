//! The in-worker run driver.
//!
//! Ties the pieces together for one run: load inputs, plan chunks through a
//! [`PairingStrategy`](crate::planner::PairingStrategy), validate the solver,
//! solve on the pool while the merger consumes outcomes, then report a
//! [`RunSummary`](crate::events::RunSummary).

mod runner;

pub use runner::{build_strategy, Engine};

use thiserror::Error;

use crate::config::ConfigError;
use crate::dataset::DatasetError;
use crate::merge::MergeError;
use crate::planner::PlanError;
use crate::solver::SolveError;

/// Errors that end a run before a summary can be produced.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Dataset(#[from] DatasetError),

    /// The planner produced a plan that does not cover the input.
    #[error(transparent)]
    ChunkPlan(PlanError),

    /// The solver rejected the run before any chunk was dispatched.
    #[error("Solver validation failed: {0}")]
    Solver(SolveError),

    /// Merging failed; chunk artifacts are kept for inspection.
    #[error("Merge failed, intermediate results kept in {scratch}: {source}")]
    Merge {
        scratch: String,
        #[source]
        source: MergeError,
    },

    #[error("Background task failed: {0}")]
    Task(String),
}

impl From<PlanError> for EngineError {
    fn from(e: PlanError) -> Self {
        if e.is_config_error() {
            EngineError::Config(ConfigError::ValidationError(e.to_string()))
        } else {
            EngineError::ChunkPlan(e)
        }
    }
}
