//! Worker pool.
//!
//! Runs chunk solves concurrently, bounded by `max_processes`:
//! - Dispatch in planner emission order, completion in any order
//! - Transient failures retried with exponential backoff
//! - Permanent failures raise a run-level fatal flag
//! - Successful partial results persisted as per-chunk artifacts
//!
//! The [`FailurePolicy`] decides whether the fatal flag stops dispatch.

mod artifacts;
mod config;
mod scheduler;
mod types;

pub use artifacts::ArtifactStore;
pub use config::{FailurePolicy, PoolConfig, RetryConfig};
pub use scheduler::{ChunkPool, PoolCancel};
pub use types::{ChunkOutcome, FailedChunk, Job, JobStatus, OutcomeResult, PoolSummary};
