//! Types for the worker pool.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::planner::ChunkId;
use crate::solver::{PartialResult, SolveError};

/// Lifecycle of one chunk job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Retrying,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Retrying => "retrying",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Snapshot of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub chunk_id: ChunkId,
    pub status: JobStatus,
    pub attempt_count: u32,
}

/// How a chunk ended.
#[derive(Debug, Clone)]
pub enum OutcomeResult {
    Succeeded {
        partial: PartialResult,
        artifact: PathBuf,
    },
    Failed {
        error: SolveError,
    },
    /// Never dispatched because the run was stopping.
    Skipped,
}

impl OutcomeResult {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Succeeded { .. } => "succeeded",
            Self::Failed { .. } => "failed",
            Self::Skipped => "skipped",
        }
    }
}

/// Sent to the merger once per chunk, whatever happened to it.
#[derive(Debug, Clone)]
pub struct ChunkOutcome {
    pub chunk_id: ChunkId,
    pub description: String,
    pub attempts: u32,
    pub result: OutcomeResult,
}

/// A chunk that ended Failed, as reported in the run summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedChunk {
    pub chunk_id: ChunkId,
    pub description: String,
    pub error: String,
    pub attempts: u32,
}

/// Counters for a drained pool.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PoolSummary {
    pub chunks_total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub retries: u32,
    /// The fatal flag was raised at some point.
    pub fatal: bool,
    /// Dispatch stopped early because of the fatal flag.
    pub aborted: bool,
    /// Dispatch stopped early through a [`PoolCancel`](super::PoolCancel).
    #[serde(default)]
    pub cancelled: bool,
    pub failed_chunks: Vec<FailedChunk>,
}
