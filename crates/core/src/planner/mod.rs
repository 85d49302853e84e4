//! Chunk planning.
//!
//! Cuts the origin/destination space into bounded work units:
//! - **Cross product**: a grid of contiguous origin groups × destination groups
//! - **Known pairs**: contiguous slices of an explicit pair list
//!
//! Both are reachable through the [`PairingStrategy`] trait.

mod grid;
mod pairs;
mod strategy;
mod types;

pub use grid::partition;
pub use pairs::partition_pairs;
pub use strategy::{CrossProduct, KnownPairs, PairingStrategy};
pub use types::{AxisRange, Chunk, ChunkId, ChunkScope};

use thiserror::Error;

/// Errors that can occur while planning chunks.
#[derive(Debug, Error)]
pub enum PlanError {
    /// Nothing to solve.
    #[error("No input records to partition (origins: {origins}, destinations: {destinations})")]
    EmptyInput { origins: usize, destinations: usize },

    /// Chunk size limit is zero.
    #[error("Chunk size must be greater than 0")]
    InvalidChunkSize,

    /// The plan does not cover the input exactly.
    #[error("Inconsistent chunk plan: {0}")]
    Inconsistent(String),
}

impl PlanError {
    /// Whether this error stems from the run parameters rather than the planner itself.
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::EmptyInput { .. } | Self::InvalidChunkSize)
    }
}
