//! Trait definitions for the solver module.

use async_trait::async_trait;

use super::error::SolveError;
use super::types::{SolveRequest, SolveResponse, SolveSettings};

/// A routing engine that can solve one chunk's OD cost matrix.
///
/// Implementations classify every failure as transient or permanent; the
/// pool decides what to do with it.
#[async_trait]
pub trait SolverAdapter: Send + Sync {
    /// Returns the name of this solver implementation.
    fn name(&self) -> &str;

    /// Checks that the engine is reachable and accepts the run settings.
    ///
    /// Called once before any chunk is dispatched.
    async fn validate(&self, settings: &SolveSettings) -> Result<(), SolveError>;

    /// Solves one chunk.
    async fn solve(&self, request: SolveRequest) -> Result<SolveResponse, SolveError>;
}
