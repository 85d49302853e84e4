//! Pairing strategies the engine is generic over.

use super::grid::partition;
use super::pairs::partition_pairs;
use super::types::Chunk;
use super::PlanError;
use crate::dataset::OdPair;

/// Decides how the origin/destination space is cut into chunks.
pub trait PairingStrategy: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Number of origin-destination pairs requested in total.
    fn requested_pairs(&self) -> usize;

    /// Produces the ordered chunk list.
    fn plan(&self) -> Result<Vec<Chunk>, PlanError>;
}

/// Every origin against every destination.
#[derive(Debug, Clone)]
pub struct CrossProduct {
    pub origin_count: usize,
    pub destination_count: usize,
    pub max_per_chunk: usize,
}

impl PairingStrategy for CrossProduct {
    fn name(&self) -> &str {
        "cross_product"
    }

    fn requested_pairs(&self) -> usize {
        self.origin_count * self.destination_count
    }

    fn plan(&self) -> Result<Vec<Chunk>, PlanError> {
        partition(self.origin_count, self.destination_count, self.max_per_chunk)
    }
}

/// An explicit list of pairs.
#[derive(Debug, Clone)]
pub struct KnownPairs {
    pub pairs: Vec<OdPair>,
    pub max_pairs_per_chunk: usize,
    pub group_by_destination: bool,
}

impl PairingStrategy for KnownPairs {
    fn name(&self) -> &str {
        "known_pairs"
    }

    fn requested_pairs(&self) -> usize {
        self.pairs.len()
    }

    fn plan(&self) -> Result<Vec<Chunk>, PlanError> {
        partition_pairs(
            &self.pairs,
            self.max_pairs_per_chunk,
            self.group_by_destination,
        )
    }
}
