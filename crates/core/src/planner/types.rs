//! Chunk types.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::dataset::OdPair;

/// Position of a chunk in planner emission order, starting at 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChunkId(pub usize);

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Half-open range of input indices `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisRange {
    pub start: usize,
    pub end: usize,
}

impl AxisRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, index: usize) -> bool {
        index >= self.start && index < self.end
    }

    pub fn iter(&self) -> std::ops::Range<usize> {
        self.start..self.end
    }
}

impl fmt::Display for AxisRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// What a chunk covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChunkScope {
    /// Every origin in `origins` against every destination in `destinations`.
    Grid {
        origins: AxisRange,
        destinations: AxisRange,
    },
    /// An explicit slice of the (possibly re-sorted) pair list.
    Pairs { range: AxisRange, pairs: Vec<OdPair> },
}

/// One unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub scope: ChunkScope,
}

impl Chunk {
    /// Number of origin-destination pairs this chunk requests.
    pub fn pair_count(&self) -> usize {
        match &self.scope {
            ChunkScope::Grid {
                origins,
                destinations,
            } => origins.len() * destinations.len(),
            ChunkScope::Pairs { pairs, .. } => pairs.len(),
        }
    }
}

impl fmt::Display for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.scope {
            ChunkScope::Grid {
                origins,
                destinations,
            } => write!(
                f,
                "chunk {} (origins {}, destinations {})",
                self.id, origins, destinations
            ),
            ChunkScope::Pairs { range, .. } => write!(f, "chunk {} (pairs {})", self.id, range),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axis_range() {
        let r = AxisRange::new(1000, 1800);
        assert_eq!(r.len(), 800);
        assert!(r.contains(1000));
        assert!(!r.contains(1800));
        assert_eq!(r.to_string(), "1000..1800");
    }

    #[test]
    fn test_chunk_display() {
        let chunk = Chunk {
            id: ChunkId(4),
            scope: ChunkScope::Grid {
                origins: AxisRange::new(2000, 2500),
                destinations: AxisRange::new(0, 1000),
            },
        };
        assert_eq!(
            chunk.to_string(),
            "chunk 4 (origins 2000..2500, destinations 0..1000)"
        );
        assert_eq!(chunk.pair_count(), 500_000);
    }
}
