//! Known-pairs partitioning.

use super::grid::axis_ranges;
use super::types::{Chunk, ChunkId, ChunkScope};
use super::PlanError;
use crate::dataset::OdPair;

/// Slices a pair list into chunks of at most `max_pairs_per_chunk` pairs.
///
/// With `group_by_destination` the pairs are stable-sorted by destination
/// first, so origins sharing a destination tend to land in the same chunk.
pub fn partition_pairs(
    pairs: &[OdPair],
    max_pairs_per_chunk: usize,
    group_by_destination: bool,
) -> Result<Vec<Chunk>, PlanError> {
    if pairs.is_empty() {
        return Err(PlanError::EmptyInput {
            origins: 0,
            destinations: 0,
        });
    }
    if max_pairs_per_chunk == 0 {
        return Err(PlanError::InvalidChunkSize);
    }

    let mut ordered = pairs.to_vec();
    if group_by_destination {
        ordered.sort_by_key(|p| p.destination);
    }

    let chunks: Vec<Chunk> = axis_ranges(ordered.len(), max_pairs_per_chunk)
        .into_iter()
        .enumerate()
        .map(|(i, range)| Chunk {
            id: ChunkId(i),
            scope: ChunkScope::Pairs {
                range,
                pairs: ordered[range.start..range.end].to_vec(),
            },
        })
        .collect();

    let covered: usize = chunks.iter().map(Chunk::pair_count).sum();
    if covered != pairs.len() || chunks.len() != pairs.len().div_ceil(max_pairs_per_chunk) {
        return Err(PlanError::Inconsistent(format!(
            "{} pair chunks cover {} pairs, expected {}",
            chunks.len(),
            covered,
            pairs.len()
        )));
    }

    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn pairs_of(chunk: &Chunk) -> &[OdPair] {
        match &chunk.scope {
            ChunkScope::Pairs { pairs, .. } => pairs,
            ChunkScope::Grid { .. } => panic!("expected a pairs chunk"),
        }
    }

    #[test]
    fn test_partition_12345_pairs() {
        let pairs: Vec<OdPair> = (0..12_345).map(|i| OdPair::new(i, i % 97)).collect();
        let chunks = partition_pairs(&pairs, 5000, false).unwrap();
        let sizes: Vec<usize> = chunks.iter().map(Chunk::pair_count).collect();
        assert_eq!(sizes, vec![5000, 5000, 2345]);
    }

    #[test]
    fn test_partition_is_exact() {
        let pairs: Vec<OdPair> = (0..103).map(|i| OdPair::new(i, (i * 7) % 11)).collect();
        for group in [false, true] {
            let chunks = partition_pairs(&pairs, 10, group).unwrap();
            assert_eq!(chunks.len(), 11);

            let mut counts: HashMap<OdPair, usize> = HashMap::new();
            for chunk in &chunks {
                assert!(chunk.pair_count() <= 10);
                for p in pairs_of(chunk) {
                    *counts.entry(*p).or_default() += 1;
                }
            }
            assert_eq!(counts.len(), pairs.len());
            assert!(counts.values().all(|&c| c == 1));
        }
    }

    #[test]
    fn test_group_by_destination_is_stable() {
        let pairs = vec![
            OdPair::new(0, 2),
            OdPair::new(1, 1),
            OdPair::new(2, 2),
            OdPair::new(3, 1),
        ];
        let chunks = partition_pairs(&pairs, 2, true).unwrap();
        assert_eq!(pairs_of(&chunks[0]), &[OdPair::new(1, 1), OdPair::new(3, 1)]);
        assert_eq!(pairs_of(&chunks[1]), &[OdPair::new(0, 2), OdPair::new(2, 2)]);
    }

    #[test]
    fn test_without_grouping_keeps_input_order() {
        let pairs = vec![OdPair::new(0, 5), OdPair::new(1, 0)];
        let chunks = partition_pairs(&pairs, 1, false).unwrap();
        assert_eq!(pairs_of(&chunks[0]), &[OdPair::new(0, 5)]);
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            partition_pairs(&[], 10, true),
            Err(PlanError::EmptyInput { .. })
        ));
        assert!(matches!(
            partition_pairs(&[OdPair::new(0, 0)], 0, true),
            Err(PlanError::InvalidChunkSize)
        ));
    }
}
