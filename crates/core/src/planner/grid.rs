//! Cross-product partitioning.

use super::types::{AxisRange, Chunk, ChunkId, ChunkScope};
use super::PlanError;

/// Splits `0..count` into contiguous ranges of at most `max` indices.
pub(super) fn axis_ranges(count: usize, max: usize) -> Vec<AxisRange> {
    (0..count.div_ceil(max))
        .map(|i| AxisRange::new(i * max, ((i + 1) * max).min(count)))
        .collect()
}

/// Partitions an `origin_count x destination_count` problem into a grid of
/// chunks, origin-group-major.
pub fn partition(
    origin_count: usize,
    destination_count: usize,
    max_per_chunk: usize,
) -> Result<Vec<Chunk>, PlanError> {
    if origin_count == 0 || destination_count == 0 {
        return Err(PlanError::EmptyInput {
            origins: origin_count,
            destinations: destination_count,
        });
    }
    if max_per_chunk == 0 {
        return Err(PlanError::InvalidChunkSize);
    }

    let origin_ranges = axis_ranges(origin_count, max_per_chunk);
    let destination_ranges = axis_ranges(destination_count, max_per_chunk);

    let chunks: Vec<Chunk> = origin_ranges
        .iter()
        .flat_map(|o| destination_ranges.iter().map(move |d| (*o, *d)))
        .enumerate()
        .map(|(i, (origins, destinations))| Chunk {
            id: ChunkId(i),
            scope: ChunkScope::Grid {
                origins,
                destinations,
            },
        })
        .collect();

    let expected = origin_ranges.len() * destination_ranges.len();
    if chunks.len() != expected {
        return Err(PlanError::Inconsistent(format!(
            "expected {} grid chunks, built {}",
            expected,
            chunks.len()
        )));
    }
    let covered: usize = chunks.iter().map(Chunk::pair_count).sum();
    if covered != origin_count * destination_count {
        return Err(PlanError::Inconsistent(format!(
            "grid covers {} pairs, expected {}",
            covered,
            origin_count * destination_count
        )));
    }

    Ok(chunks)
}
