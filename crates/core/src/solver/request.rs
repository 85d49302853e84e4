//! Turns planned chunks into solver requests.

use std::collections::HashMap;
use std::sync::Arc;

use super::types::{LocalPair, PreparedChunk, SolveRequest, SolveSettings};
use crate::dataset::{Dataset, InputRecord};
use crate::planner::{Chunk, ChunkScope};

/// Builds the request for each chunk from the loaded datasets.
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    origins: Arc<Dataset>,
    destinations: Arc<Dataset>,
    settings: SolveSettings,
}

impl RequestBuilder {
    pub fn new(origins: Arc<Dataset>, destinations: Arc<Dataset>, settings: SolveSettings) -> Self {
        Self {
            origins,
            destinations,
            settings,
        }
    }

    pub fn settings(&self) -> &SolveSettings {
        &self.settings
    }

    /// Builds the request for `chunk`.
    ///
    /// Grid chunks send their contiguous slices. Pair chunks send each
    /// distinct origin and destination once, in first-seen order, and
    /// reference them by position.
    pub fn prepare(&self, chunk: &Chunk) -> PreparedChunk {
        match &chunk.scope {
            ChunkScope::Grid {
                origins,
                destinations,
            } => {
                let origin_inputs: Vec<usize> = origins.iter().collect();
                let destination_inputs: Vec<usize> = destinations.iter().collect();
                PreparedChunk {
                    request: SolveRequest {
                        chunk_id: chunk.id,
                        settings: self.settings.clone(),
                        origins: collect(&self.origins, &origin_inputs),
                        destinations: collect(&self.destinations, &destination_inputs),
                        pairs: None,
                    },
                    origin_inputs,
                    destination_inputs,
                }
            }
            ChunkScope::Pairs { pairs, .. } => {
                let mut origin_inputs = Vec::new();
                let mut destination_inputs = Vec::new();
                let mut origin_local: HashMap<usize, u32> = HashMap::new();
                let mut destination_local: HashMap<usize, u32> = HashMap::new();

                let local_pairs = pairs
                    .iter()
                    .map(|pair| LocalPair {
                        origin: local_id(pair.origin, &mut origin_local, &mut origin_inputs),
                        destination: local_id(
                            pair.destination,
                            &mut destination_local,
                            &mut destination_inputs,
                        ),
                    })
                    .collect();

                PreparedChunk {
                    request: SolveRequest {
                        chunk_id: chunk.id,
                        settings: self.settings.clone(),
                        origins: collect(&self.origins, &origin_inputs),
                        destinations: collect(&self.destinations, &destination_inputs),
                        pairs: Some(local_pairs),
                    },
                    origin_inputs,
                    destination_inputs,
                }
            }
        }
    }
}

fn local_id(input: usize, seen: &mut HashMap<usize, u32>, inputs: &mut Vec<usize>) -> u32 {
    *seen.entry(input).or_insert_with(|| {
        inputs.push(input);
        (inputs.len() - 1) as u32
    })
}

fn collect(dataset: &Dataset, indices: &[usize]) -> Vec<InputRecord> {
    indices
        .iter()
        .filter_map(|&i| dataset.get(i).cloned())
        .collect()
}
