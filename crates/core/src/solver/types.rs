//! Request and response types exchanged with a routing engine.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

use super::error::SolveError;
use crate::config::{ConfigError, DistanceUnits, RunConfig, TimeUnits, TIME_OF_DAY_FORMAT};
use crate::dataset::InputRecord;
use crate::planner::ChunkId;

/// Analysis settings shared by every chunk of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolveSettings {
    pub network_source: String,
    pub travel_mode: String,
    pub time_units: TimeUnits,
    pub distance_units: DistanceUnits,
    pub time_of_day: Option<NaiveDateTime>,
    pub barriers: Vec<PathBuf>,
    pub cutoff: Option<f64>,
    pub max_destinations: Option<usize>,
    pub reverse_direction: bool,
    pub precalculated_locations: bool,
}

impl SolveSettings {
    /// Extracts the solver-facing part of the run configuration.
    pub fn from_config(config: &RunConfig) -> Result<Self, ConfigError> {
        let time_of_day = config
            .network
            .time_of_day
            .as_deref()
            .map(|tod| {
                NaiveDateTime::parse_from_str(tod, TIME_OF_DAY_FORMAT).map_err(|e| {
                    ConfigError::ValidationError(format!("invalid time_of_day '{}': {}", tod, e))
                })
            })
            .transpose()?;

        Ok(Self {
            network_source: config.network.source.clone(),
            travel_mode: config.network.travel_mode.clone(),
            time_units: config.network.time_units,
            distance_units: config.network.distance_units,
            time_of_day,
            barriers: config.network.barriers.clone(),
            cutoff: config.solve.cutoff,
            max_destinations: config.solve.max_destinations,
            reverse_direction: config.solve.reverse_direction,
            precalculated_locations: config.network.precalculate_locations,
        })
    }
}

/// A pair expressed in chunk-local ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocalPair {
    pub origin: u32,
    pub destination: u32,
}

/// One chunk's worth of work for the engine.
///
/// Chunk-local ids are positions in `origins` and `destinations`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolveRequest {
    pub chunk_id: ChunkId,
    pub settings: SolveSettings,
    pub origins: Vec<InputRecord>,
    pub destinations: Vec<InputRecord>,
    /// Explicit pairs in known-pairs mode; `None` means the full cross product.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pairs: Option<Vec<LocalPair>>,
}

/// One result row as returned by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostRow {
    /// Chunk-local origin id.
    pub origin: u32,
    /// Chunk-local destination id.
    pub destination: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_rank: Option<u32>,
    #[serde(default)]
    pub total_time: Option<f64>,
    #[serde(default)]
    pub total_distance: Option<f64>,
    /// Any further columns, e.g. route geometry in known-pairs mode.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl CostRow {
    pub fn new(origin: u32, destination: u32) -> Self {
        Self {
            origin,
            destination,
            destination_rank: None,
            total_time: None,
            total_distance: None,
            extra: serde_json::Map::new(),
        }
    }

    pub fn with_costs(mut self, total_time: f64, total_distance: f64) -> Self {
        self.total_time = Some(total_time);
        self.total_distance = Some(total_distance);
        self
    }
}

/// The engine's answer to a [`SolveRequest`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SolveResponse {
    pub rows: Vec<CostRow>,
}

/// A request plus the chunk-local → input index maps needed to merge its rows.
#[derive(Debug, Clone)]
pub struct PreparedChunk {
    pub request: SolveRequest,
    pub origin_inputs: Vec<usize>,
    pub destination_inputs: Vec<usize>,
}

impl PreparedChunk {
    /// Pairs the engine's response with this chunk.
    ///
    /// On top of the checks of [`PartialResult::from_response`], a chunk with
    /// explicit pairs only accepts rows for pairs it asked for.
    pub fn accept(&self, response: SolveResponse) -> Result<PartialResult, SolveError> {
        let chunk_id = self.request.chunk_id;
        let partial = PartialResult::from_response(
            chunk_id,
            self.origin_inputs.clone(),
            self.destination_inputs.clone(),
            response,
        )?;

        if let Some(pairs) = &self.request.pairs {
            let requested: HashSet<&LocalPair> = pairs.iter().collect();
            if let Some(row) = partial.rows.iter().find(|row| {
                !requested.contains(&LocalPair {
                    origin: row.origin,
                    destination: row.destination,
                })
            }) {
                return Err(SolveError::permanent(format!(
                    "row pairs origin {} with destination {}, which chunk {} did not request",
                    row.origin, row.destination, chunk_id
                )));
            }
        }
        Ok(partial)
    }
}

/// Output of one successful chunk solve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartialResult {
    pub chunk_id: ChunkId,
    pub rows: Vec<CostRow>,
    pub row_count: usize,
    /// Chunk-local origin id → input index.
    pub origin_inputs: Vec<usize>,
    /// Chunk-local destination id → input index.
    pub destination_inputs: Vec<usize>,
}

impl PartialResult {
    /// Pairs a response with its chunk, rejecting rows that reference ids the
    /// chunk never sent and rows that repeat a pair.
    pub fn from_response(
        chunk_id: ChunkId,
        origin_inputs: Vec<usize>,
        destination_inputs: Vec<usize>,
        response: SolveResponse,
    ) -> Result<Self, SolveError> {
        let mut seen = HashSet::with_capacity(response.rows.len());
        for row in &response.rows {
            if row.origin as usize >= origin_inputs.len() {
                return Err(SolveError::permanent(format!(
                    "row references origin {} but chunk {} has {} origins",
                    row.origin,
                    chunk_id,
                    origin_inputs.len()
                )));
            }
            if row.destination as usize >= destination_inputs.len() {
                return Err(SolveError::permanent(format!(
                    "row references destination {} but chunk {} has {} destinations",
                    row.destination,
                    chunk_id,
                    destination_inputs.len()
                )));
            }
            if !seen.insert((row.origin, row.destination)) {
                return Err(SolveError::permanent(format!(
                    "chunk {} returned origin {} and destination {} more than once",
                    chunk_id, row.origin, row.destination
                )));
            }
        }

        Ok(Self {
            chunk_id,
            row_count: response.rows.len(),
            rows: response.rows,
            origin_inputs,
            destination_inputs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    #[test]
    fn test_settings_from_config() {
        let mut config = fixtures::run_config("/tmp/odgrid");
        config.network.time_of_day = Some("20260115 08:30".to_string());
        config.solve.cutoff = Some(45.0);

        let settings = SolveSettings::from_config(&config).unwrap();
        assert_eq!(settings.travel_mode, "Driving Time");
        assert_eq!(settings.cutoff, Some(45.0));
        assert_eq!(
            settings.time_of_day.unwrap().format("%H:%M").to_string(),
            "08:30"
        );
    }

    #[test]
    fn test_cost_row_extra_columns() {
        let json = r#"{"origin": 0, "destination": 2, "total_time": 3.5, "total_distance": 1.2, "shape": "LINESTRING(0 0, 1 1)"}"#;
        let row: CostRow = serde_json::from_str(json).unwrap();
        assert_eq!(row.destination, 2);
        assert_eq!(row.total_time, Some(3.5));
        assert_eq!(row.extra["shape"], "LINESTRING(0 0, 1 1)");
        assert!(row.destination_rank.is_none());
    }

    #[test]
    fn test_partial_result_rejects_unknown_reference() {
        let response = SolveResponse {
            rows: vec![CostRow::new(0, 0), CostRow::new(0, 3)],
        };
        let err = PartialResult::from_response(ChunkId(1), vec![10], vec![0, 1], response)
            .unwrap_err();
        assert!(!err.is_retryable());
        assert!(err.detail.contains("destination 3"));
    }

    #[test]
    fn test_partial_result_counts_rows() {
        let response = SolveResponse {
            rows: vec![CostRow::new(0, 0), CostRow::new(1, 0)],
        };
        let partial =
            PartialResult::from_response(ChunkId(0), vec![4, 5], vec![9], response).unwrap();
        assert_eq!(partial.row_count, 2);
        assert_eq!(partial.origin_inputs, vec![4, 5]);
    }

    #[test]
    fn test_partial_result_rejects_repeated_pair() {
        let response = SolveResponse {
            rows: vec![CostRow::new(0, 0), CostRow::new(0, 0), CostRow::new(1, 1)],
        };
        let err = PartialResult::from_response(ChunkId(0), vec![3, 4], vec![7, 8], response)
            .unwrap_err();
        assert!(!err.is_retryable());
        assert!(err.detail.contains("more than once"));
    }

    fn pair_chunk(pairs: Vec<LocalPair>) -> PreparedChunk {
        let config = fixtures::run_config("/tmp/odgrid");
        PreparedChunk {
            request: SolveRequest {
                chunk_id: ChunkId(2),
                settings: SolveSettings::from_config(&config).unwrap(),
                origins: fixtures::records("o", 2),
                destinations: fixtures::records("d", 2),
                pairs: Some(pairs),
            },
            origin_inputs: vec![0, 1],
            destination_inputs: vec![0, 1],
        }
    }

    #[test]
    fn test_pair_chunk_rejects_unrequested_pair() {
        let prepared = pair_chunk(vec![
            LocalPair { origin: 0, destination: 1 },
            LocalPair { origin: 1, destination: 0 },
        ]);

        let ok = prepared
            .accept(SolveResponse {
                rows: vec![CostRow::new(1, 0), CostRow::new(0, 1)],
            })
            .unwrap();
        assert_eq!(ok.row_count, 2);

        // (0, 0) is in range but was never asked for.
        let err = prepared
            .accept(SolveResponse {
                rows: vec![CostRow::new(0, 1), CostRow::new(0, 0)],
            })
            .unwrap_err();
        assert!(!err.is_retryable());
        assert!(err.detail.contains("did not request"));
    }

    #[test]
    fn test_grid_chunk_accepts_any_pair_once() {
        let mut prepared = pair_chunk(Vec::new());
        prepared.request.pairs = None;
        let partial = prepared
            .accept(SolveResponse {
                rows: vec![CostRow::new(0, 0), CostRow::new(1, 1)],
            })
            .unwrap();
        assert_eq!(partial.row_count, 2);
    }
}
