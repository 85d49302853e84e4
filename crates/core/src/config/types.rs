use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::units::{DistanceUnits, TimeUnits};
use crate::merge::OutputConfig;
use crate::orchestrator::OrchestratorConfig;
use crate::pool::PoolConfig;
use crate::solver::CommandSolverConfig;

/// Root configuration for one run.
///
/// Built once by the caller, validated, then shipped to the worker process
/// unchanged inside the run bundle.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RunConfig {
    pub network: NetworkConfig,
    pub inputs: InputsConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub solve: SolveConfig,
    pub solver: CommandSolverConfig,
    pub pool: PoolConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
}

/// Routing network and analysis settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NetworkConfig {
    /// Path to a network dataset or a service URL.
    pub source: String,
    pub travel_mode: String,
    #[serde(default = "default_time_units")]
    pub time_units: TimeUnits,
    #[serde(default = "default_distance_units")]
    pub distance_units: DistanceUnits,
    /// Start time in `%Y%m%d %H:%M` format. Unset means time-neutral.
    #[serde(default)]
    pub time_of_day: Option<String>,
    #[serde(default)]
    pub barriers: Vec<PathBuf>,
    #[serde(default)]
    pub precalculate_locations: bool,
    /// The service is shared with other tenants and subject to the shared quota.
    #[serde(default)]
    pub shared_service: bool,
    #[serde(default)]
    pub service_limits: Option<ServiceLimits>,
}

impl NetworkConfig {
    /// Whether the network source is a remote routing service.
    pub fn is_service(&self) -> bool {
        self.source.starts_with("http")
    }
}

fn default_time_units() -> TimeUnits {
    TimeUnits::Minutes
}

fn default_distance_units() -> DistanceUnits {
    DistanceUnits::Kilometers
}

/// Limits published by a routing service.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ServiceLimits {
    #[serde(default)]
    pub max_concurrent: Option<usize>,
    #[serde(default)]
    pub max_origins: Option<usize>,
    #[serde(default)]
    pub max_destinations: Option<usize>,
    #[serde(default)]
    pub max_pairs: Option<usize>,
}

/// How origins and destinations are combined into solve units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InputMode {
    /// Every origin against every destination.
    CrossProduct,
    /// Each origin against its one assigned destination.
    KnownPairs,
}

/// Input datasets.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InputsConfig {
    #[serde(default = "default_mode")]
    pub mode: InputMode,
    /// JSON Lines file with one origin record per line.
    pub origins: PathBuf,
    /// JSON Lines file with one destination record per line.
    pub destinations: PathBuf,
    /// Origin field holding the assigned destination id (known pairs only).
    #[serde(default)]
    pub assigned_destination_field: Option<String>,
    /// Sort pairs by destination before slicing (known pairs only).
    #[serde(default = "default_group_by_destination")]
    pub group_by_destination: bool,
}

fn default_mode() -> InputMode {
    InputMode::CrossProduct
}

fn default_group_by_destination() -> bool {
    true
}

/// Chunk size limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_per_chunk")]
    pub max_per_chunk: usize,
    #[serde(default = "default_max_pairs_per_chunk")]
    pub max_pairs_per_chunk: usize,
}

fn default_max_per_chunk() -> usize {
    1000
}

fn default_max_pairs_per_chunk() -> usize {
    1000
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_per_chunk: default_max_per_chunk(),
            max_pairs_per_chunk: default_max_pairs_per_chunk(),
        }
    }
}

/// Per-solve analysis limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SolveConfig {
    /// Impedance cutoff in `time_units` (or `distance_units` for distance modes).
    #[serde(default)]
    pub cutoff: Option<f64>,
    /// Keep only the nearest K destinations per origin.
    #[serde(default)]
    pub max_destinations: Option<usize>,
    /// Solve destination to origin instead of origin to destination.
    #[serde(default)]
    pub reverse_direction: bool,
    /// Timeout around one chunk solve.
    #[serde(default = "default_solve_timeout")]
    pub timeout_secs: u64,
}

fn default_solve_timeout() -> u64 {
    900 // 15 minutes
}

impl Default for SolveConfig {
    fn default() -> Self {
        Self {
            cutoff: None,
            max_destinations: None,
            reverse_direction: false,
            timeout_secs: default_solve_timeout(),
        }
    }
}
