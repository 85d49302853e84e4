//! Testing utilities for running the engine without a routing solver.
//!
//! # Example
//!
//! ```rust,ignore
//! use odgrid_core::testing::{fixtures, MockSolver};
//!
//! let config = fixtures::run_config(dir.path());
//! fixtures::write_dataset(&config.inputs.origins, "o", 10)?;
//! fixtures::write_dataset(&config.inputs.destinations, "d", 4)?;
//!
//! let engine = Engine::new(Arc::new(config), MockSolver::new(), events);
//! ```

mod mock_solver;

pub use mock_solver::MockSolver;

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::io::Write;
    use std::path::{Path, PathBuf};

    use serde_json::json;

    use crate::config::{
        ChunkingConfig, DistanceUnits, InputMode, InputsConfig, NetworkConfig, OutputFormat,
        RunConfig, SolveConfig, TimeUnits,
    };
    use crate::dataset::{from_records, Dataset, InputRecord};
    use crate::merge::OutputConfig;
    use crate::orchestrator::OrchestratorConfig;
    use crate::pool::{FailurePolicy, PoolConfig, RetryConfig};
    use crate::solver::CommandSolverConfig;

    /// A valid cross-product config with every path under `base`.
    pub fn run_config(base: impl AsRef<Path>) -> RunConfig {
        let base = base.as_ref();
        let path = |name: &str| -> PathBuf { base.join(name) };

        RunConfig {
            network: NetworkConfig {
                source: "/data/streets.nd".to_string(),
                travel_mode: "Driving Time".to_string(),
                time_units: TimeUnits::Minutes,
                distance_units: DistanceUnits::Kilometers,
                time_of_day: None,
                barriers: Vec::new(),
                precalculate_locations: false,
                shared_service: false,
                service_limits: None,
            },
            inputs: InputsConfig {
                mode: InputMode::CrossProduct,
                origins: path("origins.jsonl"),
                destinations: path("destinations.jsonl"),
                assigned_destination_field: None,
                group_by_destination: true,
            },
            chunking: ChunkingConfig::default(),
            solve: SolveConfig::default(),
            solver: CommandSolverConfig::new("od-engine"),
            pool: PoolConfig::new(4, FailurePolicy::BestEffort).with_retry(RetryConfig {
                initial_delay_ms: 1,
                max_delay_ms: 10,
                ..RetryConfig::default()
            }),
            output: OutputConfig::new(
                OutputFormat::Csv,
                path("od_lines.csv"),
                path("updated_origins.csv"),
                path("updated_destinations.csv"),
            )
            .with_scratch_dir(path("scratch")),
            orchestrator: OrchestratorConfig::default(),
        }
    }

    /// `n` records with ids `{prefix}0..{prefix}{n-1}`, each carrying a
    /// `name` equal to its id and a numeric `x` equal to its position.
    pub fn records(prefix: &str, n: usize) -> Vec<InputRecord> {
        (0..n)
            .map(|i| {
                let id = format!("{}{}", prefix, i);
                InputRecord::new(id.clone())
                    .with_field("name", json!(id))
                    .with_field("x", json!(i))
            })
            .collect()
    }

    /// Dataset built from [`records`].
    pub fn dataset(prefix: &str, n: usize) -> Dataset {
        from_records(records(prefix, n)).unwrap_or_default()
    }

    /// Writes records as JSON Lines, creating parent directories.
    pub fn write_records(path: &Path, records: &[InputRecord]) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = std::io::BufWriter::new(std::fs::File::create(path)?);
        for record in records {
            serde_json::to_writer(&mut file, record)?;
            file.write_all(b"\n")?;
        }
        file.flush()
    }

    /// Writes [`records`] for `prefix` and `n` to `path`.
    pub fn write_dataset(path: &Path, prefix: &str, n: usize) -> std::io::Result<()> {
        write_records(path, &records(prefix, n))
    }
}
