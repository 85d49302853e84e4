pub mod config;
pub mod dataset;
pub mod engine;
pub mod events;
pub mod merge;
pub mod metrics;
pub mod orchestrator;
pub mod planner;
pub mod pool;
pub mod solver;
pub mod testing;

pub use config::{
    load_config, load_config_from_str, resolve_config, validate_config, ConfigError, InputMode,
    OutputFormat, RunConfig,
};
pub use dataset::{load_records, Dataset, DatasetError, InputRecord, RecordId};
pub use engine::{Engine, EngineError};
pub use events::{create_event_stream, EventHandle, EventLevel, RunEvent, RunState, RunSummary};
pub use merge::{MergeError, OutputConfig, ResultMerger};
pub use orchestrator::{Orchestrator, OrchestratorConfig, OrchestratorError, RunReport};
pub use planner::{Chunk, ChunkId, PairingStrategy};
pub use pool::{ChunkPool, FailurePolicy, PoolConfig, PoolSummary};
pub use solver::{CommandSolver, SolveError, SolverAdapter};
