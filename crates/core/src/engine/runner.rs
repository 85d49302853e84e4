use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{info, warn};

use super::EngineError;
use crate::config::{validate_config, InputMode, RunConfig};
use crate::dataset::{derive_pairs, load_records, Dataset};
use crate::events::{EventHandle, RunState, RunSummary};
use crate::merge::{MergeError, MergeStats, ResultMerger};
use crate::planner::{ChunkId, CrossProduct, KnownPairs, PairingStrategy};
use crate::pool::{
    ArtifactStore, ChunkOutcome, ChunkPool, FailurePolicy, OutcomeResult, PoolCancel,
    PoolSummary,
};
use crate::solver::{PartialResult, RequestBuilder, SolveSettings, SolverAdapter};

/// Builds the pairing strategy for the configured input mode.
///
/// In known-pairs mode, origins without a usable assignment are skipped and
/// reported through `events`.
pub async fn build_strategy(
    config: &RunConfig,
    origins: &Dataset,
    destinations: &Dataset,
    events: &EventHandle,
) -> Box<dyn PairingStrategy> {
    match config.inputs.mode {
        InputMode::CrossProduct => Box::new(CrossProduct {
            origin_count: origins.len(),
            destination_count: destinations.len(),
            max_per_chunk: config.chunking.max_per_chunk,
        }),
        InputMode::KnownPairs => {
            let field = config
                .inputs
                .assigned_destination_field
                .as_deref()
                .unwrap_or_default();
            let derived = derive_pairs(origins, destinations, field);
            if derived.unassigned > 0 {
                events
                    .warning(format!(
                        "{} origins have no assigned destination and were skipped",
                        derived.unassigned
                    ))
                    .await;
            }
            if derived.unknown_destination > 0 {
                events
                    .warning(format!(
                        "{} origins are assigned to a destination that does not exist and were skipped",
                        derived.unknown_destination
                    ))
                    .await;
            }
            Box::new(KnownPairs {
                pairs: derived.pairs,
                max_pairs_per_chunk: config.chunking.max_pairs_per_chunk,
                group_by_destination: config.inputs.group_by_destination,
            })
        }
    }
}

/// Drives one run inside the worker.
pub struct Engine<S: SolverAdapter> {
    config: Arc<RunConfig>,
    solver: Arc<S>,
    events: EventHandle,
    run_id: String,
}

impl<S: SolverAdapter + 'static> Engine<S> {
    pub fn new(config: Arc<RunConfig>, solver: S, events: EventHandle) -> Self {
        Self {
            config,
            solver: Arc::new(solver),
            events,
            run_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    /// Uses the run id chosen by the caller, so artifacts land where it expects.
    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = run_id.into();
        self
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Runs to a terminal state.
    ///
    /// Returns `Ok` for both Completed and Aborted runs; errors mean the run
    /// could not get that far.
    pub async fn run(&self) -> Result<RunSummary, EngineError> {
        let config = Arc::clone(&self.config);
        validate_config(&config)?;

        let origins = Arc::new(load_records(&config.inputs.origins)?);
        let destinations = Arc::new(load_records(&config.inputs.destinations)?);
        info!(
            origins = origins.len(),
            destinations = destinations.len(),
            "Inputs loaded"
        );

        let strategy = build_strategy(&config, &origins, &destinations, &self.events).await;
        let chunks = strategy.plan()?;
        let total = chunks.len();
        self.events
            .info(format!(
                "Planned {} chunks for {} requested pairs ({})",
                total,
                strategy.requested_pairs(),
                strategy.name()
            ))
            .await;

        let settings = SolveSettings::from_config(&config)?;
        self.solver
            .validate(&settings)
            .await
            .map_err(EngineError::Solver)?;

        let artifacts = ArtifactStore::new(&config.output.scratch_dir, &self.run_id);
        let builder = Arc::new(RequestBuilder::new(
            Arc::clone(&origins),
            Arc::clone(&destinations),
            settings,
        ));
        let pool = ChunkPool::new(
            config.pool.clone(),
            Arc::clone(&self.solver),
            artifacts.clone(),
            Duration::from_secs(config.solve.timeout_secs),
        );

        let streaming = config.pool.failure_policy == FailurePolicy::BestEffort;
        let capacity = config.pool.max_processes.max(1) * 2;
        let (outcome_tx, outcome_rx) = mpsc::channel::<ChunkOutcome>(capacity);

        // Best effort merges while solving; abort-on-fatal waits for the drain.
        let (merge_tx, merge_task) = if streaming {
            let (tx, rx) = mpsc::channel(capacity);
            let output = config.output.clone();
            let origins = Arc::clone(&origins);
            let destinations = Arc::clone(&destinations);
            let task = tokio::task::spawn_blocking(move || {
                merge_stream(ResultMerger::open(output, origins, destinations)?, rx)
            });
            (Some(tx), Some(task))
        } else {
            (None, None)
        };

        let progress = tokio::spawn(track_progress(
            outcome_rx,
            self.events.clone(),
            total,
            merge_tx,
            pool.cancel_handle(),
        ));

        let pool_summary = pool.run(chunks, builder, outcome_tx).await;
        let arrived = progress
            .await
            .map_err(|e| EngineError::Task(e.to_string()))?;

        if pool_summary.aborted {
            self.events
                .error(format!(
                    "Run aborted after a fatal chunk failure; intermediate results kept in {}",
                    artifacts.run_dir().display()
                ))
                .await;
            let summary = build_summary(RunState::Aborted, &pool_summary, &MergeStats::default());
            self.events.summary("Run aborted", summary.clone()).await;
            return Ok(summary);
        }

        let merged = match merge_task {
            Some(task) => task
                .await
                .map_err(|e| EngineError::Task(e.to_string()))?,
            None => {
                let output = config.output.clone();
                let origins = Arc::clone(&origins);
                let destinations = Arc::clone(&destinations);
                tokio::task::spawn_blocking(move || {
                    merge_artifacts(ResultMerger::open(output, origins, destinations)?, arrived)
                })
                .await
                .map_err(|e| EngineError::Task(e.to_string()))?
            }
        };

        let stats = match merged {
            Ok(stats) => stats,
            Err(source) => {
                let scratch = artifacts.run_dir().display().to_string();
                self.events
                    .error(format!("Merge failed: {}", source))
                    .await;
                return Err(EngineError::Merge { scratch, source });
            }
        };

        if pool_summary.succeeded == 0 {
            self.events
                .warning("No chunk succeeded; outputs are empty")
                .await;
        }
        if config.output.keep_intermediate {
            info!(path = %artifacts.run_dir().display(), "Keeping intermediate results");
        } else {
            artifacts.cleanup().await;
        }

        let summary = build_summary(RunState::Completed, &pool_summary, &stats);
        self.events
            .summary(
                format!(
                    "Run completed: {} of {} chunks succeeded, {} lines",
                    summary.chunks_succeeded, summary.chunks_total, summary.pairs_found
                ),
                summary.clone(),
            )
            .await;
        Ok(summary)
    }
}

/// Chunk id and artifact path of each outcome, in arrival order.
type Arrived = Vec<(ChunkId, Option<PathBuf>)>;

/// Emits progress for every outcome and forwards partials to the merger.
///
/// If the merger stops early its error ends the run, so the pool is
/// cancelled rather than left solving chunks nobody will merge.
async fn track_progress(
    mut rx: mpsc::Receiver<ChunkOutcome>,
    events: EventHandle,
    total: usize,
    merge_tx: Option<mpsc::Sender<(ChunkId, Option<PartialResult>)>>,
    cancel: PoolCancel,
) -> Arrived {
    let mut finished = 0;
    let mut arrived = Vec::with_capacity(total);

    while let Some(outcome) = rx.recv().await {
        finished += 1;
        if let OutcomeResult::Failed { error } = &outcome.result {
            events
                .warning(format!(
                    "Chunk {} failed after {} attempts: {}",
                    outcome.chunk_id, outcome.attempts, error
                ))
                .await;
        }
        events.chunk_finished(finished, total).await;

        let (partial, artifact) = match outcome.result {
            OutcomeResult::Succeeded { partial, artifact } => (Some(partial), Some(artifact)),
            _ => (None, None),
        };
        arrived.push((outcome.chunk_id, artifact));

        if let Some(tx) = &merge_tx {
            if tx.send((outcome.chunk_id, partial)).await.is_err() && !cancel.is_cancelled() {
                warn!("Merger stopped early; cancelling remaining chunks");
                cancel.cancel();
            }
        }
    }
    arrived
}

fn merge_stream(
    mut merger: ResultMerger,
    mut rx: mpsc::Receiver<(ChunkId, Option<PartialResult>)>,
) -> Result<MergeStats, MergeError> {
    while let Some((chunk_id, partial)) = rx.blocking_recv() {
        merger.accept(chunk_id, partial)?;
    }
    merger.finish()
}

fn merge_artifacts(mut merger: ResultMerger, arrived: Arrived) -> Result<MergeStats, MergeError> {
    for (chunk_id, artifact) in arrived {
        let partial = match artifact {
            Some(path) => Some(
                ArtifactStore::load(&path).map_err(|source| MergeError::Artifact { path, source })?,
            ),
            None => None,
        };
        merger.accept(chunk_id, partial)?;
    }
    merger.finish()
}

fn build_summary(state: RunState, pool: &PoolSummary, stats: &MergeStats) -> RunSummary {
    RunSummary {
        run_state: state,
        chunks_total: pool.chunks_total,
        chunks_succeeded: pool.succeeded,
        chunks_failed: pool.failed,
        chunks_skipped: pool.skipped,
        pairs_found: stats.lines_written,
        retries: pool.retries,
        failed_chunks: pool.failed_chunks.clone(),
        origins_written: stats.origins_written,
        destinations_written: stats.destinations_written,
    }
}
