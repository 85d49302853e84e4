//! Bounded chunk scheduler.
//!
//! Dispatches chunks in planner order, at most `max_processes` at a time,
//! retrying transient failures with exponential backoff. Every chunk yields
//! exactly one [`ChunkOutcome`] on the outcome channel.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, OwnedSemaphorePermit, RwLock, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use super::artifacts::ArtifactStore;
use super::config::{FailurePolicy, PoolConfig};
use super::types::{ChunkOutcome, FailedChunk, Job, JobStatus, OutcomeResult, PoolSummary};
use crate::metrics;
use crate::planner::{Chunk, ChunkId};
use crate::solver::{RequestBuilder, SolveError, SolverAdapter};

/// State shared by the dispatcher and every job task.
struct Shared<S> {
    config: PoolConfig,
    solver: Arc<S>,
    builder: Arc<RequestBuilder>,
    artifacts: ArtifactStore,
    solve_timeout: Duration,
    semaphore: Arc<Semaphore>,
    cancel: PoolCancel,
    fatal: AtomicBool,
    retries: AtomicU32,
    jobs: Arc<RwLock<HashMap<ChunkId, Job>>>,
}

impl<S> Shared<S> {
    fn raise_fatal(&self, chunk_id: ChunkId) {
        if !self.fatal.swap(true, Ordering::SeqCst) {
            warn!(chunk_id = %chunk_id, "Fatal chunk failure");
        }
    }

    /// The fatal flag stops dispatch under abort-on-fatal.
    fn fatal_stop(&self) -> bool {
        self.config.failure_policy == FailurePolicy::AbortOnFatal
            && self.fatal.load(Ordering::SeqCst)
    }

    /// Whether pending work must no longer be dispatched.
    fn stopping(&self) -> bool {
        self.fatal_stop() || self.cancel.is_cancelled()
    }

    async fn set_status(&self, chunk_id: ChunkId, status: JobStatus, attempt_count: u32) {
        let mut jobs = self.jobs.write().await;
        if let Some(job) = jobs.get_mut(&chunk_id) {
            job.status = status;
            job.attempt_count = attempt_count;
        }
    }
}

/// Stops a pool from dispatching any further chunk.
///
/// Chunks already solving run to completion; the rest end Skipped.
#[derive(Debug, Clone, Default)]
pub struct PoolCancel(Arc<AtomicBool>);

impl PoolCancel {
    pub fn cancel(&self) {
        if !self.0.swap(true, Ordering::SeqCst) {
            info!("Pool cancelled, pending chunks will be skipped");
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Runs chunk solves on a bounded set of concurrent slots.
pub struct ChunkPool<S: SolverAdapter> {
    config: PoolConfig,
    solver: Arc<S>,
    artifacts: ArtifactStore,
    solve_timeout: Duration,
    cancel: PoolCancel,
    jobs: Arc<RwLock<HashMap<ChunkId, Job>>>,
}

impl<S: SolverAdapter + 'static> ChunkPool<S> {
    /// Creates a new pool.
    pub fn new(
        config: PoolConfig,
        solver: Arc<S>,
        artifacts: ArtifactStore,
        solve_timeout: Duration,
    ) -> Self {
        Self {
            config,
            solver,
            artifacts,
            solve_timeout,
            cancel: PoolCancel::default(),
            jobs: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Handle that stops dispatch from outside the pool.
    pub fn cancel_handle(&self) -> PoolCancel {
        self.cancel.clone()
    }

    /// Returns a snapshot of every job, ordered by chunk id.
    pub async fn jobs(&self) -> Vec<Job> {
        let jobs = self.jobs.read().await;
        let mut snapshot: Vec<Job> = jobs.values().cloned().collect();
        snapshot.sort_by_key(|j| j.chunk_id);
        snapshot
    }

    /// Solves every chunk and waits for the pool to drain.
    ///
    /// Outcomes are sent as chunks finish; the channel is closed when this
    /// returns.
    pub async fn run(
        &self,
        chunks: Vec<Chunk>,
        builder: Arc<RequestBuilder>,
        outcomes: mpsc::Sender<ChunkOutcome>,
    ) -> PoolSummary {
        let total = chunks.len();
        {
            let mut jobs = self.jobs.write().await;
            jobs.clear();
            for chunk in &chunks {
                jobs.insert(
                    chunk.id,
                    Job {
                        chunk_id: chunk.id,
                        status: JobStatus::Pending,
                        attempt_count: 0,
                    },
                );
            }
        }

        let shared = Arc::new(Shared {
            config: self.config.clone(),
            solver: Arc::clone(&self.solver),
            builder,
            artifacts: self.artifacts.clone(),
            solve_timeout: self.solve_timeout,
            semaphore: Arc::new(Semaphore::new(self.config.max_processes.max(1))),
            cancel: self.cancel.clone(),
            fatal: AtomicBool::new(false),
            retries: AtomicU32::new(0),
            jobs: Arc::clone(&self.jobs),
        });

        info!(
            chunks = total,
            max_processes = self.config.max_processes,
            policy = self.config.failure_policy.as_str(),
            solver = self.solver.name(),
            "Dispatching chunks"
        );

        let mut tasks: JoinSet<ChunkOutcome> = JoinSet::new();
        let mut finished: Vec<ChunkOutcome> = Vec::with_capacity(total);
        // Description of every dispatched chunk until its outcome is joined.
        let mut dispatched: HashMap<ChunkId, String> = HashMap::new();

        for chunk in chunks {
            if shared.stopping() {
                finished.push(skip(&chunk, &outcomes).await);
                continue;
            }

            let permit = match Arc::clone(&shared.semaphore).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    finished.push(skip(&chunk, &outcomes).await);
                    continue;
                }
            };

            // The flag may have been raised while we waited for a slot.
            if shared.stopping() {
                drop(permit);
                finished.push(skip(&chunk, &outcomes).await);
                continue;
            }

            dispatched.insert(chunk.id, chunk.to_string());
            let shared = Arc::clone(&shared);
            let outcomes = outcomes.clone();
            tasks.spawn(async move {
                let outcome = run_job(&shared, chunk, permit).await;
                let _ = outcomes.send(outcome.clone()).await;
                outcome
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => {
                    dispatched.remove(&outcome.chunk_id);
                    finished.push(outcome);
                }
                Err(e) => error!("Chunk task panicked: {}", e),
            }
        }

        // Whatever is left never reported back.
        let mut lost: Vec<(ChunkId, String)> = dispatched.into_iter().collect();
        lost.sort_by_key(|(chunk_id, _)| *chunk_id);
        for (chunk_id, description) in lost {
            finished.push(lost_outcome(&shared, chunk_id, description, &outcomes).await);
        }

        let mut summary = PoolSummary {
            chunks_total: total,
            retries: shared.retries.load(Ordering::SeqCst),
            fatal: shared.fatal.load(Ordering::SeqCst),
            aborted: shared.fatal_stop(),
            cancelled: shared.cancel.is_cancelled(),
            ..Default::default()
        };
        for outcome in finished {
            metrics::CHUNK_OUTCOMES
                .with_label_values(&[outcome.result.label()])
                .inc();
            match outcome.result {
                OutcomeResult::Succeeded { .. } => summary.succeeded += 1,
                OutcomeResult::Skipped => summary.skipped += 1,
                OutcomeResult::Failed { error } => {
                    summary.failed += 1;
                    summary.failed_chunks.push(FailedChunk {
                        chunk_id: outcome.chunk_id,
                        description: outcome.description,
                        error: error.to_string(),
                        attempts: outcome.attempts,
                    });
                }
            }
        }
        summary.failed_chunks.sort_by_key(|f| f.chunk_id);

        info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            skipped = summary.skipped,
            retries = summary.retries,
            "Pool drained"
        );
        summary
    }
}

async fn skip(chunk: &Chunk, outcomes: &mpsc::Sender<ChunkOutcome>) -> ChunkOutcome {
    debug!(chunk_id = %chunk.id, "Skipping chunk, run is stopping");
    let outcome = ChunkOutcome {
        chunk_id: chunk.id,
        description: chunk.to_string(),
        attempts: 0,
        result: OutcomeResult::Skipped,
    };
    let _ = outcomes.send(outcome.clone()).await;
    outcome
}

/// Failed outcome for a chunk whose task ended without reporting.
async fn lost_outcome<S>(
    shared: &Shared<S>,
    chunk_id: ChunkId,
    description: String,
    outcomes: &mpsc::Sender<ChunkOutcome>,
) -> ChunkOutcome {
    let attempts = shared
        .jobs
        .read()
        .await
        .get(&chunk_id)
        .map(|job| job.attempt_count)
        .unwrap_or(0);
    shared.raise_fatal(chunk_id);
    shared
        .set_status(chunk_id, JobStatus::Failed, attempts)
        .await;

    let outcome = ChunkOutcome {
        chunk_id,
        description,
        attempts,
        result: OutcomeResult::Failed {
            error: SolveError::permanent("chunk task panicked"),
        },
    };
    let _ = outcomes.send(outcome.clone()).await;
    outcome
}

/// Drives one chunk from Running to a terminal state.
async fn run_job<S: SolverAdapter>(
    shared: &Shared<S>,
    chunk: Chunk,
    permit: OwnedSemaphorePermit,
) -> ChunkOutcome {
    let prepared = shared.builder.prepare(&chunk);
    let description = chunk.to_string();
    let max_attempts = shared.config.retry.max_attempts.max(1);
    let mut permit = Some(permit);
    let mut attempts = 0u32;

    let error = loop {
        attempts += 1;
        shared
            .set_status(chunk.id, JobStatus::Running, attempts)
            .await;
        debug!(chunk_id = %chunk.id, attempt = attempts, "Solving {}", description);

        let started = Instant::now();
        let result = match tokio::time::timeout(
            shared.solve_timeout,
            shared.solver.solve(prepared.request.clone()),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(SolveError::transient(format!(
                "solve timed out after {} seconds",
                shared.solve_timeout.as_secs_f64()
            ))),
        }
        .and_then(|response| prepared.accept(response));

        let outcome_label = match &result {
            Ok(_) => "ok",
            Err(e) if e.is_retryable() => "transient",
            Err(_) => "permanent",
        };
        metrics::SOLVE_ATTEMPTS
            .with_label_values(&[outcome_label])
            .inc();
        metrics::SOLVE_DURATION
            .with_label_values(&[outcome_label])
            .observe(started.elapsed().as_secs_f64());

        match result {
            Ok(partial) => {
                drop(permit.take());
                match shared.artifacts.write(&partial).await {
                    Ok(artifact) => {
                        shared
                            .set_status(chunk.id, JobStatus::Succeeded, attempts)
                            .await;
                        debug!(
                            chunk_id = %chunk.id,
                            rows = partial.row_count,
                            attempts,
                            "Chunk succeeded"
                        );
                        return ChunkOutcome {
                            chunk_id: chunk.id,
                            description,
                            attempts,
                            result: OutcomeResult::Succeeded { partial, artifact },
                        };
                    }
                    Err(e) => {
                        break SolveError::permanent(format!(
                            "failed to persist chunk artifact: {}",
                            e
                        ));
                    }
                }
            }
            Err(e) if e.is_retryable() && attempts < max_attempts => {
                shared
                    .set_status(chunk.id, JobStatus::Retrying, attempts)
                    .await;
                shared.retries.fetch_add(1, Ordering::SeqCst);
                metrics::CHUNK_RETRIES.inc();

                let delay = shared.config.retry.delay_for(attempts);
                warn!(
                    chunk_id = %chunk.id,
                    attempt = attempts,
                    "Transient failure on {}, retrying in {:?}: {}",
                    description,
                    delay,
                    e.detail
                );

                // Free the slot while backing off.
                drop(permit.take());
                tokio::time::sleep(delay).await;

                if shared.stopping() {
                    break e;
                }
                match Arc::clone(&shared.semaphore).acquire_owned().await {
                    Ok(p) => permit = Some(p),
                    Err(_) => break e,
                }
                if shared.stopping() {
                    break e;
                }
            }
            Err(e) => break e,
        }
    };

    drop(permit);

    if !error.is_retryable() || shared.config.failure_policy == FailurePolicy::AbortOnFatal {
        shared.raise_fatal(chunk.id);
    }
    shared
        .set_status(chunk.id, JobStatus::Failed, attempts)
        .await;
    error!(
        chunk_id = %chunk.id,
        attempts,
        "Chunk failed: {}: {}",
        description,
        error
    );

    ChunkOutcome {
        chunk_id: chunk.id,
        description,
        attempts,
        result: OutcomeResult::Failed { error },
    }
}
