//! Mock solver for testing.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use crate::dataset::InputRecord;
use crate::planner::ChunkId;
use crate::solver::{
    CostRow, SolveError, SolveRequest, SolveResponse, SolveSettings, SolverAdapter,
};

/// Mock implementation of the SolverAdapter trait.
///
/// Provides controllable behavior for testing:
/// - Scripted per-chunk failure sequences, consumed one per attempt
/// - Simulated solve latency
/// - High-water mark of concurrent solves
/// - Per-chunk attempt counts
/// - Malformed responses: out-of-range rows, extra columns, panics
///
/// Costs are derived from the numeric `x` field of each record, so the same
/// pair always gets the same cost regardless of how it was chunked.
///
/// # Example
///
/// ```rust,ignore
/// use odgrid_core::testing::MockSolver;
///
/// let solver = MockSolver::new()
///     .with_delay(Duration::from_millis(20))
///     .with_failures(ChunkId(1), vec![SolveError::transient("busy")]);
///
/// // ... run the pool ...
///
/// assert_eq!(solver.attempts(ChunkId(1)), 2);
/// assert!(solver.max_in_flight() <= 4);
/// ```
#[derive(Debug, Default)]
pub struct MockSolver {
    /// Errors returned by upcoming attempts, per chunk.
    failures: Mutex<HashMap<ChunkId, VecDeque<SolveError>>>,
    /// Chunks whose response references an origin that was never sent.
    bogus: HashSet<ChunkId>,
    /// Extra column added to every row of a chunk.
    extra_columns: HashMap<ChunkId, (String, Value)>,
    /// Chunks whose solve panics.
    panics: HashSet<ChunkId>,
    /// Error returned by `validate`.
    validate_error: Option<SolveError>,
    /// Simulated solve duration.
    delay: Duration,
    attempts: Mutex<HashMap<ChunkId, usize>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

/// Decrements the in-flight count even when the solve future is dropped by a timeout.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl MockSolver {
    /// Create a new mock solver that succeeds instantly.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the simulated solve duration.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Fail the next attempts on `chunk_id` with these errors, in order.
    pub fn with_failures(
        self,
        chunk_id: ChunkId,
        errors: impl IntoIterator<Item = SolveError>,
    ) -> Self {
        lock(&self.failures)
            .entry(chunk_id)
            .or_default()
            .extend(errors);
        self
    }

    /// Make `chunk_id` return a row referencing an origin outside the chunk.
    pub fn with_bogus_rows(mut self, chunk_id: ChunkId) -> Self {
        self.bogus.insert(chunk_id);
        self
    }

    /// Add the column `name` to every row `chunk_id` returns.
    pub fn with_extra_column(
        mut self,
        chunk_id: ChunkId,
        name: impl Into<String>,
        value: Value,
    ) -> Self {
        self.extra_columns.insert(chunk_id, (name.into(), value));
        self
    }

    /// Make every solve of `chunk_id` panic.
    pub fn with_panic(mut self, chunk_id: ChunkId) -> Self {
        self.panics.insert(chunk_id);
        self
    }

    /// Make `validate` fail.
    pub fn with_validate_error(mut self, error: SolveError) -> Self {
        self.validate_error = Some(error);
        self
    }

    /// Number of solve attempts made for `chunk_id`.
    pub fn attempts(&self, chunk_id: ChunkId) -> usize {
        lock(&self.attempts).get(&chunk_id).copied().unwrap_or(0)
    }

    /// Total solve attempts across all chunks.
    pub fn total_attempts(&self) -> usize {
        lock(&self.attempts).values().sum()
    }

    /// Highest number of solves that were running at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn cost(origin: &InputRecord, destination: &InputRecord) -> f64 {
        let x = |r: &InputRecord| r.payload.get("x").and_then(|v| v.as_f64()).unwrap_or(0.0);
        (x(origin) - x(destination)).abs() + 1.0
    }

    fn rows_for(request: &SolveRequest) -> Vec<CostRow> {
        let pairs: Vec<(u32, u32)> = match &request.pairs {
            Some(pairs) => pairs.iter().map(|p| (p.origin, p.destination)).collect(),
            None => (0..request.origins.len() as u32)
                .flat_map(|o| (0..request.destinations.len() as u32).map(move |d| (o, d)))
                .collect(),
        };

        let mut rows: Vec<CostRow> = pairs
            .into_iter()
            .filter_map(|(o, d)| {
                let origin = request.origins.get(o as usize)?;
                let destination = request.destinations.get(d as usize)?;
                let time = Self::cost(origin, destination);
                Some(CostRow::new(o, d).with_costs(time, time * 0.5))
            })
            .filter(|row| match (request.settings.cutoff, row.total_time) {
                (Some(cutoff), Some(time)) => time <= cutoff,
                _ => true,
            })
            .collect();

        if let Some(k) = request.settings.max_destinations {
            rows.sort_by(|a, b| {
                a.origin.cmp(&b.origin).then(
                    a.total_time
                        .partial_cmp(&b.total_time)
                        .unwrap_or(std::cmp::Ordering::Equal),
                )
            });
            let mut rank = 0;
            let mut current = None;
            rows.retain_mut(|row| {
                if current != Some(row.origin) {
                    current = Some(row.origin);
                    rank = 0;
                }
                rank += 1;
                row.destination_rank = Some(rank);
                rank as usize <= k
            });
        }
        rows
    }
}

#[async_trait]
impl SolverAdapter for MockSolver {
    fn name(&self) -> &str {
        "mock"
    }

    async fn validate(&self, _settings: &SolveSettings) -> Result<(), SolveError> {
        match &self.validate_error {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    async fn solve(&self, request: SolveRequest) -> Result<SolveResponse, SolveError> {
        *lock(&self.attempts).entry(request.chunk_id).or_default() += 1;

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlight(&self.in_flight);
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let scripted = lock(&self.failures)
            .get_mut(&request.chunk_id)
            .and_then(VecDeque::pop_front);
        if let Some(error) = scripted {
            return Err(error);
        }
        if self.panics.contains(&request.chunk_id) {
            panic!("mock solver panicked on chunk {}", request.chunk_id);
        }

        let mut rows = Self::rows_for(&request);
        if let Some((name, value)) = self.extra_columns.get(&request.chunk_id) {
            for row in &mut rows {
                row.extra.insert(name.clone(), value.clone());
            }
        }
        if self.bogus.contains(&request.chunk_id) {
            rows.push(CostRow::new(request.origins.len() as u32, 0));
        }
        Ok(SolveResponse { rows })
    }
}
