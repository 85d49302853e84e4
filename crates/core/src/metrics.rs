//! Prometheus metrics for a run.
//!
//! This module provides metrics for:
//! - Pool (chunk outcomes, solve attempts and durations, retries)
//! - Merge (rows written per output)
//! - Orchestrator (relayed worker events)

use once_cell::sync::Lazy;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};

/// Registry holding every odgrid metric.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    for metric in all_metrics() {
        // Only fails on duplicate registration, which all_metrics rules out.
        let _ = registry.register(metric);
    }
    registry
});

// =============================================================================
// Pool Metrics
// =============================================================================

/// Chunks finished by final result.
pub static CHUNK_OUTCOMES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("odgrid_chunk_outcomes_total", "Chunks by final result"),
        &["result"], // "succeeded", "failed", "skipped"
    )
    .unwrap()
});

/// Solve attempts by outcome.
pub static SOLVE_ATTEMPTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("odgrid_solve_attempts_total", "Solve attempts by outcome"),
        &["outcome"], // "ok", "transient", "permanent"
    )
    .unwrap()
});

/// Duration of a single solve attempt in seconds.
pub static SOLVE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "odgrid_solve_duration_seconds",
            "Duration of a single chunk solve attempt",
        )
        .buckets(vec![0.1, 0.5, 1.0, 5.0, 15.0, 30.0, 60.0, 300.0, 900.0]),
        &["outcome"],
    )
    .unwrap()
});

/// Transient failures that were retried.
pub static CHUNK_RETRIES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("odgrid_chunk_retries_total", "Chunk solves retried after a transient failure")
        .unwrap()
});

// =============================================================================
// Merge Metrics
// =============================================================================

/// Rows written per output.
pub static MERGED_ROWS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("odgrid_merged_rows_total", "Rows written to the final outputs"),
        &["output"], // "od_lines", "origins", "destinations"
    )
    .unwrap()
});

// =============================================================================
// Orchestrator Metrics
// =============================================================================

/// Worker events relayed by level.
pub static RELAYED_EVENTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("odgrid_relayed_events_total", "Worker events relayed to the caller"),
        &["level"], // "debug", "info", "warning", "error", "malformed"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Pool
        Box::new(CHUNK_OUTCOMES.clone()),
        Box::new(SOLVE_ATTEMPTS.clone()),
        Box::new(SOLVE_DURATION.clone()),
        Box::new(CHUNK_RETRIES.clone()),
        // Merge
        Box::new(MERGED_ROWS.clone()),
        // Orchestrator
        Box::new(RELAYED_EVENTS.clone()),
    ]
}

/// Encode all metrics as Prometheus text format.
pub fn render_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8_lossy(&buffer).into_owned()
}
