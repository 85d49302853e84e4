//! Destinations for relayed worker events.

use crate::events::{EventLevel, RunEvent};

/// Receives every event the worker emits, as soon as it is read.
pub trait MessageSink: Send + Sync {
    /// A well-formed event.
    fn relay(&self, event: &RunEvent);

    /// A stdout line that is not a valid event.
    fn relay_raw(&self, line: &str);
}

/// Re-emits worker events through `tracing` at the matching level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl MessageSink for TracingSink {
    fn relay(&self, event: &RunEvent) {
        let progress = event.progress.map(|p| format!(" ({:.0}%)", p * 100.0));
        let progress = progress.as_deref().unwrap_or("");
        match event.level {
            EventLevel::Debug => tracing::debug!(target: "odgrid::worker", "{}{}", event.message, progress),
            EventLevel::Info => tracing::info!(target: "odgrid::worker", "{}{}", event.message, progress),
            EventLevel::Warning => tracing::warn!(target: "odgrid::worker", "{}{}", event.message, progress),
            EventLevel::Error => tracing::error!(target: "odgrid::worker", "{}{}", event.message, progress),
        }
    }

    fn relay_raw(&self, line: &str) {
        tracing::info!(target: "odgrid::worker", "{}", line);
    }
}
