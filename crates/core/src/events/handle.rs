use tokio::sync::mpsc;

use super::types::{EventLevel, RunEvent, RunSummary};

/// Handle for emitting run events
///
/// This is cheaply cloneable and can be shared across tasks.
/// Events are sent through an async channel to be written by the EventWriter.
#[derive(Clone)]
pub struct EventHandle {
    tx: mpsc::Sender<RunEvent>,
}

impl EventHandle {
    /// Create a new event handle from a channel sender
    pub fn new(tx: mpsc::Sender<RunEvent>) -> Self {
        Self { tx }
    }

    /// Emit an event
    ///
    /// If the channel is closed, the error is logged but the caller is not failed.
    pub async fn emit(&self, event: RunEvent) {
        if let Err(e) = self.tx.send(event).await {
            tracing::error!("Failed to emit run event: {}", e);
        }
    }

    pub async fn message(&self, level: EventLevel, message: impl Into<String>) {
        self.emit(RunEvent::new(level, message)).await;
    }

    pub async fn info(&self, message: impl Into<String>) {
        self.message(EventLevel::Info, message).await;
    }

    pub async fn warning(&self, message: impl Into<String>) {
        self.message(EventLevel::Warning, message).await;
    }

    pub async fn error(&self, message: impl Into<String>) {
        self.message(EventLevel::Error, message).await;
    }

    /// Emit "Finished chunk k of n" with the matching progress fraction
    pub async fn chunk_finished(&self, finished: usize, total: usize) {
        let progress = if total == 0 {
            1.0
        } else {
            finished as f32 / total as f32
        };
        self.emit(
            RunEvent::new(
                EventLevel::Info,
                format!("Finished chunk {} of {}", finished, total),
            )
            .with_progress(progress),
        )
        .await;
    }

    /// Emit the final summary event
    pub async fn summary(&self, message: impl Into<String>, summary: RunSummary) {
        self.emit(RunEvent::new(EventLevel::Info, message).with_summary(summary))
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_emit_event() {
        let (tx, mut rx) = mpsc::channel(10);
        let handle = EventHandle::new(tx);

        handle.warning("2 origins have no assigned destination").await;

        let event = rx.recv().await.expect("Should receive event");
        assert_eq!(event.level, EventLevel::Warning);
        assert_eq!(event.version, 1);
    }

    #[tokio::test]
    async fn test_chunk_finished_progress() {
        let (tx, mut rx) = mpsc::channel(10);
        let handle = EventHandle::new(tx);

        handle.chunk_finished(3, 4).await;

        let event = rx.recv().await.expect("Should receive event");
        assert_eq!(event.message, "Finished chunk 3 of 4");
        assert_eq!(event.progress, Some(0.75));
    }

    #[tokio::test]
    async fn test_emit_closed_channel() {
        let (tx, rx) = mpsc::channel::<RunEvent>(10);
        let handle = EventHandle::new(tx);
        drop(rx);

        // This should not panic, just log an error
        handle.info("nobody listening").await;
    }
}
