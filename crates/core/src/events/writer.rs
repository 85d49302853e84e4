use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use super::handle::EventHandle;
use super::types::RunEvent;
use super::EventError;

/// Background task that writes run events as JSON lines
pub struct EventWriter<W> {
    rx: mpsc::Receiver<RunEvent>,
    out: W,
}

impl<W: AsyncWrite + Unpin + Send> EventWriter<W> {
    /// Create a new event writer
    pub fn new(rx: mpsc::Receiver<RunEvent>, out: W) -> Self {
        Self { rx, out }
    }

    /// Run the writer, consuming events until every handle is dropped
    ///
    /// Each event is flushed immediately so the reader sees it without delay.
    /// Returns the number of events written.
    pub async fn run(mut self) -> Result<usize, EventError> {
        let mut written = 0;
        while let Some(event) = self.rx.recv().await {
            let mut line = event.to_line()?;
            line.push('\n');
            self.out.write_all(line.as_bytes()).await?;
            self.out.flush().await?;
            written += 1;
        }
        Ok(written)
    }
}

/// Create a complete event stream
///
/// Returns:
/// - `EventHandle` - for emitting events (clone this to share across tasks)
/// - `EventWriter` - spawn this as a background task with `tokio::spawn(writer.run())`
pub fn create_event_stream<W: AsyncWrite + Unpin + Send>(
    out: W,
    buffer_size: usize,
) -> (EventHandle, EventWriter<W>) {
    let (tx, rx) = mpsc::channel(buffer_size);
    (EventHandle::new(tx), EventWriter::new(rx, out))
}
