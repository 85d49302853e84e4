//! Run event stream.
//!
//! The worker reports progress and problems to its caller as newline-delimited
//! JSON [`RunEvent`] records on stdout:
//! - `EventHandle` - cloneable emitter used by the engine
//! - `EventWriter` - background task serializing events to any async writer
//!
//! Events are versioned and parsed strictly on the receiving side.

mod handle;
mod types;
mod writer;

pub use handle::EventHandle;
pub use types::{EventLevel, RunEvent, RunState, RunSummary, EVENT_VERSION};
pub use writer::{create_event_stream, EventWriter};

use thiserror::Error;

/// Errors that can occur in the event stream.
#[derive(Debug, Error)]
pub enum EventError {
    /// A line is not a valid event.
    #[error("Invalid event: {0}")]
    Parse(String),

    /// The event was written by an incompatible worker.
    #[error("Unsupported event version: {0}")]
    UnsupportedVersion(u32),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
