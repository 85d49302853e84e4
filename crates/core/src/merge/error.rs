//! Error types for the merge module.

use std::path::PathBuf;
use thiserror::Error;

use crate::planner::ChunkId;

/// Errors raised by an output sink.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Rows written before the columns were declared, or with the wrong width.
    #[error("Invalid sink usage: {0}")]
    Usage(String),
}

impl From<rusqlite::Error> for SinkError {
    fn from(e: rusqlite::Error) -> Self {
        SinkError::Database(e.to_string())
    }
}

/// Errors that can occur while merging partial results.
#[derive(Debug, Error)]
pub enum MergeError {
    /// A partial result carries a different set of extra columns than the
    /// one that fixed the output schema.
    #[error("Chunk {chunk_id} has columns {found:?}, expected {expected:?}")]
    SchemaMismatch {
        chunk_id: ChunkId,
        expected: Vec<String>,
        found: Vec<String>,
    },

    /// A persisted chunk artifact could not be loaded.
    #[error("Failed to load chunk artifact {path}: {source}")]
    Artifact {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Output error: {0}")]
    Sink(#[from] SinkError),
}
