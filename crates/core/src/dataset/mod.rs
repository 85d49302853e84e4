//! Input datasets.
//!
//! Origins and destinations are read from JSON Lines files, one record per
//! line. Only the `id` field is interpreted; the rest of each record is an
//! opaque payload handed to the solver and copied to the updated outputs.

mod pairs;
mod reader;
mod types;

pub use pairs::{derive_pairs, DerivedPairs};
pub use reader::{from_records, load_records, read_records};
pub use types::{Dataset, InputRecord, OdPair, RecordId};

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading input records.
#[derive(Debug, Error)]
pub enum DatasetError {
    /// The file could not be opened or read.
    #[error("Failed to read {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A line is not a valid record.
    #[error("Invalid record in {path} at line {line}: {reason}")]
    Parse {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    /// Two records share an id.
    #[error("Duplicate record id: {0}")]
    DuplicateId(String),
}
