//! Result merging.
//!
//! Consumes per-chunk partial results in any order and writes three outputs:
//! OD lines, updated origins and updated destinations. Chunk-local ids are
//! rewritten to dense global ids so every line references rows of the
//! updated outputs.

mod config;
mod error;
mod merger;
pub mod sink;
mod staging;

pub use config::{MergeOrder, OutputConfig};
pub use error::{MergeError, SinkError};
pub use merger::{MergeStats, ResultMerger, LINE_COLUMNS, RECORD_COLUMNS};
pub use sink::{open_sink, ColumnarSink, CsvSink, OutputSink, SqliteSink};
pub use staging::staged_path;
