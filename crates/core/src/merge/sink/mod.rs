//! Output sinks.
//!
//! A sink receives one table: a column list once, then rows of JSON values
//! in column order. The merger drives three of them, one per output.

mod columnar;
mod csv;
mod sqlite;

pub use columnar::ColumnarSink;
pub use csv::CsvSink;
pub use sqlite::SqliteSink;

use serde_json::Value;
use std::path::Path;

use super::config::OutputConfig;
use super::error::SinkError;
use crate::config::OutputFormat;

/// A destination for one output table.
pub trait OutputSink: Send {
    /// Declares the columns. Called exactly once before any rows.
    fn begin(&mut self, columns: &[String]) -> Result<(), SinkError>;

    /// Appends a batch of rows.
    fn write_rows(&mut self, rows: &[Vec<Value>]) -> Result<(), SinkError>;

    /// Flushes everything and closes the table.
    fn finish(&mut self) -> Result<(), SinkError>;
}

/// Opens the sink for `table` in the configured format.
///
/// `table` names the sqlite table; file-based formats ignore it.
pub fn open_sink(
    config: &OutputConfig,
    path: &Path,
    table: &str,
) -> Result<Box<dyn OutputSink>, SinkError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(match config.format {
        OutputFormat::Sqlite => Box::new(SqliteSink::open(path, table)?),
        OutputFormat::Csv => Box::new(CsvSink::create(path)?),
        OutputFormat::Columnar => Box::new(ColumnarSink::create(path, config.block_rows)?),
    })
}

pub(super) fn check_width(columns: usize, row: &[Value]) -> Result<(), SinkError> {
    if row.len() != columns {
        return Err(SinkError::Usage(format!(
            "row has {} values, table has {} columns",
            row.len(),
            columns
        )));
    }
    Ok(())
}
