//! Configuration for the result merger and output sinks.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::config::OutputFormat;

/// Order in which partial results are merged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeOrder {
    /// As chunks finish. Fastest, output order varies between runs.
    #[default]
    Arrival,
    /// Ascending chunk id. Out-of-order partials are held back.
    ChunkId,
}

/// Where and how final outputs are written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub format: OutputFormat,

    /// OD cost matrix lines.
    pub od_lines: PathBuf,

    /// Origins that appear in at least one line.
    pub updated_origins: PathBuf,

    /// Destinations that appear in at least one line.
    pub updated_destinations: PathBuf,

    #[serde(default)]
    pub merge_order: MergeOrder,

    /// Rows per write batch (one transaction for sqlite).
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Rows per block in the columnar format.
    #[serde(default = "default_block_rows")]
    pub block_rows: usize,

    /// Root folder for per-run chunk artifacts.
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,

    /// Keep chunk artifacts after a successful merge.
    #[serde(default)]
    pub keep_intermediate: bool,
}

fn default_batch_size() -> usize {
    1000
}

fn default_block_rows() -> usize {
    10_000
}

fn default_scratch_dir() -> PathBuf {
    PathBuf::from("scratch")
}

impl OutputConfig {
    /// Output config with default tuning for the given format and paths.
    pub fn new(
        format: OutputFormat,
        od_lines: impl Into<PathBuf>,
        updated_origins: impl Into<PathBuf>,
        updated_destinations: impl Into<PathBuf>,
    ) -> Self {
        Self {
            format,
            od_lines: od_lines.into(),
            updated_origins: updated_origins.into(),
            updated_destinations: updated_destinations.into(),
            merge_order: MergeOrder::default(),
            batch_size: default_batch_size(),
            block_rows: default_block_rows(),
            scratch_dir: default_scratch_dir(),
            keep_intermediate: false,
        }
    }

    /// Sets the scratch folder.
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = dir.into();
        self
    }

    /// Sets the merge order.
    pub fn with_merge_order(mut self, order: MergeOrder) -> Self {
        self.merge_order = order;
        self
    }

    /// The three output paths, lines first.
    pub fn paths(&self) -> [&PathBuf; 3] {
        [&self.od_lines, &self.updated_origins, &self.updated_destinations]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config: OutputConfig = toml::from_str(
            r#"
            format = "sqlite"
            od_lines = "out.db"
            updated_origins = "out.db"
            updated_destinations = "out.db"
            "#,
        )
        .unwrap();
        assert_eq!(config.format, OutputFormat::Sqlite);
        assert_eq!(config.merge_order, MergeOrder::Arrival);
        assert_eq!(config.batch_size, 1000);
        assert_eq!(config.block_rows, 10_000);
        assert!(!config.keep_intermediate);
    }

    #[test]
    fn test_merge_order_chunk_id() {
        let order: MergeOrder = serde_json::from_str(r#""chunk_id""#).unwrap();
        assert_eq!(order, MergeOrder::ChunkId);
    }
}
