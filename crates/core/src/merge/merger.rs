//! Global-id assignment and output writing.

use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::config::{MergeOrder, OutputConfig};
use super::error::{MergeError, SinkError};
use super::sink::{open_sink, OutputSink};
use super::staging::StagedOutputs;
use crate::dataset::Dataset;
use crate::metrics;
use crate::planner::ChunkId;
use crate::solver::PartialResult;

/// Fixed leading columns of the OD lines output.
pub const LINE_COLUMNS: [&str; 6] = [
    "object_id",
    "origin_id",
    "destination_id",
    "destination_rank",
    "total_time",
    "total_distance",
];

/// Columns of the updated origins and destinations outputs.
pub const RECORD_COLUMNS: [&str; 4] = ["object_id", "input_id", "chunk_id", "attributes"];

/// Totals written by a finished merge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub chunks_merged: usize,
    pub lines_written: u64,
    pub origins_written: u64,
    pub destinations_written: u64,
}

/// One output table plus its pending batch.
struct Table {
    name: &'static str,
    sink: Box<dyn OutputSink>,
    batch: Vec<Vec<Value>>,
    begun: bool,
    written: u64,
}

impl Table {
    fn new(name: &'static str, sink: Box<dyn OutputSink>) -> Self {
        Self {
            name,
            sink,
            batch: Vec::new(),
            begun: false,
            written: 0,
        }
    }

    fn begin(&mut self, columns: &[String]) -> Result<(), MergeError> {
        self.sink.begin(columns)?;
        self.begun = true;
        Ok(())
    }

    fn push(&mut self, row: Vec<Value>, batch_size: usize) -> Result<(), MergeError> {
        self.batch.push(row);
        if self.batch.len() >= batch_size {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), MergeError> {
        if self.batch.is_empty() {
            return Ok(());
        }
        self.sink.write_rows(&self.batch)?;
        let n = self.batch.len() as u64;
        self.written += n;
        metrics::MERGED_ROWS.with_label_values(&[self.name]).inc_by(n);
        self.batch.clear();
        Ok(())
    }
}

/// Merges partial results into the three final outputs.
///
/// Global ids are dense and start at 1. Each (chunk, chunk-local id) gets its
/// own global id the first time a row references it, so a record solved in
/// two chunks appears twice in the updated outputs.
pub struct ResultMerger {
    config: OutputConfig,
    origins: Arc<Dataset>,
    destinations: Arc<Dataset>,
    lines: Table,
    origin_table: Table,
    destination_table: Table,
    /// Sorted extra column names, fixed by the first non-empty partial.
    schema: Option<Vec<String>>,
    next_line_id: u64,
    next_origin_id: u64,
    next_destination_id: u64,
    /// Held back partials when merging in chunk id order; `None` marks a chunk
    /// that produced nothing.
    held: BTreeMap<ChunkId, Option<PartialResult>>,
    next_chunk: usize,
    chunks_merged: usize,
    /// Dropped after the tables, so sinks are closed before staged files go.
    staging: Option<StagedOutputs>,
}

impl ResultMerger {
    /// Opens the configured sinks on staged files.
    ///
    /// Existing outputs are untouched until [`finish`](Self::finish) succeeds.
    /// If the merger fails or is dropped first, the staged files are removed.
    pub fn open(
        config: OutputConfig,
        origins: Arc<Dataset>,
        destinations: Arc<Dataset>,
    ) -> Result<Self, MergeError> {
        let staging = StagedOutputs::prepare(config.paths()).map_err(SinkError::from)?;
        let lines = open_sink(&config, &staging.path_for(&config.od_lines), "od_lines")?;
        let origin_sink = open_sink(
            &config,
            &staging.path_for(&config.updated_origins),
            "updated_origins",
        )?;
        let destination_sink = open_sink(
            &config,
            &staging.path_for(&config.updated_destinations),
            "updated_destinations",
        )?;
        let mut merger = Self::with_sinks(
            config,
            origins,
            destinations,
            lines,
            origin_sink,
            destination_sink,
        );
        merger.staging = Some(staging);
        Ok(merger)
    }

    /// Builds a merger over caller-provided sinks.
    pub fn with_sinks(
        config: OutputConfig,
        origins: Arc<Dataset>,
        destinations: Arc<Dataset>,
        lines: Box<dyn OutputSink>,
        origin_sink: Box<dyn OutputSink>,
        destination_sink: Box<dyn OutputSink>,
    ) -> Self {
        Self {
            config,
            origins,
            destinations,
            lines: Table::new("od_lines", lines),
            origin_table: Table::new("origins", origin_sink),
            destination_table: Table::new("destinations", destination_sink),
            schema: None,
            next_line_id: 1,
            next_origin_id: 1,
            next_destination_id: 1,
            held: BTreeMap::new(),
            next_chunk: 0,
            chunks_merged: 0,
            staging: None,
        }
    }

    /// Accepts the outcome of one chunk. `None` means the chunk failed or was
    /// skipped; in chunk id order it still advances the cursor.
    pub fn accept(
        &mut self,
        chunk_id: ChunkId,
        partial: Option<PartialResult>,
    ) -> Result<(), MergeError> {
        match self.config.merge_order {
            MergeOrder::Arrival => match partial {
                Some(partial) => self.merge(partial),
                None => Ok(()),
            },
            MergeOrder::ChunkId => {
                self.held.insert(chunk_id, partial);
                while let Some(next) = self.held.remove(&ChunkId(self.next_chunk)) {
                    self.next_chunk += 1;
                    if let Some(partial) = next {
                        self.merge(partial)?;
                    }
                }
                Ok(())
            }
        }
    }

    /// Flushes and closes every output, then moves staged files into place.
    pub fn finish(mut self) -> Result<MergeStats, MergeError> {
        let stats = self.close_tables()?;
        let staging = self.staging.take();
        drop(self);
        if let Some(staging) = staging {
            staging.promote().map_err(SinkError::from)?;
        }
        Ok(stats)
    }

    fn close_tables(&mut self) -> Result<MergeStats, MergeError> {
        // Anything still held sits behind a chunk that never reported.
        let held = std::mem::take(&mut self.held);
        if !held.is_empty() {
            debug!(held = held.len(), "Merging partials held behind missing chunks");
        }
        for partial in held.into_values().flatten() {
            self.merge(partial)?;
        }

        if self.chunks_merged == 0 {
            warn!("No chunk produced results; writing empty outputs");
        }

        if !self.lines.begun {
            let columns = self.line_columns();
            self.lines.begin(&columns)?;
        }
        self.begin_record_tables()?;

        for table in [
            &mut self.lines,
            &mut self.origin_table,
            &mut self.destination_table,
        ] {
            table.flush()?;
            table.sink.finish()?;
        }

        let stats = MergeStats {
            chunks_merged: self.chunks_merged,
            lines_written: self.lines.written,
            origins_written: self.origin_table.written,
            destinations_written: self.destination_table.written,
        };
        info!(
            chunks = stats.chunks_merged,
            lines = stats.lines_written,
            origins = stats.origins_written,
            destinations = stats.destinations_written,
            "Merge finished"
        );
        Ok(stats)
    }

    fn line_columns(&self) -> Vec<String> {
        LINE_COLUMNS
            .iter()
            .map(|c| c.to_string())
            .chain(self.schema.iter().flatten().cloned())
            .collect()
    }

    fn begin_record_tables(&mut self) -> Result<(), MergeError> {
        let columns: Vec<String> = RECORD_COLUMNS.iter().map(|c| c.to_string()).collect();
        if !self.origin_table.begun {
            self.origin_table.begin(&columns)?;
        }
        if !self.destination_table.begun {
            self.destination_table.begin(&columns)?;
        }
        Ok(())
    }

    fn merge(&mut self, partial: PartialResult) -> Result<(), MergeError> {
        let chunk_id = partial.chunk_id;
        self.begin_record_tables()?;

        if !partial.rows.is_empty() {
            let found: Vec<String> = partial
                .rows
                .iter()
                .flat_map(|r| r.extra.keys().cloned())
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect();
            if let Some(expected) = &self.schema {
                if *expected != found {
                    return Err(MergeError::SchemaMismatch {
                        chunk_id,
                        expected: expected.clone(),
                        found,
                    });
                }
            } else {
                self.schema = Some(found);
                let columns = self.line_columns();
                self.lines.begin(&columns)?;
            }
        }

        let batch_size = self.config.batch_size.max(1);
        let chunk_value = Value::from(chunk_id.0 as u64);
        let mut origin_global: Vec<Option<u64>> = vec![None; partial.origin_inputs.len()];
        let mut destination_global: Vec<Option<u64>> =
            vec![None; partial.destination_inputs.len()];

        for row in &partial.rows {
            let local = row.origin as usize;
            let origin_id = match origin_global[local] {
                Some(id) => id,
                None => {
                    let id = self.next_origin_id;
                    self.next_origin_id += 1;
                    origin_global[local] = Some(id);
                    let record = record_row(
                        id,
                        &self.origins,
                        partial.origin_inputs[local],
                        &chunk_value,
                    );
                    self.origin_table.push(record, batch_size)?;
                    id
                }
            };

            let local = row.destination as usize;
            let destination_id = match destination_global[local] {
                Some(id) => id,
                None => {
                    let id = self.next_destination_id;
                    self.next_destination_id += 1;
                    destination_global[local] = Some(id);
                    let record = record_row(
                        id,
                        &self.destinations,
                        partial.destination_inputs[local],
                        &chunk_value,
                    );
                    self.destination_table.push(record, batch_size)?;
                    id
                }
            };

            let mut line = vec![
                Value::from(self.next_line_id),
                Value::from(origin_id),
                Value::from(destination_id),
                row.destination_rank.map(Value::from).unwrap_or(Value::Null),
                float(row.total_time),
                float(row.total_distance),
            ];
            for column in self.schema.iter().flatten() {
                line.push(row.extra.get(column).cloned().unwrap_or(Value::Null));
            }
            self.next_line_id += 1;
            self.lines.push(line, batch_size)?;
        }

        self.chunks_merged += 1;
        debug!(chunk_id = %chunk_id, rows = partial.row_count, "Merged chunk");
        Ok(())
    }
}

fn float(value: Option<f64>) -> Value {
    value
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

fn record_row(global_id: u64, dataset: &Dataset, input: usize, chunk: &Value) -> Vec<Value> {
    let (input_id, attributes) = match dataset.get(input) {
        Some(record) => (
            Value::String(record.id.to_string()),
            Value::Object(record.payload.clone()),
        ),
        None => (Value::Null, Value::Null),
    };
    vec![Value::from(global_id), input_id, chunk.clone(), attributes]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutputFormat;
    use crate::solver::{CostRow, SolveResponse};
    use crate::testing::fixtures;
    use serde_json::json;
    use std::sync::Mutex;

    type Captured = Arc<Mutex<Vec<Vec<Value>>>>;

    /// Sink that keeps rows in memory.
    struct MemorySink {
        columns: Arc<Mutex<Vec<String>>>,
        rows: Captured,
    }

    impl OutputSink for MemorySink {
        fn begin(&mut self, columns: &[String]) -> Result<(), SinkError> {
            *self.columns.lock().unwrap() = columns.to_vec();
            Ok(())
        }

        fn write_rows(&mut self, rows: &[Vec<Value>]) -> Result<(), SinkError> {
            self.rows.lock().unwrap().extend_from_slice(rows);
            Ok(())
        }

        fn finish(&mut self) -> Result<(), SinkError> {
            Ok(())
        }
    }

    struct Harness {
        merger: ResultMerger,
        line_columns: Arc<Mutex<Vec<String>>>,
        lines: Captured,
        origins: Captured,
        destinations: Captured,
    }

    fn harness(order: MergeOrder) -> Harness {
        let memory = || {
            let columns = Arc::new(Mutex::new(Vec::new()));
            let rows: Captured = Arc::new(Mutex::new(Vec::new()));
            let sink = MemorySink {
                columns: Arc::clone(&columns),
                rows: Arc::clone(&rows),
            };
            (Box::new(sink) as Box<dyn OutputSink>, columns, rows)
        };
        let (line_sink, line_columns, lines) = memory();
        let (origin_sink, _, origins) = memory();
        let (destination_sink, _, destinations) = memory();

        let mut config = OutputConfig::new(OutputFormat::Csv, "l", "o", "d");
        config.merge_order = order;
        config.batch_size = 2;

        Harness {
            merger: ResultMerger::with_sinks(
                config,
                Arc::new(fixtures::dataset("o", 10)),
                Arc::new(fixtures::dataset("d", 10)),
                line_sink,
                origin_sink,
                destination_sink,
            ),
            line_columns,
            lines,
            origins,
            destinations,
        }
    }

    fn partial(chunk: usize, origins: Vec<usize>, destinations: Vec<usize>, rows: Vec<CostRow>) -> PartialResult {
        PartialResult::from_response(ChunkId(chunk), origins, destinations, SolveResponse { rows })
            .unwrap()
    }

    #[test]
    fn test_assigns_dense_global_ids() {
        let mut h = harness(MergeOrder::Arrival);
        h.merger
            .accept(
                ChunkId(0),
                Some(partial(
                    0,
                    vec![0, 1],
                    vec![5, 6],
                    vec![
                        CostRow::new(0, 0).with_costs(1.0, 1.0),
                        CostRow::new(0, 1).with_costs(2.0, 2.0),
                        CostRow::new(1, 1).with_costs(3.0, 3.0),
                    ],
                )),
            )
            .unwrap();
        // Same input origin 1 in another chunk gets a new global id.
        h.merger
            .accept(
                ChunkId(1),
                Some(partial(1, vec![1], vec![7], vec![CostRow::new(0, 0)])),
            )
            .unwrap();
        let stats = h.merger.finish().unwrap();

        assert_eq!(stats.lines_written, 4);
        assert_eq!(stats.origins_written, 3);
        assert_eq!(stats.destinations_written, 3);

        let lines = h.lines.lock().unwrap();
        let ids: Vec<(u64, u64, u64)> = lines
            .iter()
            .map(|l| {
                (
                    l[0].as_u64().unwrap(),
                    l[1].as_u64().unwrap(),
                    l[2].as_u64().unwrap(),
                )
            })
            .collect();
        assert_eq!(ids, vec![(1, 1, 1), (2, 1, 2), (3, 2, 2), (4, 3, 3)]);

        let origins = h.origins.lock().unwrap();
        assert_eq!(origins[2][0], json!(3));
        assert_eq!(origins[2][1], json!("o1"));
        assert_eq!(origins[2][2], json!(1));
        assert_eq!(origins[2][3]["name"], json!("o1"));
    }

    #[test]
    fn test_unreferenced_records_are_not_written() {
        let mut h = harness(MergeOrder::Arrival);
        h.merger
            .accept(
                ChunkId(0),
                Some(partial(0, vec![0, 1, 2], vec![0, 1], vec![CostRow::new(2, 1)])),
            )
            .unwrap();
        h.merger.finish().unwrap();

        let origins = h.origins.lock().unwrap();
        assert_eq!(origins.len(), 1);
        assert_eq!(origins[0][1], json!("o2"));
        assert_eq!(h.destinations.lock().unwrap()[0][1], json!("d1"));
    }

    #[test]
    fn test_chunk_id_order_holds_back_partials() {
        let mut h = harness(MergeOrder::ChunkId);
        h.merger
            .accept(ChunkId(2), Some(partial(2, vec![2], vec![0], vec![CostRow::new(0, 0)])))
            .unwrap();
        h.merger.accept(ChunkId(1), None).unwrap();
        assert!(h.lines.lock().unwrap().is_empty());

        h.merger
            .accept(ChunkId(0), Some(partial(0, vec![0], vec![0], vec![CostRow::new(0, 0)])))
            .unwrap();
        h.merger.finish().unwrap();

        let origins = h.origins.lock().unwrap();
        let inputs: Vec<&Value> = origins.iter().map(|r| &r[1]).collect();
        assert_eq!(inputs, vec![&json!("o0"), &json!("o2")]);
    }

    #[test]
    fn test_extra_columns_and_schema_mismatch() {
        let mut h = harness(MergeOrder::Arrival);
        let mut row = CostRow::new(0, 0);
        row.extra.insert("shape".to_string(), json!("LINESTRING(0 0, 1 1)"));
        h.merger
            .accept(ChunkId(0), Some(partial(0, vec![0], vec![0], vec![row])))
            .unwrap();

        assert_eq!(
            h.line_columns.lock().unwrap().last().map(String::as_str),
            Some("shape")
        );

        let err = h
            .merger
            .accept(ChunkId(1), Some(partial(1, vec![1], vec![1], vec![CostRow::new(0, 0)])))
            .unwrap_err();
        match err {
            MergeError::SchemaMismatch {
                chunk_id,
                expected,
                found,
            } => {
                assert_eq!(chunk_id, ChunkId(1));
                assert_eq!(expected, vec!["shape".to_string()]);
                assert!(found.is_empty());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_run_declares_columns() {
        let h = harness(MergeOrder::Arrival);
        let stats = h.merger.finish().unwrap();
        assert_eq!(stats, MergeStats::default());
        assert_eq!(h.line_columns.lock().unwrap().len(), LINE_COLUMNS.len());
    }

    fn csv_config(dir: &std::path::Path) -> OutputConfig {
        OutputConfig::new(
            OutputFormat::Csv,
            dir.join("lines.csv"),
            dir.join("origins.csv"),
            dir.join("destinations.csv"),
        )
    }

    fn open_merger(config: OutputConfig) -> ResultMerger {
        ResultMerger::open(
            config,
            Arc::new(fixtures::dataset("o", 4)),
            Arc::new(fixtures::dataset("d", 4)),
        )
        .unwrap()
    }

    #[test]
    fn test_outputs_appear_only_after_finish() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = csv_config(dir.path());
        let mut merger = open_merger(config.clone());

        merger
            .accept(ChunkId(0), Some(partial(0, vec![0], vec![1], vec![CostRow::new(0, 0)])))
            .unwrap();
        assert!(config.paths().iter().all(|p| !p.exists()));
        assert!(crate::merge::staged_path(&config.od_lines).exists());

        merger.finish().unwrap();
        let text = std::fs::read_to_string(&config.od_lines).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(config.paths().iter().all(|p| p.exists()));
        assert!(!crate::merge::staged_path(&config.od_lines).exists());
    }

    #[test]
    fn test_failed_merge_keeps_previous_outputs() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = csv_config(dir.path());
        std::fs::write(&config.od_lines, "previous run\n").unwrap();

        let mut merger = open_merger(config.clone());
        let mut row = CostRow::new(0, 0);
        row.extra.insert("shape".to_string(), json!("LINE"));
        merger
            .accept(ChunkId(0), Some(partial(0, vec![0], vec![0], vec![row])))
            .unwrap();
        let err = merger
            .accept(ChunkId(1), Some(partial(1, vec![1], vec![1], vec![CostRow::new(0, 0)])))
            .unwrap_err();
        assert!(matches!(err, MergeError::SchemaMismatch { .. }));
        drop(merger);

        assert_eq!(
            std::fs::read_to_string(&config.od_lines).unwrap(),
            "previous run\n"
        );
        assert!(!config.updated_origins.exists());
        assert!(!config.updated_destinations.exists());
        for path in config.paths() {
            assert!(!crate::merge::staged_path(path).exists());
        }
    }

    #[test]
    fn test_sqlite_tables_share_one_staged_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let db = dir.path().join("out.db");
        let config = OutputConfig::new(OutputFormat::Sqlite, &db, &db, &db);

        let mut merger = open_merger(config);
        merger
            .accept(ChunkId(0), Some(partial(0, vec![0, 1], vec![0], vec![CostRow::new(1, 0)])))
            .unwrap();
        merger.finish().unwrap();

        let conn = rusqlite::Connection::open(&db).unwrap();
        for table in ["od_lines", "updated_origins", "updated_destinations"] {
            let count: i64 = conn
                .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| r.get(0))
                .unwrap();
            assert_eq!(count, 1, "{}", table);
        }
        assert!(!crate::merge::staged_path(&db).exists());
    }
}
