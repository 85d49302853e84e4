//! Column-blocked JSON Lines sink.
//!
//! Rows are buffered column by column and written as one JSON object per
//! block: `{"columns": [...], "rows": n, "data": [[col 0...], [col 1...]]}`.
//! Readers can pull a single column out of a block without touching the rest.

use serde::Serialize;
use serde_json::Value;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use super::{check_width, OutputSink};
use crate::merge::error::SinkError;

#[derive(Serialize)]
struct Block<'a> {
    columns: &'a [String],
    rows: usize,
    data: &'a [Vec<Value>],
}

/// Writes a block every `block_rows` rows.
pub struct ColumnarSink {
    writer: BufWriter<File>,
    block_rows: usize,
    columns: Vec<String>,
    data: Vec<Vec<Value>>,
    buffered: usize,
    blocks_written: usize,
    begun: bool,
}

impl ColumnarSink {
    /// Creates (or truncates) the file.
    pub fn create(path: &Path, block_rows: usize) -> Result<Self, SinkError> {
        Ok(Self {
            writer: BufWriter::new(File::create(path)?),
            block_rows: block_rows.max(1),
            columns: Vec::new(),
            data: Vec::new(),
            buffered: 0,
            blocks_written: 0,
            begun: false,
        })
    }

    fn flush_block(&mut self) -> Result<(), SinkError> {
        let block = Block {
            columns: &self.columns,
            rows: self.buffered,
            data: &self.data,
        };
        serde_json::to_writer(&mut self.writer, &block)
            .map_err(|e| SinkError::Serialization(e.to_string()))?;
        self.writer.write_all(b"\n")?;

        for column in &mut self.data {
            column.clear();
        }
        self.buffered = 0;
        self.blocks_written += 1;
        Ok(())
    }
}

impl OutputSink for ColumnarSink {
    fn begin(&mut self, columns: &[String]) -> Result<(), SinkError> {
        if self.begun {
            return Err(SinkError::Usage("columns declared twice".to_string()));
        }
        self.begun = true;
        self.columns = columns.to_vec();
        self.data = vec![Vec::with_capacity(self.block_rows); columns.len()];
        Ok(())
    }

    fn write_rows(&mut self, rows: &[Vec<Value>]) -> Result<(), SinkError> {
        if !self.begun {
            return Err(SinkError::Usage("rows written before columns".to_string()));
        }
        for row in rows {
            check_width(self.columns.len(), row)?;
            for (column, value) in self.data.iter_mut().zip(row) {
                column.push(value.clone());
            }
            self.buffered += 1;
            if self.buffered >= self.block_rows {
                self.flush_block()?;
            }
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<(), SinkError> {
        // An empty table still gets one block so its columns are recorded.
        if self.buffered > 0 || self.blocks_written == 0 {
            self.flush_block()?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
