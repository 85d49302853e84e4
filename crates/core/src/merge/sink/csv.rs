//! Delimited text sink.

use serde_json::Value;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use super::{check_width, OutputSink};
use crate::merge::error::SinkError;

/// Comma-separated values with a header line, RFC 4180 quoting.
pub struct CsvSink {
    writer: BufWriter<File>,
    columns: Option<usize>,
}

impl CsvSink {
    /// Creates (or truncates) the file.
    pub fn create(path: &Path) -> Result<Self, SinkError> {
        Ok(Self {
            writer: BufWriter::new(File::create(path)?),
            columns: None,
        })
    }

    fn write_record(&mut self, fields: impl Iterator<Item = String>) -> Result<(), SinkError> {
        let line = fields.map(|f| escape(&f)).collect::<Vec<_>>().join(",");
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }
}

fn field(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

impl OutputSink for CsvSink {
    fn begin(&mut self, columns: &[String]) -> Result<(), SinkError> {
        if self.columns.is_some() {
            return Err(SinkError::Usage("columns declared twice".to_string()));
        }
        self.columns = Some(columns.len());
        self.write_record(columns.iter().cloned())
    }

    fn write_rows(&mut self, rows: &[Vec<Value>]) -> Result<(), SinkError> {
        let columns = self
            .columns
            .ok_or_else(|| SinkError::Usage("rows written before columns".to_string()))?;
        for row in rows {
            check_width(columns, row)?;
            self.write_record(row.iter().map(field))?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<(), SinkError> {
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_header_and_quoting() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("lines.csv");

        let mut sink = CsvSink::create(&path).unwrap();
        sink.begin(&["object_id".to_string(), "name".to_string(), "attributes".to_string()])
            .unwrap();
        sink.write_rows(&[
            vec![json!(1), json!("plain"), json!({"a": 1})],
            vec![json!(2), json!("with, comma"), Value::Null],
            vec![json!(3), json!("say \"hi\""), json!(true)],
        ])
        .unwrap();
        sink.finish().unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "object_id,name,attributes");
        assert_eq!(lines[1], r#"1,plain,"{""a"":1}""#);
        assert_eq!(lines[2], r#"2,"with, comma","#);
        assert_eq!(lines[3], r#"3,"say ""hi""",true"#);
    }

    #[test]
    fn test_rows_before_columns_rejected() {
        let dir = TempDir::new().unwrap();
        let mut sink = CsvSink::create(&dir.path().join("x.csv")).unwrap();
        assert!(matches!(
            sink.write_rows(&[vec![json!(1)]]),
            Err(SinkError::Usage(_))
        ));
    }
}
