//! SQLite table sink.

use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection};
use serde_json::Value;
use std::path::Path;

use super::{check_width, OutputSink};
use crate::merge::error::SinkError;

/// Writes one table of a SQLite database; each batch is one transaction.
///
/// The table is dropped and recreated when the columns are declared, so a
/// rerun replaces the previous output.
pub struct SqliteSink {
    conn: Connection,
    table: String,
    insert_sql: Option<String>,
    columns: usize,
}

impl SqliteSink {
    /// Opens (or creates) the database file.
    pub fn open(path: &Path, table: &str) -> Result<Self, SinkError> {
        let conn = Connection::open(path)?;
        Ok(Self {
            conn,
            table: table.to_string(),
            insert_sql: None,
            columns: 0,
        })
    }

    /// In-memory database (useful for testing).
    pub fn in_memory(table: &str) -> Result<Self, SinkError> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
            table: table.to_string(),
            insert_sql: None,
            columns: 0,
        })
    }

    /// The underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => n
                .as_f64()
                .map(SqlValue::Real)
                .unwrap_or_else(|| SqlValue::Text(n.to_string())),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

impl OutputSink for SqliteSink {
    fn begin(&mut self, columns: &[String]) -> Result<(), SinkError> {
        if self.insert_sql.is_some() {
            return Err(SinkError::Usage("columns declared twice".to_string()));
        }
        let table = quote_ident(&self.table);
        let column_list = columns
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ");

        self.conn.execute_batch(&format!(
            "DROP TABLE IF EXISTS {table}; CREATE TABLE {table} ({column_list});"
        ))?;

        let placeholders = vec!["?"; columns.len()].join(", ");
        self.insert_sql = Some(format!(
            "INSERT INTO {table} ({column_list}) VALUES ({placeholders})"
        ));
        self.columns = columns.len();
        Ok(())
    }

    fn write_rows(&mut self, rows: &[Vec<Value>]) -> Result<(), SinkError> {
        let sql = self
            .insert_sql
            .as_deref()
            .ok_or_else(|| SinkError::Usage("rows written before columns".to_string()))?;

        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(sql)?;
            for row in rows {
                check_width(self.columns, row)?;
                stmt.execute(params_from_iter(row.iter().map(to_sql)))?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_create_and_insert() {
        let mut sink = SqliteSink::in_memory("od_lines").unwrap();
        sink.begin(&[
            "object_id".to_string(),
            "total_time".to_string(),
            "shape".to_string(),
        ])
        .unwrap();
        sink.write_rows(&[
            vec![json!(1), json!(3.25), json!("LINESTRING(0 0, 1 1)")],
            vec![json!(2), Value::Null, json!({"k": [1, 2]})],
        ])
        .unwrap();
        sink.finish().unwrap();

        let conn = sink.connection();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM od_lines", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 2);

        let time: f64 = conn
            .query_row("SELECT total_time FROM od_lines WHERE object_id = 1", [], |r| r.get(0))
            .unwrap();
        assert_eq!(time, 3.25);

        let shape: String = conn
            .query_row("SELECT shape FROM od_lines WHERE object_id = 2", [], |r| r.get(0))
            .unwrap();
        assert_eq!(shape, r#"{"k":[1,2]}"#);
    }

    #[test]
    fn test_width_mismatch() {
        let mut sink = SqliteSink::in_memory("t").unwrap();
        sink.begin(&["a".to_string(), "b".to_string()]).unwrap();
        assert!(matches!(
            sink.write_rows(&[vec![json!(1)]]),
            Err(SinkError::Usage(_))
        ));
    }
}
