//! JSON Lines record reader.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::debug;

use super::types::{Dataset, InputRecord};
use super::DatasetError;

/// Loads a dataset from a JSON Lines file. Blank lines are skipped.
pub fn load_records(path: &Path) -> Result<Dataset, DatasetError> {
    let file = File::open(path).map_err(|source| DatasetError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let dataset = read_records(BufReader::new(file), path)?;
    debug!("Loaded {} records from {}", dataset.len(), path.display());
    Ok(dataset)
}

/// Parses JSON Lines from any reader. `origin` is only used in error messages.
pub fn read_records<R: BufRead>(reader: R, origin: &Path) -> Result<Dataset, DatasetError> {
    let mut records = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line.map_err(|source| DatasetError::Open {
            path: origin.to_path_buf(),
            source,
        })?;
        if line.trim().is_empty() {
            continue;
        }
        let record: InputRecord =
            serde_json::from_str(&line).map_err(|e| DatasetError::Parse {
                path: origin.to_path_buf(),
                line: idx + 1,
                reason: e.to_string(),
            })?;
        records.push(record);
    }
    from_records(records)
}

/// Builds a dataset from records already in memory, rejecting duplicate ids.
pub fn from_records(records: Vec<InputRecord>) -> Result<Dataset, DatasetError> {
    let mut index = HashMap::with_capacity(records.len());
    for (pos, record) in records.iter().enumerate() {
        if index.insert(record.id.clone(), pos).is_some() {
            return Err(DatasetError::DuplicateId(record.id.to_string()));
        }
    }
    Ok(Dataset::from_parts(records, index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::RecordId;
    use std::io::{Cursor, Write};
    use std::path::PathBuf;
    use tempfile::NamedTempFile;

    #[test]
    fn test_read_mixed_id_types() {
        let input = r#"{"id": "a", "x": 1.0, "y": 2.0}

{"id": 7, "x": 3.0, "y": 4.0}
"#;
        let ds = read_records(Cursor::new(input), &PathBuf::from("mem")).unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.get(1).unwrap().id.as_str(), "7");
        assert_eq!(ds.position(&RecordId::new("a")), Some(0));
        assert_eq!(ds.get(0).unwrap().payload["x"], serde_json::json!(1.0));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let input = "{\"id\": 1}\n{\"id\": \"1\"}\n";
        let err = read_records(Cursor::new(input), &PathBuf::from("mem")).unwrap_err();
        assert!(matches!(err, DatasetError::DuplicateId(ref id) if id == "1"));
    }

    #[test]
    fn test_parse_error_reports_line() {
        let input = "{\"id\": 1}\n{not json}\n";
        let err = read_records(Cursor::new(input), &PathBuf::from("points.jsonl")).unwrap_err();
        match err {
            DatasetError::Parse { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_id_rejected() {
        let input = "{\"name\": \"no id\"}\n";
        assert!(read_records(Cursor::new(input), &PathBuf::from("mem")).is_err());
    }

    #[test]
    fn test_load_records_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{{\"id\": \"o1\"}}").unwrap();
        writeln!(file, "{{\"id\": \"o2\"}}").unwrap();
        let ds = load_records(file.path()).unwrap();
        assert_eq!(ds.len(), 2);
    }

    #[test]
    fn test_load_records_missing_file() {
        let err = load_records(Path::new("/nonexistent/origins.jsonl")).unwrap_err();
        assert!(matches!(err, DatasetError::Open { .. }));
    }
}
