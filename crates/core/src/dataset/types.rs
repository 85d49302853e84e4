//! Input record types.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;

/// Unique identifier of an input record.
///
/// Accepts either a JSON string or an integer; both are kept as text so
/// `"17"` and `17` refer to the same record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Builds an id from a JSON scalar. Returns `None` for null, objects and arrays.
    pub fn from_value(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::String(s) => Some(Self(s.clone())),
            serde_json::Value::Number(n) => Some(Self(n.to_string())),
            serde_json::Value::Bool(b) => Some(Self(b.to_string())),
            _ => None,
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for RecordId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        RecordId::from_value(&value)
            .ok_or_else(|| serde::de::Error::custom("record id must be a string or number"))
    }
}

/// One input record. Everything but the id is opaque to the engine and is
/// passed through to the solver and the updated outputs as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputRecord {
    pub id: RecordId,
    #[serde(flatten)]
    pub payload: serde_json::Map<String, serde_json::Value>,
}

impl InputRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: RecordId::new(id),
            payload: serde_json::Map::new(),
        }
    }

    pub fn with_field(mut self, key: &str, value: serde_json::Value) -> Self {
        self.payload.insert(key.to_string(), value);
        self
    }
}

/// An ordered collection of input records. Record position is the input index.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    records: Vec<InputRecord>,
    index: HashMap<RecordId, usize>,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&InputRecord> {
        self.records.get(index)
    }

    pub fn records(&self) -> &[InputRecord] {
        &self.records
    }

    /// Position of the record with the given id.
    pub fn position(&self, id: &RecordId) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub(super) fn from_parts(records: Vec<InputRecord>, index: HashMap<RecordId, usize>) -> Self {
        Self { records, index }
    }
}

/// A known origin-destination pair, by input index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OdPair {
    pub origin: usize,
    pub destination: usize,
}

impl OdPair {
    pub fn new(origin: usize, destination: usize) -> Self {
        Self {
            origin,
            destination,
        }
    }
}
