//! Stored value encodings.
//!
//! - [`MetaValue`] — self-describing metadata values (bincode, tagged enum)
//! - [`StateVectorRecord`] — `(clock, state_vector)` cached per document
//!
//! Both use bincode's standard config: integers are varint encoded and byte
//! strings carry a varint length prefix.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::PersistenceError;

/// A metadata value that round-trips without an external schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MetaValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    List(Vec<MetaValue>),
    Map(BTreeMap<String, MetaValue>),
}

impl MetaValue {
    pub fn encode(&self) -> Result<Vec<u8>, PersistenceError> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| PersistenceError::Serialization(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, PersistenceError> {
        let (value, _) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .map_err(|e| PersistenceError::Deserialization(e.to_string()))?;
        Ok(value)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            MetaValue::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetaValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<bool> for MetaValue {
    fn from(b: bool) -> Self {
        MetaValue::Bool(b)
    }
}

impl From<i64> for MetaValue {
    fn from(n: i64) -> Self {
        MetaValue::Int(n)
    }
}

impl From<i32> for MetaValue {
    fn from(n: i32) -> Self {
        MetaValue::Int(n.into())
    }
}

impl From<f64> for MetaValue {
    fn from(n: f64) -> Self {
        MetaValue::Float(n)
    }
}

impl From<&str> for MetaValue {
    fn from(s: &str) -> Self {
        MetaValue::String(s.to_owned())
    }
}

impl From<String> for MetaValue {
    fn from(s: String) -> Self {
        MetaValue::String(s)
    }
}

impl From<Vec<u8>> for MetaValue {
    fn from(b: Vec<u8>) -> Self {
        MetaValue::Bytes(b)
    }
}

impl From<Vec<MetaValue>> for MetaValue {
    fn from(items: Vec<MetaValue>) -> Self {
        MetaValue::List(items)
    }
}

impl From<BTreeMap<String, MetaValue>> for MetaValue {
    fn from(map: BTreeMap<String, MetaValue>) -> Self {
        MetaValue::Map(map)
    }
}

/// Cached state vector of a document, tagged with the update clock it
/// reflects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateVectorRecord {
    pub clock: u32,
    pub state_vector: Vec<u8>,
}

impl StateVectorRecord {
    pub fn encode(&self) -> Result<Vec<u8>, PersistenceError> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| PersistenceError::Serialization(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, PersistenceError> {
        let (record, _) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .map_err(|e| PersistenceError::Deserialization(e.to_string()))?;
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meta_value_nested_roundtrip() {
        let mut inner = BTreeMap::new();
        inner.insert("width".to_string(), MetaValue::Float(12.5));
        inner.insert("tags".to_string(), vec![MetaValue::from("a"), MetaValue::Null].into());

        let value = MetaValue::List(vec![
            MetaValue::Bool(true),
            MetaValue::Int(-42),
            MetaValue::Bytes(vec![0, 255, 7]),
            MetaValue::Map(inner),
        ]);

        let decoded = MetaValue::decode(&value.encode().unwrap()).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn test_meta_value_distinguishes_int_and_float() {
        let int = MetaValue::decode(&MetaValue::from(5).encode().unwrap()).unwrap();
        let float = MetaValue::decode(&MetaValue::from(5.0).encode().unwrap()).unwrap();
        assert_eq!(int.as_i64(), Some(5));
        assert_eq!(float.as_i64(), None);
    }

    #[test]
    fn test_meta_value_decode_garbage_fails() {
        assert!(MetaValue::decode(&[0xFF, 0xFF, 0xFF]).is_err());
    }

    #[test]
    fn test_state_vector_record_layout() {
        let record = StateVectorRecord { clock: 3, state_vector: vec![1, 2, 3] };
        let bytes = record.encode().unwrap();
        // varint clock, varint length, raw bytes
        assert_eq!(bytes, vec![3, 3, 1, 2, 3]);
        assert_eq!(StateVectorRecord::decode(&bytes).unwrap(), record);
    }
}
