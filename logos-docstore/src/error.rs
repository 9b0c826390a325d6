//! Error types shared across the persistence layer.

use thiserror::Error;

/// Errors raised by a [`KvStore`](crate::storage::KvStore) backend.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Backend internal error (RocksDB or otherwise)
    #[error("Database error: {0}")]
    Database(String),
    /// The backend was closed by `destroy`
    #[error("Store is closed")]
    Closed,
}

impl From<rocksdb::Error> for StoreError {
    fn from(e: rocksdb::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

/// Key encoding/decoding errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("Unknown key segment tag {tag:#04x} at offset {offset}")]
    UnknownTag { tag: u8, offset: usize },
    #[error("Key truncated at offset {0}")]
    Truncated(usize),
    #[error("Key string segment is not valid UTF-8")]
    InvalidUtf8,
    /// Integer segment does not fit the fixed 32-bit clock encoding
    #[error("Key integer segment {0} does not fit in u32")]
    OutOfRange(i128),
}

/// Errors reported by a [`CrdtEngine`](crate::crdt::CrdtEngine).
#[derive(Debug, Clone, Error)]
pub enum CrdtError {
    #[error("Failed to decode CRDT payload: {0}")]
    Decode(String),
    #[error("Failed to apply CRDT update: {0}")]
    Apply(String),
}

/// Errors returned by [`Persistence`](crate::Persistence) operations.
#[derive(Debug, Clone, Error)]
pub enum PersistenceError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Key(#[from] KeyError),
    #[error(transparent)]
    Crdt(#[from] CrdtError),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Deserialization error: {0}")]
    Deserialization(String),
    /// A stored key or value does not have the expected layout
    #[error("Malformed record for document '{doc}': {reason}")]
    MalformedRecord { doc: String, reason: String },
    /// The update clock of a document reached `u32::MAX`
    #[error("Update clock exhausted for document '{0}'")]
    ClockOverflow(String),
    /// The persistence instance was destroyed or dropped
    #[error("Persistence instance is closed")]
    Closed,
    /// The operation panicked on the worker thread
    #[error("Operation '{0}' aborted")]
    Aborted(&'static str),
    #[error("Failed to spawn persistence worker: {0}")]
    WorkerSpawn(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PersistenceError::ClockOverflow("notes".into());
        assert!(err.to_string().contains("notes"));

        let err: PersistenceError = StoreError::Database("disk full".into()).into();
        assert!(err.to_string().contains("Database error: disk full"));

        let err = KeyError::UnknownTag { tag: 7, offset: 3 };
        assert!(err.to_string().contains("0x07"));
    }
}
