//! Ordered key-value backends.
//!
//! Architecture:
//! ```text
//! ┌─────────────┐   get/put/del/batch/scan   ┌──────────────┐
//! │ Persistence │ ─────────────────────────► │ dyn KvStore  │
//! │ (worker)    │                            ├──────────────┤
//! └─────────────┘                            │ RocksStore   │  on disk
//!                                            │ MemoryStore  │  BTreeMap
//!                                            └──────────────┘
//! ```
//!
//! Keys and values are opaque bytes. Ordering is plain lexicographic byte
//! order, which [`crate::keys`] relies on.

pub mod memory;
pub mod rocks;

pub use memory::MemoryStore;
pub use rocks::{RocksStore, StoreConfig};

use crate::error::StoreError;

/// A single write inside a [`KvStore::batch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    Put { key: Vec<u8>, value: Vec<u8> },
    Del { key: Vec<u8> },
}

/// A scanned key/value pair. Fields not requested through
/// [`RangeOptions::keys`] / [`RangeOptions::values`] are left empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

/// Range scan options, modeled on LevelDB read streams.
#[derive(Debug, Clone)]
pub struct RangeOptions {
    pub gte: Option<Vec<u8>>,
    pub gt: Option<Vec<u8>>,
    pub lte: Option<Vec<u8>>,
    pub lt: Option<Vec<u8>>,
    pub reverse: bool,
    pub limit: Option<usize>,
    pub keys: bool,
    pub values: bool,
}

impl Default for RangeOptions {
    fn default() -> Self {
        Self {
            gte: None,
            gt: None,
            lte: None,
            lt: None,
            reverse: false,
            limit: None,
            keys: true,
            values: true,
        }
    }
}

impl RangeOptions {
    /// `[gte, lt)`
    pub fn between(gte: Vec<u8>, lt: Vec<u8>) -> Self {
        Self {
            gte: Some(gte),
            lt: Some(lt),
            ..Self::default()
        }
    }

    /// `[gte, lte]`
    pub fn inclusive(gte: Vec<u8>, lte: Vec<u8>) -> Self {
        Self {
            gte: Some(gte),
            lte: Some(lte),
            ..Self::default()
        }
    }

    pub fn reverse(mut self) -> Self {
        self.reverse = true;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn keys_only(mut self) -> Self {
        self.keys = true;
        self.values = false;
        self
    }

    pub fn values_only(mut self) -> Self {
        self.keys = false;
        self.values = true;
        self
    }

    /// Whether `key` is at or above the lower bound.
    pub fn above_lower(&self, key: &[u8]) -> bool {
        if let Some(gt) = &self.gt {
            if key <= gt.as_slice() {
                return false;
            }
        }
        if let Some(gte) = &self.gte {
            if key < gte.as_slice() {
                return false;
            }
        }
        true
    }

    /// Whether `key` is at or below the upper bound.
    pub fn below_upper(&self, key: &[u8]) -> bool {
        if let Some(lt) = &self.lt {
            if key >= lt.as_slice() {
                return false;
            }
        }
        if let Some(lte) = &self.lte {
            if key > lte.as_slice() {
                return false;
            }
        }
        true
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        self.above_lower(key) && self.below_upper(key)
    }

    /// Tightest lower bound key, ignoring whether it is inclusive.
    pub(crate) fn lower_key(&self) -> Option<&[u8]> {
        match (&self.gt, &self.gte) {
            (Some(gt), Some(gte)) => Some(gt.as_slice().max(gte.as_slice())),
            (Some(k), None) | (None, Some(k)) => Some(k.as_slice()),
            (None, None) => None,
        }
    }

    /// Tightest upper bound key, ignoring whether it is inclusive.
    pub(crate) fn upper_key(&self) -> Option<&[u8]> {
        match (&self.lt, &self.lte) {
            (Some(lt), Some(lte)) => Some(lt.as_slice().min(lte.as_slice())),
            (Some(k), None) | (None, Some(k)) => Some(k.as_slice()),
            (None, None) => None,
        }
    }

    pub(crate) fn project(&self, key: &[u8], value: &[u8]) -> Entry {
        Entry {
            key: if self.keys { key.to_vec() } else { Vec::new() },
            value: if self.values { value.to_vec() } else { Vec::new() },
        }
    }
}

/// Ordered key-value store used by the persistence layer.
///
/// Implementations are owned by a single worker thread, so they only need
/// to be `Send`.
pub trait KvStore: Send {
    /// `Ok(None)` when the key does not exist.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;

    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), StoreError>;

    fn del(&mut self, key: &[u8]) -> Result<(), StoreError>;

    /// Apply all operations atomically.
    fn batch(&mut self, ops: Vec<BatchOp>) -> Result<(), StoreError>;

    fn scan(&self, opts: &RangeOptions) -> Result<Vec<Entry>, StoreError>;

    /// Delete every key in `[gte, lt)`.
    ///
    /// The fallback scans the keys and deletes them in one batch.
    fn clear_range(&mut self, gte: &[u8], lt: &[u8]) -> Result<(), StoreError> {
        let keys = self.scan(&RangeOptions::between(gte.to_vec(), lt.to_vec()).keys_only())?;
        if keys.is_empty() {
            return Ok(());
        }
        let ops = keys.into_iter().map(|e| BatchOp::Del { key: e.key }).collect();
        self.batch(ops)
    }

    /// Release backend resources. Called once by `destroy`.
    fn close(&mut self) -> Result<(), StoreError> {
        Ok(())
    }
}
