//! In-memory [`KvStore`] over a `BTreeMap`.
//!
//! Nothing is persisted. Used for tests and ephemeral documents.

use std::collections::BTreeMap;
use std::ops::Bound;

use super::{BatchOp, Entry, KvStore, RangeOptions};
use crate::error::StoreError;

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: BTreeMap<Vec<u8>, Vec<u8>>,
    closed: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn check_open(&self) -> Result<(), StoreError> {
        if self.closed {
            Err(StoreError::Closed)
        } else {
            Ok(())
        }
    }

    fn bounds(opts: &RangeOptions) -> Option<(Bound<&[u8]>, Bound<&[u8]>)> {
        let lower = match (opts.lower_key(), &opts.gt) {
            (None, _) => Bound::Unbounded,
            (Some(k), Some(gt)) if k == gt.as_slice() => Bound::Excluded(k),
            (Some(k), _) => Bound::Included(k),
        };
        let upper = match (opts.upper_key(), &opts.lt) {
            (None, _) => Bound::Unbounded,
            (Some(k), Some(lt)) if k == lt.as_slice() => Bound::Excluded(k),
            (Some(k), _) => Bound::Included(k),
        };

        // BTreeMap::range panics on inverted or empty-excluded ranges
        let (lo, hi) = match (lower, upper) {
            (Bound::Included(lo) | Bound::Excluded(lo), Bound::Included(hi) | Bound::Excluded(hi)) => (lo, hi),
            _ => return Some((lower, upper)),
        };
        if lo > hi {
            return None;
        }
        if lo == hi && !matches!((lower, upper), (Bound::Included(_), Bound::Included(_))) {
            return None;
        }
        Some((lower, upper))
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        self.check_open()?;
        Ok(self.entries.get(key).cloned())
    }

    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.check_open()?;
        self.entries.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn del(&mut self, key: &[u8]) -> Result<(), StoreError> {
        self.check_open()?;
        self.entries.remove(key);
        Ok(())
    }

    fn batch(&mut self, ops: Vec<BatchOp>) -> Result<(), StoreError> {
        self.check_open()?;
        for op in ops {
            match op {
                BatchOp::Put { key, value } => {
                    self.entries.insert(key, value);
                }
                BatchOp::Del { key } => {
                    self.entries.remove(&key);
                }
            }
        }
        Ok(())
    }

    fn scan(&self, opts: &RangeOptions) -> Result<Vec<Entry>, StoreError> {
        self.check_open()?;
        let Some(bounds) = Self::bounds(opts) else {
            return Ok(Vec::new());
        };
        let limit = opts.limit.unwrap_or(usize::MAX);
        let range = self.entries.range::<[u8], _>(bounds);
        let entries = if opts.reverse {
            range.rev().take(limit).map(|(k, v)| opts.project(k, v)).collect()
        } else {
            range.take(limit).map(|(k, v)| opts.project(k, v)).collect()
        };
        Ok(entries)
    }

    fn clear_range(&mut self, gte: &[u8], lt: &[u8]) -> Result<(), StoreError> {
        self.check_open()?;
        if gte >= lt {
            return Ok(());
        }
        let doomed: Vec<Vec<u8>> = self
            .entries
            .range::<[u8], _>((Bound::Included(gte), Bound::Excluded(lt)))
            .map(|(k, _)| k.clone())
            .collect();
        for key in doomed {
            self.entries.remove(&key);
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), StoreError> {
        self.closed = true;
        self.entries.clear();
        Ok(())
    }
}
