//! Per-document update log.
//!
//! Each stored update gets `clock = current + 1`, where `current` is found by
//! a reverse seek over the document's update range. Clocks only skip values
//! right after compaction, which replaces `[0, clock)` with one record.

use crate::crdt::CrdtEngine;
use crate::error::PersistenceError;
use crate::keys;
use crate::storage::{BatchOp, KvStore, RangeOptions};
use crate::value::StateVectorRecord;

/// Range query over one document's update log.
#[derive(Debug, Clone)]
pub struct UpdateQuery {
    /// First clock, inclusive
    pub from: u32,
    /// Last clock, exclusive (`None` = through `u32::MAX`)
    pub to: Option<u32>,
    pub limit: Option<usize>,
    pub reverse: bool,
    /// Return clocks
    pub keys: bool,
    /// Return payloads
    pub values: bool,
}

impl Default for UpdateQuery {
    fn default() -> Self {
        Self {
            from: 0,
            to: None,
            limit: None,
            reverse: false,
            keys: true,
            values: true,
        }
    }
}

impl UpdateQuery {
    pub fn clocks_only() -> Self {
        Self {
            values: false,
            ..Self::default()
        }
    }

    fn range_options(&self, doc: &str) -> RangeOptions {
        let (start, end) = keys::update_range(doc);
        let gte = if self.from == 0 { start } else { keys::update_key(doc, self.from) };
        let lt = match self.to {
            Some(to) => keys::update_key(doc, to),
            None => end,
        };
        RangeOptions {
            gte: Some(gte),
            lt: Some(lt),
            reverse: self.reverse,
            limit: self.limit,
            keys: self.keys,
            values: self.values,
            ..RangeOptions::default()
        }
    }
}

/// One update log record. Fields not requested by the query are `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateEntry {
    pub clock: Option<u32>,
    pub payload: Option<Vec<u8>>,
}

pub(crate) fn get_updates(
    store: &dyn KvStore,
    doc: &str,
    query: &UpdateQuery,
) -> Result<Vec<UpdateEntry>, PersistenceError> {
    let entries = store.scan(&query.range_options(doc))?;
    entries
        .into_iter()
        .map(|entry| {
            let clock = if query.keys {
                Some(clock_of(doc, &entry.key)?)
            } else {
                None
            };
            let payload = query.values.then_some(entry.value);
            Ok(UpdateEntry { clock, payload })
        })
        .collect()
}

/// All payloads of `doc` in clock order.
pub(crate) fn load_payloads(store: &dyn KvStore, doc: &str) -> Result<Vec<Vec<u8>>, PersistenceError> {
    let (start, end) = keys::update_range(doc);
    let entries = store.scan(&RangeOptions::between(start, end).values_only())?;
    Ok(entries.into_iter().map(|e| e.value).collect())
}

/// Highest stored clock of `doc`, `None` if it has no updates.
pub(crate) fn current_clock(store: &dyn KvStore, doc: &str) -> Result<Option<u32>, PersistenceError> {
    let (start, end) = keys::update_range(doc);
    let last = store.scan(&RangeOptions::between(start, end).reverse().limit(1).keys_only())?;
    match last.first() {
        Some(entry) => Ok(Some(clock_of(doc, &entry.key)?)),
        None => Ok(None),
    }
}

/// Append `payload` to the log of `doc` and return its clock.
///
/// The very first update of a document also records the state vector of a
/// document holding only that update, so the document is listed by the
/// directory before it is ever compacted.
pub(crate) fn store_update<C: CrdtEngine>(
    store: &mut dyn KvStore,
    engine: &C,
    doc: &str,
    payload: &[u8],
) -> Result<u32, PersistenceError> {
    let clock = match current_clock(store, doc)? {
        None => {
            let mut single = engine.create();
            engine.apply_update(&mut single, payload)?;
            let record = StateVectorRecord {
                clock: 0,
                state_vector: engine.encode_state_vector(&single),
            };
            store.batch(vec![
                BatchOp::Put {
                    key: keys::state_vector_key(doc),
                    value: record.encode()?,
                },
                BatchOp::Put {
                    key: keys::update_key(doc, 0),
                    value: payload.to_vec(),
                },
            ])?;
            log::debug!("First update stored for document '{doc}'");
            return Ok(0);
        }
        Some(u32::MAX) => return Err(PersistenceError::ClockOverflow(doc.to_string())),
        Some(current) => current + 1,
    };

    store.put(&keys::update_key(doc, clock), payload)?;
    Ok(clock)
}

fn clock_of(doc: &str, key: &[u8]) -> Result<u32, PersistenceError> {
    keys::clock_from_update_key(key)?.ok_or_else(|| PersistenceError::MalformedRecord {
        doc: doc.to_string(),
        reason: "update key without clock segment".into(),
    })
}
