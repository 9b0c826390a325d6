//! Cached state vectors.
//!
//! Each document has one StateVectorRecord under `("v1_sv", doc)`, tagged
//! with the update clock it reflects. A record whose clock is behind the
//! log is stale and gets recomputed by a flush.

use crate::compaction;
use crate::crdt::CrdtEngine;
use crate::error::PersistenceError;
use crate::keys;
use crate::storage::KvStore;
use crate::updates;
use crate::value::StateVectorRecord;

pub(crate) fn read_record(
    store: &dyn KvStore,
    doc: &str,
) -> Result<Option<StateVectorRecord>, PersistenceError> {
    match store.get(&keys::state_vector_key(doc))? {
        Some(raw) => Ok(Some(StateVectorRecord::decode(&raw)?)),
        None => Ok(None),
    }
}

pub(crate) fn write_record(
    store: &mut dyn KvStore,
    doc: &str,
    record: &StateVectorRecord,
) -> Result<(), PersistenceError> {
    store.put(&keys::state_vector_key(doc), &record.encode()?)?;
    Ok(())
}

/// State vector of `doc`, never staler than the newest stored update.
pub(crate) fn get_state_vector<C: CrdtEngine>(
    store: &mut dyn KvStore,
    engine: &C,
    doc: &str,
) -> Result<Vec<u8>, PersistenceError> {
    let cached = read_record(store, doc)?;
    let current = updates::current_clock(store, doc)?;

    match (cached, current) {
        (Some(record), Some(clock)) if record.clock == clock => Ok(record.state_vector),
        // no log left to recompute from
        (Some(record), None) => Ok(record.state_vector),
        (None, None) => Ok(engine.encode_state_vector(&engine.create())),
        (_, Some(_)) => {
            log::debug!("State vector of '{doc}' is stale, flushing");
            match compaction::flush_document(store, engine, doc)? {
                Some(flushed) => Ok(flushed.state_vector),
                None => Ok(engine.encode_state_vector(&engine.create())),
            }
        }
    }
}
