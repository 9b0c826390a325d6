//! Update log compaction.
//!
//! A flush folds every update record of a document into one merged record:
//!
//! ```text
//! before:  [0] U0  [1] U1  ...  [n] Un
//! after:                              [n+1] merge(U0..Un)
//! ```
//!
//! The merged record is appended before the old range is deleted, so a
//! crash in between leaves a log that still materializes to the same
//! document (CRDT updates are idempotent).

use crate::crdt::CrdtEngine;
use crate::error::PersistenceError;
use crate::keys;
use crate::state_vector;
use crate::storage::KvStore;
use crate::updates;
use crate::value::StateVectorRecord;

/// Record count above which loading a document also compacts it.
pub const PREFERRED_TRIM_SIZE: usize = 500;

/// Full-state update plus state vector of a merged document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedState {
    pub update: Vec<u8>,
    pub state_vector: Vec<u8>,
}

/// Outcome of a flush.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlushResult {
    /// Clock of the merged record
    pub clock: u32,
    pub state_vector: Vec<u8>,
}

/// Merge `updates` in order into a fresh document.
pub fn merge_updates<C: CrdtEngine>(
    engine: &C,
    updates: &[Vec<u8>],
) -> Result<MergedState, PersistenceError> {
    let mut doc = engine.create();
    engine.apply_updates(&mut doc, updates)?;
    Ok(MergedState {
        update: engine.encode_state_as_update(&doc, None)?,
        state_vector: engine.encode_state_vector(&doc),
    })
}

/// Compact the whole update log of `doc`. `None` when it has no records.
pub(crate) fn flush_document<C: CrdtEngine>(
    store: &mut dyn KvStore,
    engine: &C,
    doc: &str,
) -> Result<Option<FlushResult>, PersistenceError> {
    let payloads = updates::load_payloads(store, doc)?;
    if payloads.is_empty() {
        return Ok(None);
    }
    let merged = merge_updates(engine, &payloads)?;
    let result = write_merged(store, engine, doc, merged)?;
    log::debug!(
        "Flushed {} update(s) of '{}' into clock {}",
        payloads.len(),
        doc,
        result.clock
    );
    Ok(Some(result))
}

/// Load `doc`, compacting it when its log exceeds `trim_threshold` records.
pub(crate) fn materialize<C: CrdtEngine>(
    store: &mut dyn KvStore,
    engine: &C,
    doc: &str,
    trim_threshold: usize,
) -> Result<C::Doc, PersistenceError> {
    let payloads = updates::load_payloads(store, doc)?;
    let mut ydoc = engine.create();
    engine.apply_updates(&mut ydoc, &payloads)?;

    if payloads.len() > trim_threshold {
        let merged = MergedState {
            update: engine.encode_state_as_update(&ydoc, None)?,
            state_vector: engine.encode_state_vector(&ydoc),
        };
        let result = write_merged(store, engine, doc, merged)?;
        log::debug!(
            "Trimmed {} update(s) of '{}' on load into clock {} (threshold {})",
            payloads.len(),
            doc,
            result.clock,
            trim_threshold
        );
    }
    Ok(ydoc)
}

fn write_merged<C: CrdtEngine>(
    store: &mut dyn KvStore,
    engine: &C,
    doc: &str,
    merged: MergedState,
) -> Result<FlushResult, PersistenceError> {
    let clock = updates::store_update(store, engine, doc, &merged.update)?;
    let record = StateVectorRecord {
        clock,
        state_vector: merged.state_vector,
    };
    state_vector::write_record(store, doc, &record)?;

    if clock > 0 {
        let (start, _) = keys::update_range(doc);
        let end = keys::update_key(doc, clock);
        if let Err(e) = store.clear_range(&start, &end) {
            log::warn!("Failed to drop compacted updates of '{doc}' below clock {clock}: {e}");
        }
    }

    Ok(FlushResult {
        clock,
        state_vector: record.state_vector,
    })
}
