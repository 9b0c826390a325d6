//! Document directory.
//!
//! A document exists while it has a state vector record, so the `v1_sv`
//! namespace doubles as the list of documents.

use crate::error::PersistenceError;
use crate::keys::{self, NS_DOCUMENTS, NS_STATE_VECTORS};
use crate::storage::{KvStore, RangeOptions};
use crate::value::StateVectorRecord;

/// Last known state vector of one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocStateVector {
    pub name: String,
    pub state_vector: Vec<u8>,
    /// Update clock the state vector reflects
    pub clock: u32,
}

pub(crate) fn get_all_doc_names(store: &dyn KvStore) -> Result<Vec<String>, PersistenceError> {
    let (start, end) = keys::namespace_range(NS_STATE_VECTORS);
    let mut names = Vec::new();
    for entry in store.scan(&RangeOptions::between(start, end).keys_only())? {
        if let Some(name) = keys::doc_name_from_state_vector_key(&entry.key)? {
            names.push(name);
        }
    }
    Ok(names)
}

pub(crate) fn get_all_doc_state_vectors(
    store: &dyn KvStore,
) -> Result<Vec<DocStateVector>, PersistenceError> {
    let (start, end) = keys::namespace_range(NS_STATE_VECTORS);
    let mut docs = Vec::new();
    for entry in store.scan(&RangeOptions::between(start, end))? {
        let Some(name) = keys::doc_name_from_state_vector_key(&entry.key)? else {
            continue;
        };
        let record = StateVectorRecord::decode(&entry.value)?;
        docs.push(DocStateVector {
            name,
            state_vector: record.state_vector,
            clock: record.clock,
        });
    }
    Ok(docs)
}

/// Remove every record of `doc`: updates, metas and the state vector.
pub(crate) fn clear_document(store: &mut dyn KvStore, doc: &str) -> Result<(), PersistenceError> {
    let (start, end) = keys::update_range(doc);
    store.clear_range(&start, &end)?;
    let (start, end) = keys::meta_range(doc);
    store.clear_range(&start, &end)?;
    store.del(&keys::state_vector_key(doc))?;
    log::debug!("Cleared document '{doc}'");
    Ok(())
}

/// Remove every document.
pub(crate) fn clear_all(store: &mut dyn KvStore) -> Result<(), PersistenceError> {
    for namespace in [NS_DOCUMENTS, NS_STATE_VECTORS] {
        let (start, end) = keys::namespace_range(namespace);
        store.clear_range(&start, &end)?;
    }
    Ok(())
}
