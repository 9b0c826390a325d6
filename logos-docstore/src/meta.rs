//! Per-document metadata under `("v1", doc, "meta", key)`.

use std::collections::BTreeMap;

use crate::error::PersistenceError;
use crate::keys;
use crate::storage::{KvStore, RangeOptions};
use crate::value::MetaValue;

pub(crate) fn set_meta(
    store: &mut dyn KvStore,
    doc: &str,
    key: &str,
    value: &MetaValue,
) -> Result<(), PersistenceError> {
    store.put(&keys::meta_key(doc, key), &value.encode()?)?;
    Ok(())
}

pub(crate) fn get_meta(
    store: &dyn KvStore,
    doc: &str,
    key: &str,
) -> Result<Option<MetaValue>, PersistenceError> {
    match store.get(&keys::meta_key(doc, key))? {
        Some(raw) => Ok(Some(MetaValue::decode(&raw)?)),
        None => Ok(None),
    }
}

pub(crate) fn del_meta(store: &mut dyn KvStore, doc: &str, key: &str) -> Result<(), PersistenceError> {
    store.del(&keys::meta_key(doc, key))?;
    Ok(())
}

/// Every meta entry of `doc`, keyed by meta name.
pub(crate) fn get_metas(
    store: &dyn KvStore,
    doc: &str,
) -> Result<BTreeMap<String, MetaValue>, PersistenceError> {
    let (start, end) = keys::meta_range(doc);
    let mut metas = BTreeMap::new();
    for entry in store.scan(&RangeOptions::between(start, end))? {
        let name = keys::meta_name_from_key(&entry.key)?.ok_or_else(|| {
            PersistenceError::MalformedRecord {
                doc: doc.to_string(),
                reason: "meta key without name segment".into(),
            }
        })?;
        metas.insert(name, MetaValue::decode(&entry.value)?);
    }
    Ok(metas)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn test_set_get_del() {
        let mut store = MemoryStore::new();
        assert_eq!(get_meta(&store, "doc", "owner").unwrap(), None);

        set_meta(&mut store, "doc", "owner", &"alice".into()).unwrap();
        assert_eq!(get_meta(&store, "doc", "owner").unwrap(), Some(MetaValue::from("alice")));

        set_meta(&mut store, "doc", "owner", &"bob".into()).unwrap();
        assert_eq!(
            get_meta(&store, "doc", "owner").unwrap().and_then(|v| v.as_str().map(String::from)),
            Some("bob".to_string())
        );

        del_meta(&mut store, "doc", "owner").unwrap();
        assert_eq!(get_meta(&store, "doc", "owner").unwrap(), None);
        // deleting twice is fine
        del_meta(&mut store, "doc", "owner").unwrap();
    }

    #[test]
    fn test_get_metas_scoped_to_document() {
        let mut store = MemoryStore::new();
        set_meta(&mut store, "doc", "b", &MetaValue::Int(2)).unwrap();
        set_meta(&mut store, "doc", "a", &MetaValue::Bool(true)).unwrap();
        set_meta(&mut store, "doc2", "a", &MetaValue::Null).unwrap();
        store.put(&keys::update_key("doc", 0), b"update").unwrap();

        let metas = get_metas(&store, "doc").unwrap();
        assert_eq!(metas.len(), 2);
        assert_eq!(metas["a"], MetaValue::Bool(true));
        assert_eq!(metas["b"].as_i64(), Some(2));

        assert!(get_metas(&store, "empty").unwrap().is_empty());
    }
}
