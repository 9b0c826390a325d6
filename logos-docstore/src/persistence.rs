//! Public persistence handle.
//!
//! Every operation is submitted to one [`TransactionQueue`] whose worker owns
//! the backing store and CRDT engine. Operations run in call order, one at a
//! time; each returns a [`Pending`] future with its result.
//!
//! ```text
//! Persistence::store_update ──┐
//! Persistence::get_ydoc ──────┼──► TransactionQueue ──► Worker { store, engine }
//! Persistence::set_meta ──────┘                           │
//!                                                         ├── updates / compaction
//!                                                         ├── state_vector / meta
//!                                                         └── directory
//! ```

use std::collections::BTreeMap;

use crate::compaction::{self, FlushResult, PREFERRED_TRIM_SIZE};
use crate::crdt::{CrdtEngine, YrsEngine};
use crate::directory::{self, DocStateVector};
use crate::error::PersistenceError;
use crate::meta;
use crate::queue::{Pending, QueueStats, TransactionQueue};
use crate::state_vector;
use crate::storage::{KvStore, MemoryStore, RocksStore, StoreConfig};
use crate::updates::{self, UpdateEntry, UpdateQuery};
use crate::value::MetaValue;

/// Persistence layer configuration.
#[derive(Debug, Clone)]
pub struct PersistenceConfig {
    /// Loading a document with more update records than this compacts it
    /// (default: 500)
    pub trim_threshold: usize,
    /// Name of the worker thread (default: "docstore-worker")
    pub worker_name: String,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            trim_threshold: PREFERRED_TRIM_SIZE,
            worker_name: "docstore-worker".to_string(),
        }
    }
}

/// State owned by the queue worker.
struct Worker<C: CrdtEngine> {
    /// `None` after `destroy`
    store: Option<Box<dyn KvStore>>,
    engine: C,
    config: PersistenceConfig,
}

impl<C: CrdtEngine> Worker<C> {
    fn parts(&mut self) -> Result<(&mut dyn KvStore, &C), PersistenceError> {
        let store: &mut dyn KvStore = self.store.as_deref_mut().ok_or(PersistenceError::Closed)?;
        Ok((store, &self.engine))
    }
}

/// Durable document store: an append-only update log per document, with
/// compaction, cached state vectors and metadata.
///
/// Dropping the handle blocks until the worker has drained its queue and
/// released the store. Inside an async task, await [`destroy`](Self::destroy)
/// first so the drop only joins an idle worker, or drop the handle through
/// `tokio::task::spawn_blocking`.
pub struct Persistence<C: CrdtEngine = YrsEngine> {
    queue: TransactionQueue<Worker<C>>,
}

impl Persistence<YrsEngine> {
    /// Open (or create) a RocksDB-backed store for Yrs documents.
    pub fn open(config: StoreConfig) -> Result<Self, PersistenceError> {
        let path = config.path.display().to_string();
        let store = RocksStore::open(config)?;
        let persistence = Self::with_store(store, YrsEngine, PersistenceConfig::default())?;
        log::info!("Persistence opened at {path}");
        Ok(persistence)
    }

    /// Non-durable store for Yrs documents.
    pub fn in_memory() -> Result<Self, PersistenceError> {
        Self::with_store(MemoryStore::new(), YrsEngine, PersistenceConfig::default())
    }
}

impl<C: CrdtEngine> Persistence<C> {
    /// Run on any backing store and CRDT engine.
    pub fn with_store(
        store: impl KvStore + 'static,
        engine: C,
        config: PersistenceConfig,
    ) -> Result<Self, PersistenceError> {
        let name = config.worker_name.clone();
        let worker = Worker {
            store: Some(Box::new(store)),
            engine,
            config,
        };
        let queue = TransactionQueue::spawn(&name, worker)?;
        Ok(Self { queue })
    }

    /// Materialize `doc` from its update log. Compacts the log when it has
    /// more records than the configured trim threshold.
    pub fn get_ydoc(&self, doc: &str) -> Pending<C::Doc> {
        let doc = doc.to_string();
        self.queue.submit("get_ydoc", move |w: &mut Worker<C>| {
            let threshold = w.config.trim_threshold;
            let (store, engine) = w.parts()?;
            compaction::materialize(store, engine, &doc, threshold)
        })
    }

    /// Append an update to `doc` and return its clock.
    pub fn store_update(&self, doc: &str, update: Vec<u8>) -> Pending<u32> {
        let doc = doc.to_string();
        self.queue.submit("store_update", move |w: &mut Worker<C>| {
            let (store, engine) = w.parts()?;
            updates::store_update(store, engine, &doc, &update)
        })
    }

    /// State vector reflecting every update stored so far.
    pub fn get_state_vector(&self, doc: &str) -> Pending<Vec<u8>> {
        let doc = doc.to_string();
        self.queue.submit("get_state_vector", move |w: &mut Worker<C>| {
            let (store, engine) = w.parts()?;
            state_vector::get_state_vector(store, engine, &doc)
        })
    }

    /// Update containing what a peer at `remote_state_vector` is missing.
    pub fn get_diff(&self, doc: &str, remote_state_vector: Vec<u8>) -> Pending<Vec<u8>> {
        let doc = doc.to_string();
        self.queue.submit("get_diff", move |w: &mut Worker<C>| {
            let threshold = w.config.trim_threshold;
            let (store, engine) = w.parts()?;
            let ydoc = compaction::materialize(store, engine, &doc, threshold)?;
            Ok(engine.encode_state_as_update(&ydoc, Some(&remote_state_vector))?)
        })
    }

    /// Merge the whole update log of `doc` into one record.
    pub fn flush_document(&self, doc: &str) -> Pending<Option<FlushResult>> {
        let doc = doc.to_string();
        self.queue.submit("flush_document", move |w: &mut Worker<C>| {
            let (store, engine) = w.parts()?;
            compaction::flush_document(store, engine, &doc)
        })
    }

    /// Delete every update, meta entry and the state vector of `doc`.
    pub fn clear_document(&self, doc: &str) -> Pending<()> {
        let doc = doc.to_string();
        self.queue.submit("clear_document", move |w: &mut Worker<C>| {
            let (store, _) = w.parts()?;
            directory::clear_document(store, &doc)
        })
    }

    pub fn set_meta(&self, doc: &str, key: &str, value: impl Into<MetaValue>) -> Pending<()> {
        let (doc, key, value) = (doc.to_string(), key.to_string(), value.into());
        self.queue.submit("set_meta", move |w: &mut Worker<C>| {
            let (store, _) = w.parts()?;
            meta::set_meta(store, &doc, &key, &value)
        })
    }

    pub fn get_meta(&self, doc: &str, key: &str) -> Pending<Option<MetaValue>> {
        let (doc, key) = (doc.to_string(), key.to_string());
        self.queue.submit("get_meta", move |w: &mut Worker<C>| {
            let (store, _) = w.parts()?;
            meta::get_meta(store, &doc, &key)
        })
    }

    pub fn del_meta(&self, doc: &str, key: &str) -> Pending<()> {
        let (doc, key) = (doc.to_string(), key.to_string());
        self.queue.submit("del_meta", move |w: &mut Worker<C>| {
            let (store, _) = w.parts()?;
            meta::del_meta(store, &doc, &key)
        })
    }

    pub fn get_metas(&self, doc: &str) -> Pending<BTreeMap<String, MetaValue>> {
        let doc = doc.to_string();
        self.queue.submit("get_metas", move |w: &mut Worker<C>| {
            let (store, _) = w.parts()?;
            meta::get_metas(store, &doc)
        })
    }

    /// Names of every document with at least one stored update.
    pub fn get_all_doc_names(&self) -> Pending<Vec<String>> {
        self.queue.submit("get_all_doc_names", |w: &mut Worker<C>| {
            let (store, _) = w.parts()?;
            directory::get_all_doc_names(store)
        })
    }

    /// Cached state vector of every document. Entries may lag behind the
    /// update log; use [`get_state_vector`](Self::get_state_vector) for a
    /// fresh one.
    pub fn get_all_doc_state_vectors(&self) -> Pending<Vec<DocStateVector>> {
        self.queue.submit("get_all_doc_state_vectors", |w: &mut Worker<C>| {
            let (store, _) = w.parts()?;
            directory::get_all_doc_state_vectors(store)
        })
    }

    /// Delete every document.
    pub fn clear_all(&self) -> Pending<()> {
        self.queue.submit("clear_all", |w: &mut Worker<C>| {
            let (store, _) = w.parts()?;
            directory::clear_all(store)?;
            log::info!("Cleared all documents");
            Ok(())
        })
    }

    /// Close the backing store once every earlier operation finished.
    /// Operations submitted afterwards fail with [`PersistenceError::Closed`].
    pub fn destroy(&self) -> Pending<()> {
        self.queue.submit("destroy", |w: &mut Worker<C>| {
            if let Some(mut store) = w.store.take() {
                store.close()?;
                log::info!("Persistence destroyed");
            }
            Ok(())
        })
    }

    /// Highest update clock of `doc`, `None` if it has no updates.
    pub fn current_clock(&self, doc: &str) -> Pending<Option<u32>> {
        let doc = doc.to_string();
        self.queue.submit("current_clock", move |w: &mut Worker<C>| {
            let (store, _) = w.parts()?;
            updates::current_clock(store, &doc)
        })
    }

    /// Raw update records of `doc`.
    pub fn get_updates(&self, doc: &str, query: UpdateQuery) -> Pending<Vec<UpdateEntry>> {
        let doc = doc.to_string();
        self.queue.submit("get_updates", move |w: &mut Worker<C>| {
            let (store, _) = w.parts()?;
            updates::get_updates(store, &doc, &query)
        })
    }

    pub fn queue_stats(&self) -> &QueueStats {
        self.queue.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crdt::testing::OpListEngine;

    fn op_list(config: PersistenceConfig) -> Persistence<OpListEngine> {
        Persistence::with_store(MemoryStore::new(), OpListEngine, config).unwrap()
    }

    #[tokio::test]
    async fn test_store_and_load() {
        let p = op_list(PersistenceConfig::default());
        let first = p.store_update("doc", OpListEngine::update(&[b"a"]));
        let second = p.store_update("doc", OpListEngine::update(&[b"b"]));
        let doc = p.get_ydoc("doc");

        assert_eq!(first.await.unwrap(), 0);
        assert_eq!(second.await.unwrap(), 1);
        assert_eq!(doc.await.unwrap(), vec![b"a".to_vec(), b"b".to_vec()]);
        assert_eq!(p.current_clock("doc").await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn test_trim_threshold_is_configurable() {
        let p = op_list(PersistenceConfig {
            trim_threshold: 3,
            ..PersistenceConfig::default()
        });
        for i in 0..4u8 {
            p.store_update("doc", OpListEngine::update(&[&[i]])).await.unwrap();
        }
        assert_eq!(p.get_ydoc("doc").await.unwrap().len(), 4);

        let records = p.get_updates("doc", UpdateQuery::clocks_only()).await.unwrap();
        assert_eq!(records, vec![UpdateEntry { clock: Some(4), payload: None }]);
    }

    #[tokio::test]
    async fn test_diff_against_remote_state() {
        let p = op_list(PersistenceConfig::default());
        p.store_update("doc", OpListEngine::update(&[b"a", b"b"])).await.unwrap();
        let remote = p.get_state_vector("doc").await.unwrap();
        p.store_update("doc", OpListEngine::update(&[b"c"])).await.unwrap();

        let diff = p.get_diff("doc", remote).await.unwrap();
        assert_eq!(OpListEngine::entries(&diff), vec![b"c".to_vec()]);
    }

    #[tokio::test]
    async fn test_failed_operation_reports_error_and_queue_continues() {
        let p = op_list(PersistenceConfig::default());
        let bad = p.store_update("doc", vec![0xFF, 0xFF]);
        let good = p.store_update("doc", OpListEngine::update(&[b"ok"]));

        assert!(matches!(bad.await, Err(PersistenceError::Crdt(_))));
        assert_eq!(good.await.unwrap(), 0);
        assert_eq!(p.queue_stats().failed(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_drop_inside_runtime_after_destroy() {
        let p = op_list(PersistenceConfig::default());
        p.store_update("doc", OpListEngine::update(&[b"a"])).await.unwrap();
        p.destroy().await.unwrap();
        assert_eq!(p.queue_stats().completed(), 2);
        // worker is idle, so the join in drop returns at once
        drop(p);

        let busy = op_list(PersistenceConfig::default());
        for i in 0..50u8 {
            drop(busy.store_update("doc", OpListEngine::update(&[&[i]])));
        }
        tokio::task::spawn_blocking(move || drop(busy)).await.unwrap();
    }

    #[tokio::test]
    async fn test_destroy_closes_store() {
        let p = op_list(PersistenceConfig::default());
        let write = p.store_update("doc", OpListEngine::update(&[b"a"]));
        let destroyed = p.destroy();
        let late = p.get_all_doc_names();

        assert_eq!(write.await.unwrap(), 0);
        destroyed.await.unwrap();
        assert!(matches!(late.await, Err(PersistenceError::Closed)));
        // destroying twice is harmless
        p.destroy().await.unwrap();
    }
}
