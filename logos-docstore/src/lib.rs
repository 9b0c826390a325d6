//! # logos-docstore — Durable CRDT document store for Logos
//!
//! Persists collaborative documents as an append-only log of CRDT updates
//! in an ordered key-value store, compacts the log on demand and caches
//! per-document state vectors for cheap sync handshakes.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   Pending<T>    ┌──────────────────┐
//! │ Persistence │ ◄─────────────► │ TransactionQueue │
//! │ (handle)    │   FIFO jobs     │ (worker thread)  │
//! └─────────────┘                 └────────┬─────────┘
//!                                          │
//!                      ┌───────────────────┼───────────────────┐
//!                      ▼                   ▼                   ▼
//!               ┌─────────────┐    ┌──────────────┐    ┌─────────────┐
//!               │ CrdtEngine  │    │ key codec    │    │ dyn KvStore │
//!               │ (Yrs)       │    │ ("v1", doc…) │    │ RocksDB/mem │
//!               └─────────────┘    └──────────────┘    └─────────────┘
//! ```
//!
//! ## Key Layout
//!
//! | Record | Key | Value |
//! |--------|-----|-------|
//! | Update | `("v1", doc, "update", clock)` | raw CRDT update |
//! | Meta | `("v1", doc, "meta", name)` | bincode [`MetaValue`] |
//! | State vector | `("v1_sv", doc)` | bincode [`StateVectorRecord`] |
//!
//! ## Modules
//!
//! - [`keys`] — Order-preserving tuple key codec
//! - [`storage`] — `KvStore` backends (RocksDB, in-memory)
//! - [`queue`] — Single-worker transaction queue
//! - [`crdt`] — CRDT engine seam and the Yrs implementation
//! - [`persistence`] — Public API

pub mod compaction;
pub mod crdt;
pub mod directory;
pub mod error;
pub mod keys;
mod meta;
pub mod persistence;
pub mod queue;
mod state_vector;
pub mod storage;
pub mod updates;
pub mod value;

// Re-exports for convenience
pub use compaction::{FlushResult, MergedState, PREFERRED_TRIM_SIZE, merge_updates};
pub use crdt::{CrdtEngine, YrsEngine};
pub use directory::DocStateVector;
pub use error::{CrdtError, KeyError, PersistenceError, StoreError};
pub use keys::KeySegment;
pub use persistence::{Persistence, PersistenceConfig};
pub use queue::{Pending, QueueStats, TransactionQueue};
pub use storage::{BatchOp, Entry, KvStore, MemoryStore, RangeOptions, RocksStore, StoreConfig};
pub use updates::{UpdateEntry, UpdateQuery};
pub use value::{MetaValue, StateVectorRecord};
