//! RocksDB-backed [`KvStore`].
//!
//! All records share the default column family: the key codec already
//! separates the `v1` (update log + meta) and `v1_sv` (state vectors)
//! namespaces, and a single ordered keyspace keeps range scans and range
//! deletes one iterator/one batch each.
//!
//! Performance targets:
//! - Update append (1KB): <50μs
//! - Reverse seek for the current clock: one iterator step
//! - Directory scan: proportional to document count, never to log size
//!
//! Reference: Kleppmann — DDIA, Chapter 3 (LSM Trees, SSTables)

use rocksdb::{
    BlockBasedOptions, Cache, DBCompressionType, DBWithThreadMode, Direction, IteratorMode,
    Options, SingleThreaded, WriteBatch, WriteOptions,
};
use std::path::{Path, PathBuf};

use super::{BatchOp, Entry, KvStore, RangeOptions};
use crate::error::StoreError;

/// Store configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Database directory path
    pub path: PathBuf,
    /// Block cache size in bytes (default: 256MB)
    pub block_cache_size: usize,
    /// Bloom filter bits per key (default: 10)
    pub bloom_filter_bits: i32,
    /// Enable fsync on every write (default: false)
    pub sync_writes: bool,
    /// Max open files for RocksDB (default: 512)
    pub max_open_files: i32,
    /// Write buffer size (default: 64MB)
    pub write_buffer_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("logos_docstore"),
            block_cache_size: 256 * 1024 * 1024, // 256MB
            bloom_filter_bits: 10,
            sync_writes: false,
            max_open_files: 512,
            write_buffer_size: 64 * 1024 * 1024, // 64MB
        }
    }
}

impl StoreConfig {
    /// Config at `path` with default tuning.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Create config for testing (small caches).
    pub fn for_testing(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            block_cache_size: 8 * 1024 * 1024, // 8MB
            bloom_filter_bits: 10,
            sync_writes: false,
            max_open_files: 64,
            write_buffer_size: 4 * 1024 * 1024, // 4MB
        }
    }
}

/// RocksDB store. Exclusive-open: a second process opening the same path
/// fails on the RocksDB lock file.
pub struct RocksStore {
    /// `None` once closed
    db: Option<DBWithThreadMode<SingleThreaded>>,
    config: StoreConfig,
}

impl RocksStore {
    /// Open (or create) the database at the configured path.
    pub fn open(config: StoreConfig) -> Result<Self, StoreError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_max_open_files(config.max_open_files);
        opts.set_keep_log_file_num(5);
        opts.set_max_total_wal_size(128 * 1024 * 1024); // 128MB WAL limit
        opts.increase_parallelism(num_cpus());

        let mut block_opts = BlockBasedOptions::default();
        let cache = Cache::new_lru_cache(config.block_cache_size);
        block_opts.set_block_cache(&cache);
        block_opts.set_bloom_filter(config.bloom_filter_bits as f64, false);
        block_opts.set_block_size(16 * 1024); // 16KB blocks
        opts.set_block_based_table_factory(&block_opts);

        // Update payloads are small and numerous; LZ4 keeps decode cheap
        opts.set_compression_type(DBCompressionType::Lz4);
        opts.set_write_buffer_size(config.write_buffer_size);
        opts.set_max_write_buffer_number(4);

        let db = DBWithThreadMode::<SingleThreaded>::open(&opts, &config.path)?;
        log::info!("Opened RocksDB store at {}", config.path.display());

        Ok(Self { db: Some(db), config })
    }

    /// Get the database path.
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    /// Force memtable flush to disk.
    pub fn sync(&self) -> Result<(), StoreError> {
        self.db()?.flush()?;
        Ok(())
    }

    fn db(&self) -> Result<&DBWithThreadMode<SingleThreaded>, StoreError> {
        self.db.as_ref().ok_or(StoreError::Closed)
    }

    fn write_options(&self) -> WriteOptions {
        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(self.config.sync_writes);
        write_opts
    }
}

impl KvStore for RocksStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.db()?.get(key)?)
    }

    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        let write_opts = self.write_options();
        self.db()?.put_opt(key, value, &write_opts)?;
        Ok(())
    }

    fn del(&mut self, key: &[u8]) -> Result<(), StoreError> {
        let write_opts = self.write_options();
        self.db()?.delete_opt(key, &write_opts)?;
        Ok(())
    }

    fn batch(&mut self, ops: Vec<BatchOp>) -> Result<(), StoreError> {
        let mut batch = WriteBatch::default();
        for op in ops {
            match op {
                BatchOp::Put { key, value } => batch.put(key, value),
                BatchOp::Del { key } => batch.delete(key),
            }
        }
        let write_opts = self.write_options();
        self.db()?.write_opt(batch, &write_opts)?;
        Ok(())
    }

    fn scan(&self, opts: &RangeOptions) -> Result<Vec<Entry>, StoreError> {
        let db = self.db()?;
        let limit = opts.limit.unwrap_or(usize::MAX);
        let mut entries = Vec::new();
        if limit == 0 {
            return Ok(entries);
        }

        let mode = match (opts.reverse, opts.lower_key(), opts.upper_key()) {
            (false, Some(lower), _) => IteratorMode::From(lower, Direction::Forward),
            (false, None, _) => IteratorMode::Start,
            // Reverse seek lands on the last key <= upper
            (true, _, Some(upper)) => IteratorMode::From(upper, Direction::Reverse),
            (true, _, None) => IteratorMode::End,
        };

        for item in db.iterator(mode) {
            let (key, value) = item?;
            if opts.reverse {
                if !opts.below_upper(&key) {
                    continue;
                }
                if !opts.above_lower(&key) {
                    break;
                }
            } else {
                if !opts.above_lower(&key) {
                    continue;
                }
                if !opts.below_upper(&key) {
                    break;
                }
            }
            entries.push(opts.project(&key, &value));
            if entries.len() >= limit {
                break;
            }
        }

        Ok(entries)
    }

    fn clear_range(&mut self, gte: &[u8], lt: &[u8]) -> Result<(), StoreError> {
        if gte >= lt {
            return Ok(());
        }
        let mut batch = WriteBatch::default();
        batch.delete_range(gte, lt);
        let write_opts = self.write_options();
        self.db()?.write_opt(batch, &write_opts)?;
        Ok(())
    }

    fn close(&mut self) -> Result<(), StoreError> {
        if self.db.is_some() {
            self.sync()?;
            self.db = None;
            log::info!("Closed RocksDB store at {}", self.config.path.display());
        }
        Ok(())
    }
}

/// Get number of CPU cores for RocksDB parallelism.
fn num_cpus() -> i32 {
    std::thread::available_parallelism()
        .map(|n| n.get() as i32)
        .unwrap_or(4)
}
