//! The Store
//!
//! Owns the store file and the committed in-memory state, and hands out
//! transactions over them.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use parking_lot::{Mutex, RwLock};

use crate::config::Config;
use crate::error::{Result, RuleDbError};

use super::lock::lock_exclusive;
use super::log::{is_current, open_store_file, LogFile, RecoveryResult};
use super::record::TxRecord;
use super::scan::Scan;
use super::snapshot::Snapshot;
use super::state::DbState;
use super::tx::{ReadTransaction, WriteTransaction};

/// Transactional, file-backed bucket store
///
/// ## Concurrency Model: Single-Writer / Multiple-Reader (SWMR)
///
/// - **Writes** (`update`): serialized by `writer`, which also owns the
///   file handle. The closure works on a private copy of the committed
///   state; nothing is published until the commit record is synced.
///
/// - **Reads** (`view`, `get`, `scan_all`): clone the `Arc` of the
///   committed state under a short read lock and then run lock-free.
///   A reader never sees a half-applied transaction.
pub struct Store {
    config: Config,

    /// Last committed state (swapped wholesale on commit)
    committed: RwLock<Arc<DbState>>,

    /// File handle; `None` once the store is closed
    writer: Mutex<Option<LogFile>>,

    closed: AtomicBool,

    /// What replaying the file at open found
    recovery: RecoveryResult,
}

/// Outcome of rewriting the store file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactionResult {
    pub bytes_before: u64,
    pub bytes_after: u64,
}

/// Summary of the store contents
#[derive(Debug, Clone)]
pub struct StoreStats {
    pub path: PathBuf,
    pub txid: u64,
    pub file_size: u64,
    /// (bucket name, key count), in name order
    pub buckets: Vec<(String, usize)>,
}

impl Store {
    /// Open or create a store
    ///
    /// On startup:
    /// 1. Open/create the file (0600 on unix)
    /// 2. Take the exclusive lock, waiting at most `config.lock_timeout`
    /// 3. Replay committed transactions, cutting off a torn tail
    /// 4. Ensure the default bucket exists
    /// 5. Compact the file if it has outgrown the live data
    pub fn open(config: Config) -> Result<Self> {
        let path = config.db_path.clone();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let file = Self::open_locked(&path, config.lock_timeout)?;

        let (log, records, recovery) = LogFile::recover(file, &path, config.sync_strategy)?;

        let mut state = DbState::default();
        for record in &records {
            state.apply_record(record)?;
        }

        Self::log_recovery(&path, &recovery);

        let store = Self {
            config,
            committed: RwLock::new(Arc::new(state)),
            writer: Mutex::new(Some(log)),
            closed: AtomicBool::new(false),
            recovery,
        };

        let default_bucket = store.config.default_bucket.clone();
        store.ensure_bucket(&default_bucket)?;

        if let Some(min_bytes) = store.config.auto_compact_bytes {
            store.compact_if_bloated(min_bytes)?;
        }

        tracing::info!(
            path = %path.display(),
            txid = store.committed.read().txid,
            "Store opened"
        );
        Ok(store)
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified store file
    pub fn open_path(path: &Path) -> Result<Self> {
        Self::open(Config::builder().db_path(path).build())
    }

    // =========================================================================
    // Transactions
    // =========================================================================

    /// Run `f` in a write transaction
    ///
    /// Commits every write `f` made if it returns `Ok`; discards them all if
    /// it returns `Err` or panics. Returns after the commit is on disk.
    pub fn update<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut WriteTransaction) -> Result<T>,
    {
        let mut writer = self.writer.lock();
        let log = writer.as_mut().ok_or(RuleDbError::Closed)?;

        let base = Arc::clone(&self.committed.read());
        let mut tx = WriteTransaction::new((*base).clone());
        let value = f(&mut tx)?;

        let (mut state, ops) = tx.into_parts();
        if ops.is_empty() {
            return Ok(value);
        }

        let record = TxRecord {
            txid: base.txid + 1,
            ops,
        };
        let file_size = log.append(&record)?;

        state.txid = record.txid;
        *self.committed.write() = Arc::new(state);

        tracing::debug!(
            txid = record.txid,
            ops = record.ops.len(),
            file_size,
            "Committed transaction"
        );
        Ok(value)
    }

    /// Run `f` against a consistent snapshot
    pub fn view<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&ReadTransaction) -> Result<T>,
    {
        let tx = self.begin_read()?;
        f(&tx)
    }

    /// Start a read transaction that lives as long as the returned value
    pub fn begin_read(&self) -> Result<ReadTransaction> {
        self.ensure_open()?;
        Ok(ReadTransaction::new(Arc::clone(&self.committed.read())))
    }

    // =========================================================================
    // Single-Operation Helpers
    // =========================================================================

    /// Create a bucket if it does not exist (idempotent)
    pub fn ensure_bucket(&self, name: &str) -> Result<()> {
        self.update(|tx| tx.create_bucket_if_not_exists(name).map(|_| ()))
    }

    /// Upsert one key, creating the bucket if needed
    pub fn put(&self, bucket: &str, key: &[u8], value: &[u8]) -> Result<()> {
        self.update(|tx| tx.create_bucket_if_not_exists(bucket)?.put(key, value))
    }

    /// Point lookup; `None` if the key or the bucket is absent
    pub fn get(&self, bucket: &str, key: &[u8]) -> Result<Option<Bytes>> {
        self.ensure_open()?;
        let state = Arc::clone(&self.committed.read());
        Ok(state
            .buckets
            .get(bucket)
            .and_then(|data| data.get(key).cloned()))
    }

    /// Delete one key
    ///
    /// Fails with `BucketNotFound` if the bucket does not exist; deleting an
    /// absent key from an existing bucket succeeds without a commit.
    pub fn delete(&self, bucket: &str, key: &[u8]) -> Result<()> {
        self.update(|tx| {
            tx.bucket_mut(bucket)?.delete(key);
            Ok(())
        })
    }

    /// Lazily iterate a bucket in key order over the current snapshot
    ///
    /// Each call starts from a fresh snapshot. A missing bucket yields
    /// nothing.
    pub fn scan_all(&self, bucket: &str) -> Result<Scan> {
        Ok(self.begin_read()?.scan(bucket))
    }

    /// Serialized image of the current state
    pub fn snapshot(&self) -> Result<Snapshot> {
        self.begin_read()?.snapshot()
    }

    /// Write a complete image of the current state to `sink`
    pub fn snapshot_to<W: Write>(&self, sink: &mut W) -> Result<u64> {
        self.snapshot()?.write_to(sink)
    }

    // =========================================================================
    // Compaction
    // =========================================================================

    /// Rewrite the store file as a single snapshot of the current state
    ///
    /// The new file is synced and then renamed over the old one, so a crash
    /// at any point leaves either the old or the new file in place.
    pub fn compact(&self) -> Result<CompactionResult> {
        let mut writer = self.writer.lock();
        let log = writer.as_mut().ok_or(RuleDbError::Closed)?;
        let state = Arc::clone(&self.committed.read());

        let snapshot = Snapshot::build(&state)?;
        self.rewrite(log, &snapshot)
    }

    /// Compact if the file is at least `min_bytes` and more than twice the
    /// size of the live data
    fn compact_if_bloated(&self, min_bytes: u64) -> Result<()> {
        let mut writer = self.writer.lock();
        let log = writer.as_mut().ok_or(RuleDbError::Closed)?;
        if log.len() < min_bytes {
            return Ok(());
        }

        let state = Arc::clone(&self.committed.read());
        let snapshot = Snapshot::build(&state)?;
        if log.len() <= snapshot.len().saturating_mul(2) {
            return Ok(());
        }

        self.rewrite(log, &snapshot).map(|_| ())
    }

    fn rewrite(&self, log: &mut LogFile, snapshot: &Snapshot) -> Result<CompactionResult> {
        let bytes_before = log.len();
        let bytes_after = log.compact(&self.config.db_path, snapshot.as_bytes())?;

        tracing::info!(
            path = %self.config.db_path.display(),
            txid = snapshot.txid(),
            bytes_before,
            bytes_after,
            "Compacted store file"
        );
        Ok(CompactionResult {
            bytes_before,
            bytes_after,
        })
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Sync and release the store file
    ///
    /// Every call after the first, and every other operation afterwards,
    /// fails with `Closed`.
    pub fn close(&self) -> Result<()> {
        let mut writer = self.writer.lock();
        let log = writer.take().ok_or(RuleDbError::Closed)?;
        self.closed.store(true, Ordering::SeqCst);

        log.close()?;
        tracing::info!(path = %self.config.db_path.display(), "Store closed");
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> Result<StoreStats> {
        let file_size = match self.writer.lock().as_ref() {
            Some(log) => log.len(),
            None => return Err(RuleDbError::Closed),
        };
        let state = Arc::clone(&self.committed.read());

        Ok(StoreStats {
            path: self.config.db_path.clone(),
            txid: state.txid,
            file_size,
            buckets: state
                .buckets
                .iter()
                .map(|(name, data)| (name.clone(), data.len()))
                .collect(),
        })
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn path(&self) -> &Path {
        &self.config.db_path
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Replay statistics from `open`
    pub fn recovery(&self) -> &RecoveryResult {
        &self.recovery
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(RuleDbError::Closed);
        }
        Ok(())
    }

    /// Open the store file and take its lock
    ///
    /// Retries when the file was replaced by a compaction while this call
    /// waited, so the lock is always held on the file at `path`.
    fn open_locked(path: &Path, timeout: Duration) -> Result<File> {
        let deadline = Instant::now() + timeout;
        loop {
            let file = open_store_file(path, false)?;
            let remaining = deadline.saturating_duration_since(Instant::now());
            lock_exclusive(&file, path, remaining)?;

            if is_current(&file, path)? {
                return Ok(file);
            }
            tracing::debug!(path = %path.display(), "Store file replaced while waiting, reopening");
        }
    }

    fn log_recovery(path: &Path, recovery: &RecoveryResult) {
        if recovery.records_recovered > 0 || recovery.bytes_truncated > 0 {
            tracing::info!(
                "Store recovery: {} transactions replayed, {} bytes truncated, last_txid={} ({})",
                recovery.records_recovered,
                recovery.bytes_truncated,
                recovery.last_txid,
                path.display()
            );
        }
    }
}
