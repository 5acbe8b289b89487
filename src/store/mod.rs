//! Store Module
//!
//! Transactional, ordered key-value storage in a single file, organized
//! into named buckets.
//!
//! ## Responsibilities
//! - Exclusive, bounded-wait file locking
//! - Atomic, durable write transactions (one synced record per commit)
//! - Snapshot reads that never observe a partial commit
//! - Crash recovery of a torn final commit
//! - Full-image snapshots for backup
//! - Compaction of the commit log into a single snapshot
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ Header (16 bytes)                           │
//! │ ┌──────────┬────────────┬─────────────────┐ │
//! │ │"RLDB" (4)│ Version (2)│  Reserved (10)  │ │
//! │ └──────────┴────────────┴─────────────────┘ │
//! ├─────────────────────────────────────────────┤
//! │ Commit 1                                    │
//! │ ┌─────────┬─────────┬─────────────────────┐ │
//! │ │ Len (4) │ CRC (4) │ TxRecord (bincode)  │ │
//! │ └─────────┴─────────┴─────────────────────┘ │
//! ├─────────────────────────────────────────────┤
//! │ Commit 2 ...                                │
//! └─────────────────────────────────────────────┘
//! ```

mod db;
mod lock;
mod log;
mod record;
mod scan;
mod snapshot;
mod state;
mod tx;

pub use db::{CompactionResult, Store, StoreStats};
pub use log::RecoveryResult;
pub use scan::Scan;
pub use snapshot::Snapshot;
pub use tx::{Bucket, BucketMut, ReadTransaction, WriteTransaction};
