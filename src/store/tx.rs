//! Transactions
//!
//! A `ReadTransaction` pins one committed state. A `WriteTransaction` works
//! on a private copy of the committed state and records every mutation; the
//! store commits the recorded mutations only if the closure succeeds.

use std::sync::Arc;

use bytes::Bytes;

use crate::error::{Result, RuleDbError};

use super::record::Op;
use super::scan::Scan;
use super::snapshot::Snapshot;
use super::state::{BucketData, DbState};

// =============================================================================
// Read Side
// =============================================================================

/// Point-in-time view of the store
pub struct ReadTransaction {
    state: Arc<DbState>,
}

impl ReadTransaction {
    pub(crate) fn new(state: Arc<DbState>) -> Self {
        Self { state }
    }

    /// Look up a bucket; `None` if it does not exist
    pub fn bucket(&self, name: &str) -> Option<Bucket<'_>> {
        self.state
            .buckets
            .get_key_value(name)
            .map(|(name, data)| Bucket {
                name: name.as_str(),
                data,
            })
    }

    /// Names of all buckets, in order
    pub fn bucket_names(&self) -> Vec<String> {
        self.state.buckets.keys().cloned().collect()
    }

    /// Owned, lazy iterator over a bucket pinned to this transaction
    pub fn scan(&self, name: &str) -> Scan {
        Scan::new(self.state.buckets.get(name).cloned())
    }

    /// Id of the last transaction visible to this view
    pub fn txid(&self) -> u64 {
        self.state.txid
    }

    /// Full store image of this view
    pub fn snapshot(&self) -> Result<Snapshot> {
        Snapshot::build(&self.state)
    }
}

/// Read-only handle on one bucket
#[derive(Clone, Copy)]
pub struct Bucket<'tx> {
    name: &'tx str,
    data: &'tx BucketData,
}

impl<'tx> Bucket<'tx> {
    pub fn name(&self) -> &str {
        self.name
    }

    pub fn get(&self, key: &[u8]) -> Option<&'tx [u8]> {
        self.data.get(key).map(|v| &v[..])
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Entries in lexicographic key order
    pub fn iter(&self) -> impl Iterator<Item = (&'tx [u8], &'tx [u8])> + 'tx {
        self.data.iter().map(|(k, v)| (k.as_slice(), &v[..]))
    }
}

// =============================================================================
// Write Side
// =============================================================================

/// Mutable transaction handed to `Store::update`
pub struct WriteTransaction {
    state: DbState,
    ops: Vec<Op>,
}

impl WriteTransaction {
    pub(crate) fn new(state: DbState) -> Self {
        Self {
            state,
            ops: Vec::new(),
        }
    }

    pub(crate) fn into_parts(self) -> (DbState, Vec<Op>) {
        (self.state, self.ops)
    }

    /// Read-only view of a bucket, including this transaction's writes
    pub fn bucket(&self, name: &str) -> Option<Bucket<'_>> {
        self.state
            .buckets
            .get_key_value(name)
            .map(|(name, data)| Bucket {
                name: name.as_str(),
                data,
            })
    }

    /// Writable handle on an existing bucket
    pub fn bucket_mut(&mut self, name: &str) -> Result<BucketMut<'_>> {
        let data = self
            .state
            .buckets
            .get_mut(name)
            .ok_or_else(|| RuleDbError::BucketNotFound(name.to_string()))?;

        Ok(BucketMut {
            name: name.to_string(),
            data,
            ops: &mut self.ops,
        })
    }

    /// Writable handle on a bucket, creating it first if needed
    pub fn create_bucket_if_not_exists(&mut self, name: &str) -> Result<BucketMut<'_>> {
        if name.is_empty() {
            return Err(RuleDbError::Validation("bucket name is empty".to_string()));
        }

        if !self.state.buckets.contains_key(name) {
            self.state
                .buckets
                .insert(name.to_string(), Arc::new(BucketData::new()));
            self.ops.push(Op::CreateBucket {
                name: name.to_string(),
            });
        }

        self.bucket_mut(name)
    }

    /// Remove a bucket and everything in it
    pub fn delete_bucket(&mut self, name: &str) -> Result<()> {
        if self.state.buckets.remove(name).is_none() {
            return Err(RuleDbError::BucketNotFound(name.to_string()));
        }
        self.ops.push(Op::DeleteBucket {
            name: name.to_string(),
        });
        Ok(())
    }

    pub fn bucket_names(&self) -> Vec<String> {
        self.state.buckets.keys().cloned().collect()
    }

    /// Whether the transaction has recorded any mutation
    pub fn is_dirty(&self) -> bool {
        !self.ops.is_empty()
    }
}

/// Writable handle on one bucket inside a `WriteTransaction`
pub struct BucketMut<'tx> {
    name: String,
    data: &'tx mut Arc<BucketData>,
    ops: &'tx mut Vec<Op>,
}

impl BucketMut<'_> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        self.data.get(key).map(|v| &v[..])
    }

    /// Insert or fully replace the value under `key`
    pub fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        if key.is_empty() {
            return Err(RuleDbError::Validation("key is empty".to_string()));
        }

        let value = Bytes::copy_from_slice(value);
        Arc::make_mut(self.data).insert(key.to_vec(), value.clone());
        self.ops.push(Op::Put {
            bucket: self.name.clone(),
            key: key.to_vec(),
            value,
        });
        Ok(())
    }

    /// Remove `key`; returns whether it was present
    pub fn delete(&mut self, key: &[u8]) -> bool {
        if !self.data.contains_key(key) {
            return false;
        }

        Arc::make_mut(self.data).remove(key);
        self.ops.push(Op::Delete {
            bucket: self.name.clone(),
            key: key.to_vec(),
        });
        true
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
