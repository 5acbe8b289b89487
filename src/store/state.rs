//! In-memory image of the committed store
//!
//! Every bucket sits behind its own `Arc`, so cloning the whole state is
//! O(buckets) and a writer only copies the buckets it touches.

use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::Bytes;

use crate::error::{Result, RuleDbError};

use super::record::{Op, TxRecord};

/// Ordered key → value map for one bucket
pub(crate) type BucketData = BTreeMap<Vec<u8>, Bytes>;

#[derive(Debug, Clone, Default)]
pub(crate) struct DbState {
    /// Id of the last transaction folded into this state
    pub txid: u64,

    pub buckets: BTreeMap<String, Arc<BucketData>>,
}

impl DbState {
    /// Fold a replayed record into the state
    pub fn apply_record(&mut self, record: &TxRecord) -> Result<()> {
        for op in &record.ops {
            self.apply(op).map_err(|reason| {
                RuleDbError::Corruption(format!("transaction {}: {}", record.txid, reason))
            })?;
        }
        self.txid = record.txid;
        Ok(())
    }

    fn apply(&mut self, op: &Op) -> std::result::Result<(), String> {
        match op {
            Op::CreateBucket { name } => {
                self.buckets.entry(name.clone()).or_default();
            }
            Op::DeleteBucket { name } => {
                self.buckets.remove(name);
            }
            Op::Put { bucket, key, value } => {
                let data = self
                    .buckets
                    .get_mut(bucket)
                    .ok_or_else(|| format!("put into missing bucket {:?}", bucket))?;
                Arc::make_mut(data).insert(key.clone(), value.clone());
            }
            Op::Delete { bucket, key } => {
                let data = self
                    .buckets
                    .get_mut(bucket)
                    .ok_or_else(|| format!("delete from missing bucket {:?}", bucket))?;
                Arc::make_mut(data).remove(key);
            }
        }
        Ok(())
    }
}
