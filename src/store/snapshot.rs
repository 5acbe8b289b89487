//! Store Snapshots
//!
//! A snapshot is a complete, compacted store file built from one committed
//! state: the regular file header followed by a single record that creates
//! every bucket and puts every key. Writing it to disk yields a file that
//! `Store::open` accepts as-is.

use std::io::Write;

use crate::error::Result;

use super::record::{file_header, Op, TxRecord, HEADER_SIZE};
use super::state::DbState;

/// Serialized image of the store at one transaction
#[derive(Debug, Clone)]
pub struct Snapshot {
    image: Vec<u8>,
    txid: u64,
}

impl Snapshot {
    pub(crate) fn build(state: &DbState) -> Result<Self> {
        let mut image = file_header().to_vec();

        let mut ops = Vec::new();
        for (name, data) in &state.buckets {
            ops.push(Op::CreateBucket { name: name.clone() });
            for (key, value) in data.iter() {
                ops.push(Op::Put {
                    bucket: name.clone(),
                    key: key.clone(),
                    value: value.clone(),
                });
            }
        }

        if !ops.is_empty() {
            // txid 0 never appears in a file; keep the image replayable
            let txid = state.txid.max(1);
            image.extend_from_slice(&TxRecord { txid, ops }.encode()?);
        }

        Ok(Self {
            image,
            txid: state.txid,
        })
    }

    /// Total size of the image in bytes, known before streaming
    pub fn len(&self) -> u64 {
        self.image.len() as u64
    }

    /// True when the image holds no record (a store with no buckets)
    pub fn is_empty(&self) -> bool {
        self.len() <= HEADER_SIZE
    }

    /// Transaction the image reflects
    pub fn txid(&self) -> u64 {
        self.txid
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.image
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.image
    }

    /// Stream the image into `sink`, returning the number of bytes written
    pub fn write_to<W: Write>(&self, sink: &mut W) -> Result<u64> {
        sink.write_all(&self.image)?;
        sink.flush()?;
        Ok(self.len())
    }
}
