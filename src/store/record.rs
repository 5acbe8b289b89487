//! Log record definitions
//!
//! Defines the committed-transaction record and its framed encoding.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{Result, RuleDbError};

/// Magic bytes identifying a ruledb store file
pub(crate) const MAGIC: &[u8; 4] = b"RLDB";

/// Current file format version
pub(crate) const VERSION: u16 = 1;

/// File header: Magic (4) + Version (2) + Reserved (10) = 16 bytes
pub(crate) const HEADER_SIZE: u64 = 16;

/// Frame header: Len (4) + CRC (4)
pub(crate) const FRAME_HEADER_SIZE: usize = 8;

/// One committed write transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct TxRecord {
    /// Transaction id - strictly increasing across the file
    pub txid: u64,

    /// Mutations in the order they were made
    pub ops: Vec<Op>,
}

/// Mutations that can be logged
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) enum Op {
    CreateBucket { name: String },
    DeleteBucket { name: String },
    Put { bucket: String, key: Vec<u8>, value: Bytes },
    Delete { bucket: String, key: Vec<u8> },
}

/// Outcome of decoding one frame from the front of a buffer
#[derive(Debug)]
pub(crate) enum Frame {
    /// A valid record and the number of bytes it occupied
    Complete(TxRecord, usize),

    /// The buffer ends before the frame does
    Incomplete,

    /// The frame is fully present but its checksum or payload is bad
    Invalid { len: usize, reason: String },
}

impl TxRecord {
    /// Encode as `[len u32][crc u32][bincode payload]`
    pub fn encode(&self) -> Result<Vec<u8>> {
        let payload = bincode::serialize(self)?;
        let len = u32::try_from(payload.len()).map_err(|_| {
            RuleDbError::Serialization(format!("record too large: {} bytes", payload.len()))
        })?;

        let mut frame = Vec::with_capacity(FRAME_HEADER_SIZE + payload.len());
        frame.extend_from_slice(&len.to_le_bytes());
        frame.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
        frame.extend_from_slice(&payload);
        Ok(frame)
    }

    /// Decode the frame at the front of `buf`
    pub fn decode(buf: &[u8]) -> Frame {
        if buf.len() < FRAME_HEADER_SIZE {
            return Frame::Incomplete;
        }

        let len = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
        let crc = u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]);
        let total = FRAME_HEADER_SIZE + len;
        if buf.len() < total {
            return Frame::Incomplete;
        }

        let payload = &buf[FRAME_HEADER_SIZE..total];
        let actual = crc32fast::hash(payload);
        if actual != crc {
            return Frame::Invalid {
                len: total,
                reason: format!("CRC mismatch: expected {:#010x}, got {:#010x}", crc, actual),
            };
        }

        match bincode::deserialize::<TxRecord>(payload) {
            Ok(record) => Frame::Complete(record, total),
            Err(e) => Frame::Invalid {
                len: total,
                reason: format!("undecodable record: {}", e),
            },
        }
    }
}

/// Build the file header
pub(crate) fn file_header() -> [u8; HEADER_SIZE as usize] {
    let mut header = [0u8; HEADER_SIZE as usize];
    header[0..4].copy_from_slice(MAGIC);
    header[4..6].copy_from_slice(&VERSION.to_le_bytes());
    header
}

/// Whether `buf` is a strict prefix of a fresh file header
///
/// Only a crash while a new file is being initialized leaves one behind.
pub(crate) fn is_partial_header(buf: &[u8]) -> bool {
    !buf.is_empty() && buf.len() < HEADER_SIZE as usize && file_header().starts_with(buf)
}

/// Offset of the first intact frame starting after `buf[0]` whose txid
/// is above `after_txid`
pub(crate) fn find_later_frame(buf: &[u8], after_txid: u64) -> Option<usize> {
    (1..buf.len()).find(|&offset| {
        matches!(
            TxRecord::decode(&buf[offset..]),
            Frame::Complete(record, _) if record.txid > after_txid
        )
    })
}

/// Validate a file header
pub(crate) fn check_header(buf: &[u8]) -> Result<()> {
    if buf.len() < HEADER_SIZE as usize {
        return Err(RuleDbError::Corruption(format!(
            "file header truncated: {} bytes",
            buf.len()
        )));
    }

    if &buf[0..4] != MAGIC {
        return Err(RuleDbError::Corruption(format!(
            "invalid magic: expected RLDB, got {:?}",
            &buf[0..4]
        )));
    }

    let version = u16::from_le_bytes([buf[4], buf[5]]);
    if version != VERSION {
        return Err(RuleDbError::Corruption(format!(
            "unsupported format version: {}",
            version
        )));
    }

    Ok(())
}
