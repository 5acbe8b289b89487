//! Error types for ruledb
//!
//! One error enum for the store, the repository and the HTTP layer.
//! Callers that need to branch on the class of failure use
//! [`RuleDbError::kind`] instead of matching individual variants.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using RuleDbError
pub type Result<T> = std::result::Result<T, RuleDbError>;

/// Unified error type for ruledb operations
#[derive(Debug, Error)]
pub enum RuleDbError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store file corrupted: {0}")]
    Corruption(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Open/Lifecycle Errors
    // -------------------------------------------------------------------------
    #[error("Timed out after {waited_ms}ms waiting for lock on {}", path.display())]
    LockTimeout { path: PathBuf, waited_ms: u64 },

    #[error("Store is closed")]
    Closed,

    // -------------------------------------------------------------------------
    // Logical Errors
    // -------------------------------------------------------------------------
    #[error("Bucket not found: {0}")]
    BucketNotFound(String),

    #[error("Failed to decode value for key {key:?}: {reason}")]
    Decode { key: String, reason: String },

    #[error("Validation failed: {0}")]
    Validation(String),
}

/// Coarse classification of a [`RuleDbError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The file could not be opened, read or written, or is corrupt
    Io,
    /// Another process holds the store lock
    LockTimeout,
    /// A bucket required by the operation does not exist
    NotFound,
    /// Stored bytes do not parse into the expected record
    Decode,
    /// Caller-supplied data was rejected before touching the store
    Validation,
    /// The store has been closed
    Closed,
}

impl RuleDbError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RuleDbError::Io(_) | RuleDbError::Corruption(_) | RuleDbError::Serialization(_) => {
                ErrorKind::Io
            }
            RuleDbError::LockTimeout { .. } => ErrorKind::LockTimeout,
            RuleDbError::Closed => ErrorKind::Closed,
            RuleDbError::BucketNotFound(_) => ErrorKind::NotFound,
            RuleDbError::Decode { .. } => ErrorKind::Decode,
            RuleDbError::Validation(_) => ErrorKind::Validation,
        }
    }
}

impl From<bincode::Error> for RuleDbError {
    fn from(e: bincode::Error) -> Self {
        RuleDbError::Serialization(e.to_string())
    }
}
