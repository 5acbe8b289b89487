//! Configuration for ruledb
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;
use std::time::Duration;

/// Name of the bucket holding IP rules
pub const DEFAULT_BUCKET: &str = "ipFilters";

/// Main configuration for a ruledb instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Path of the single store file
    pub db_path: PathBuf,

    /// How long `Store::open` waits for the file lock before giving up
    pub lock_timeout: Duration,

    /// How commits are flushed to disk
    pub sync_strategy: SyncStrategy,

    /// Bucket created at open and used by the rule repository
    pub default_bucket: String,

    /// Compact at open once the file is at least this large and more than
    /// twice the size of the live data; `None` disables it
    pub auto_compact_bytes: Option<u64>,

    // -------------------------------------------------------------------------
    // HTTP Configuration
    // -------------------------------------------------------------------------
    /// HTTP listen address
    pub listen_addr: String,

    /// Maximum accepted request body size (bytes)
    pub max_body_bytes: usize,
}

/// Commit sync strategy
///
/// Both variants fsync before a commit returns; they differ only in
/// whether file metadata is flushed as well.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStrategy {
    /// `File::sync_all` after every commit
    Full,

    /// `File::sync_data` after every commit
    DataOnly,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./ruledb.db"),
            lock_timeout: Duration::from_secs(1),
            sync_strategy: SyncStrategy::Full,
            default_bucket: DEFAULT_BUCKET.to_string(),
            auto_compact_bytes: Some(1024 * 1024), // 1 MB
            listen_addr: "127.0.0.1:8080".to_string(),
            max_body_bytes: 4 * 1024 * 1024, // 4 MB
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the store file path
    pub fn db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.db_path = path.into();
        self
    }

    /// Set the bounded wait for the file lock
    pub fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.config.lock_timeout = timeout;
        self
    }

    /// Set the commit sync strategy
    pub fn sync_strategy(mut self, strategy: SyncStrategy) -> Self {
        self.config.sync_strategy = strategy;
        self
    }

    /// Set the bucket used for rules
    pub fn default_bucket(mut self, name: impl Into<String>) -> Self {
        self.config.default_bucket = name.into();
        self
    }

    /// Set the file size that triggers compaction at open
    pub fn auto_compact_bytes(mut self, bytes: Option<u64>) -> Self {
        self.config.auto_compact_bytes = bytes;
        self
    }

    /// Set the HTTP listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    /// Set the maximum request body size (in bytes)
    pub fn max_body_bytes(mut self, bytes: usize) -> Self {
        self.config.max_body_bytes = bytes;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
