//! # ruledb
//!
//! IP filter rules persisted in an embedded, single-file bucket store:
//! - Transactional single-file store with named buckets
//! - Durable commits with crash recovery of a torn final write
//! - Single-writer/multi-reader concurrency with snapshot reads
//! - Rule repository mapping rules onto the `ipFilters` bucket
//! - HTTP API for create, bulk create, list, delete and backup
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      HTTP API (axum)                         │
//! │        GET/POST/PATCH /rules/ip/  DELETE  backup             │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ spawn_blocking
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                   RuleRepository                             │
//! │            (Rule <-> JSON bytes, validation)                 │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                       Store                                  │
//! │        (Single Writer / Multi Reader, snapshots)             │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!                       ▼
//!               ┌───────────────┐
//!               │  store file   │
//!               │ (commit log)  │
//!               └───────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod store;
pub mod repository;
pub mod http;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{ErrorKind, Result, RuleDbError};
pub use config::{Config, SyncStrategy, DEFAULT_BUCKET};
pub use repository::{Rule, RuleListing, RuleRepository};
pub use store::Store;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of ruledb
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
