//! Repository Module
//!
//! Domain mapping between IP rules and the bucket store.
//!
//! ## Responsibilities
//! - Validate rules before they reach the store
//! - Serialize rules to self-describing JSON values keyed by ip
//! - Single and batched upserts, each in one write transaction
//! - Raw and decoded listings, backups

mod rule;
mod rules;

pub use rule::Rule;
pub use rules::{RuleListing, RuleRepository};
