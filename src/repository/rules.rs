//! Rule Repository
//!
//! Maps `Rule`s onto one bucket of the store. Every call runs its own
//! transaction; there is no cache in front of the store.

use std::io::Write;
use std::sync::Arc;

use bytes::Bytes;

use crate::error::{Result, RuleDbError};
use crate::store::{Snapshot, Store};

use super::Rule;

/// Outcome of decoding every stored rule
#[derive(Debug, Default)]
pub struct RuleListing {
    /// Successfully decoded rules, in key order
    pub rules: Vec<Rule>,

    /// One `Decode` error per entry that could not be read
    pub errors: Vec<RuleDbError>,
}

/// Rule persistence over a shared `Store`
#[derive(Clone)]
pub struct RuleRepository {
    store: Arc<Store>,
    bucket: String,
}

impl RuleRepository {
    /// Repository over the store's default bucket
    pub fn new(store: Arc<Store>) -> Self {
        let bucket = store.config().default_bucket.clone();
        Self { store, bucket }
    }

    /// Repository over a specific bucket
    pub fn with_bucket(store: Arc<Store>, bucket: impl Into<String>) -> Self {
        Self {
            store,
            bucket: bucket.into(),
        }
    }

    /// Insert `rule`, replacing any rule with the same ip
    pub fn create_or_replace(&self, rule: &Rule) -> Result<()> {
        rule.validate()?;
        let value = rule.encode()?;

        self.store.update(|tx| {
            tx.create_bucket_if_not_exists(&self.bucket)?
                .put(rule.key(), &value)
        })?;

        tracing::debug!(ip = %rule.ip, is_drop = rule.is_drop, "Stored rule");
        Ok(())
    }

    /// Insert every rule in one transaction
    ///
    /// All rules are validated and encoded before the transaction starts.
    /// If anything fails, nothing from the batch is written.
    pub fn create_or_replace_bulk(&self, rules: &[Rule]) -> Result<usize> {
        let mut encoded = Vec::with_capacity(rules.len());
        for (index, rule) in rules.iter().enumerate() {
            rule.validate().map_err(|e| match e {
                RuleDbError::Validation(msg) => {
                    RuleDbError::Validation(format!("rule #{}: {}", index, msg))
                }
                other => other,
            })?;
            encoded.push((rule.key(), rule.encode()?));
        }

        self.store.update(|tx| {
            let mut bucket = tx.create_bucket_if_not_exists(&self.bucket)?;
            for (key, value) in &encoded {
                bucket.put(key, value)?;
            }
            Ok(())
        })?;

        tracing::info!(count = rules.len(), bucket = %self.bucket, "Stored rule batch");
        Ok(rules.len())
    }

    /// Remove the rule for `ip`
    ///
    /// Fails with `BucketNotFound` when the rule bucket does not exist; an
    /// ip with no rule is not an error.
    pub fn delete(&self, ip: &str) -> Result<()> {
        if ip.trim().is_empty() {
            return Err(RuleDbError::Validation("rule ip is missing".to_string()));
        }

        self.store.delete(&self.bucket, ip.as_bytes())?;
        tracing::debug!(ip, "Deleted rule");
        Ok(())
    }

    /// Look up the rule for `ip`
    pub fn get(&self, ip: &str) -> Result<Option<Rule>> {
        self.store
            .get(&self.bucket, ip.as_bytes())?
            .map(|value| Rule::decode(ip.as_bytes(), &value))
            .transpose()
    }

    /// Every stored entry as (key, raw value), in key order
    pub fn list_all(&self) -> Result<Vec<(String, Bytes)>> {
        Ok(self
            .store
            .scan_all(&self.bucket)?
            .map(|(key, value)| (String::from_utf8_lossy(&key).into_owned(), value))
            .collect())
    }

    /// Every stored entry decoded, with per-entry decode failures
    pub fn list_rules(&self) -> Result<RuleListing> {
        let mut listing = RuleListing::default();

        for (key, value) in self.store.scan_all(&self.bucket)? {
            match Rule::decode(&key, &value) {
                Ok(rule) => listing.rules.push(rule),
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping undecodable rule");
                    listing.errors.push(e);
                }
            }
        }

        Ok(listing)
    }

    /// Image of the whole store for backup
    pub fn snapshot(&self) -> Result<Snapshot> {
        self.store.snapshot()
    }

    /// Write a backup of the whole store to `sink`
    pub fn backup<W: Write>(&self, sink: &mut W) -> Result<u64> {
        self.store.snapshot_to(sink)
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }
}
