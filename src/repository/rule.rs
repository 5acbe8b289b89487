//! Rule entity
//!
//! Stored as UTF-8 JSON so every value is self-describing:
//! `{"ip":"10.0.0.1","isDrop":true,"orgId":"acme"}`.
//!
//! Decoding is lenient towards older records: a missing `isDrop` is
//! `false`, a missing `orgId` is `None`, unknown fields are ignored and the
//! first-generation key `is_done` is read as `isDrop`.

use serde::{Deserialize, Serialize};

use crate::error::{Result, RuleDbError};

/// A drop/allow decision for one IP
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    /// Lookup key; must not be blank
    #[serde(default)]
    pub ip: String,

    /// Block traffic from `ip` (true) or explicitly allow it (false)
    #[serde(default, alias = "is_done")]
    pub is_drop: bool,

    /// Optional tenant tag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_id: Option<String>,
}

impl Rule {
    pub fn new(ip: impl Into<String>, is_drop: bool) -> Self {
        Self {
            ip: ip.into(),
            is_drop,
            org_id: None,
        }
    }

    pub fn with_org(mut self, org_id: impl Into<String>) -> Self {
        self.org_id = Some(org_id.into());
        self
    }

    /// Reject records that cannot be keyed
    pub fn validate(&self) -> Result<()> {
        if self.ip.trim().is_empty() {
            return Err(RuleDbError::Validation("rule ip is missing".to_string()));
        }
        Ok(())
    }

    pub fn key(&self) -> &[u8] {
        self.ip.as_bytes()
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| RuleDbError::Serialization(e.to_string()))
    }

    /// Decode the value stored under `key`
    pub fn decode(key: &[u8], value: &[u8]) -> Result<Self> {
        serde_json::from_slice(value).map_err(|e| RuleDbError::Decode {
            key: String::from_utf8_lossy(key).into_owned(),
            reason: e.to_string(),
        })
    }
}
