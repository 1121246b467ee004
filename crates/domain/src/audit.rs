//! Tamper-evident audit entries.
//!
//! Each entry embeds the content hash of its predecessor, forming a hash
//! chain. The content hash covers the signed payload plus the signature
//! bytes, so it depends on both content and authenticity.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use skysentry_core::unix_millis;

/// Ordered detail map. `BTreeMap` keeps serialization key-sorted, so the
/// canonical encoding is reproducible across implementations.
pub type AuditDetails = BTreeMap<String, serde_json::Value>;

/// One append-only audit log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: String,
    /// Unix milliseconds.
    pub timestamp: u64,
    /// Drone id or operator id that caused the action.
    pub actor: String,
    /// Action tag, e.g. `mission_start`, `detection`, `battery_rtl`.
    pub action: String,
    pub details: AuditDetails,
    /// Content hash of the previous entry; empty for the genesis entry.
    pub prev_hash: String,
    /// Hex Ed25519 signature over [`AuditEntry::signable_payload`].
    pub signature: String,
}

impl AuditEntry {
    pub fn new(
        id: String,
        actor: impl Into<String>,
        action: impl Into<String>,
        details: AuditDetails,
        prev_hash: String,
    ) -> Self {
        Self {
            id,
            timestamp: unix_millis(),
            actor: actor.into(),
            action: action.into(),
            details,
            prev_hash,
            signature: String::new(),
        }
    }

    /// Key-sorted JSON encoding of the detail map.
    pub fn canonical_details(&self) -> String {
        serde_json::to_string(&self.details).unwrap_or_else(|_| "{}".to_string())
    }

    /// The canonical byte string that gets signed.
    pub fn signable_payload(&self) -> Vec<u8> {
        format!(
            "{}|{}|{}|{}|{}",
            self.timestamp,
            self.actor,
            self.action,
            self.canonical_details(),
            self.prev_hash,
        )
        .into_bytes()
    }

    /// Hash of this entry's content, used as `prev_hash` by its successor.
    pub fn content_hash(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.signable_payload());
        hasher.update(self.signature.as_bytes());
        hasher.finalize().to_hex().to_string()
    }
}
