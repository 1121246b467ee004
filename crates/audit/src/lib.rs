//! Append-only, tamper-evident audit logging.
//!
//! Every consequential action gets a signed, hash-chained entry. Each
//! entry embeds the content hash of its predecessor; editing, reordering,
//! or deleting any entry breaks the chain at a position linear replay can
//! pinpoint. There is no write path that can repair a broken chain.

use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tracing::debug;

use skysentry_core::IdGenerator;
use skysentry_domain::{AuditDetails, AuditEntry};
use skysentry_identity::{CryptoEngine, IdentityError};
use skysentry_store::{DataStore, StoreError};

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Identity error: {0}")]
    Identity(#[from] IdentityError),
}

pub type Result<T> = std::result::Result<T, AuditError>;

/// Outcome of a full-chain verification replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainVerdict {
    /// Every link matched; `entries` were checked.
    Intact { entries: usize },
    /// The chain broke. `at` is the 1-based position of the first entry
    /// whose recorded `prev_hash` does not match the recomputed running
    /// hash. For a content or signature tamper of entry *k* that is its
    /// successor *k + 1*; for a `prev_hash` tamper it is *k* itself.
    Broken { at: usize },
}

impl ChainVerdict {
    pub fn is_intact(&self) -> bool {
        matches!(self, ChainVerdict::Intact { .. })
    }
}

/// Append-only audit log bound to one actor identity.
///
/// All appends across the system funnel through one instance; the append
/// lock makes read-last-hash → sign → insert atomic so concurrent callers
/// can never fork the chain.
pub struct AuditLog {
    store: Arc<DataStore>,
    engine: Arc<CryptoEngine>,
    ids: Arc<IdGenerator>,
    actor: String,
    append: Mutex<()>,
}

impl AuditLog {
    pub fn new(
        store: Arc<DataStore>,
        engine: Arc<CryptoEngine>,
        ids: Arc<IdGenerator>,
        actor: impl Into<String>,
    ) -> Self {
        Self {
            store,
            engine,
            ids,
            actor: actor.into(),
            append: Mutex::new(()),
        }
    }

    /// Create a signed, hash-chained audit entry.
    pub fn log(&self, action: &str, details: AuditDetails) -> Result<AuditEntry> {
        let _guard = self.append.lock().unwrap_or_else(PoisonError::into_inner);

        let prev_hash = self
            .store
            .last_audit_entry()?
            .map(|entry| entry.content_hash())
            .unwrap_or_default();

        let mut entry = AuditEntry::new(
            self.ids.generate(),
            self.actor.clone(),
            action,
            details,
            prev_hash,
        );
        entry.signature = self.engine.sign_data(&entry.signable_payload())?;

        self.store.append_audit(&entry)?;
        debug!(action, entry_id = %entry.id, "audit entry appended");
        Ok(entry)
    }

    /// Replay the whole chain in append order and check every link.
    pub fn verify_chain(&self) -> Result<ChainVerdict> {
        Ok(verify_entries(&self.store.audit_entries_asc()?))
    }

    /// Recent entries, most recent first.
    pub fn recent(&self, limit: usize) -> Result<Vec<AuditEntry>> {
        Ok(self.store.audit_entries_desc(limit)?)
    }
}

/// Check every link of a chain given in append order.
///
/// Usable without identity material loaded; linkage replay needs only
/// the entries themselves.
pub fn verify_entries(entries: &[AuditEntry]) -> ChainVerdict {
    let mut running_hash = String::new();
    for (i, entry) in entries.iter().enumerate() {
        if entry.prev_hash != running_hash {
            return ChainVerdict::Broken { at: i + 1 };
        }
        running_hash = entry.content_hash();
    }
    ChainVerdict::Intact { entries: entries.len() }
}
