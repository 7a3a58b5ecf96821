//! Paste persistence.
//!
//! The store is the single source of truth for "identifier exists":
//! `insert` rejects duplicates under the store's own synchronization, which
//! closes the race between two concurrent creates proposing the same
//! candidate. Expired documents stay tombstoned (id still reserved) until
//! their retention period elapses.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use thiserror::Error;

use crate::error::ApiError;
use crate::models::PasteDocument;

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("identifier already in use")]
    DuplicateId,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            // A duplicate surviving the allocator's retries is an
            // allocation failure from the caller's point of view.
            StoreError::DuplicateId => ApiError::AllocationExhausted,
            StoreError::Unavailable(msg) => ApiError::StoreUnavailable(msg),
        }
    }
}

#[async_trait]
pub trait PasteStore: Send + Sync {
    /// Insert a new document, failing with `DuplicateId` when the id is
    /// held by any live or tombstoned-but-retained record.
    async fn insert(&self, doc: PasteDocument, now_secs: u64) -> Result<(), StoreError>;

    /// Raw record lookup; returns tombstoned records too. Expiry policy
    /// is applied by the caller.
    async fn get(&self, id: &str) -> Result<Option<PasteDocument>, StoreError>;

    /// Increment the view counter of a record.
    async fn record_view(&self, id: &str) -> Result<(), StoreError>;

    /// All records carrying `owner_token`, unfiltered and unordered.
    async fn list_by_owner(&self, owner_token: &str) -> Result<Vec<PasteDocument>, StoreError>;

    /// Physically remove a record. Returns whether anything was removed.
    async fn delete(&self, id: &str) -> Result<bool, StoreError>;

    /// Drop tombstones whose retention has elapsed, releasing their ids.
    async fn purge_expired(&self, now_secs: u64) -> Result<usize, StoreError>;
}

/// In-memory store. Read-your-writes by construction; the map lock is
/// never held across an await point.
pub struct MemoryStore {
    retention_secs: u64,
    pastes: RwLock<HashMap<String, PasteDocument>>,
}

impl MemoryStore {
    pub fn new(retention_secs: u64) -> Self {
        Self {
            retention_secs,
            pastes: RwLock::new(HashMap::new()),
        }
    }

    /// Whether a record no longer reserves its id at `now`.
    fn past_retention(&self, doc: &PasteDocument, now_secs: u64) -> bool {
        match doc.expires_at {
            Some(expires_at) => now_secs >= expires_at.saturating_add(self.retention_secs),
            None => false,
        }
    }
}

#[async_trait]
impl PasteStore for MemoryStore {
    async fn insert(&self, doc: PasteDocument, now_secs: u64) -> Result<(), StoreError> {
        let mut pastes = self.pastes.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = pastes.get(&doc.id) {
            if !self.past_retention(existing, now_secs) {
                return Err(StoreError::DuplicateId);
            }
        }
        pastes.insert(doc.id.clone(), doc);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<PasteDocument>, StoreError> {
        let pastes = self.pastes.read().unwrap_or_else(PoisonError::into_inner);
        Ok(pastes.get(id).cloned())
    }

    async fn record_view(&self, id: &str) -> Result<(), StoreError> {
        let mut pastes = self.pastes.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(doc) = pastes.get_mut(id) {
            doc.views += 1;
        }
        Ok(())
    }

    async fn list_by_owner(&self, owner_token: &str) -> Result<Vec<PasteDocument>, StoreError> {
        let pastes = self.pastes.read().unwrap_or_else(PoisonError::into_inner);
        Ok(pastes
            .values()
            .filter(|doc| doc.owner_token.as_deref() == Some(owner_token))
            .cloned()
            .collect())
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let mut pastes = self.pastes.write().unwrap_or_else(PoisonError::into_inner);
        Ok(pastes.remove(id).is_some())
    }

    async fn purge_expired(&self, now_secs: u64) -> Result<usize, StoreError> {
        let mut pastes = self.pastes.write().unwrap_or_else(PoisonError::into_inner);
        let before = pastes.len();
        pastes.retain(|_, doc| match doc.expires_at {
            Some(expires_at) => now_secs < expires_at.saturating_add(self.retention_secs),
            None => true,
        });
        Ok(before - pastes.len())
    }
}
