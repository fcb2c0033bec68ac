use inspectsync_core::{DraftKey, EntityId, SectionDraft, Snapshot};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StorageError;

/// A fetched collection as last written by a list screen.
///
/// `fetched_at_ms == 0` marks the entry stale no matter the TTL.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ListCacheEntry {
    pub items: Vec<Value>,
    pub fetched_at_ms: u64,
}

/// Durable per-`(entity, section)` draft storage. Last write wins.
pub trait DraftStore {
    fn get_draft(&self, key: &DraftKey) -> Result<Option<SectionDraft>, StorageError>;

    /// Snapshot recorded alongside the most recent write for `key`.
    fn draft_snapshot(&self, key: &DraftKey) -> Result<Option<Snapshot>, StorageError>;

    fn put_draft(&mut self, draft: &SectionDraft, snapshot: Snapshot) -> Result<(), StorageError>;

    fn drafts_for_entity(&self, entity_id: &EntityId) -> Result<Vec<SectionDraft>, StorageError>;
}

/// Durable list-cache storage keyed by list view.
pub trait ListCacheStore {
    fn get_list(&self, key: &str) -> Result<Option<ListCacheEntry>, StorageError>;

    fn put_list(&mut self, key: &str, entry: &ListCacheEntry) -> Result<(), StorageError>;
}
