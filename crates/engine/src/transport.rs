//! The seam between the engine and the remote record store.

use std::collections::BTreeMap;

use async_trait::async_trait;
use inspectsync_core::{DraftKey, EntityId, RecordId, RemoteRecord, SubmissionId};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("network unreachable: {0}")]
    Unreachable(String),

    #[error("remote returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("cannot read asset {uri}: {message}")]
    Asset { uri: String, message: String },
}

/// A remote collection plus its section-specific filters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub collection: String,
    pub filters: BTreeMap<String, String>,
}

impl ListQuery {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            filters: BTreeMap::new(),
        }
    }

    pub fn with_filter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.insert(key.into(), value.into());
        self
    }

    /// Stable list-cache key; filters are ordered so equal queries share an
    /// entry.
    pub fn cache_key(&self) -> String {
        if self.filters.is_empty() {
            return self.collection.clone();
        }
        let filters: Vec<String> = self
            .filters
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        format!("{}?{}", self.collection, filters.join("&"))
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Page {
    pub items: Vec<Value>,
    /// Total collection size, when the server bothers to report it.
    pub total: Option<u64>,
}

/// A freshly captured file to be sent as a binary multipart part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPart {
    pub part_name: String,
    pub field: String,
    /// Position of the owning entry in the draft, blank entries included.
    pub entry_index: usize,
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub submission_id: SubmissionId,
    pub key: DraftKey,
    pub record_id: Option<RecordId>,
    /// Non-asset values and already-remote asset URLs.
    pub report: Value,
    pub deleted_assets: Vec<String>,
    pub uploads: Vec<UploadPart>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitReceipt {
    pub record_id: RecordId,
    /// Hosted URL of each uploaded part, keyed by part name.
    pub uploaded: BTreeMap<String, String>,
}

impl SubmitReceipt {
    pub fn new(record_id: RecordId) -> Self {
        Self {
            record_id,
            uploaded: BTreeMap::new(),
        }
    }
}

#[async_trait]
pub trait RemoteClient: Send + Sync {
    async fn fetch_page(
        &self,
        query: &ListQuery,
        limit: usize,
        offset: usize,
    ) -> Result<Page, TransportError>;

    /// `Ok(None)` when the store has no record for the entity yet.
    async fn fetch_record(&self, entity_id: &EntityId)
        -> Result<Option<RemoteRecord>, TransportError>;

    async fn submit(&self, submission: &Submission) -> Result<SubmitReceipt, TransportError>;
}
