pub mod config;
pub mod error;
pub mod inflight;
pub mod list_cache;
pub mod merge;
pub mod paginate;
pub mod submit;
pub mod tracker;
pub mod transport;

pub use config::EngineConfig;
pub use error::EngineError;
pub use list_cache::{CachedList, ListCache};
pub use merge::{MergeSource, Merged, RemoteProjection};
pub use submit::{SubmitOutcome, ValidationError};
pub use tokio_util::sync::CancellationToken;
pub use tracker::AssetDeletionTracker;
pub use transport::{
    ListQuery, Page, RemoteClient, Submission, SubmitReceipt, TransportError, UploadPart,
};

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use inspectsync_core::{
    Clock, CoreError, DraftKey, EntityId, FieldValue, SectionData, SectionDraft, Snapshot,
    SubmissionId, SystemClock,
};
use inspectsync_storage::{DraftStore, ListCacheStore};
use tracing::{debug, info, instrument, warn};

use crate::inflight::InFlight;

/// Bail out if the caller went away while we were suspended. The request
/// itself has already completed; only its result is dropped.
pub(crate) fn checkpoint(cancel: &CancellationToken, stage: &'static str) -> Result<(), EngineError> {
    if cancel.is_cancelled() {
        warn!(stage, "discarding result of cancelled operation");
        return Err(EngineError::Cancelled(stage));
    }
    Ok(())
}

/// A section ready for editing.
#[derive(Debug, Clone)]
pub struct OpenedSection {
    pub draft: SectionDraft,
    pub source: MergeSource,
}

/// A list ready for display.
#[derive(Debug, Clone, PartialEq)]
pub struct ListView {
    pub items: Vec<serde_json::Value>,
    pub fetched_at_ms: u64,
    pub from_cache: bool,
}

/// Draft/remote synchronization for form sections and list screens.
///
/// Storage, transport and clock are injected. Storage access is serialized
/// through a mutex that is never held across an await.
pub struct SyncEngine<S, C> {
    store: Mutex<S>,
    client: C,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
    /// Last snapshot written per draft, for write coalescing.
    snapshots: Mutex<HashMap<DraftKey, Snapshot>>,
    in_flight: InFlight,
}

impl<S, C> SyncEngine<S, C>
where
    S: DraftStore + ListCacheStore + Send,
    C: RemoteClient,
{
    pub fn new(store: S, client: C, config: EngineConfig) -> Result<Self, EngineError> {
        Self::with_clock(store, client, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        store: S,
        client: C,
        config: EngineConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            store: Mutex::new(store),
            client,
            clock,
            config,
            snapshots: Mutex::new(HashMap::new()),
            in_flight: InFlight::new(),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    fn store(&self) -> MutexGuard<'_, S> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn now_ms(&self) -> Result<u64, EngineError> {
        Ok(self.clock.now_ms()?)
    }

    /// Write `draft` unless its content matches what was last persisted.
    /// Returns whether a write happened.
    fn persist(&self, store: &mut S, draft: &SectionDraft) -> Result<bool, EngineError> {
        let snapshot = draft.snapshot()?;
        let mut snapshots = self.snapshots.lock().unwrap_or_else(PoisonError::into_inner);
        let last = match snapshots.get(&draft.key) {
            Some(last) => Some(*last),
            None => store.draft_snapshot(&draft.key)?,
        };
        if last == Some(snapshot) {
            debug!(key = %draft.key, "draft unchanged, write skipped");
            snapshots.insert(draft.key.clone(), snapshot);
            return Ok(false);
        }
        store.put_draft(draft, snapshot)?;
        snapshots.insert(draft.key.clone(), snapshot);
        debug!(key = %draft.key, "draft persisted");
        Ok(true)
    }

    /// Load (or start) the draft for `key`, apply `edit`, persist.
    fn mutate<F>(&self, key: &DraftKey, edit: F) -> Result<SectionDraft, EngineError>
    where
        F: FnOnce(&mut SectionDraft) -> Result<(), EngineError>,
    {
        let now = self.now_ms()?;
        let mut store = self.store();
        let mut draft = store
            .get_draft(key)?
            .unwrap_or_else(|| SectionDraft::blank(key.clone(), now));
        edit(&mut draft)?;
        let schema = draft.schema();
        draft.data.ensure_entry(schema);
        draft.last_modified_ms = now;
        self.persist(&mut store, &draft)?;
        Ok(draft)
    }

    // ========================================================================
    // Drafts
    // ========================================================================

    pub fn draft(&self, key: &DraftKey) -> Result<Option<SectionDraft>, EngineError> {
        Ok(self.store().get_draft(key)?)
    }

    pub fn drafts_for_entity(&self, entity_id: &EntityId) -> Result<Vec<SectionDraft>, EngineError> {
        Ok(self.store().drafts_for_entity(entity_id)?)
    }

    /// Produce the editing state for a section.
    ///
    /// A draft with content is returned without touching the network.
    /// Otherwise the remote record is fetched, normalized and merged. A
    /// transport failure leaves the stored draft as it was.
    #[instrument(skip(self, key, cancel), fields(key = %key))]
    pub async fn open_section(
        &self,
        key: &DraftKey,
        cancel: &CancellationToken,
    ) -> Result<OpenedSection, EngineError> {
        let local = self.store().get_draft(key)?;
        if let Some(draft) = local.as_ref().filter(|d| d.has_content()) {
            debug!("local draft has content, remote not consulted");
            return Ok(OpenedSection {
                draft: draft.clone(),
                source: MergeSource::Draft,
            });
        }

        let record = match self.client.fetch_record(&key.entity_id).await {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, "remote record fetch failed");
                return Err(e.into());
            }
        };
        checkpoint(cancel, "hydration")?;

        let projection = record
            .as_ref()
            .map(|record| RemoteProjection::from_record(record, key));
        let now = self.now_ms()?;

        let mut store = self.store();
        // Edits may have landed while the fetch was suspended.
        let local = store.get_draft(key)?.or(local);
        let merged = merge::merge(key, local, projection, now);
        self.persist(&mut store, &merged.draft)?;
        debug!(source = ?merged.source, "section opened");
        Ok(OpenedSection {
            draft: merged.draft,
            source: merged.source,
        })
    }

    /// Set a field of a form section.
    pub fn set_field(
        &self,
        key: &DraftKey,
        field: &str,
        value: FieldValue,
    ) -> Result<SectionDraft, EngineError> {
        self.set_entry_field(key, 0, field, value)
    }

    /// Set a field of one entry; form sections only have entry 0. Replacing
    /// a remote asset queues it for deletion.
    pub fn set_entry_field(
        &self,
        key: &DraftKey,
        index: usize,
        field: &str,
        value: FieldValue,
    ) -> Result<SectionDraft, EngineError> {
        let spec = key.section.schema().require_field(field)?;
        if value.kind() != spec.kind {
            return Err(CoreError::FieldKindMismatch {
                field: field.to_string(),
                expected: spec.kind.as_str(),
            }
            .into());
        }

        self.mutate(key, |draft| {
            let len = draft.entry_count();
            let entry = draft
                .data
                .entries_mut()
                .get_mut(index)
                .ok_or_else(|| EngineError::EntryOutOfRange {
                    key: key.to_string(),
                    index,
                    len,
                })?;
            let old = entry.insert(field.to_string(), value.clone());
            let old_asset = old.as_ref().and_then(FieldValue::as_asset);
            if old_asset.is_some() || value.as_asset().is_some() {
                AssetDeletionTracker::new(&mut draft.pending_deletions)
                    .on_replace(old_asset, value.as_asset());
            }
            Ok(())
        })
    }

    /// Append a blank entry to a repeatable section.
    pub fn add_entry(&self, key: &DraftKey) -> Result<SectionDraft, EngineError> {
        let schema = key.section.schema();
        if !schema.repeatable {
            return Err(EngineError::NotRepeatable(key.to_string()));
        }
        self.mutate(key, |draft| {
            if let SectionData::Entries(entries) = &mut draft.data {
                entries.push(schema.blank_entry());
            }
            Ok(())
        })
    }

    /// Remove an entry. Removing the last one leaves a single blank entry.
    pub fn remove_entry(&self, key: &DraftKey, index: usize) -> Result<SectionDraft, EngineError> {
        if !key.section.schema().repeatable {
            return Err(EngineError::NotRepeatable(key.to_string()));
        }
        self.mutate(key, |draft| {
            let SectionData::Entries(entries) = &mut draft.data else {
                return Err(EngineError::NotRepeatable(key.to_string()));
            };
            if index >= entries.len() {
                return Err(EngineError::EntryOutOfRange {
                    key: key.to_string(),
                    index,
                    len: entries.len(),
                });
            }
            let removed = entries.remove(index);
            AssetDeletionTracker::new(&mut draft.pending_deletions).on_entry_removed(&removed);
            Ok(())
        })
    }

    /// Record that a local asset now lives at `url`.
    pub fn promote_asset(
        &self,
        key: &DraftKey,
        index: usize,
        field: &str,
        url: &str,
    ) -> Result<SectionDraft, EngineError> {
        key.section.schema().require_field(field)?;
        self.mutate(key, |draft| {
            let len = draft.entry_count();
            let entry = draft
                .data
                .entries_mut()
                .get_mut(index)
                .ok_or_else(|| EngineError::EntryOutOfRange {
                    key: key.to_string(),
                    index,
                    len,
                })?;
            let Some(FieldValue::Asset(slot)) = entry.get_mut(field) else {
                return Err(CoreError::FieldKindMismatch {
                    field: field.to_string(),
                    expected: "asset",
                }
                .into());
            };
            if let Some(asset) = slot.take() {
                match asset.clone().promote(url) {
                    Ok(promoted) => *slot = Some(promoted),
                    Err(e) => {
                        *slot = Some(asset);
                        return Err(e.into());
                    }
                }
            }
            Ok(())
        })
    }

    // ========================================================================
    // Submission
    // ========================================================================

    /// Validate and send one section.
    ///
    /// A second call for the same section while one is on the wire returns
    /// [`SubmitOutcome::Ignored`] without a network call. On failure nothing
    /// local changes; on success the acknowledged deletions are cleared and
    /// the rest of the draft stays as submitted.
    #[instrument(skip(self, key), fields(key = %key))]
    pub async fn submit(&self, key: &DraftKey) -> Result<SubmitOutcome, EngineError> {
        let Some(_guard) = self.in_flight.try_acquire(key) else {
            debug!("submission already in flight, ignored");
            return Ok(SubmitOutcome::Ignored);
        };

        let now = self.now_ms()?;
        let draft = self
            .store()
            .get_draft(key)?
            .unwrap_or_else(|| SectionDraft::blank(key.clone(), now));
        submit::validate(&draft)?;

        let submission = submit::build_submission(&draft, SubmissionId::new());
        let receipt = match self.client.submit(&submission).await {
            Ok(receipt) => receipt,
            Err(e) => {
                warn!(error = %e, submission_id = %submission.submission_id, "submission failed");
                return Err(e.into());
            }
        };

        let now = self.now_ms()?;
        let mut store = self.store();
        let mut current = store.get_draft(key)?.unwrap_or(draft);
        AssetDeletionTracker::new(&mut current.pending_deletions)
            .acknowledge(&submission.deleted_assets);
        let promoted = submit::apply_uploads(&mut current, &submission.uploads, &receipt.uploaded);
        current.remote_record_id = Some(receipt.record_id.clone());
        current.last_modified_ms = now;
        self.persist(&mut store, &current)?;

        info!(
            record_id = %receipt.record_id,
            submission_id = %submission.submission_id,
            uploads = submission.uploads.len(),
            promoted,
            deleted = submission.deleted_assets.len(),
            "section submitted"
        );
        Ok(SubmitOutcome::Submitted {
            record_id: receipt.record_id,
            submission_id: submission.submission_id,
        })
    }

    pub fn is_submitting(&self, key: &DraftKey) -> bool {
        self.in_flight.is_active(key)
    }

    // ========================================================================
    // Lists
    // ========================================================================

    pub fn cached_list(&self, query: &ListQuery) -> Result<CachedList, EngineError> {
        let now = self.now_ms()?;
        let mut store = self.store();
        let cache = ListCache::new(&mut *store);
        Ok(cache.read(&query.cache_key(), self.config.list_ttl_ms, now)?)
    }

    pub fn invalidate_list(&self, query: &ListQuery) -> Result<(), EngineError> {
        let mut store = self.store();
        ListCache::new(&mut *store).invalidate(&query.cache_key())?;
        Ok(())
    }

    /// Serve a fresh cached list, or fetch every page and cache the result.
    ///
    /// `force` skips the freshness check. A failed or cancelled fetch leaves
    /// the cache exactly as it was.
    #[instrument(skip(self, query, cancel), fields(list = %query.cache_key()))]
    pub async fn load_list(
        &self,
        query: &ListQuery,
        force: bool,
        cancel: &CancellationToken,
    ) -> Result<ListView, EngineError> {
        let cached = self.cached_list(query)?;
        if cached.is_fresh && !force {
            debug!(items = cached.items.len(), "serving fresh cached list");
            return Ok(ListView {
                items: cached.items,
                fetched_at_ms: cached.fetched_at_ms,
                from_cache: true,
            });
        }

        let items = match paginate::fetch_all(&self.client, query, self.config.page_size, cancel).await {
            Ok(items) => items,
            Err(e) => {
                warn!(error = %e, "list fetch failed, cache left untouched");
                return Err(e);
            }
        };

        let now = self.now_ms()?;
        let mut store = self.store();
        ListCache::new(&mut *store).write(&query.cache_key(), items.clone(), now)?;
        debug!(items = items.len(), "list refreshed");
        Ok(ListView {
            items,
            fetched_at_ms: now,
            from_cache: false,
        })
    }
}
