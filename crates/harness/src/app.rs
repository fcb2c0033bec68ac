use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use inspectsync_core::{DraftKey, EntityId, FieldValue, SectionDraft, Snapshot};
use inspectsync_engine::{EngineConfig, EngineError, SyncEngine};
use inspectsync_storage::{
    DraftStore, ListCacheEntry, ListCacheStore, SqliteStorage, StorageError,
};

use crate::{FakeRemote, ManualClock};

/// Start of every test timeline, far from zero so "never fetched" stays
/// distinguishable.
pub const START_MS: u64 = 1_700_000_000_000;

/// SQLite storage that counts draft writes.
pub struct CountingStore {
    inner: SqliteStorage,
    draft_writes: Arc<AtomicUsize>,
}

impl CountingStore {
    pub fn new(inner: SqliteStorage) -> Self {
        Self {
            inner,
            draft_writes: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.draft_writes)
    }
}

impl DraftStore for CountingStore {
    fn get_draft(&self, key: &DraftKey) -> Result<Option<SectionDraft>, StorageError> {
        self.inner.get_draft(key)
    }

    fn draft_snapshot(&self, key: &DraftKey) -> Result<Option<Snapshot>, StorageError> {
        self.inner.draft_snapshot(key)
    }

    fn put_draft(&mut self, draft: &SectionDraft, snapshot: Snapshot) -> Result<(), StorageError> {
        self.draft_writes.fetch_add(1, Ordering::SeqCst);
        self.inner.put_draft(draft, snapshot)
    }

    fn drafts_for_entity(&self, entity_id: &EntityId) -> Result<Vec<SectionDraft>, StorageError> {
        self.inner.drafts_for_entity(entity_id)
    }
}

impl ListCacheStore for CountingStore {
    fn get_list(&self, key: &str) -> Result<Option<ListCacheEntry>, StorageError> {
        self.inner.get_list(key)
    }

    fn put_list(&mut self, key: &str, entry: &ListCacheEntry) -> Result<(), StorageError> {
        self.inner.put_list(key, entry)
    }
}

pub type TestEngine = SyncEngine<CountingStore, FakeRemote>;

/// An engine wired to a [`FakeRemote`], a [`ManualClock`] and SQLite.
pub struct TestApp {
    pub engine: TestEngine,
    pub clock: Arc<ManualClock>,
    draft_writes: Arc<AtomicUsize>,
}

impl TestApp {
    pub fn new(remote: FakeRemote) -> Result<Self, EngineError> {
        Self::with_config(remote, EngineConfig::default())
    }

    pub fn with_config(remote: FakeRemote, config: EngineConfig) -> Result<Self, EngineError> {
        let storage = SqliteStorage::open_in_memory()?;
        Self::build(storage, remote, config, Arc::new(ManualClock::new(START_MS)))
    }

    /// Engine over a database file, for restart scenarios.
    pub fn on_disk(
        path: &Path,
        remote: FakeRemote,
        clock: Arc<ManualClock>,
    ) -> Result<Self, EngineError> {
        let storage = SqliteStorage::open(&path.display().to_string())?;
        Self::build(storage, remote, EngineConfig::default(), clock)
    }

    fn build(
        storage: SqliteStorage,
        remote: FakeRemote,
        config: EngineConfig,
        clock: Arc<ManualClock>,
    ) -> Result<Self, EngineError> {
        let store = CountingStore::new(storage);
        let draft_writes = store.counter();
        let engine = SyncEngine::with_clock(store, remote, config, clock.clone())?;
        Ok(Self {
            engine,
            clock,
            draft_writes,
        })
    }

    pub fn remote(&self) -> &FakeRemote {
        self.engine.client()
    }

    pub fn draft_writes(&self) -> usize {
        self.draft_writes.load(Ordering::SeqCst)
    }

    /// Set several form fields in order.
    pub fn fill(
        &self,
        key: &DraftKey,
        fields: Vec<(&str, FieldValue)>,
    ) -> Result<SectionDraft, EngineError> {
        let mut last = None;
        for (field, value) in fields {
            last = Some(self.engine.set_field(key, field, value)?);
        }
        match last {
            Some(draft) => Ok(draft),
            None => Ok(self
                .engine
                .draft(key)?
                .unwrap_or_else(|| SectionDraft::blank(key.clone(), START_MS))),
        }
    }
}
