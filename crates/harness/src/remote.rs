use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use inspectsync_core::{EntityId, RecordId, RemoteRecord};
use inspectsync_engine::{
    CancellationToken, ListQuery, Page, RemoteClient, Submission, SubmitReceipt, TransportError,
};
use serde_json::{Value, json};
use tokio::sync::{Notify, Semaphore};

const RELEASE_PERMITS: usize = 1024;

/// Host every fake upload is served from.
pub const FAKE_CDN: &str = "https://cdn.fake.test";

/// One `fetch_page` call as the remote saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub collection: String,
    pub limit: usize,
    pub offset: usize,
}

#[derive(Debug, Default)]
struct Collection {
    items: Vec<Value>,
    report_total: bool,
    /// Zero-based request number that fails.
    fail_at: Option<usize>,
    served: usize,
}

#[derive(Default)]
struct State {
    collections: HashMap<String, Collection>,
    records: HashMap<EntityId, Value>,
    page_requests: Vec<PageRequest>,
    record_requests: usize,
    submissions: Vec<Submission>,
    fail_records: bool,
    fail_submissions: bool,
    next_record: u64,
    cancel_after_pages: Option<(usize, CancellationToken)>,
    cancel_on_record: Option<CancellationToken>,
}

/// Scriptable in-memory remote store. Records every call it receives.
pub struct FakeRemote {
    state: Mutex<State>,
    hold_submissions: AtomicBool,
    submission_started: Notify,
    release: Semaphore,
}

impl Default for FakeRemote {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeRemote {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            hold_submissions: AtomicBool::new(false),
            submission_started: Notify::new(),
            release: Semaphore::new(0),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ========================================================================
    // Scripting
    // ========================================================================

    /// Serve `items` under `collection`, optionally reporting the total.
    pub fn with_collection(self, collection: &str, items: Vec<Value>, report_total: bool) -> Self {
        self.state().collections.insert(
            collection.to_string(),
            Collection {
                items,
                report_total,
                ..Collection::default()
            },
        );
        self
    }

    /// `count` items shaped like list rows: `{ "id": "item-N" }`.
    pub fn numbered_items(count: usize) -> Vec<Value> {
        (0..count).map(|n| json!({ "id": format!("item-{n}") })).collect()
    }

    pub fn with_record(self, entity_id: &str, record: Value) -> Self {
        self.set_record(entity_id, record);
        self
    }

    pub fn set_record(&self, entity_id: &str, record: Value) {
        self.state().records.insert(EntityId::from(entity_id), record);
    }

    /// Make request number `request` (zero-based) of `collection` fail.
    pub fn fail_page_at(&self, collection: &str, request: usize) {
        self.state()
            .collections
            .entry(collection.to_string())
            .or_default()
            .fail_at = Some(request);
    }

    pub fn fail_records(&self, fail: bool) {
        self.state().fail_records = fail;
    }

    pub fn fail_submissions(&self, fail: bool) {
        self.state().fail_submissions = fail;
    }

    /// Cancel `token` once `pages` page requests have been answered, as if
    /// the screen was left mid-fetch.
    pub fn cancel_after_pages(&self, pages: usize, token: CancellationToken) {
        self.state().cancel_after_pages = Some((pages, token));
    }

    /// Cancel `token` while the next record fetch is on the wire.
    pub fn cancel_on_record_fetch(&self, token: CancellationToken) {
        self.state().cancel_on_record = Some(token);
    }

    /// Park every submission until [`FakeRemote::release_submissions`].
    pub fn hold_submissions(&self) {
        self.hold_submissions.store(true, Ordering::SeqCst);
    }

    pub fn release_submissions(&self) {
        self.hold_submissions.store(false, Ordering::SeqCst);
        self.release.add_permits(RELEASE_PERMITS);
    }

    /// Resolves once a held submission has reached the remote.
    pub async fn submission_started(&self) {
        self.submission_started.notified().await;
    }

    // ========================================================================
    // Inspection
    // ========================================================================

    pub fn page_requests(&self) -> Vec<PageRequest> {
        self.state().page_requests.clone()
    }

    pub fn record_requests(&self) -> usize {
        self.state().record_requests
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.state().submissions.clone()
    }

    pub fn network_calls(&self) -> usize {
        let state = self.state();
        state.page_requests.len() + state.record_requests + state.submissions.len()
    }
}

#[async_trait]
impl RemoteClient for FakeRemote {
    async fn fetch_page(
        &self,
        query: &ListQuery,
        limit: usize,
        offset: usize,
    ) -> Result<Page, TransportError> {
        let mut state = self.state();
        state.page_requests.push(PageRequest {
            collection: query.collection.clone(),
            limit,
            offset,
        });
        let answered = state.page_requests.len();
        if let Some((pages, token)) = &state.cancel_after_pages
            && answered >= *pages
        {
            token.cancel();
        }

        let collection = state.collections.entry(query.collection.clone()).or_default();
        let request = collection.served;
        collection.served += 1;
        if collection.fail_at == Some(request) {
            return Err(TransportError::Unreachable(format!(
                "scripted failure on request {request}"
            )));
        }

        let items = collection
            .items
            .iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect();
        let total = collection.report_total.then_some(collection.items.len() as u64);
        Ok(Page { items, total })
    }

    async fn fetch_record(
        &self,
        entity_id: &EntityId,
    ) -> Result<Option<RemoteRecord>, TransportError> {
        let mut state = self.state();
        state.record_requests += 1;
        if let Some(token) = state.cancel_on_record.take() {
            token.cancel();
        }
        if state.fail_records {
            return Err(TransportError::Status {
                status: 503,
                message: "scripted outage".into(),
            });
        }
        Ok(state.records.get(entity_id).cloned().map(RemoteRecord::new))
    }

    async fn submit(&self, submission: &Submission) -> Result<SubmitReceipt, TransportError> {
        let record_id = {
            let mut state = self.state();
            state.submissions.push(submission.clone());
            if state.fail_submissions {
                return Err(TransportError::Status {
                    status: 500,
                    message: "scripted rejection".into(),
                });
            }
            match &submission.record_id {
                Some(id) => id.clone(),
                None => {
                    state.next_record += 1;
                    RecordId::from(format!("rec-{}", state.next_record))
                }
            }
        };

        if self.hold_submissions.load(Ordering::SeqCst) {
            self.submission_started.notify_one();
            let permit = self
                .release
                .acquire()
                .await
                .map_err(|e| TransportError::Unreachable(e.to_string()))?;
            permit.forget();
        }
        let mut receipt = SubmitReceipt::new(record_id);
        receipt.uploaded = submission
            .uploads
            .iter()
            .map(|upload| {
                let url = format!(
                    "{FAKE_CDN}/{}/{}/{}",
                    receipt.record_id, submission.submission_id, upload.part_name
                );
                (upload.part_name.clone(), url)
            })
            .collect();
        Ok(receipt)
    }
}
