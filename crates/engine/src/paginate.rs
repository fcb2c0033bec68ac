use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::transport::{ListQuery, Page, RemoteClient};
use crate::{checkpoint, EngineError};

/// Progress of one accumulation run. Dropped when the run ends, whether it
/// completed or failed.
#[derive(Debug)]
pub struct PaginationState {
    offset: usize,
    page_size: usize,
    items: Vec<Value>,
    reported_total: Option<u64>,
    requests: usize,
}

impl PaginationState {
    pub fn new(page_size: usize) -> Self {
        Self {
            offset: 0,
            page_size,
            items: Vec::new(),
            reported_total: None,
            requests: 0,
        }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn requests(&self) -> usize {
        self.requests
    }

    /// Fold one page in and report whether the collection is exhausted.
    ///
    /// A short page always ends the run. A reported total ends it once the
    /// accumulated count reaches it; only the first reported total counts.
    pub fn absorb(&mut self, page: Page) -> bool {
        let received = page.items.len();
        self.requests += 1;
        self.offset += received;
        self.items.extend(page.items);
        if self.reported_total.is_none() {
            self.reported_total = page.total;
        }

        if received < self.page_size {
            return true;
        }
        matches!(self.reported_total, Some(total) if self.items.len() as u64 >= total)
    }

    pub fn into_items(self) -> Vec<Value> {
        self.items
    }
}

/// Fetch every item of `query` one page at a time, in offset order.
///
/// Any failed page aborts the whole run; nothing accumulated so far is
/// returned.
pub async fn fetch_all<C>(
    client: &C,
    query: &ListQuery,
    page_size: usize,
    cancel: &CancellationToken,
) -> Result<Vec<Value>, EngineError>
where
    C: RemoteClient + ?Sized,
{
    if page_size == 0 {
        return Err(EngineError::InvalidConfig("page_size must be positive".into()));
    }

    let mut state = PaginationState::new(page_size);
    loop {
        let page = client.fetch_page(query, page_size, state.offset()).await?;
        checkpoint(cancel, "page fetch")?;
        let done = state.absorb(page);
        debug!(
            collection = %query.collection,
            offset = state.offset(),
            requests = state.requests(),
            "page accumulated"
        );
        if done {
            return Ok(state.into_items());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn page(n: usize, total: Option<u64>) -> Page {
        Page {
            items: (0..n).map(|i| json!(i)).collect(),
            total,
        }
    }

    #[test]
    fn short_page_ends_run() {
        let mut state = PaginationState::new(25);
        assert!(!state.absorb(page(25, None)));
        assert!(!state.absorb(page(25, None)));
        assert!(state.absorb(page(10, None)));
        assert_eq!(state.requests(), 3);
        assert_eq!(state.offset(), 60);
        assert_eq!(state.into_items().len(), 60);
    }

    #[test]
    fn reported_total_ends_run_on_full_page() {
        let mut state = PaginationState::new(25);
        assert!(!state.absorb(page(25, Some(50))));
        assert!(state.absorb(page(25, None)));
        assert_eq!(state.requests(), 2);
    }

    #[test]
    fn only_first_reported_total_counts() {
        let mut state = PaginationState::new(2);
        assert!(!state.absorb(page(2, Some(6))));
        // A later, smaller total is ignored.
        assert!(!state.absorb(page(2, Some(2))));
        assert!(state.absorb(page(2, None)));
    }

    #[test]
    fn overshooting_total_still_stops() {
        let mut state = PaginationState::new(10);
        assert!(state.absorb(page(10, Some(3))));
    }

    #[test]
    fn empty_first_page_ends_run() {
        let mut state = PaginationState::new(25);
        assert!(state.absorb(page(0, None)));
        assert!(state.into_items().is_empty());
    }
}
