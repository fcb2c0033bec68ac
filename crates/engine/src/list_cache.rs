use inspectsync_storage::{ListCacheEntry, ListCacheStore, StorageError};
use serde_json::Value;

/// What a list screen gets back from the cache.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CachedList {
    pub items: Vec<Value>,
    pub fetched_at_ms: u64,
    pub is_fresh: bool,
}

/// Fresh iff fetched less than `ttl_ms` ago. A zero fetch time never is.
pub fn is_fresh(fetched_at_ms: u64, now_ms: u64, ttl_ms: u64) -> bool {
    fetched_at_ms != 0 && now_ms.saturating_sub(fetched_at_ms) < ttl_ms
}

/// TTL policy over a [`ListCacheStore`].
pub struct ListCache<'a, S: ListCacheStore + ?Sized> {
    store: &'a mut S,
}

impl<'a, S: ListCacheStore + ?Sized> ListCache<'a, S> {
    pub fn new(store: &'a mut S) -> Self {
        Self { store }
    }

    /// A key never written reads as empty and stale.
    pub fn read(&self, key: &str, ttl_ms: u64, now_ms: u64) -> Result<CachedList, StorageError> {
        let entry = self.store.get_list(key)?.unwrap_or_default();
        Ok(CachedList {
            is_fresh: is_fresh(entry.fetched_at_ms, now_ms, ttl_ms),
            fetched_at_ms: entry.fetched_at_ms,
            items: entry.items,
        })
    }

    pub fn write(&mut self, key: &str, items: Vec<Value>, fetched_at_ms: u64) -> Result<(), StorageError> {
        self.store.put_list(key, &ListCacheEntry { items, fetched_at_ms })
    }

    /// Force the next read stale while keeping the last items on display.
    pub fn invalidate(&mut self, key: &str) -> Result<(), StorageError> {
        let items = self
            .store
            .get_list(key)?
            .map(|entry| entry.items)
            .unwrap_or_default();
        self.write(key, items, 0)
    }
}
