use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

use inspectsync_core::DraftKey;

/// Sections with a submission currently on the wire.
#[derive(Debug, Default)]
pub struct InFlight {
    active: Mutex<HashSet<DraftKey>>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `key` for one submission. `None` if it is already claimed.
    pub fn try_acquire(&self, key: &DraftKey) -> Option<InFlightGuard<'_>> {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if !active.insert(key.clone()) {
            return None;
        }
        Some(InFlightGuard {
            owner: self,
            key: key.clone(),
        })
    }

    pub fn is_active(&self, key: &DraftKey) -> bool {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(key)
    }
}

/// Releases the claim when dropped, on success, failure or cancellation.
#[derive(Debug)]
pub struct InFlightGuard<'a> {
    owner: &'a InFlight,
    key: DraftKey,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.owner
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}
