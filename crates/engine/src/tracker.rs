use std::collections::BTreeSet;

use inspectsync_core::{AssetRef, FieldMap, FieldValue};

/// Records remote asset URLs that local edits have superseded, so the server
/// can drop the orphaned files on the next successful submission.
pub struct AssetDeletionTracker<'a> {
    pending: &'a mut BTreeSet<String>,
}

impl<'a> AssetDeletionTracker<'a> {
    pub fn new(pending: &'a mut BTreeSet<String>) -> Self {
        Self { pending }
    }

    /// Returns true when a URL was newly queued for deletion.
    ///
    /// Local references are never tracked. Putting a queued remote asset
    /// back in place withdraws it from the set.
    pub fn on_replace(&mut self, old: Option<&AssetRef>, new: Option<&AssetRef>) -> bool {
        if let Some(url) = new.and_then(AssetRef::remote_url) {
            self.pending.remove(url);
        }
        match old {
            Some(AssetRef::Remote(url)) if old != new => self.pending.insert(url.clone()),
            _ => false,
        }
    }

    /// A removed entry releases every remote asset it held.
    pub fn on_entry_removed(&mut self, entry: &FieldMap) -> usize {
        entry
            .values()
            .filter_map(FieldValue::as_asset)
            .filter(|asset| self.on_replace(Some(*asset), None))
            .count()
    }

    /// Drop the URLs a submission acknowledged. Anything queued after the
    /// submission was built stays.
    pub fn acknowledge(&mut self, submitted: &[String]) -> usize {
        submitted
            .iter()
            .filter(|url| self.pending.remove(url.as_str()))
            .count()
    }
}
