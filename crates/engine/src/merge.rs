//! Draft-versus-remote selection for a section being opened.

use inspectsync_core::{DraftKey, RecordId, RemoteRecord, SectionData, SectionDraft};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeSource {
    /// The local draft had content and was kept as-is.
    Draft,
    /// The draft was empty or missing; the remote record seeded it.
    Remote,
    /// Nothing on either side; an empty draft.
    Blank,
}

/// Normalized view of one section of a remote record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteProjection {
    pub data: SectionData,
    pub record_id: Option<RecordId>,
}

impl RemoteProjection {
    pub fn from_record(record: &RemoteRecord, key: &DraftKey) -> Self {
        let schema = key.section.schema();
        Self {
            data: record
                .project(schema)
                .unwrap_or_else(|| SectionData::blank(schema)),
            record_id: record.record_id(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Merged {
    pub draft: SectionDraft,
    pub source: MergeSource,
}

/// Pick the editing state for `key`.
///
/// A draft with any non-empty field wins whole; remote values are never
/// mixed into it. Otherwise a remote projection with content replaces it.
/// A record lacking the section only lends its record id.
pub fn merge(
    key: &DraftKey,
    draft: Option<SectionDraft>,
    remote: Option<RemoteProjection>,
    now_ms: u64,
) -> Merged {
    match (draft, remote) {
        (Some(draft), _) if draft.has_content() => Merged {
            draft,
            source: MergeSource::Draft,
        },
        (draft, Some(remote)) if !remote.data.has_content() => {
            let mut draft = draft.unwrap_or_else(|| SectionDraft::blank(key.clone(), now_ms));
            if remote.record_id.is_some() {
                draft.remote_record_id = remote.record_id;
            }
            Merged {
                draft,
                source: MergeSource::Blank,
            }
        }
        (draft, Some(remote)) => {
            let record_id = remote
                .record_id
                .or_else(|| draft.and_then(|d| d.remote_record_id));
            Merged {
                draft: SectionDraft::from_remote(key.clone(), remote.data, record_id, now_ms),
                source: MergeSource::Remote,
            }
        }
        (Some(draft), None) => Merged {
            draft,
            source: MergeSource::Blank,
        },
        (None, None) => Merged {
            draft: SectionDraft::blank(key.clone(), now_ms),
            source: MergeSource::Blank,
        },
    }
}
