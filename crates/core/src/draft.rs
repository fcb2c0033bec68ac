use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::asset::AssetRef;
use crate::field_value::FieldValue;
use crate::ids::{EntityId, RecordId};
use crate::schema::{SectionKind, SectionSchema};
use crate::CoreError;

pub type FieldMap = BTreeMap<String, FieldValue>;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DraftKey {
    pub entity_id: EntityId,
    pub section: SectionKind,
}

impl DraftKey {
    pub fn new(entity_id: impl Into<EntityId>, section: SectionKind) -> Self {
        Self {
            entity_id: entity_id.into(),
            section,
        }
    }
}

impl fmt::Display for DraftKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.entity_id, self.section.as_str())
    }
}

/// Field values of one section. Form sections hold a single map, repeatable
/// sections hold one map per entry and never drop below one entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "shape", content = "fields", rename_all = "snake_case")]
pub enum SectionData {
    Form(FieldMap),
    Entries(Vec<FieldMap>),
}

impl SectionData {
    pub fn blank(schema: &SectionSchema) -> Self {
        if schema.repeatable {
            Self::Entries(vec![schema.blank_entry()])
        } else {
            Self::Form(schema.blank_entry())
        }
    }

    pub fn entries(&self) -> &[FieldMap] {
        match self {
            Self::Form(map) => std::slice::from_ref(map),
            Self::Entries(entries) => entries,
        }
    }

    pub fn entries_mut(&mut self) -> &mut [FieldMap] {
        match self {
            Self::Form(map) => std::slice::from_mut(map),
            Self::Entries(entries) => entries,
        }
    }

    pub fn has_content(&self) -> bool {
        self.entries()
            .iter()
            .any(|entry| entry.values().any(|v| !v.is_empty()))
    }

    pub fn assets(&self) -> impl Iterator<Item = &AssetRef> {
        self.entries()
            .iter()
            .flat_map(|entry| entry.values())
            .filter_map(FieldValue::as_asset)
    }

    /// Restore the at-least-one-entry invariant for repeatable sections.
    pub fn ensure_entry(&mut self, schema: &SectionSchema) {
        if let Self::Entries(entries) = self
            && entries.is_empty()
        {
            entries.push(schema.blank_entry());
        }
    }
}

/// Structural digest of a draft's content, used to skip redundant writes.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Snapshot([u8; 32]);

impl Snapshot {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Snapshot({:02x}{:02x}...)", self.0[0], self.0[1])
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionDraft {
    pub key: DraftKey,
    pub data: SectionData,
    pub pending_deletions: BTreeSet<String>,
    pub remote_record_id: Option<RecordId>,
    pub last_modified_ms: u64,
}

impl SectionDraft {
    pub fn blank(key: DraftKey, now_ms: u64) -> Self {
        let data = SectionData::blank(key.section.schema());
        Self {
            key,
            data,
            pending_deletions: BTreeSet::new(),
            remote_record_id: None,
            last_modified_ms: now_ms,
        }
    }

    pub fn from_remote(
        key: DraftKey,
        mut data: SectionData,
        remote_record_id: Option<RecordId>,
        now_ms: u64,
    ) -> Self {
        data.ensure_entry(key.section.schema());
        Self {
            key,
            data,
            pending_deletions: BTreeSet::new(),
            remote_record_id,
            last_modified_ms: now_ms,
        }
    }

    pub fn schema(&self) -> &'static SectionSchema {
        self.key.section.schema()
    }

    /// True once any field or asset holds something. Pending deletions alone
    /// do not count.
    pub fn has_content(&self) -> bool {
        self.data.has_content()
    }

    pub fn entry_count(&self) -> usize {
        self.data.entries().len()
    }

    /// Digest over everything persisted except the modification time.
    pub fn snapshot(&self) -> Result<Snapshot, CoreError> {
        let bytes = rmp_serde::to_vec(&(
            &self.key,
            &self.data,
            &self.pending_deletions,
            &self.remote_record_id,
        ))
        .map_err(|e| CoreError::Serialization(e.to_string()))?;
        Ok(Snapshot(*blake3::hash(&bytes).as_bytes()))
    }

    pub fn to_json(&self) -> Result<String, CoreError> {
        serde_json::to_string(self).map_err(|e| CoreError::Serialization(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        let mut draft: Self =
            serde_json::from_str(json).map_err(|e| CoreError::Serialization(e.to_string()))?;
        let schema = draft.key.section.schema();
        draft.data.ensure_entry(schema);
        Ok(draft)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> DraftKey {
        DraftKey::new("veh-1", SectionKind::Defects)
    }

    #[test]
    fn blank_repeatable_section_has_one_entry() {
        let draft = SectionDraft::blank(key(), 10);
        assert_eq!(draft.entry_count(), 1);
        assert!(!draft.has_content());
    }

    #[test]
    fn from_remote_restores_entry_invariant() {
        let draft = SectionDraft::from_remote(key(), SectionData::Entries(vec![]), None, 10);
        assert_eq!(draft.entry_count(), 1);
    }

    #[test]
    fn snapshot_ignores_timestamp() {
        let a = SectionDraft::blank(key(), 10);
        let mut b = a.clone();
        b.last_modified_ms = 99;
        assert_eq!(a.snapshot().unwrap(), b.snapshot().unwrap());

        b.pending_deletions.insert("https://cdn.example.com/x.jpg".into());
        assert_ne!(a.snapshot().unwrap(), b.snapshot().unwrap());
    }

    #[test]
    fn snapshot_tracks_field_edits() {
        let a = SectionDraft::blank(DraftKey::new("veh-1", SectionKind::Engine), 10);
        let mut b = a.clone();
        if let SectionData::Form(fields) = &mut b.data {
            fields.insert("remarks".into(), FieldValue::Text("noisy".into()));
        }
        assert!(b.has_content());
        assert_ne!(a.snapshot().unwrap(), b.snapshot().unwrap());
    }

    #[test]
    fn json_roundtrip_keeps_assets() {
        let mut draft = SectionDraft::blank(key(), 10);
        draft.data.entries_mut()[0].insert(
            "image".into(),
            FieldValue::Asset(Some(AssetRef::Remote("https://cdn.example.com/d.jpg".into()))),
        );
        let json = draft.to_json().unwrap();
        let back = SectionDraft::from_json(&json).unwrap();
        assert_eq!(back, draft);
        assert_eq!(back.data.assets().count(), 1);
    }
}
