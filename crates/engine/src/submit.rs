//! Validation and payload construction for a section submission.

use std::collections::BTreeMap;

use inspectsync_core::asset::is_remote_uri;
use inspectsync_core::{
    AssetRef, FieldMap, FieldValue, RecordId, SectionDraft, SectionSchema, SubmissionId,
};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::transport::{Submission, UploadPart};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{label} is required{}", entry_suffix(.entry))]
pub struct ValidationError {
    pub field: &'static str,
    pub label: &'static str,
    /// Zero-based position on screen, for repeatable sections.
    pub entry: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Submitted {
        record_id: RecordId,
        submission_id: SubmissionId,
    },
    /// Another submission of the same section was still in flight.
    Ignored,
}

fn entry_suffix(entry: &Option<usize>) -> String {
    match entry {
        Some(index) => format!(" (entry {})", index + 1),
        None => String::new(),
    }
}

fn is_blank(entry: &FieldMap) -> bool {
    entry.values().all(FieldValue::is_empty)
}

fn missing_required(schema: &SectionSchema, entry: &FieldMap) -> Option<&'static str> {
    schema
        .fields
        .iter()
        .filter(|f| f.required)
        .find(|f| entry.get(f.name).is_none_or(FieldValue::is_empty))
        .map(|f| f.name)
}

/// Whether `entry` is an add/remove placeholder that is left out of the
/// submission. A repeatable section with nothing but placeholders still
/// has its first entry checked.
fn skipped(schema: &SectionSchema, entries: &[FieldMap], entry: &FieldMap) -> bool {
    schema.repeatable && is_blank(entry) && entries.iter().any(|e| !is_blank(e))
}

/// Entries that will actually be sent, with their position in the draft.
fn submitted_entries(draft: &SectionDraft) -> Vec<(usize, &FieldMap)> {
    let schema = draft.schema();
    let entries = draft.data.entries();
    entries
        .iter()
        .enumerate()
        .filter(|(_, entry)| !skipped(schema, entries, entry))
        .collect()
}

/// Fail on the first required field left empty, in schema order.
pub fn validate(draft: &SectionDraft) -> Result<(), ValidationError> {
    let schema = draft.schema();
    let entries = draft.data.entries();
    for (index, entry) in entries.iter().enumerate() {
        if skipped(schema, entries, entry) {
            continue;
        }
        if let Some(name) = missing_required(schema, entry) {
            let label = schema.field(name).map(|f| f.label).unwrap_or(name);
            return Err(ValidationError {
                field: name,
                label,
                entry: schema.repeatable.then_some(index),
            });
        }
    }
    Ok(())
}

/// Multipart part name for a captured file: `{role}_{index}`.
pub fn part_name(role: &str, index: usize) -> String {
    format!("{role}_{index}")
}

fn report_value(value: &FieldValue) -> Value {
    match value {
        FieldValue::Text(s) => Value::String(s.clone()),
        FieldValue::YesNo(choice) => Value::String(FieldValue::yes_no_str(*choice).to_string()),
        FieldValue::Asset(Some(AssetRef::Remote(url))) => Value::String(url.clone()),
        // Travels as a binary part instead.
        FieldValue::Asset(Some(AssetRef::Local(_))) => Value::Null,
        FieldValue::Asset(None) => Value::String(String::new()),
    }
}

/// `ordinal` numbers the part among submitted entries; `position` is where
/// the entry sits in the draft.
fn report_entry(
    schema: &SectionSchema,
    entry: &FieldMap,
    ordinal: usize,
    position: usize,
    uploads: &mut Vec<UploadPart>,
) -> Value {
    let mut object = Map::new();
    for field in schema.fields {
        let value = entry
            .get(field.name)
            .cloned()
            .unwrap_or_else(|| FieldValue::empty(field.kind));
        if let (Some(role), Some(AssetRef::Local(uri))) = (field.upload_role, value.as_asset()) {
            uploads.push(UploadPart {
                part_name: part_name(role, ordinal),
                field: field.name.to_string(),
                entry_index: position,
                uri: uri.clone(),
            });
        }
        object.insert(field.name.to_string(), report_value(&value));
    }
    Value::Object(object)
}

/// Build the write request for a validated draft.
pub fn build_submission(draft: &SectionDraft, submission_id: SubmissionId) -> Submission {
    let schema = draft.schema();
    let mut uploads = Vec::new();
    let entries: Vec<Value> = submitted_entries(draft)
        .into_iter()
        .enumerate()
        .map(|(ordinal, (position, entry))| {
            report_entry(schema, entry, ordinal, position, &mut uploads)
        })
        .collect();

    let mut report = Map::new();
    report.insert("section".into(), Value::String(draft.key.section.as_str().into()));
    if let Some(record_id) = &draft.remote_record_id {
        report.insert("recordId".into(), Value::String(record_id.to_string()));
    }
    if schema.repeatable {
        report.insert("entries".into(), Value::Array(entries));
    } else if let Some(Value::Object(fields)) = entries.into_iter().next() {
        report.insert("fields".into(), Value::Object(fields));
    }

    Submission {
        submission_id,
        key: draft.key.clone(),
        record_id: draft.remote_record_id.clone(),
        report: Value::Object(report),
        deleted_assets: draft.pending_deletions.iter().cloned().collect(),
        uploads,
    }
}

/// Swap each uploaded local reference for its hosted URL. A slot edited
/// while the upload was on the wire keeps the edit, and the orphaned upload
/// is queued for deletion instead. Returns how many slots were promoted.
pub fn apply_uploads(
    draft: &mut SectionDraft,
    uploads: &[UploadPart],
    uploaded: &BTreeMap<String, String>,
) -> usize {
    let mut promoted = 0;
    for upload in uploads {
        let Some(url) = uploaded.get(&upload.part_name) else {
            continue;
        };
        if !is_remote_uri(url) {
            continue;
        }
        let slot = draft
            .data
            .entries_mut()
            .get_mut(upload.entry_index)
            .and_then(|entry| entry.get_mut(&upload.field));
        match slot {
            Some(FieldValue::Asset(Some(asset)))
                if asset.is_local() && asset.uri() == upload.uri =>
            {
                *asset = AssetRef::Remote(url.clone());
                promoted += 1;
            }
            _ => {
                draft.pending_deletions.insert(url.clone());
            }
        }
    }
    promoted
}
