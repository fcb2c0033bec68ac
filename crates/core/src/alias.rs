//! Tolerant lookup of remote field spellings.
//!
//! The remote store has renamed keys across releases without versioning,
//! so every lookup goes through an ordered alias list: exact spellings first,
//! then a case- and whitespace-insensitive pass. Nothing in here fails on an
//! unexpected shape; missing or mistyped values resolve to `None`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::asset::AssetRef;
use crate::draft::{FieldMap, SectionData};
use crate::field_value::FieldValue;
use crate::ids::RecordId;
use crate::schema::{FieldKind, SectionSchema};

const RECORD_ID_KEYS: &[&str] = &["_id", "id", "recordId", "reportId"];
const NESTED_URL_KEYS: &[&str] = &["url", "uri", "path"];

/// Case-folded key with all whitespace removed.
pub fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// First non-null value under any of `aliases`, trying exact spellings in
/// order before falling back to normalized comparison.
pub fn resolve<'a>(fragment: &'a Value, aliases: &[&str]) -> Option<&'a Value> {
    let object = fragment.as_object()?;

    for alias in aliases {
        if let Some(value) = object.get(*alias)
            && !value.is_null()
        {
            return Some(value);
        }
    }

    for alias in aliases {
        let wanted = normalize_key(alias);
        let found = object
            .iter()
            .find(|(key, value)| !value.is_null() && normalize_key(key) == wanted);
        if let Some((_, value)) = found {
            return Some(value);
        }
    }

    None
}

fn coerce_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(FieldValue::yes_no_str(Some(*b)).to_string()),
        _ => None,
    }
}

fn coerce_yes_no(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_i64() {
            Some(1) => Some(true),
            Some(0) => Some(false),
            _ => None,
        },
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "yes" | "y" | "true" | "1" => Some(true),
            "no" | "n" | "false" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn coerce_asset(value: &Value) -> Option<AssetRef> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(AssetRef::from_uri(s.as_str())),
        Value::Object(_) => resolve(value, NESTED_URL_KEYS).and_then(coerce_asset),
        Value::Array(items) => items.iter().find_map(coerce_asset),
        _ => None,
    }
}

/// Canonical value for one field, or the kind's empty value.
pub fn coerce(kind: FieldKind, value: Option<&Value>) -> FieldValue {
    match kind {
        FieldKind::Text => FieldValue::Text(value.and_then(coerce_text).unwrap_or_default()),
        FieldKind::YesNo => FieldValue::YesNo(value.and_then(coerce_yes_no)),
        FieldKind::Asset => FieldValue::Asset(value.and_then(coerce_asset)),
    }
}

fn project_entry(fragment: &Value, schema: &SectionSchema) -> FieldMap {
    schema
        .fields
        .iter()
        .map(|field| {
            let value = coerce(field.kind, resolve(fragment, field.aliases));
            (field.name.to_string(), value)
        })
        .collect()
}

/// The raw, denormalized record for one entity as returned by the detail
/// endpoint. Never mutated after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteRecord(Value);

impl RemoteRecord {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn record_id(&self) -> Option<RecordId> {
        resolve(&self.0, RECORD_ID_KEYS)
            .and_then(coerce_text)
            .filter(|id| !id.is_empty())
            .map(RecordId::from)
    }

    /// Normalized view of one section, or `None` when the record carries
    /// nothing recognizable for it.
    pub fn project(&self, schema: &SectionSchema) -> Option<SectionData> {
        // Field aliases are only ever matched inside the section fragment.
        // Top-level keys belong to the inspection as a whole.
        let fragment = resolve(&self.0, schema.section_keys)?;

        if schema.repeatable {
            let entries = match fragment {
                Value::Array(items) => items
                    .iter()
                    .filter(|item| item.is_object())
                    .map(|item| project_entry(item, schema))
                    .collect(),
                Value::Object(_) => vec![project_entry(fragment, schema)],
                _ => Vec::new(),
            };
            let mut data = SectionData::Entries(entries);
            data.ensure_entry(schema);
            Some(data)
        } else {
            Some(SectionData::Form(project_entry(fragment, schema)))
        }
    }
}
