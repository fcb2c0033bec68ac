//! Shapes of the remote store's JSON responses.
//!
//! Envelopes have drifted between deployments, so items, totals and ids are
//! located through the same alias lookup used for record fields.

use std::collections::BTreeMap;

use inspectsync_core::alias::resolve;
use inspectsync_core::asset::is_remote_uri;
use inspectsync_core::{RecordId, RemoteRecord};
use inspectsync_engine::{Page, SubmitReceipt, TransportError};
use serde_json::Value;

const ITEM_KEYS: &[&str] = &["data", "items", "results"];
const TOTAL_KEYS: &[&str] = &["total", "count", "totalCount"];
const ENVELOPE_KEY: &str = "data";
const UPLOADS_KEYS: &[&str] = &["uploads", "uploaded", "files", "assets"];
const PART_NAME_KEYS: &[&str] = &["part", "partName", "name", "fieldname"];
const URL_KEYS: &[&str] = &["url", "location", "uri"];

fn hosted_url(value: &Value) -> Option<String> {
    let url = match value {
        Value::String(s) => s.trim(),
        Value::Object(_) => resolve(value, URL_KEYS).and_then(Value::as_str)?.trim(),
        _ => return None,
    };
    is_remote_uri(url).then(|| url.to_string())
}

/// Hosted URL per uploaded part. Accepts a `{part: url}` map or a list of
/// `{part, url}` objects; anything unrecognizable is skipped.
fn parse_uploaded(record: &Value) -> BTreeMap<String, String> {
    match resolve(record, UPLOADS_KEYS) {
        Some(Value::Object(map)) => map
            .iter()
            .filter_map(|(part, value)| Some((part.clone(), hosted_url(value)?)))
            .collect(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| {
                let part = resolve(item, PART_NAME_KEYS).and_then(Value::as_str)?;
                Some((part.to_string(), hosted_url(item)?))
            })
            .collect(),
        _ => BTreeMap::new(),
    }
}

fn parse_total(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// One page of a collection response.
pub fn parse_page(body: Value) -> Result<Page, TransportError> {
    match body {
        Value::Array(items) => Ok(Page { items, total: None }),
        Value::Object(_) => {
            let items = resolve(&body, ITEM_KEYS)
                .and_then(Value::as_array)
                .cloned()
                .ok_or_else(|| {
                    TransportError::InvalidResponse("collection response has no item array".into())
                })?;
            let total = resolve(&body, TOTAL_KEYS).and_then(parse_total);
            Ok(Page { items, total })
        }
        other => Err(TransportError::InvalidResponse(format!(
            "collection response is neither array nor object: {other}"
        ))),
    }
}

/// Strip the optional `data` envelope around a detail record.
pub fn parse_record(body: Value) -> RemoteRecord {
    match body {
        Value::Object(mut object) if object.get(ENVELOPE_KEY).is_some_and(Value::is_object) => {
            let inner = object.remove(ENVELOPE_KEY).unwrap_or(Value::Null);
            RemoteRecord::new(inner)
        }
        other => RemoteRecord::new(other),
    }
}

/// Record id from a write response. Servers that answer an update with an
/// empty body keep the id the draft already had.
pub fn parse_receipt(
    body: Value,
    known: Option<&RecordId>,
) -> Result<SubmitReceipt, TransportError> {
    let record = parse_record(body);
    let record_id = record.record_id().or_else(|| known.cloned()).ok_or_else(|| {
        TransportError::InvalidResponse("write response carries no record id".into())
    })?;
    Ok(SubmitReceipt {
        record_id,
        uploaded: parse_uploaded(record.as_value()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn root_array_page_has_no_total() {
        let page = parse_page(json!([{ "id": 1 }, { "id": 2 }])).unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.total, None);
    }

    #[test]
    fn enveloped_page_reads_items_and_total() {
        let page = parse_page(json!({ "results": [{ "id": 1 }], "totalCount": 60 })).unwrap();
        assert_eq!(page.items, vec![json!({ "id": 1 })]);
        assert_eq!(page.total, Some(60));

        let page = parse_page(json!({ "data": [], "count": "12" })).unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.total, Some(12));
    }

    #[test]
    fn unusable_total_is_ignored() {
        let page = parse_page(json!({ "items": [1], "total": "many" })).unwrap();
        assert_eq!(page.total, None);
    }

    #[test]
    fn page_without_items_is_invalid() {
        assert!(matches!(
            parse_page(json!({ "total": 3 })),
            Err(TransportError::InvalidResponse(_))
        ));
        assert!(parse_page(json!("nope")).is_err());
    }

    #[test]
    fn record_envelope_is_optional() {
        let wrapped = parse_record(json!({ "data": { "_id": "rec-1" } }));
        assert_eq!(wrapped.record_id(), Some(RecordId::from("rec-1")));

        let bare = parse_record(json!({ "id": "rec-2", "data": "not an envelope" }));
        assert_eq!(bare.record_id(), Some(RecordId::from("rec-2")));
    }

    #[test]
    fn receipt_falls_back_to_known_id() {
        let fresh = parse_receipt(json!({ "reportId": 7 }), None).unwrap();
        assert_eq!(fresh.record_id, RecordId::from("7"));

        let known = RecordId::from("rec-9");
        let kept = parse_receipt(json!({}), Some(&known)).unwrap();
        assert_eq!(kept.record_id, known);

        assert!(parse_receipt(Value::Null, None).is_err());
    }

    #[test]
    fn receipt_maps_parts_to_hosted_urls() {
        let receipt = parse_receipt(
            json!({ "data": {
                "_id": "rec-1",
                "uploads": {
                    "engineImage_0": "https://cdn.example.com/e.jpg",
                    "defectImage_0": { "url": "https://cdn.example.com/d.jpg" },
                    "defectImage_1": "file:///not/hosted.jpg",
                },
            }}),
            None,
        )
        .unwrap();
        assert_eq!(receipt.uploaded.len(), 2);
        assert_eq!(receipt.uploaded["engineImage_0"], "https://cdn.example.com/e.jpg");
        assert_eq!(receipt.uploaded["defectImage_0"], "https://cdn.example.com/d.jpg");

        let listed = parse_receipt(
            json!({
                "id": "rec-2",
                "files": [
                    { "fieldname": "chassisImage_0", "location": "https://cdn.example.com/c.jpg" },
                    { "fieldname": "broken" },
                ],
            }),
            None,
        )
        .unwrap();
        assert_eq!(listed.uploaded.len(), 1);
        assert_eq!(listed.uploaded["chassisImage_0"], "https://cdn.example.com/c.jpg");
    }
}
