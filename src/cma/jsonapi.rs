//! JSON:API document conversion.
//!
//! The CMA speaks JSON:API (`{data: {id, type, attributes, relationships}}`)
//! while tools work with flat entities (`{id, type, ...attributes,
//! ...relationships}`). These helpers convert in both directions.

use serde_json::{Map, Value, json};

/// Keys that sit beside `attributes` rather than inside them.
const ENVELOPE_KEYS: [&str; 3] = ["id", "type", "meta"];

/// Wrap a flat entity into a JSON:API request document.
///
/// Values shaped like resource linkage (`{"type": .., "id": ..}` or a
/// non-empty array of those) are moved to `relationships`; `id` and `meta` stay at the top level; the rest
/// becomes `attributes`.
#[must_use]
pub fn serialize(kind: &str, entity: &Value) -> Value {
    let mut attributes = Map::new();
    let mut relationships = Map::new();
    let mut resource = Map::new();
    resource.insert("type".to_string(), Value::String(kind.to_string()));

    if let Value::Object(map) = entity {
        for (key, value) in map {
            match key.as_str() {
                "id" => {
                    resource.insert("id".to_string(), value.clone());
                }
                "meta" => {
                    resource.insert("meta".to_string(), value.clone());
                }
                "type" => {}
                _ if is_linkage(value) => {
                    relationships.insert(key.clone(), json!({ "data": value }));
                }
                _ => {
                    attributes.insert(key.clone(), value.clone());
                }
            }
        }
    }

    if !attributes.is_empty() {
        resource.insert("attributes".to_string(), Value::Object(attributes));
    }
    if !relationships.is_empty() {
        resource.insert("relationships".to_string(), Value::Object(relationships));
    }

    json!({ "data": Value::Object(resource) })
}

/// Flatten the `data` member of a JSON:API response document.
///
/// Returns `Value::Null` when the document has no data, an array when `data`
/// is an array, and a flat object otherwise.
#[must_use]
pub fn deserialize(document: &Value) -> Value {
    match document.get("data") {
        Some(Value::Array(items)) => Value::Array(items.iter().map(flatten).collect()),
        Some(Value::Object(_)) => flatten(&document["data"]),
        _ => Value::Null,
    }
}

/// Flatten a single JSON:API resource object.
#[must_use]
pub fn flatten(resource: &Value) -> Value {
    let Value::Object(obj) = resource else {
        return resource.clone();
    };

    let mut out = Map::new();
    for key in ENVELOPE_KEYS {
        if let Some(v) = obj.get(key) {
            out.insert(key.to_string(), v.clone());
        }
    }
    if let Some(Value::Object(attrs)) = obj.get("attributes") {
        for (k, v) in attrs {
            out.insert(k.clone(), v.clone());
        }
    }
    if let Some(Value::Object(rels)) = obj.get("relationships") {
        for (k, v) in rels {
            out.insert(k.clone(), v.get("data").cloned().unwrap_or(Value::Null));
        }
    }
    Value::Object(out)
}

/// Resource linkage `{"type": kind, "id": id}`.
#[must_use]
pub fn linkage(kind: &str, id: &str) -> Value {
    json!({ "type": kind, "id": id })
}

/// Read `meta.total_count` from a list response.
#[must_use]
pub fn total_count(document: &Value) -> Option<u64> {
    document
        .get("meta")
        .and_then(|m| m.get("total_count"))
        .and_then(Value::as_u64)
}

fn is_linkage(value: &Value) -> bool {
    match value {
        Value::Object(map) => {
            map.len() == 2
                && map.get("type").is_some_and(Value::is_string)
                && map.get("id").is_some_and(Value::is_string)
        }
        Value::Array(items) => !items.is_empty() && items.iter().all(is_linkage),
        _ => false,
    }
}
