//! Schema and payload helpers shared by the resource routers

use serde_json::{Map, Value, json};

use crate::cma::jsonapi;
use crate::handler::ValidatedArgs;

/// Wrap `properties` into an object schema that also accepts the
/// credential fields every action carries.
pub fn args_schema(properties: Value, required: &[&str]) -> Value {
    let mut props = match properties {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    props.insert(
        "apiToken".into(),
        json!({ "type": "string", "minLength": 1, "description": "DatoCMS API token" }),
    );
    props.insert(
        "environment".into(),
        json!({ "type": "string", "description": "Environment name; omit for the primary environment" }),
    );

    let mut req = vec!["apiToken"];
    req.extend_from_slice(required);
    json!({
        "type": "object",
        "properties": props,
        "required": req,
        "additionalProperties": false
    })
}

/// Non-empty string
pub fn id(description: &str) -> Value {
    json!({ "type": "string", "minLength": 1, "description": description })
}

/// Any string
pub fn string(description: &str) -> Value {
    json!({ "type": "string", "description": description })
}

/// Boolean
pub fn boolean(description: &str) -> Value {
    json!({ "type": "boolean", "description": description })
}

/// Integer
pub fn integer(description: &str) -> Value {
    json!({ "type": "integer", "description": description })
}

/// Free-form object
pub fn object(description: &str) -> Value {
    json!({ "type": "object", "description": description })
}

/// Array of non-empty strings
pub fn strings(description: &str) -> Value {
    json!({ "type": "array", "items": { "type": "string", "minLength": 1 }, "description": description })
}

/// `{limit, offset}` with the API's 500 page size limit
pub fn page() -> Value {
    json!({
        "type": "object",
        "properties": {
            "limit": { "type": "integer", "minimum": 1, "maximum": 500 },
            "offset": { "type": "integer", "minimum": 0 }
        },
        "description": "Pagination"
    })
}

/// `page[limit]` / `page[offset]` query pairs from the `page` argument
pub fn page_query(args: &ValidatedArgs) -> Vec<(String, String)> {
    let mut query = Vec::new();
    if let Some(page) = args.get("page") {
        for key in ["limit", "offset"] {
            if let Some(n) = page.get(key).and_then(Value::as_u64) {
                query.push((format!("page[{key}]"), n.to_string()));
            }
        }
    }
    query
}

/// The validated arguments minus `exclude`, with camelCase keys turned
/// into the API's snake_case attribute names.
pub fn attributes(args: &ValidatedArgs, exclude: &[&str]) -> Value {
    let Value::Object(map) = args.payload(exclude) else {
        return Value::Object(Map::new());
    };
    Value::Object(map.into_iter().map(|(k, v)| (snake_case(&k), v)).collect())
}

/// Add a relationship linkage to an entity payload when `args[arg]` is set
pub fn link(entity: &mut Value, args: &ValidatedArgs, arg: &str, name: &str, kind: &str) {
    if let (Some(id), Value::Object(map)) = (args.str(arg), entity) {
        map.insert(name.to_string(), jsonapi::linkage(kind, id));
    }
}

/// `apiKey` → `api_key`
pub fn snake_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for c in key.chars() {
        if c.is_ascii_uppercase() {
            out.push('_');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}
