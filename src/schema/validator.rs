//! Strict JSON Schema validator for tool arguments.
//!
//! Validates LLM-supplied arguments against a registered schema before any
//! API request is made, and produces messages that tell the model exactly
//! which field is wrong and what is accepted.
//!
//! # Validation steps (per object, in order)
//!
//! 1. **Required parameters** – every name listed under `required:` must be
//!    present and non-null.
//! 2. **Unknown parameters** – keys not listed under `properties:` are
//!    rejected unless `additionalProperties` allows them.
//! 3. **Type validation with coercion** – `"123"` → `123` for `integer` /
//!    `number`, `"true"` / `"false"` → booleans.
//! 4. **Enum values**, numeric `minimum` / `maximum`, string `minLength` /
//!    `maxLength`, `format: date-time`, array `minItems` / `maxItems`.
//! 5. **Nesting** – `properties` of nested objects and `items` of arrays are
//!    validated recursively; violations carry dotted / indexed paths
//!    (`page.limit`, `ids[2]`).

use serde::Serialize;
use serde_json::{Map, Value};

/// A single validation violation with a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    /// Path of the offending field (empty for top-level issues)
    pub path: String,
    /// What is wrong with it
    pub message: String,
}

impl Violation {
    /// Create a violation
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// The result of validating arguments against a schema.
#[derive(Debug, Clone)]
pub struct ValidationOutcome {
    /// All violations found. Empty means the arguments are valid.
    pub violations: Vec<Violation>,
    /// Arguments after safe type coercions have been applied.
    pub coerced: Value,
}

impl ValidationOutcome {
    /// Returns `true` if there are no violations.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }
}

// ── Public entry point ────────────────────────────────────────────────────────

/// Validate `arguments` against `schema`.
///
/// `Value::Null` or an empty object as the schema accepts any object.
#[must_use]
pub fn validate(arguments: &Value, schema: &Value) -> ValidationOutcome {
    if schema.is_null() || schema == &Value::Object(Map::new()) {
        return ValidationOutcome {
            violations: Vec::new(),
            coerced: arguments.clone(),
        };
    }

    // Normalise arguments to an object; null / missing → treat as empty object.
    let arg_map = match arguments {
        Value::Object(m) => m.clone(),
        Value::Null => Map::new(),
        _ => {
            return ValidationOutcome {
                violations: vec![Violation::new("", "Arguments must be a JSON object")],
                coerced: arguments.clone(),
            };
        }
    };

    let mut violations = Vec::new();
    let coerced = validate_object("", &arg_map, schema, &mut violations);

    // If there are violations keep the original args (they'll be rejected).
    let coerced = if violations.is_empty() {
        coerced
    } else {
        arguments.clone()
    };

    ValidationOutcome { violations, coerced }
}

// ── Object validation ─────────────────────────────────────────────────────────

fn validate_object(
    path: &str,
    arg_map: &Map<String, Value>,
    schema: &Value,
    violations: &mut Vec<Violation>,
) -> Value {
    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        // Free-form object.
        return Value::Object(arg_map.clone());
    };

    let before = violations.len();

    // Step 1 – required parameters.
    let required = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(Value::as_str).collect::<Vec<_>>())
        .unwrap_or_default();
    for name in required {
        match arg_map.get(name) {
            None => violations.push(Violation::new(
                join(path, name),
                "required parameter is missing",
            )),
            Some(Value::Null) => violations.push(Violation::new(
                join(path, name),
                "required parameter must not be null",
            )),
            _ => {}
        }
    }

    // Step 2 – unknown parameters.
    let additional_allowed = !matches!(schema.get("additionalProperties"), None | Some(Value::Bool(false)));
    if !additional_allowed {
        for key in arg_map.keys() {
            if !properties.contains_key(key.as_str()) {
                let known: Vec<&str> = properties.keys().map(String::as_str).collect();
                violations.push(Violation::new(
                    join(path, key),
                    format!(
                        "unknown parameter; valid parameters are: {}",
                        known.join(", ")
                    ),
                ));
            }
        }
    }

    // Early exit: don't clutter the message with cascading type errors.
    if violations.len() > before {
        return Value::Object(arg_map.clone());
    }

    // Steps 3-5 – per-property validation.
    let mut coerced_map = Map::new();
    for (key, raw_value) in arg_map {
        let Some(prop_schema) = properties.get(key) else {
            coerced_map.insert(key.clone(), raw_value.clone());
            continue;
        };
        if raw_value.is_null() {
            // Null is acceptable for optional params.
            continue;
        }
        let coerced = validate_property(&join(path, key), raw_value, prop_schema, violations);
        coerced_map.insert(key.clone(), coerced);
    }

    Value::Object(coerced_map)
}

// ── Per-property validation ───────────────────────────────────────────────────

fn validate_property(
    path: &str,
    value: &Value,
    prop_schema: &Value,
    violations: &mut Vec<Violation>,
) -> Value {
    let declared_type = prop_schema.get("type").and_then(Value::as_str);

    // Attempt coercion first; use the coerced value for subsequent checks.
    let coerced = match declared_type.map(|ty| try_coerce(value, ty)) {
        Some(Ok(v)) => v,
        Some(Err(msg)) => {
            violations.push(Violation::new(path, msg));
            return value.clone();
        }
        None => value.clone(),
    };

    if let Some(enum_values) = prop_schema.get("enum").and_then(Value::as_array) {
        if !enum_values.contains(&coerced) {
            let options: Vec<String> = enum_values.iter().map(value_to_display_string).collect();
            violations.push(Violation::new(
                path,
                format!("must be one of: {}", options.join(", ")),
            ));
        }
    }

    if let Some(num) = coerced.as_f64() {
        if let Some(min) = prop_schema.get("minimum").and_then(Value::as_f64) {
            if num < min {
                violations.push(Violation::new(path, format!("must be >= {min}")));
            }
        }
        if let Some(max) = prop_schema.get("maximum").and_then(Value::as_f64) {
            if num > max {
                violations.push(Violation::new(path, format!("must be <= {max}")));
            }
        }
    }

    if let Some(s) = coerced.as_str() {
        check_string(path, s, prop_schema, violations);
    }

    match coerced {
        Value::Array(items) => Value::Array(check_array(path, &items, prop_schema, violations)),
        Value::Object(map) => validate_object(path, &map, prop_schema, violations),
        other => other,
    }
}

fn check_string(path: &str, s: &str, prop_schema: &Value, violations: &mut Vec<Violation>) {
    let len = s.chars().count() as u64;
    if let Some(min_len) = prop_schema.get("minLength").and_then(Value::as_u64) {
        if len < min_len {
            let msg = if min_len == 1 {
                "must not be empty".to_string()
            } else {
                format!("must be at least {min_len} characters long")
            };
            violations.push(Violation::new(path, msg));
        }
    }
    if let Some(max_len) = prop_schema.get("maxLength").and_then(Value::as_u64) {
        if len > max_len {
            violations.push(Violation::new(
                path,
                format!("must be at most {max_len} characters long"),
            ));
        }
    }
    if prop_schema.get("format").and_then(Value::as_str) == Some("date-time")
        && chrono::DateTime::parse_from_rfc3339(s).is_err()
    {
        violations.push(Violation::new(
            path,
            format!("expected an ISO 8601 date-time (e.g. 2026-01-31T09:00:00Z), got \"{s}\""),
        ));
    }
}

fn check_array(
    path: &str,
    items: &[Value],
    prop_schema: &Value,
    violations: &mut Vec<Violation>,
) -> Vec<Value> {
    let len = items.len() as u64;
    if let Some(min) = prop_schema.get("minItems").and_then(Value::as_u64) {
        if len < min {
            violations.push(Violation::new(path, format!("must contain at least {min} item(s)")));
        }
    }
    if let Some(max) = prop_schema.get("maxItems").and_then(Value::as_u64) {
        if len > max {
            violations.push(Violation::new(path, format!("must contain at most {max} item(s)")));
        }
    }

    let Some(item_schema) = prop_schema.get("items") else {
        return items.to_vec();
    };
    items
        .iter()
        .enumerate()
        .map(|(i, item)| validate_property(&format!("{path}[{i}]"), item, item_schema, violations))
        .collect()
}

// ── Type coercion ─────────────────────────────────────────────────────────────

/// Attempt to coerce `value` to the declared JSON Schema `type`.
fn try_coerce(value: &Value, declared_type: &str) -> Result<Value, String> {
    match declared_type {
        "string" => coerce_to_string(value),
        "integer" => coerce_to_integer(value),
        "number" => coerce_to_number(value),
        "boolean" => coerce_to_boolean(value),
        "array" => match value {
            Value::Array(_) => Ok(value.clone()),
            _ => Err(format!("expected array, got {}", json_type_name(value))),
        },
        "object" => match value {
            Value::Object(_) => Ok(value.clone()),
            _ => Err(format!("expected object, got {}", json_type_name(value))),
        },
        _ => Ok(value.clone()),
    }
}

fn coerce_to_string(value: &Value) -> Result<Value, String> {
    match value {
        Value::String(_) => Ok(value.clone()),
        Value::Number(n) => Ok(Value::String(n.to_string())),
        _ => Err(format!("expected string, got {}", json_type_name(value))),
    }
}

fn coerce_to_integer(value: &Value) -> Result<Value, String> {
    match value {
        Value::Number(n) if n.is_i64() || n.is_u64() => Ok(value.clone()),
        Value::Number(n) => {
            // Float with no fractional part → integer.
            if let Some(f) = n.as_f64() {
                if f.fract() == 0.0 {
                    #[allow(clippy::cast_possible_truncation)]
                    return Ok(Value::Number((f as i64).into()));
                }
            }
            Err(format!("expected integer, got float {n}"))
        }
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map(|i| Value::Number(i.into()))
            .map_err(|_| format!("expected integer, got string \"{s}\"")),
        _ => Err(format!("expected integer, got {}", json_type_name(value))),
    }
}

fn coerce_to_number(value: &Value) -> Result<Value, String> {
    match value {
        Value::Number(_) => Ok(value.clone()),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(|f| serde_json::Number::from_f64(f).map(Value::Number))
            .ok_or_else(|| format!("expected number, got string \"{s}\"")),
        _ => Err(format!("expected number, got {}", json_type_name(value))),
    }
}

fn coerce_to_boolean(value: &Value) -> Result<Value, String> {
    match value {
        Value::Bool(_) => Ok(value.clone()),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(Value::Bool(true)),
            "false" | "0" | "no" => Ok(Value::Bool(false)),
            _ => Err(format!("expected boolean, got string \"{s}\"; use true or false")),
        },
        _ => Err(format!("expected boolean, got {}", json_type_name(value))),
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn join(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn value_to_display_string(v: &Value) -> String {
    match v {
        Value::String(s) => format!("\"{s}\""),
        _ => v.to_string(),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
