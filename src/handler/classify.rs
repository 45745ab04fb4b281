//! Error taxonomy: every failure that reaches a caller carries exactly one
//! [`ErrorKind`].
//!
//! Structured fields win over message heuristics. Among structured fields
//! the API error code is checked before the HTTP status, because DatoCMS
//! reports `STALE_ITEM_VERSION` with a 422 status.

use std::fmt;

use serde::Serialize;
use serde_json::Value;

use crate::Error;
use crate::cma::UpstreamError;
use crate::schema::Violation;

/// The closed set of error kinds surfaced to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Missing or insufficient credentials
    Authorization,
    /// The addressed entity does not exist
    NotFound,
    /// The request was rejected as invalid
    Validation,
    /// Optimistic locking failed
    VersionConflict,
    /// Anything else
    Generic,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Authorization => "authorization",
            Self::NotFound => "not_found",
            Self::Validation => "validation",
            Self::VersionConflict => "version_conflict",
            Self::Generic => "generic",
        };
        f.write_str(s)
    }
}

// Checked in this order; the first match wins.
const CODES: &[(ErrorKind, &[&str])] = &[
    (
        ErrorKind::Authorization,
        &["UNAUTHORIZED", "INVALID_AUTHORIZATION_HEADER", "INSUFFICIENT_PERMISSIONS"],
    ),
    (ErrorKind::NotFound, &["RECORD_NOT_FOUND", "NOT_FOUND"]),
    (ErrorKind::Validation, &["VALIDATION_ERROR", "INVALID_FIELD"]),
    (ErrorKind::VersionConflict, &["STALE_ITEM_VERSION"]),
];

const STATUSES: &[(ErrorKind, u16)] = &[
    (ErrorKind::Authorization, 401),
    (ErrorKind::NotFound, 404),
    (ErrorKind::Validation, 422),
];

const HEURISTICS: &[(ErrorKind, &[&str])] = &[
    (ErrorKind::Authorization, &["401", "unauthorized"]),
    (ErrorKind::NotFound, &["404", "not found"]),
    (ErrorKind::Validation, &["422", "validation"]),
    (ErrorKind::VersionConflict, &["version conflict", "stale_item_version"]),
];

/// A classified error ready for the response boundary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedError {
    /// The one kind this error belongs to
    pub kind: ErrorKind,
    /// Human-readable message
    pub message: String,
    /// Field-level failures; non-empty exactly when `kind` is `Validation`
    pub violations: Vec<Violation>,
}

impl ClassifiedError {
    /// Rewrite a not-found message to name the entity and id the caller asked for.
    ///
    /// No-op for other kinds.
    #[must_use]
    pub fn with_subject(mut self, entity: &str, id: &str) -> Self {
        if self.kind == ErrorKind::NotFound && !self.message.contains(id) {
            self.message = Error::not_found(entity, id).to_string();
        }
        self
    }
}

/// Classify an error. Pure: the same error always yields the same kind.
#[must_use]
pub fn classify(error: &Error) -> ClassifiedError {
    let kind = kind_of(error);
    let detail = extract_details(error);
    let message = match kind {
        ErrorKind::Authorization => format!(
            "Authorization failed: {detail}. Check that the API token is valid and its role allows this action."
        ),
        ErrorKind::NotFound => match error {
            Error::NotFound { .. } => error.to_string(),
            _ => format!("Not found: {detail}"),
        },
        ErrorKind::Validation => format!("Validation error: {detail}"),
        ErrorKind::VersionConflict => format!(
            "Version conflict: {detail}. The entity was modified since it was read; fetch the latest version and retry."
        ),
        ErrorKind::Generic => detail.clone(),
    };
    let violations = if kind == ErrorKind::Validation {
        violations_of(error, &detail)
    } else {
        Vec::new()
    };
    ClassifiedError {
        kind,
        message,
        violations,
    }
}

/// Per-field failures of a validation error.
///
/// Upstream `INVALID_FIELD` entries carry `details.field` and `details.code`;
/// anything less structured becomes one top-level violation.
fn violations_of(error: &Error, detail: &str) -> Vec<Violation> {
    let fields: Vec<Violation> = match error {
        Error::Upstream(upstream) => upstream.details.iter().filter_map(field_violation).collect(),
        _ => Vec::new(),
    };
    if !fields.is_empty() {
        return fields;
    }
    let message = match error {
        Error::InvalidArguments(message) => message.clone(),
        Error::Upstream(upstream) => upstream.message.clone(),
        _ => detail.to_string(),
    };
    vec![Violation::new("", message)]
}

fn field_violation(entry: &Value) -> Option<Violation> {
    let details = entry.get("details")?;
    let field = details.get("field").and_then(Value::as_str)?;
    let message = details
        .get("code")
        .or_else(|| details.get("message"))
        .or_else(|| entry.get("code"))
        .and_then(Value::as_str)
        .unwrap_or("invalid value");
    Some(Violation::new(field, message))
}

fn kind_of(error: &Error) -> ErrorKind {
    match error {
        Error::NotFound { .. } => ErrorKind::NotFound,
        Error::InvalidArguments(_) => ErrorKind::Validation,
        Error::Upstream(upstream) => structured_kind(upstream)
            .unwrap_or_else(|| heuristic_kind(&upstream.message)),
        other => heuristic_kind(&other.to_string()),
    }
}

fn structured_kind(error: &UpstreamError) -> Option<ErrorKind> {
    CODES
        .iter()
        .find(|(_, codes)| codes.iter().any(|c| error.has_code(c)))
        .map(|(kind, _)| *kind)
        .or_else(|| {
            let status = error.status?;
            STATUSES
                .iter()
                .find(|(_, s)| *s == status)
                .map(|(kind, _)| *kind)
        })
}

fn heuristic_kind(message: &str) -> ErrorKind {
    let lower = message.to_lowercase();
    HEURISTICS
        .iter()
        .find(|(_, needles)| needles.iter().any(|n| lower.contains(n)))
        .map_or(ErrorKind::Generic, |(kind, _)| *kind)
}

// ── Details ──────────────────────────────────────────────────────────────────

/// Best-effort human-readable rendering of an error. Never fails.
///
/// Upstream errors render their message plus the API's error entries.
/// Other errors render their message, and when the message embeds a JSON
/// document its `errors` / `data.errors` array is appended.
#[must_use]
pub fn extract_details(error: &Error) -> String {
    match error {
        Error::Upstream(u) if !u.details.is_empty() => {
            format!("{}\nDetails: {}", u.message, render_values(&u.details))
        }
        Error::Upstream(u) => u.message.clone(),
        other => {
            let message = other.to_string();
            match embedded_errors(&message) {
                Some(errors) => format!("{message}\nDetails: {errors}"),
                None => message,
            }
        }
    }
}

/// Best-effort rendering of an arbitrary JSON error value. Never fails.
///
/// Strings are returned as-is; objects are searched for `message`, then
/// `errors`, then `data.errors`; anything else is stringified.
#[must_use]
pub fn extract_value_details(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Object(map) => {
            if let Some(message) = map.get("message") {
                return extract_value_details(message);
            }
            if let Some(errors) = map.get("errors") {
                return pretty(errors);
            }
            if let Some(errors) = value.pointer("/data/errors") {
                return pretty(errors);
            }
            value.to_string()
        }
        other => other.to_string(),
    }
}

fn embedded_errors(message: &str) -> Option<String> {
    let start = message.find('{')?;
    let end = message.rfind('}')?;
    if end <= start {
        return None;
    }
    let document: Value = serde_json::from_str(&message[start..=end]).ok()?;
    document
        .get("errors")
        .or_else(|| document.pointer("/data/errors"))
        .map(pretty)
}

fn render_values(values: &[Value]) -> String {
    pretty(&Value::Array(values.to_vec()))
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
