//! Upstream (DatoCMS CMA) error shape

use std::fmt;

use serde_json::Value;

/// Maximum number of body characters kept when the API returns a non-JSON error
const MAX_RAW_BODY_CHARS: usize = 500;

/// An error reported by the Content Management API.
///
/// DatoCMS answers failed requests with a JSON:API error document:
///
/// ```json
/// {"data": [{"id": "…", "type": "api_error",
///            "attributes": {"code": "INVALID_FIELD", "details": {…}}}]}
/// ```
///
/// The first error's `code` is lifted into [`UpstreamError::code`]; every
/// entry's `attributes` is kept in [`UpstreamError::details`].
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamError {
    /// HTTP status, when the error came from an HTTP response
    pub status: Option<u16>,
    /// API error code (`RECORD_NOT_FOUND`, `STALE_ITEM_VERSION`, ...)
    pub code: Option<String>,
    /// Human-readable summary
    pub message: String,
    /// Raw error entries as returned by the API
    pub details: Vec<Value>,
}

impl UpstreamError {
    /// Build an error carrying only a message
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            status: None,
            code: None,
            message: message.into(),
            details: Vec::new(),
        }
    }

    /// Set the HTTP status
    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Set the API error code
    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Parse an error from an HTTP status and raw response body.
    #[must_use]
    pub fn from_response(status: u16, body: &str) -> Self {
        let parsed: Option<Value> = serde_json::from_str(body).ok();

        let entries: Vec<Value> = parsed
            .as_ref()
            .and_then(|v| v.get("data"))
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .map(|e| e.get("attributes").cloned().unwrap_or_else(|| e.clone()))
                    .collect()
            })
            .unwrap_or_default();

        let code = entries
            .first()
            .and_then(|a| a.get("code"))
            .and_then(Value::as_str)
            .map(String::from);

        let message = match (&code, &parsed) {
            (Some(code), _) => format!("API returned {status}: {code}"),
            (None, Some(json)) => format!("API returned {status}: {json}"),
            (None, None) => format!(
                "API returned {status}: {}",
                body.chars().take(MAX_RAW_BODY_CHARS).collect::<String>()
            ),
        };

        Self {
            status: Some(status),
            code,
            message,
            details: entries,
        }
    }

    /// Whether any entry carries the given error code.
    #[must_use]
    pub fn has_code(&self, code: &str) -> bool {
        self.code.as_deref() == Some(code)
            || self
                .details
                .iter()
                .any(|d| d.get("code").and_then(Value::as_str) == Some(code))
    }
}

impl fmt::Display for UpstreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for UpstreamError {}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn parses_jsonapi_error_document() {
        let body = json!({
            "data": [{
                "id": "1c3f",
                "type": "api_error",
                "attributes": {
                    "code": "INVALID_FIELD",
                    "details": {"field": "title", "code": "VALIDATION_REQUIRED"}
                }
            }]
        })
        .to_string();

        let err = UpstreamError::from_response(422, &body);

        assert_eq!(err.status, Some(422));
        assert_eq!(err.code.as_deref(), Some("INVALID_FIELD"));
        assert_eq!(err.message, "API returned 422: INVALID_FIELD");
        assert_eq!(err.details[0]["details"]["field"], "title");
    }

    #[test]
    fn non_json_body_is_truncated() {
        let body = "x".repeat(2_000);
        let err = UpstreamError::from_response(502, &body);

        assert_eq!(err.code, None);
        assert!(err.details.is_empty());
        assert!(err.message.len() < 600);
        assert!(err.message.starts_with("API returned 502: xxx"));
    }

    #[test]
    fn has_code_checks_every_entry() {
        let body = json!({"data": [
            {"attributes": {"code": "INVALID_FIELD"}},
            {"attributes": {"code": "STALE_ITEM_VERSION"}}
        ]})
        .to_string();

        let err = UpstreamError::from_response(422, &body);
        assert!(err.has_code("STALE_ITEM_VERSION"));
        assert!(!err.has_code("RECORD_NOT_FOUND"));
    }
}
