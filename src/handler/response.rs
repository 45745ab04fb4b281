//! Response envelopes and their rendering into tool-call text blocks

use serde::Serialize;
use serde_json::Value;

use super::classify::{ClassifiedError, ErrorKind};
use crate::protocol::{Content, ToolsCallResult};
use crate::schema::{ValidationFailure, Violation};

/// Maximum characters per text block
pub const MAX_CHUNK_CHARS: usize = 100_000;

/// `{limit, offset, total, has_more}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    /// Page size requested
    pub limit: u64,
    /// Offset requested
    pub offset: u64,
    /// Total matching entities
    pub total: u64,
    /// Whether entities remain beyond this page
    pub has_more: bool,
}

impl Pagination {
    /// Derive pagination for a page of `count` items
    #[must_use]
    pub fn new(limit: u64, offset: u64, total: u64, count: usize) -> Self {
        Self {
            limit,
            offset,
            total,
            has_more: offset.saturating_add(count as u64) < total,
        }
    }
}

/// Envelope metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Meta {
    /// Pagination of list results
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
    /// Field-level validation failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_errors: Option<Vec<Violation>>,
    /// Kind of a failed call
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    /// Trace block, present only for traced calls
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<Value>,
}

impl Meta {
    fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// The canonical `{success, data?, message?, error?, meta?}` shape
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope {
    /// Whether the operation succeeded
    pub success: bool,
    /// Payload
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Human-readable summary
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Error message of a failed call
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Metadata
    #[serde(skip_serializing_if = "Meta::is_empty")]
    pub meta: Meta,
}

impl Envelope {
    /// A successful envelope
    #[must_use]
    pub fn success(data: Option<Value>, message: Option<String>) -> Self {
        Self {
            success: true,
            data,
            message,
            error: None,
            meta: Meta::default(),
        }
    }

    /// A failed envelope carrying only a message
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: None,
            error: Some(message.into()),
            meta: Meta::default(),
        }
    }

    /// A failed envelope for a classified error.
    ///
    /// Validation errors always carry `validation_errors`.
    #[must_use]
    pub fn classified(error: ClassifiedError) -> Self {
        let mut envelope = Self::error(error.message);
        envelope.meta.error_kind = Some(error.kind);
        if error.kind == ErrorKind::Validation {
            envelope.meta.validation_errors = Some(error.violations);
        }
        envelope
    }

    /// A failed envelope for rejected arguments
    #[must_use]
    pub fn invalid(failure: ValidationFailure) -> Self {
        let mut envelope = Self::error(failure.message);
        envelope.meta.error_kind = Some(ErrorKind::Validation);
        envelope.meta.validation_errors = Some(failure.violations);
        envelope
    }

    /// Attach pagination
    #[must_use]
    pub fn with_pagination(mut self, pagination: Option<Pagination>) -> Self {
        self.meta.pagination = pagination;
        self
    }

    /// Serialized JSON text of this envelope
    #[must_use]
    pub fn to_text(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|e| {
            format!(r#"{{"success": false, "error": "Failed to serialize response: {e}"}}"#)
        })
    }

    /// Render as a tool-call result: chunked text, `isError` mirroring `success`
    #[must_use]
    pub fn render(&self) -> ToolsCallResult {
        ToolsCallResult {
            content: chunk(&self.to_text()).into_iter().map(Content::text).collect(),
            is_error: !self.success,
        }
    }
}

/// Build a success envelope, rendered
#[must_use]
pub fn build_success(payload: Value, message: Option<String>) -> ToolsCallResult {
    Envelope::success(Some(payload), message).render()
}

/// Build an error envelope, rendered
pub fn build_error(message: impl Into<String>) -> ToolsCallResult {
    Envelope::error(message).render()
}

/// Split `text` into consecutive slices of at most [`MAX_CHUNK_CHARS`] characters.
///
/// Slices never split a character; concatenating them yields `text`.
#[must_use]
pub fn chunk(text: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut start = 0;
    let mut count = 0;
    for (idx, _) in text.char_indices() {
        if count == MAX_CHUNK_CHARS {
            blocks.push(text[start..idx].to_string());
            start = idx;
            count = 0;
        }
        count += 1;
    }
    blocks.push(text[start..].to_string());
    blocks
}
