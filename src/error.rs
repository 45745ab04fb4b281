//! Error types for the DatoCMS MCP server

use std::io;

use thiserror::Error;

use crate::cma::UpstreamError;

/// Result type alias for the DatoCMS MCP server
pub type Result<T> = std::result::Result<T, Error>;

/// DatoCMS MCP errors
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Transport error (network failure, job polling exhausted, ...)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Protocol error
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Error reported by the DatoCMS Content Management API
    #[error("{0}")]
    Upstream(UpstreamError),

    /// A lookup resolved to nothing
    #[error("{entity} with ID '{id}' was not found")]
    NotFound {
        /// Human-readable entity name ("Record", "Role", ...)
        entity: String,
        /// The identifier that was requested
        id: String,
    },

    /// Arguments passed validation but cannot be acted upon
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// JSON-RPC error
    #[error("JSON-RPC error {code}: {message}")]
    JsonRpc {
        /// Error code
        code: i32,
        /// Error message
        message: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a JSON-RPC error
    pub fn json_rpc(code: i32, message: impl Into<String>) -> Self {
        Self::JsonRpc {
            code,
            message: message.into(),
        }
    }

    /// Create a not-found error for `entity` / `id`
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Convert to JSON-RPC error code
    #[must_use]
    pub fn to_rpc_code(&self) -> i32 {
        match self {
            Self::JsonRpc { code, .. } => *code,
            Self::Json(_) => rpc_codes::PARSE_ERROR,
            Self::Protocol(_) => rpc_codes::INVALID_REQUEST,
            Self::InvalidArguments(_) => rpc_codes::INVALID_PARAMS,
            Self::Transport(_) | Self::Http(_) | Self::Upstream(_) | Self::NotFound { .. } => {
                rpc_codes::SERVER_ERROR_START
            }
            _ => rpc_codes::INTERNAL_ERROR,
        }
    }
}

impl From<UpstreamError> for Error {
    fn from(err: UpstreamError) -> Self {
        Self::Upstream(err)
    }
}

/// Standard JSON-RPC error codes
pub mod rpc_codes {
    /// Parse error - Invalid JSON
    pub const PARSE_ERROR: i32 = -32700;
    /// Invalid Request - Not a valid Request object
    pub const INVALID_REQUEST: i32 = -32600;
    /// Method not found
    pub const METHOD_NOT_FOUND: i32 = -32601;
    /// Invalid params
    pub const INVALID_PARAMS: i32 = -32602;
    /// Internal error
    pub const INTERNAL_ERROR: i32 = -32603;
    /// Server error range start
    pub const SERVER_ERROR_START: i32 = -32000;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_display_mentions_entity_and_id() {
        let err = Error::not_found("Record", "abc123");
        assert_eq!(err.to_string(), "Record with ID 'abc123' was not found");
    }

    #[test]
    fn rpc_codes_follow_error_family() {
        assert_eq!(Error::Protocol("x".into()).to_rpc_code(), rpc_codes::INVALID_REQUEST);
        assert_eq!(
            Error::InvalidArguments("x".into()).to_rpc_code(),
            rpc_codes::INVALID_PARAMS
        );
        assert_eq!(Error::Internal("x".into()).to_rpc_code(), rpc_codes::INTERNAL_ERROR);
        assert_eq!(Error::json_rpc(-32601, "nope").to_rpc_code(), -32601);
    }
}
