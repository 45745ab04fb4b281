//! DatoCMS Content Management API client.
//!
//! [`CmaApi`] is the subset of CMA operations the handlers depend on. The
//! production implementation is [`HttpCmaClient`]; the typed adapters
//! [`RecordsClient`] and [`CollaboratorsClient`] sit on top of any
//! implementation.

mod client;
mod collaborators;
mod error;
pub mod jsonapi;
mod records;

pub use client::HttpCmaClient;
pub use collaborators::CollaboratorsClient;
pub use error::UpstreamError;
pub use records::{RecordsClient, SelectivePublish};

use std::fmt;

use async_trait::async_trait;
use serde_json::Value;

use crate::Result;

/// Query-string pairs (`filter[type]=...`, `page[limit]=...`)
pub type Query = [(String, String)];

/// One page of a list endpoint
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    /// Flattened entities
    pub data: Vec<Value>,
    /// `meta.total_count`, when the endpoint reports it
    pub total: Option<u64>,
}

/// HTTP verb used by [`CmaApi::perform`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    /// GET
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// DELETE
    Delete,
}

impl Verb {
    fn as_method(self) -> reqwest::Method {
        match self {
            Self::Get => reqwest::Method::GET,
            Self::Post => reqwest::Method::POST,
            Self::Put => reqwest::Method::PUT,
            Self::Delete => reqwest::Method::DELETE,
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        })
    }
}

/// The CMA operations this server calls.
///
/// Paths are relative to the API root (`/items/123`). Entities crossing this
/// boundary are flat (see [`jsonapi`]); errors reported by the API surface
/// as [`crate::Error::Upstream`] and are never swallowed.
#[async_trait]
pub trait CmaApi: Send + Sync {
    /// `GET path`; `None` when the response carries no data
    async fn find(&self, path: &str, query: &Query) -> Result<Option<Value>>;

    /// `GET path` on a collection endpoint
    async fn list(&self, path: &str, query: &Query) -> Result<Page>;

    /// `POST path` with `entity` serialized as a `kind` resource
    async fn create(&self, path: &str, kind: &str, entity: Value) -> Result<Value>;

    /// `PUT path` with `entity` serialized as a `kind` resource
    async fn update(&self, path: &str, kind: &str, entity: Value) -> Result<Value>;

    /// `DELETE path`; returns the deleted entity when the API echoes it
    async fn destroy(&self, path: &str) -> Result<Option<Value>>;

    /// Any other resource verb (publish, duplicate, regenerate_token, ...).
    ///
    /// `document` is sent verbatim as the JSON:API request body.
    async fn perform(&self, verb: Verb, path: &str, document: Option<Value>) -> Result<Value>;
}

/// Percent-encode a single path segment supplied by a caller.
#[must_use]
pub fn segment(raw: &str) -> String {
    // form encoding turns spaces into '+' and escapes a literal '+' as %2B
    url::form_urlencoded::byte_serialize(raw.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_escapes_slashes_and_spaces() {
        assert_eq!(segment("abc123"), "abc123");
        assert_eq!(segment("a/b c"), "a%2Fb%20c");
        assert_eq!(segment("a+b"), "a%2Bb");
    }

    #[test]
    fn verb_display_matches_http_method() {
        assert_eq!(Verb::Delete.to_string(), "DELETE");
        assert_eq!(Verb::Post.as_method(), reqwest::Method::POST);
    }
}
