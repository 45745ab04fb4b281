//! DatoCMS MCP server library
//!
//! Exposes the DatoCMS Content Management API as a small set of MCP tools,
//! one per resource family (records, schema, collaborators, roles, API
//! tokens, locales, UI). Every action runs through the same handler
//! pipeline:
//!
//! - **Trace**: optional timing / request-id metadata (`debug: true`)
//! - **Catch errors**: every failure becomes a classified error envelope
//! - **Validate**: arguments are checked against the action's schema before
//!   anything else runs
//! - **Resolve and run**: one cached API client per token, environment and
//!   client kind
//!
//! # Protocol Version
//!
//! Implements MCP protocol versions 2024-11-05, 2025-03-26 and 2025-06-18
//! over stdio or HTTP.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod clients;
pub mod cma;
pub mod config;
pub mod error;
pub mod handler;
pub mod protocol;
pub mod routers;
pub mod schema;
pub mod server;
pub mod trace;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{Error, Result};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Setup tracing/logging. Output goes to stderr; stdout carries the stdio protocol.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    let installed = match format {
        Some("json") => subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
        _ => subscriber
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init(),
    };

    installed.map_err(|e| Error::Internal(format!("tracing already initialized: {e}")))
}
