//! MCP protocol types (the subset a tools-only server speaks)

mod messages;
mod types;

pub use messages::*;
pub use types::*;

/// Latest MCP protocol version this server speaks
pub const PROTOCOL_VERSION: &str = "2025-06-18";

/// Protocol versions accepted during `initialize`, oldest first
pub const SUPPORTED_VERSIONS: &[&str] = &["2024-11-05", "2025-03-26", "2025-06-18"];

/// Pick the protocol version to answer `initialize` with.
///
/// A supported client version is echoed back; anything else gets the
/// latest version we speak.
#[must_use]
pub fn negotiate_version(client_version: &str) -> &'static str {
    SUPPORTED_VERSIONS
        .iter()
        .find(|v| **v == client_version)
        .copied()
        .unwrap_or(PROTOCOL_VERSION)
}
