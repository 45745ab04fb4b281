//! Command-line interface

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::config::{Config, TransportKind};

/// MCP server for the DatoCMS Content Management API
#[derive(Parser, Debug)]
#[command(name = "datocms-mcp")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short, long, env = "DATOCMS_MCP_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(
        long,
        default_value = "info",
        env = "DATOCMS_MCP_LOG_LEVEL",
        global = true
    )]
    pub log_level: String,

    /// Log format (text, json)
    #[arg(long, env = "DATOCMS_MCP_LOG_FORMAT", global = true)]
    pub log_format: Option<String>,

    /// Subcommand (optional - defaults to server mode)
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Transport selectable on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TransportArg {
    /// Newline-delimited JSON-RPC on stdin/stdout
    Stdio,
    /// JSON-RPC over `POST /mcp`
    Http,
}

impl From<TransportArg> for TransportKind {
    fn from(arg: TransportArg) -> Self {
        match arg {
            TransportArg::Stdio => Self::Stdio,
            TransportArg::Http => Self::Http,
        }
    }
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the MCP server (default)
    Serve {
        /// Transport to serve on
        #[arg(short, long, value_enum)]
        transport: Option<TransportArg>,

        /// Port to listen on (HTTP)
        #[arg(short, long, env = "DATOCMS_MCP_PORT")]
        port: Option<u16>,

        /// Host to bind to (HTTP)
        #[arg(long, env = "DATOCMS_MCP_HOST")]
        host: Option<String>,
    },

    /// Print the tool catalogue as JSON and exit
    Tools,
}

impl Command {
    /// Apply `serve` overrides on top of the loaded configuration
    pub fn apply(&self, config: &mut Config) {
        if let Self::Serve {
            transport,
            port,
            host,
        } = self
        {
            if let Some(transport) = transport {
                config.server.transport = (*transport).into();
            }
            if let Some(port) = port {
                config.server.port = *port;
            }
            if let Some(host) = host {
                config.server.host.clone_from(host);
            }
        }
    }
}
