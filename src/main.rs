//! DatoCMS MCP server binary

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};

use datocms_mcp::{
    cli::{Cli, Command},
    config::{Config, TransportKind},
    server::{McpServer, serve_http, serve_stdio},
    setup_tracing,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = setup_tracing(&cli.log_level, cli.log_format.as_deref()) {
        eprintln!("Failed to setup tracing: {e}");
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config =
        Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(command) = &cli.command {
        command.apply(&mut config);
        config.validate().context("Invalid configuration")?;
    }

    let server = Arc::new(McpServer::from_config(&config).context("Failed to build server")?);

    if matches!(cli.command, Some(Command::Tools)) {
        let tools = serde_json::to_string_pretty(&server.routers().tools())?;
        println!("{tools}");
        return Ok(());
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        transport = %config.server.transport,
        api = %config.cma.base_url,
        "Starting DatoCMS MCP server"
    );

    match config.server.transport {
        TransportKind::Stdio => serve_stdio(server).await?,
        TransportKind::Http => serve_http(server, &config.server.host, config.server.port).await?,
    }

    info!("Server shutdown complete");
    Ok(())
}
