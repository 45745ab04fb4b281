//! JSON-RPC over HTTP: `POST /mcp` and `GET /health`

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};
use tracing::{info, warn};

use super::McpServer;
use crate::{Error, Result};

/// Build the HTTP router
pub fn router(server: Arc<McpServer>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/mcp", post(mcp_handler))
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(server)
}

/// Serve HTTP on `host:port` until Ctrl+C / SIGTERM
///
/// # Errors
///
/// Returns an error if the address is invalid or cannot be bound.
pub async fn serve_http(server: Arc<McpServer>, host: &str, port: u16) -> Result<()> {
    let addr = SocketAddr::new(
        host.parse()
            .map_err(|e| Error::Config(format!("Invalid host: {e}")))?,
        port,
    );
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "Serving MCP on HTTP");

    axum::serve(listener, router(server))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| Error::Internal(e.to_string()))?;

    info!("HTTP server stopped");
    Ok(())
}

async fn health_handler(State(server): State<Arc<McpServer>>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "tools": server.routers().iter().count(),
        "cached_clients": server.clients().len(),
    }))
}

async fn mcp_handler(State(server): State<Arc<McpServer>>, Json(message): Json<Value>) -> Response {
    match server.handle_message(&message).await {
        Some(response) => Json(response).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received");
}
