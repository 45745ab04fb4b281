//! Newline-delimited JSON-RPC on stdin/stdout.
//!
//! Every request runs in its own task so a slow upstream call never blocks
//! the next line; replies funnel through a single writer task so lines are
//! never interleaved. Logs go to stderr.

use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use super::McpServer;
use crate::{Error, Result};

/// Serve on the process's stdin/stdout until stdin closes
///
/// # Errors
///
/// Returns an error if stdin cannot be read or stdout cannot be written.
pub async fn serve_stdio(server: Arc<McpServer>) -> Result<()> {
    info!("Serving MCP on stdio");
    serve(server, BufReader::new(tokio::io::stdin()), tokio::io::stdout()).await
}

/// Serve on any line reader / writer pair
pub(crate) async fn serve<R, W>(server: Arc<McpServer>, reader: R, writer: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel::<String>(64);
    let writer_task = tokio::spawn(write_lines(rx, writer));

    let mut requests = JoinSet::new();
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim().to_string();
        if line.is_empty() {
            continue;
        }
        let server = Arc::clone(&server);
        let tx = tx.clone();
        requests.spawn(async move {
            let Some(response) = server.handle_line(&line).await else {
                return;
            };
            match serde_json::to_string(&response) {
                Ok(text) => {
                    if tx.send(text).await.is_err() {
                        debug!("Writer closed; dropping response");
                    }
                }
                Err(e) => error!(error = %e, "Failed to serialize response"),
            }
        });
        // Reap finished requests so the set does not grow unbounded
        while requests.try_join_next().is_some() {}
    }

    debug!("stdin closed; waiting for in-flight requests");
    while requests.join_next().await.is_some() {}
    drop(tx);

    writer_task
        .await
        .map_err(|e| Error::Internal(format!("writer task failed: {e}")))?
}

async fn write_lines<W>(mut rx: mpsc::Receiver<String>, mut writer: W) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(mut line) = rx.recv().await {
        line.push('\n');
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;
    }
    Ok(())
}
