//! Request-scoped trace context.
//!
//! The trace stage of the handler pipeline mints a [`TraceContext`] for a
//! traced call and installs it task-locally with [`scope`]. Code running
//! inside that scope (notably [`crate::cma::HttpCmaClient`]) reads it with
//! [`current`] to tag outbound requests, and bumps the upstream call
//! counter through [`record_api_call`]. Outside a scope both are no-ops.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use uuid::Uuid;

tokio::task_local! {
    static TRACE: Arc<TraceContext>;
}

/// Per-call trace state
#[derive(Debug)]
pub struct TraceContext {
    /// Request id (`"dato-<uuid-v4>"`)
    pub request_id: String,
    api_calls: AtomicU32,
}

impl TraceContext {
    /// Create a context with a freshly generated request id
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            request_id: generate(),
            api_calls: AtomicU32::new(0),
        })
    }

    /// Number of upstream calls recorded so far
    #[must_use]
    pub fn api_calls(&self) -> u32 {
        self.api_calls.load(Ordering::Relaxed)
    }
}

/// Generate a new request id: `"dato-<uuid-v4>"`.
#[must_use]
pub fn generate() -> String {
    format!("dato-{}", Uuid::new_v4())
}

/// Return the trace context of the current task, if any.
#[must_use]
pub fn current() -> Option<Arc<TraceContext>> {
    TRACE.try_with(Arc::clone).ok()
}

/// Count one upstream call against the current trace context.
pub fn record_api_call() {
    let _ = TRACE.try_with(|ctx| ctx.api_calls.fetch_add(1, Ordering::Relaxed));
}

/// Run `future` with `ctx` installed as the task-local trace context.
pub async fn scope<F, T>(ctx: Arc<TraceContext>, future: F) -> T
where
    F: std::future::Future<Output = T>,
{
    TRACE.scope(ctx, future).await
}
