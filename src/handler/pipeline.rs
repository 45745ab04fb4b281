//! The fixed handler pipeline: Trace → CatchErrors → Validate → ResolveAndRun.
//!
//! Each stage wraps the next one and the stage traits only nest one way,
//! so the order is fixed by the types [`HandlerFactory::make`] builds:
//! [`Trace`] and [`CatchErrors`] are [`Handler`]s (never fail),
//! [`Validate`] is an [`Operation`] (may fail), and [`ResolveAndRun`] is a
//! [`ValidatedOperation`] (only ever sees [`ValidatedArgs`]).

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::FutureExt;
use serde_json::{Value, json};
use tracing::{debug, warn};

use super::classify::{ClassifiedError, ErrorKind, classify};
use super::descriptor::{OperationDescriptor, ValidatedArgs};
use super::response::Envelope;
use crate::clients::ClientManager;
use crate::schema::SchemaRegistry;
use crate::{Result, trace};

/// Argument key that turns tracing on for one call
pub const DEBUG_ARG: &str = "debug";

/// A composed operation: raw arguments in, envelope out, never fails
#[async_trait]
pub trait Handler: Send + Sync {
    /// Run the operation
    async fn handle(&self, args: Value) -> Envelope;

    /// The operation's descriptor
    fn descriptor(&self) -> &OperationDescriptor;
}

/// Raw arguments in, envelope or error out
#[async_trait]
pub trait Operation: Send + Sync {
    /// Run the operation
    async fn call(&self, args: Value) -> Result<Envelope>;
}

/// Validated arguments in, envelope or error out
#[async_trait]
pub trait ValidatedOperation: Send + Sync {
    /// Run the operation
    async fn call(&self, args: ValidatedArgs) -> Result<Envelope>;
}

// ── Stage 4: client resolution + domain action ──────────────────────────────

/// Resolve the caller's client and run the domain action
pub struct ResolveAndRun {
    descriptor: Arc<OperationDescriptor>,
    clients: Arc<ClientManager>,
}

impl ResolveAndRun {
    /// Create the innermost stage
    #[must_use]
    pub fn new(descriptor: Arc<OperationDescriptor>, clients: Arc<ClientManager>) -> Self {
        Self {
            descriptor,
            clients,
        }
    }
}

#[async_trait]
impl ValidatedOperation for ResolveAndRun {
    async fn call(&self, args: ValidatedArgs) -> Result<Envelope> {
        let credential = args.credential()?;
        let client = self
            .clients
            .resolve(&credential, self.descriptor.client_kind);
        let output = self.descriptor.run(client, args.clone()).await?;
        self.descriptor.shape_output(output, &args)
    }
}

// ── Stage 3: schema validation ──────────────────────────────────────────────

/// Validate raw arguments against the registered schema
pub struct Validate<O> {
    descriptor: Arc<OperationDescriptor>,
    schemas: Arc<SchemaRegistry>,
    inner: O,
}

impl<O: ValidatedOperation> Validate<O> {
    /// Wrap `inner`
    #[must_use]
    pub fn new(descriptor: Arc<OperationDescriptor>, schemas: Arc<SchemaRegistry>, inner: O) -> Self {
        Self {
            descriptor,
            schemas,
            inner,
        }
    }
}

#[async_trait]
impl<O: ValidatedOperation> Operation for Validate<O> {
    async fn call(&self, args: Value) -> Result<Envelope> {
        match self
            .schemas
            .validate(self.descriptor.domain, self.descriptor.action, &args)
        {
            Ok(value) => self.inner.call(ValidatedArgs::new(value)).await,
            Err(failure) => {
                debug!(
                    domain = self.descriptor.domain,
                    action = self.descriptor.action,
                    violations = failure.violations.len(),
                    "Arguments rejected"
                );
                Ok(Envelope::invalid(failure))
            }
        }
    }
}

// ── Stage 2: error handling ─────────────────────────────────────────────────

/// Turn every error (and panic) of the inner stages into an error envelope
pub struct CatchErrors<O> {
    descriptor: Arc<OperationDescriptor>,
    inner: O,
}

impl<O: Operation> CatchErrors<O> {
    /// Wrap `inner`
    #[must_use]
    pub fn new(descriptor: Arc<OperationDescriptor>, inner: O) -> Self {
        Self { descriptor, inner }
    }

    fn report(&self, classified: ClassifiedError, args: &Value) -> Envelope {
        let classified = match self.descriptor.requested_id(args) {
            Some(id) => classified.with_subject(self.descriptor.entity, &id),
            None => classified,
        };
        warn!(
            domain = self.descriptor.domain,
            action = self.descriptor.action,
            kind = %classified.kind,
            error = %classified.message,
            "Operation failed"
        );
        Envelope::classified(classified)
    }
}

#[async_trait]
impl<O: Operation> Handler for CatchErrors<O> {
    async fn handle(&self, args: Value) -> Envelope {
        let outcome = AssertUnwindSafe(self.inner.call(args.clone()))
            .catch_unwind()
            .await;
        match outcome {
            Ok(Ok(envelope)) => envelope,
            Ok(Err(error)) => self.report(classify(&error), &args),
            Err(_) => self.report(
                ClassifiedError {
                    kind: ErrorKind::Generic,
                    message: format!(
                        "Internal error while running {}.{}",
                        self.descriptor.domain, self.descriptor.action
                    ),
                    violations: Vec::new(),
                },
                &args,
            ),
        }
    }

    fn descriptor(&self) -> &OperationDescriptor {
        &self.descriptor
    }
}

// ── Stage 1: debug / trace ──────────────────────────────────────────────────

/// Optionally trace a call and attach `meta.debug`
pub struct Trace<H> {
    always: bool,
    inner: H,
}

impl<H: Handler> Trace<H> {
    /// Wrap `inner`; `always` traces every call
    #[must_use]
    pub fn new(always: bool, inner: H) -> Self {
        Self { always, inner }
    }
}

#[async_trait]
impl<H: Handler> Handler for Trace<H> {
    async fn handle(&self, mut args: Value) -> Envelope {
        // The flag is not part of any schema; strip it before validation.
        let requested = args
            .as_object_mut()
            .and_then(|m| m.remove(DEBUG_ARG))
            .is_some_and(|v| v.as_bool() == Some(true));

        if !(self.always || requested) {
            return self.inner.handle(args).await;
        }

        let ctx = trace::TraceContext::new();
        let started = Instant::now();
        let mut envelope = trace::scope(Arc::clone(&ctx), self.inner.handle(args)).await;
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let descriptor = self.inner.descriptor();
        let operation = format!("{}.{}", descriptor.domain, descriptor.action);
        let response_chars = envelope.to_text().chars().count();
        debug!(
            request_id = %ctx.request_id,
            operation = %operation,
            duration_ms,
            api_calls = ctx.api_calls(),
            "Traced call"
        );
        envelope.meta.debug = Some(json!({
            "request_id": ctx.request_id,
            "operation": operation,
            "duration_ms": duration_ms,
            "response_chars": response_chars,
            "api_calls": ctx.api_calls(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        }));
        envelope
    }

    fn descriptor(&self) -> &OperationDescriptor {
        self.inner.descriptor()
    }
}

// ── Factory ─────────────────────────────────────────────────────────────────

/// Builds composed handlers from descriptors
#[derive(Clone)]
pub struct HandlerFactory {
    clients: Arc<ClientManager>,
    schemas: Arc<SchemaRegistry>,
    always_trace: bool,
}

impl HandlerFactory {
    /// Create a factory over shared client and schema state
    #[must_use]
    pub fn new(clients: Arc<ClientManager>, schemas: Arc<SchemaRegistry>, always_trace: bool) -> Self {
        Self {
            clients,
            schemas,
            always_trace,
        }
    }

    /// The schema registry handlers validate against
    #[must_use]
    pub fn schemas(&self) -> &Arc<SchemaRegistry> {
        &self.schemas
    }

    /// The client manager handlers resolve through
    #[must_use]
    pub fn clients(&self) -> &Arc<ClientManager> {
        &self.clients
    }

    /// Register the descriptor's schema and compose its pipeline
    #[must_use]
    pub fn make(&self, descriptor: OperationDescriptor) -> Arc<dyn Handler> {
        let description = (!descriptor.description.is_empty()).then_some(descriptor.description);
        match descriptor.refinement {
            Some(refine) => self.schemas.register_refined(
                descriptor.domain,
                descriptor.action,
                descriptor.schema.clone(),
                description,
                refine,
            ),
            None => self.schemas.register(
                descriptor.domain,
                descriptor.action,
                descriptor.schema.clone(),
                description,
            ),
        }

        let descriptor = Arc::new(descriptor);
        let run = ResolveAndRun::new(Arc::clone(&descriptor), Arc::clone(&self.clients));
        let validate = Validate::new(Arc::clone(&descriptor), Arc::clone(&self.schemas), run);
        let catch = CatchErrors::new(descriptor, validate);
        Arc::new(Trace::new(self.always_trace, catch))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::Error;
    use crate::clients::ClientKind;
    use crate::cma::UpstreamError;
    use crate::handler::descriptor::{Shape, action};
    use crate::testing::StaticFactory;
    use pretty_assertions::assert_eq;

    fn factory(always_trace: bool) -> HandlerFactory {
        HandlerFactory::new(
            Arc::new(ClientManager::new(Arc::new(StaticFactory::default()), 8)),
            Arc::new(SchemaRegistry::new()),
            always_trace,
        )
    }

    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "apiToken": { "type": "string", "minLength": 1 },
                "environment": { "type": "string" },
                "roleId": { "type": "string" }
            },
            "required": ["apiToken", "roleId"]
        })
    }

    #[tokio::test]
    async fn validation_failure_never_runs_the_action() {
        // GIVEN: an action that counts invocations
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let handler = factory(false).make(
            OperationDescriptor::new(
                "roles",
                "get_role",
                "Role",
                Shape::Retrieve,
                action(move |_c, _a| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    async { Ok(json!({"id": "1"})) }
                }),
            )
            .id_field("roleId")
            .schema(schema()),
        );

        // WHEN: the required id is missing
        let envelope = handler.handle(json!({"apiToken": "t"})).await;

        // THEN: a validation envelope, and the action never ran
        assert!(!envelope.success);
        assert_eq!(envelope.meta.error_kind, Some(ErrorKind::Validation));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        // AND: valid input runs it exactly once
        let envelope = handler.handle(json!({"apiToken": "t", "roleId": "1"})).await;
        assert!(envelope.success);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retrieve_of_nothing_is_not_found() {
        let handler = factory(false).make(
            OperationDescriptor::new(
                "roles",
                "get_role",
                "Role",
                Shape::Retrieve,
                action(|_c, _a| async { Ok(None::<Value>) }),
            )
            .id_field("roleId")
            .schema(schema()),
        );

        let envelope = handler.handle(json!({"apiToken": "t", "roleId": "r-404"})).await;
        assert!(!envelope.success);
        assert_eq!(envelope.meta.error_kind, Some(ErrorKind::NotFound));
        assert!(envelope.error.unwrap().contains("r-404"));
    }

    #[tokio::test]
    async fn upstream_errors_are_classified_with_the_requested_id() {
        let handler = factory(false).make(
            OperationDescriptor::new(
                "roles",
                "destroy_role",
                "Role",
                Shape::Delete,
                action(|_c, _a| async {
                    Err::<(), _>(Error::from(
                        UpstreamError::message("API returned 404").with_status(404),
                    ))
                }),
            )
            .id_field("roleId")
            .schema(schema()),
        );

        let envelope = handler.handle(json!({"apiToken": "t", "roleId": "gone"})).await;
        assert_eq!(envelope.meta.error_kind, Some(ErrorKind::NotFound));
        assert_eq!(envelope.error.as_deref(), Some("Role with ID 'gone' was not found"));
    }

    #[tokio::test]
    async fn panics_become_generic_errors() {
        let handler = factory(false).make(
            OperationDescriptor::new(
                "roles",
                "get_role",
                "Role",
                Shape::Retrieve,
                action(|_c, _a| async {
                    if true {
                        panic!("boom");
                    }
                    Ok(())
                }),
            )
            .schema(schema()),
        );

        let envelope = handler.handle(json!({"apiToken": "t", "roleId": "1"})).await;
        assert!(!envelope.success);
        assert_eq!(envelope.meta.error_kind, Some(ErrorKind::Generic));
    }

    #[tokio::test]
    async fn debug_flag_adds_trace_block_and_is_stripped() {
        let handler = factory(false).make(
            OperationDescriptor::new(
                "roles",
                "get_role",
                "Role",
                Shape::Retrieve,
                action(|_c, a: ValidatedArgs| async move {
                    // The flag never reaches validated args
                    assert!(a.get(DEBUG_ARG).is_none());
                    Ok(json!({"id": "1"}))
                }),
            )
            .schema(schema()),
        );

        let plain = handler.handle(json!({"apiToken": "t", "roleId": "1"})).await;
        assert!(plain.meta.debug.is_none());

        let traced = handler
            .handle(json!({"apiToken": "t", "roleId": "1", "debug": true}))
            .await;
        assert!(traced.success, "{traced:?}");
        let debug = traced.meta.debug.expect("debug block");
        assert_eq!(debug["operation"], "roles.get_role");
        assert_eq!(debug["api_calls"], 0);
        assert!(debug["request_id"].as_str().unwrap().starts_with("dato-"));
        assert!(debug["response_chars"].as_u64().unwrap() > 0);
    }

    #[tokio::test]
    async fn always_trace_forces_debug_block() {
        let handler = factory(true).make(
            OperationDescriptor::new(
                "roles",
                "get_role",
                "Role",
                Shape::Retrieve,
                action(|_c, _a| async { Ok(json!({"id": "1"})) }),
            )
            .schema(schema()),
        );
        let envelope = handler.handle(json!({"apiToken": "t", "roleId": "1"})).await;
        assert!(envelope.meta.debug.is_some());
    }

    #[tokio::test]
    async fn action_receives_handle_of_requested_kind() {
        let handler = factory(false).make(
            OperationDescriptor::new(
                "records",
                "get",
                "Record",
                Shape::Custom,
                action(|client, _a| async move {
                    client.records()?;
                    Ok(json!({"kind": format!("{:?}", client.kind())}))
                }),
            )
            .client(ClientKind::Records)
            .schema(schema()),
        );
        let envelope = handler.handle(json!({"apiToken": "t", "roleId": "1"})).await;
        assert_eq!(envelope.data, Some(json!({"kind": "Records"})));
    }
}
