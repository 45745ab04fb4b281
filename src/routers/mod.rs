//! Resource routers: one MCP tool per resource family, dispatching
//! `{action, args}` to composed handlers.

mod collaborators;
mod common;
mod locales;
mod query;
mod records;
mod roles;
mod schema;
mod tokens;
mod ui;

use std::fmt::Write as _;
use std::sync::Arc;

use serde_json::{Value, json};
use tracing::debug;

use crate::handler::{Envelope, Handler, HandlerFactory, OperationDescriptor};
use crate::protocol::{Tool, ToolAnnotations};
use crate::schema::{ValidationFailure, Violation};

pub use query::{FieldCondition, MODEL_CONTEXT_REQUIRED, matches_condition};

/// One tool exposing a family of actions
pub struct ResourceRouter {
    tool: &'static str,
    domain: &'static str,
    title: &'static str,
    summary: &'static str,
    handlers: Vec<(&'static str, Arc<dyn Handler>)>,
}

impl ResourceRouter {
    /// Create an empty router
    #[must_use]
    pub fn new(
        tool: &'static str,
        domain: &'static str,
        title: &'static str,
        summary: &'static str,
    ) -> Self {
        Self {
            tool,
            domain,
            title,
            summary,
            handlers: Vec::new(),
        }
    }

    /// Compose and register an action. Re-registering an action replaces it.
    pub fn register(&mut self, factory: &HandlerFactory, descriptor: OperationDescriptor) {
        let action = descriptor.action;
        let handler = factory.make(descriptor);
        match self.handlers.iter_mut().find(|(name, _)| *name == action) {
            Some(slot) => slot.1 = handler,
            None => self.handlers.push((action, handler)),
        }
    }

    /// Tool name
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.tool
    }

    /// Schema domain of this family
    #[must_use]
    pub fn domain(&self) -> &'static str {
        self.domain
    }

    /// Registered action names, in registration order
    #[must_use]
    pub fn actions(&self) -> Vec<&'static str> {
        self.handlers.iter().map(|(name, _)| *name).collect()
    }

    /// Dispatch a tool call `{action, args}`
    pub async fn call(&self, arguments: Value) -> Envelope {
        let Some(action) = arguments.get("action").and_then(Value::as_str) else {
            return self.reject("action is required");
        };
        let args = arguments
            .get("args")
            .cloned()
            .filter(|a| !a.is_null())
            .unwrap_or_else(|| json!({}));
        self.dispatch(action, args).await
    }

    /// Dispatch one action
    pub async fn dispatch(&self, action: &str, args: Value) -> Envelope {
        let Some((_, handler)) = self.handlers.iter().find(|(name, _)| *name == action) else {
            return self.reject(&format!("Unknown action '{action}' for {}", self.tool));
        };
        debug!(tool = self.tool, action, "Dispatching");
        handler.handle(args).await
    }

    fn reject(&self, problem: &str) -> Envelope {
        let valid = self.actions().join(", ");
        Envelope::invalid(ValidationFailure {
            message: format!("{problem}. Valid actions: {valid}"),
            violations: vec![Violation::new(
                "action",
                format!("must be one of: {valid}"),
            )],
        })
    }

    /// MCP tool definition
    #[must_use]
    pub fn tool(&self) -> Tool {
        let mut description = format!("{}\n\nActions:", self.summary);
        for (name, handler) in &self.handlers {
            let d = handler.descriptor().description;
            if d.is_empty() {
                let _ = write!(description, "\n- {name}");
            } else {
                let _ = write!(description, "\n- {name}: {d}");
            }
        }
        description.push_str(
            "\n\nEvery action takes apiToken (required) and environment (optional) in args. \
             Add \"debug\": true to args for timing metadata.",
        );

        let destructive = self.handlers.iter().any(|(name, _)| {
            name.starts_with("destroy") || name.starts_with("remove") || name.starts_with("set_")
        });

        Tool {
            name: self.tool.to_string(),
            title: Some(self.title.to_string()),
            description: Some(description),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "action": { "type": "string", "enum": self.actions() },
                    "args": { "type": "object", "description": "Arguments of the chosen action" }
                },
                "required": ["action"]
            }),
            annotations: Some(ToolAnnotations {
                title: Some(self.title.to_string()),
                read_only_hint: Some(false),
                destructive_hint: Some(destructive),
                open_world_hint: Some(true),
            }),
        }
    }
}

/// Every resource router, keyed by tool name
pub struct Routers {
    routers: Vec<ResourceRouter>,
}

impl Routers {
    /// Build all routers, registering their schemas through `factory`
    #[must_use]
    pub fn build(factory: &HandlerFactory) -> Self {
        Self {
            routers: vec![
                records::router(factory),
                schema::router(factory),
                collaborators::router(factory),
                roles::router(factory),
                tokens::router(factory),
                locales::router(factory),
                ui::router(factory),
            ],
        }
    }

    /// Tool definitions
    #[must_use]
    pub fn tools(&self) -> Vec<Tool> {
        self.routers.iter().map(ResourceRouter::tool).collect()
    }

    /// The router behind a tool name
    #[must_use]
    pub fn get(&self, tool: &str) -> Option<&ResourceRouter> {
        self.routers.iter().find(|r| r.name() == tool)
    }

    /// All routers
    pub fn iter(&self) -> impl Iterator<Item = &ResourceRouter> {
        self.routers.iter()
    }
}
