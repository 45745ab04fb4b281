//! Declarative operation descriptors and the per-shape result handling

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::response::{Envelope, Pagination};
use crate::clients::{ClientHandle, ClientKind, Credential};
use crate::cma::Page;
use crate::schema::Refinement;
use crate::{Error, Result};

/// Arguments that passed schema validation.
///
/// Only the validation stage constructs these, so a domain action can
/// never observe unvalidated input.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedArgs(Value);

impl ValidatedArgs {
    pub(crate) fn new(value: Value) -> Self {
        Self(value)
    }

    /// Raw validated value
    #[must_use]
    pub fn value(&self) -> &Value {
        &self.0
    }

    /// Field lookup
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|v| !v.is_null())
    }

    /// String field lookup
    #[must_use]
    pub fn str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// String field that the schema marks required
    pub fn require_str(&self, key: &str) -> Result<&str> {
        self.str(key)
            .ok_or_else(|| Error::InvalidArguments(format!("{key} is required")))
    }

    /// Boolean field, `false` when absent
    #[must_use]
    pub fn flag(&self, key: &str) -> bool {
        self.get(key).and_then(Value::as_bool).unwrap_or(false)
    }

    /// The credential carried by every call
    pub fn credential(&self) -> Result<Credential> {
        let token = self.require_str("apiToken")?;
        Ok(Credential::new(
            token,
            self.str("environment").map(String::from),
        ))
    }

    /// The arguments minus credentials and the named keys.
    ///
    /// Used to turn the remaining fields into an entity payload.
    #[must_use]
    pub fn payload(&self, exclude: &[&str]) -> Value {
        let map: Map<String, Value> = self
            .0
            .as_object()
            .map(|m| {
                m.iter()
                    .filter(|(k, _)| {
                        k.as_str() != "apiToken"
                            && k.as_str() != "environment"
                            && !exclude.contains(&k.as_str())
                    })
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default();
        Value::Object(map)
    }

    /// Object field, or an empty object
    #[must_use]
    pub fn object(&self, key: &str) -> Value {
        self.get(key)
            .filter(|v| v.is_object())
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new()))
    }

    /// Deserialize the arguments into a typed struct
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.0.clone())
            .map_err(|e| Error::InvalidArguments(e.to_string()))
    }
}

/// What a domain action produced
#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    /// One entity, or nothing
    Entity(Option<Value>),
    /// A page of entities
    Page(Page),
    /// No payload
    Empty,
}

impl From<Value> for Output {
    fn from(value: Value) -> Self {
        if value.is_null() {
            Self::Entity(None)
        } else {
            Self::Entity(Some(value))
        }
    }
}

impl From<Option<Value>> for Output {
    fn from(value: Option<Value>) -> Self {
        Self::Entity(value.filter(|v| !v.is_null()))
    }
}

impl From<Page> for Output {
    fn from(page: Page) -> Self {
        Self::Page(page)
    }
}

impl From<()> for Output {
    fn from((): ()) -> Self {
        Self::Empty
    }
}

/// Boxed domain action
pub type ActionFn =
    Arc<dyn Fn(ClientHandle, ValidatedArgs) -> BoxFuture<'static, Result<Output>> + Send + Sync>;

/// Wrap an async function as an [`ActionFn`]
pub fn action<F, Fut, O>(f: F) -> ActionFn
where
    F: Fn(ClientHandle, ValidatedArgs) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<O>> + Send + 'static,
    O: Into<Output>,
{
    Arc::new(move |client, args| {
        f(client, args)
            .map(|r| r.map(Into::<Output>::into))
            .boxed()
    })
}

/// A list result after formatting
#[derive(Debug, Clone, PartialEq)]
pub struct ListView {
    /// Payload
    pub data: Value,
    /// Number of entities in the payload
    pub count: usize,
    /// Pagination, if known
    pub pagination: Option<Pagination>,
}

/// Reshapes a page before it is wrapped in an envelope
pub type ListFormatter = fn(Page, &ValidatedArgs) -> ListView;

/// How an operation's output becomes an envelope
#[derive(Clone, Copy)]
pub enum Shape {
    /// Created entity plus templated message
    Create,
    /// `None` is promoted to a not-found error
    Retrieve,
    /// Updated entity plus templated message
    Update,
    /// No payload, templated message
    Delete,
    /// Array payload with count message
    List(Option<ListFormatter>),
    /// Whatever the action returned
    Custom,
}

impl fmt::Debug for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Create => "Create",
            Self::Retrieve => "Retrieve",
            Self::Update => "Update",
            Self::Delete => "Delete",
            Self::List(_) => "List",
            Self::Custom => "Custom",
        };
        f.write_str(name)
    }
}

/// Static definition of one callable action
#[derive(Clone)]
pub struct OperationDescriptor {
    /// Resource domain (`records`, `roles`, ...)
    pub domain: &'static str,
    /// Action name; also the schema name
    pub action: &'static str,
    /// Entity name used in messages
    pub entity: &'static str,
    /// One-line description for the tool catalogue
    pub description: &'static str,
    /// Argument naming the entity id, if any
    pub id_field: Option<&'static str>,
    /// Which client adapter the action needs
    pub client_kind: ClientKind,
    /// How the output is shaped
    pub shape: Shape,
    /// Message template overriding the shape's default
    pub message: Option<&'static str>,
    /// Argument schema
    pub schema: Value,
    /// Cross-field check run after the schema
    pub refinement: Option<Refinement>,
    run: ActionFn,
}

impl fmt::Debug for OperationDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationDescriptor")
            .field("domain", &self.domain)
            .field("action", &self.action)
            .field("shape", &self.shape)
            .finish_non_exhaustive()
    }
}

impl OperationDescriptor {
    /// Describe an operation
    pub fn new(
        domain: &'static str,
        action: &'static str,
        entity: &'static str,
        shape: Shape,
        run: ActionFn,
    ) -> Self {
        Self {
            domain,
            action,
            entity,
            description: "",
            id_field: None,
            client_kind: ClientKind::Default,
            shape,
            message: None,
            schema: Value::Object(Map::new()),
            refinement: None,
            run,
        }
    }

    /// Set the description
    #[must_use]
    pub fn describe(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    /// Set the id argument
    #[must_use]
    pub fn id_field(mut self, field: &'static str) -> Self {
        self.id_field = Some(field);
        self
    }

    /// Set the client adapter
    #[must_use]
    pub fn client(mut self, kind: ClientKind) -> Self {
        self.client_kind = kind;
        self
    }

    /// Override the success message template
    #[must_use]
    pub fn message(mut self, template: &'static str) -> Self {
        self.message = Some(template);
        self
    }

    /// Set the argument schema
    #[must_use]
    pub fn schema(mut self, schema: Value) -> Self {
        self.schema = schema;
        self
    }

    /// Add a cross-field refinement
    #[must_use]
    pub fn refine(mut self, refinement: Refinement) -> Self {
        self.refinement = Some(refinement);
        self
    }

    /// Run the domain action
    pub(super) async fn run(&self, client: ClientHandle, args: ValidatedArgs) -> Result<Output> {
        (self.run)(client, args).await
    }

    /// The requested id, read from raw or validated arguments
    #[must_use]
    pub fn requested_id(&self, args: &Value) -> Option<String> {
        let field = self.id_field?;
        match args.get(field)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Turn an action's output into an envelope
    pub(super) fn shape_output(&self, output: Output, args: &ValidatedArgs) -> Result<Envelope> {
        let requested = self.requested_id(args.value());
        match self.shape {
            Shape::Create => {
                let entity = entity_of(output);
                let id = id_of(entity.as_ref()).or(requested);
                let template = self
                    .message
                    .unwrap_or("{entity} created successfully with ID '{id}'.");
                // No id to name: drop the template rather than leak `{id}`
                let template = if id.is_none() && template.contains("{id}") {
                    "{entity} created successfully."
                } else {
                    template
                };
                let message = self.render(template, id.as_deref(), None, entity.as_ref());
                Ok(Envelope::success(entity, Some(message)))
            }
            Shape::Retrieve => {
                let Some(entity) = entity_of(output) else {
                    return Err(Error::not_found(self.entity, requested.unwrap_or_default()));
                };
                let message = self
                    .message
                    .map(|t| self.render(t, requested.as_deref(), None, Some(&entity)));
                Ok(Envelope::success(Some(entity), message))
            }
            Shape::Update => {
                let entity = entity_of(output);
                let id = requested.or_else(|| id_of(entity.as_ref()));
                let message = self.render(
                    self.message.unwrap_or("{entity} {id} was successfully updated."),
                    id.as_deref(),
                    None,
                    entity.as_ref(),
                );
                Ok(Envelope::success(entity, Some(message)))
            }
            Shape::Delete => {
                let message = self.render(
                    self.message.unwrap_or("{entity} {id} was successfully deleted."),
                    requested.as_deref(),
                    None,
                    None,
                );
                Ok(Envelope::success(None, Some(message)))
            }
            Shape::List(formatter) => {
                let page = match output {
                    Output::Page(page) => page,
                    Output::Entity(Some(Value::Array(data))) => Page { data, total: None },
                    Output::Entity(_) | Output::Empty => Page::default(),
                };
                let view = formatter.unwrap_or(default_list)(page, args);
                let message = self.render(
                    self.message.unwrap_or("Found {count} {entity}(s)."),
                    requested.as_deref(),
                    Some(view.count),
                    None,
                );
                Ok(Envelope::success(Some(view.data), Some(message)).with_pagination(view.pagination))
            }
            Shape::Custom => {
                let (data, count, pagination) = match output {
                    Output::Entity(entity) => (entity, None, None),
                    Output::Page(page) => {
                        let view = default_list(page, args);
                        (Some(view.data), Some(view.count), view.pagination)
                    }
                    Output::Empty => (None, None, None),
                };
                let id = requested.or_else(|| id_of(data.as_ref()));
                let message = self
                    .message
                    .map(|t| self.render(t, id.as_deref(), count, data.as_ref()));
                Ok(Envelope::success(data, message).with_pagination(pagination))
            }
        }
    }

    fn render(
        &self,
        template: &str,
        id: Option<&str>,
        count: Option<usize>,
        result: Option<&Value>,
    ) -> String {
        render_template(template, self.entity, id, count, result)
    }
}

/// Substitute `{entity}`, `{id}`, `{count}` and top-level scalar fields of
/// `result` into `template`. Unknown placeholders are left as-is.
#[must_use]
pub fn render_template(
    template: &str,
    entity: &str,
    id: Option<&str>,
    count: Option<usize>,
    result: Option<&Value>,
) -> String {
    let mut out = template.replace("{entity}", entity);
    if let Some(id) = id {
        out = out.replace("{id}", id);
    }
    if let Some(count) = count {
        out = out.replace("{count}", &count.to_string());
    }
    if let Some(Value::Object(fields)) = result {
        for (key, value) in fields {
            let placeholder = format!("{{{key}}}");
            if !out.contains(&placeholder) {
                continue;
            }
            let rendered = match value {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => continue,
            };
            out = out.replace(&placeholder, &rendered);
        }
    }
    out
}

fn entity_of(output: Output) -> Option<Value> {
    match output {
        Output::Entity(entity) => entity,
        Output::Page(page) => Some(Value::Array(page.data)),
        Output::Empty => None,
    }
}

fn id_of(entity: Option<&Value>) -> Option<String> {
    entity?.get("id").and_then(Value::as_str).map(String::from)
}

/// Array payload; pagination from the `page` argument when the total is known
fn default_list(page: Page, args: &ValidatedArgs) -> ListView {
    let count = page.data.len();
    let pagination = page.total.map(|total| {
        let page_args = args.get("page");
        let limit = page_args
            .and_then(|p| p.get("limit"))
            .and_then(Value::as_u64)
            .unwrap_or(count as u64);
        let offset = page_args
            .and_then(|p| p.get("offset"))
            .and_then(Value::as_u64)
            .unwrap_or(0);
        Pagination::new(limit, offset, total, count)
    });
    ListView {
        data: Value::Array(page.data),
        count,
        pagination,
    }
}
