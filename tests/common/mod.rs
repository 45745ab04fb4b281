//! In-memory fake of the DatoCMS CMA shared by the integration tests
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};

use datocms_mcp::Result;
use datocms_mcp::clients::{ClientFactory, Credential};
use datocms_mcp::cma::{CmaApi, Page, Query, UpstreamError, Verb};
use datocms_mcp::handler::Envelope;
use datocms_mcp::server::McpServer;
use datocms_mcp::trace;

/// One recorded upstream call
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub verb: &'static str,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

/// Scripted CMA: entities by path, pages by path, queued failures by `"VERB path"`
#[derive(Default)]
pub struct FakeCma {
    calls: Mutex<Vec<Call>>,
    entities: Mutex<HashMap<String, Value>>,
    pages: Mutex<HashMap<String, Page>>,
    script: Mutex<HashMap<String, VecDeque<Option<UpstreamError>>>>,
    created: AtomicUsize,
}

impl FakeCma {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// `GET path` returns `entity`
    pub fn with_entity(&self, path: &str, entity: Value) {
        self.entities.lock().insert(path.to_string(), entity);
    }

    /// `GET path` on a collection returns `page`
    pub fn with_page(&self, path: &str, data: Vec<Value>, total: Option<u64>) {
        self.pages
            .lock()
            .insert(path.to_string(), Page { data, total });
    }

    /// Queue outcomes for `"VERB path"`: `None` succeeds, `Some` fails
    pub fn script(&self, key: &str, outcomes: Vec<Option<UpstreamError>>) {
        self.script
            .lock()
            .insert(key.to_string(), outcomes.into_iter().collect());
    }

    /// Every call made so far
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    fn record(
        &self,
        verb: &'static str,
        path: &str,
        query: &Query,
        body: Option<Value>,
    ) -> Result<()> {
        trace::record_api_call();
        self.calls.lock().push(Call {
            verb,
            path: path.to_string(),
            query: query.to_vec(),
            body,
        });
        let key = format!("{verb} {path}");
        let next = self
            .script
            .lock()
            .get_mut(&key)
            .and_then(VecDeque::pop_front)
            .flatten();
        match next {
            Some(error) => Err(error.into()),
            None => Ok(()),
        }
    }
}

fn id_from(path: &str) -> Value {
    path.trim_start_matches('/')
        .split('/')
        .nth(1)
        .map_or(Value::Null, |id| Value::String(id.to_string()))
}

#[async_trait]
impl CmaApi for FakeCma {
    async fn find(&self, path: &str, query: &Query) -> Result<Option<Value>> {
        self.record("GET", path, query, None)?;
        Ok(self.entities.lock().get(path).cloned())
    }

    async fn list(&self, path: &str, query: &Query) -> Result<Page> {
        self.record("GET", path, query, None)?;
        Ok(self.pages.lock().get(path).cloned().unwrap_or_default())
    }

    async fn create(&self, path: &str, _kind: &str, mut entity: Value) -> Result<Value> {
        self.record("POST", path, &[], Some(entity.clone()))?;
        let n = self.created.fetch_add(1, Ordering::Relaxed) + 1;
        if let Value::Object(map) = &mut entity {
            map.insert("id".to_string(), json!(format!("new-{n}")));
        }
        Ok(entity)
    }

    async fn update(&self, path: &str, _kind: &str, mut entity: Value) -> Result<Value> {
        self.record("PUT", path, &[], Some(entity.clone()))?;
        if let Value::Object(map) = &mut entity {
            map.entry("id").or_insert_with(|| id_from(path));
        }
        Ok(entity)
    }

    async fn destroy(&self, path: &str) -> Result<Option<Value>> {
        self.record("DELETE", path, &[], None)?;
        Ok(None)
    }

    async fn perform(&self, verb: Verb, path: &str, document: Option<Value>) -> Result<Value> {
        let verb = match verb {
            Verb::Get => "GET",
            Verb::Post => "POST",
            Verb::Put => "PUT",
            Verb::Delete => "DELETE",
        };
        self.record(verb, path, &[], document)?;
        Ok(json!({ "id": id_from(path), "path": path }))
    }
}

/// Hands out the same fake for every credential and counts builds
pub struct FakeFactory {
    pub api: Arc<FakeCma>,
    pub builds: AtomicUsize,
}

impl FakeFactory {
    pub fn new(api: Arc<FakeCma>) -> Arc<Self> {
        Arc::new(Self {
            api,
            builds: AtomicUsize::new(0),
        })
    }
}

impl ClientFactory for FakeFactory {
    fn build(&self, _credential: &Credential) -> Arc<dyn CmaApi> {
        self.builds.fetch_add(1, Ordering::Relaxed);
        Arc::clone(&self.api) as Arc<dyn CmaApi>
    }
}

/// A server over `api`
pub fn server(api: &Arc<FakeCma>) -> McpServer {
    McpServer::new(FakeFactory::new(Arc::clone(api)), 16, false)
}

/// Dispatch `action` on `tool` and return the envelope
pub async fn call(server: &McpServer, tool: &str, action: &str, args: Value) -> Envelope {
    server
        .routers()
        .get(tool)
        .unwrap_or_else(|| panic!("no tool {tool}"))
        .call(json!({ "action": action, "args": args }))
        .await
}

/// 404 the way the CMA reports a missing entity
pub fn not_found() -> UpstreamError {
    UpstreamError::message("RECORD_NOT_FOUND")
        .with_status(404)
        .with_code("RECORD_NOT_FOUND")
}

/// 422 the way the CMA reports a stale version
pub fn stale_version() -> UpstreamError {
    UpstreamError::message("STALE_ITEM_VERSION")
        .with_status(422)
        .with_code("STALE_ITEM_VERSION")
}
