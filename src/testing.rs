//! In-memory CMA doubles shared by the unit tests

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::Value;

use crate::Result;
use crate::clients::{ClientFactory, Credential};
use crate::cma::{CmaApi, Page, Query, Verb};

/// Finds nothing, echoes writes back and lists a fixed page
#[derive(Debug, Default)]
pub(crate) struct StaticApi {
    page: Page,
}

#[async_trait]
impl CmaApi for StaticApi {
    async fn find(&self, _: &str, _: &Query) -> Result<Option<Value>> {
        Ok(None)
    }

    async fn list(&self, _: &str, _: &Query) -> Result<Page> {
        Ok(self.page.clone())
    }

    async fn create(&self, _: &str, _: &str, entity: Value) -> Result<Value> {
        Ok(entity)
    }

    async fn update(&self, _: &str, _: &str, entity: Value) -> Result<Value> {
        Ok(entity)
    }

    async fn destroy(&self, _: &str) -> Result<Option<Value>> {
        Ok(None)
    }

    async fn perform(&self, _: Verb, _: &str, _: Option<Value>) -> Result<Value> {
        Ok(Value::Null)
    }
}

/// Builds a fresh [`StaticApi`] per client and counts the builds
#[derive(Debug, Default)]
pub(crate) struct StaticFactory {
    page: Page,
    built: AtomicUsize,
}

impl StaticFactory {
    /// A factory whose clients list `data`
    pub(crate) fn listing(data: Vec<Value>) -> Self {
        Self {
            page: Page {
                total: Some(data.len() as u64),
                data,
            },
            built: AtomicUsize::new(0),
        }
    }

    /// Clients built so far
    pub(crate) fn built(&self) -> usize {
        self.built.load(Ordering::SeqCst)
    }
}

impl ClientFactory for StaticFactory {
    fn build(&self, _: &Credential) -> Arc<dyn CmaApi> {
        self.built.fetch_add(1, Ordering::SeqCst);
        Arc::new(StaticApi {
            page: self.page.clone(),
        })
    }
}
