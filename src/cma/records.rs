//! Records-specialized adapter over [`CmaApi`]

use std::sync::Arc;

use serde_json::{Value, json};

use super::{CmaApi, Page, Query, Verb, jsonapi, segment};
use crate::Result;

/// Locale selection for a partial publish/unpublish
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectivePublish {
    /// Locales whose content is (un)published
    pub content_in_locales: Vec<String>,
    /// Whether non-localized fields are published too (publish only)
    pub non_localized_content: bool,
}

/// Typed access to records (`items`), their versions and scheduling
pub struct RecordsClient {
    api: Arc<dyn CmaApi>,
}

impl RecordsClient {
    /// Wrap a raw API client
    pub fn new(api: Arc<dyn CmaApi>) -> Self {
        Self { api }
    }

    /// The wrapped API client
    #[must_use]
    pub fn api(&self) -> Arc<dyn CmaApi> {
        Arc::clone(&self.api)
    }

    /// `GET /items`
    pub async fn list(&self, query: &Query) -> Result<Page> {
        self.api.list("/items", query).await
    }

    /// `GET /items/{id}`
    pub async fn find(&self, id: &str, query: &Query) -> Result<Option<Value>> {
        self.api.find(&item_path(id), query).await
    }

    /// `POST /items`
    pub async fn create(&self, record: Value) -> Result<Value> {
        self.api.create("/items", "item", record).await
    }

    /// `PUT /items/{id}`
    pub async fn update(&self, id: &str, record: Value) -> Result<Value> {
        self.api.update(&item_path(id), "item", record).await
    }

    /// `POST /items/{id}/duplicate`
    pub async fn duplicate(&self, id: &str) -> Result<Value> {
        self.api
            .perform(Verb::Post, &format!("{}/duplicate", item_path(id)), None)
            .await
    }

    /// `DELETE /items/{id}`
    pub async fn destroy(&self, id: &str) -> Result<Option<Value>> {
        self.api.destroy(&item_path(id)).await
    }

    /// `POST /items/{id}/publish`, optionally for a subset of locales
    pub async fn publish(&self, id: &str, selective: Option<&SelectivePublish>) -> Result<Value> {
        let body = selective.map(|s| {
            jsonapi::serialize(
                "selective_publish_operation",
                &json!({
                    "content_in_locales": s.content_in_locales,
                    "non_localized_content": s.non_localized_content,
                }),
            )
        });
        self.api
            .perform(Verb::Post, &format!("{}/publish", item_path(id)), body)
            .await
    }

    /// `POST /items/{id}/unpublish`, optionally for a subset of locales
    pub async fn unpublish(&self, id: &str, selective: Option<&SelectivePublish>) -> Result<Value> {
        let body = selective.map(|s| {
            jsonapi::serialize(
                "selective_unpublish_operation",
                &json!({ "content_in_locales": s.content_in_locales }),
            )
        });
        self.api
            .perform(Verb::Post, &format!("{}/unpublish", item_path(id)), body)
            .await
    }

    /// `POST /items/{id}/scheduled-publication`
    pub async fn schedule_publication(&self, id: &str, at: &str) -> Result<Value> {
        let body = jsonapi::serialize(
            "scheduled_publication",
            &json!({ "publication_scheduled_at": at }),
        );
        self.api
            .perform(
                Verb::Post,
                &format!("{}/scheduled-publication", item_path(id)),
                Some(body),
            )
            .await
    }

    /// `DELETE /items/{id}/scheduled-publication`
    pub async fn cancel_scheduled_publication(&self, id: &str) -> Result<Value> {
        self.api
            .perform(
                Verb::Delete,
                &format!("{}/scheduled-publication", item_path(id)),
                None,
            )
            .await
    }

    /// `POST /items/{id}/scheduled-unpublishing`
    pub async fn schedule_unpublishing(&self, id: &str, at: &str) -> Result<Value> {
        let body = jsonapi::serialize(
            "scheduled_unpublishing",
            &json!({ "unpublishing_scheduled_at": at }),
        );
        self.api
            .perform(
                Verb::Post,
                &format!("{}/scheduled-unpublishing", item_path(id)),
                Some(body),
            )
            .await
    }

    /// `DELETE /items/{id}/scheduled-unpublishing`
    pub async fn cancel_scheduled_unpublishing(&self, id: &str) -> Result<Value> {
        self.api
            .perform(
                Verb::Delete,
                &format!("{}/scheduled-unpublishing", item_path(id)),
                None,
            )
            .await
    }

    /// `GET /items/{id}/references`
    pub async fn references(&self, id: &str, query: &Query) -> Result<Page> {
        self.api
            .list(&format!("{}/references", item_path(id)), query)
            .await
    }

    /// `GET /items/{id}/versions`
    pub async fn versions(&self, id: &str, query: &Query) -> Result<Page> {
        self.api
            .list(&format!("{}/versions", item_path(id)), query)
            .await
    }

    /// `POST /versions/{id}/restore`
    pub async fn restore_version(&self, version_id: &str) -> Result<Value> {
        self.api
            .perform(
                Verb::Post,
                &format!("/versions/{}/restore", segment(version_id)),
                None,
            )
            .await
    }

    /// `GET /site`
    pub async fn site(&self) -> Result<Option<Value>> {
        self.api.find("/site", &[]).await
    }
}

fn item_path(id: &str) -> String {
    format!("/items/{}", segment(id))
}
