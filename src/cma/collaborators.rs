//! Collaborators-specialized adapter over [`CmaApi`]

use std::sync::Arc;

use serde_json::Value;

use super::{CmaApi, Page, Verb, segment};
use crate::Result;

/// Typed access to users, invitations, roles and API tokens
pub struct CollaboratorsClient {
    api: Arc<dyn CmaApi>,
}

impl CollaboratorsClient {
    /// Wrap a raw API client
    pub fn new(api: Arc<dyn CmaApi>) -> Self {
        Self { api }
    }

    /// The wrapped API client
    #[must_use]
    pub fn api(&self) -> Arc<dyn CmaApi> {
        Arc::clone(&self.api)
    }

    // ── users ────────────────────────────────────────────────────────────

    /// `GET /users`
    pub async fn list_users(&self) -> Result<Page> {
        self.api.list("/users", &[]).await
    }

    /// `GET /users/{id}`
    pub async fn find_user(&self, id: &str) -> Result<Option<Value>> {
        self.api.find(&path("/users", id), &[]).await
    }

    /// `PUT /users/{id}`
    pub async fn update_user(&self, id: &str, user: Value) -> Result<Value> {
        self.api.update(&path("/users", id), "user", user).await
    }

    /// `DELETE /users/{id}`
    pub async fn destroy_user(&self, id: &str) -> Result<Option<Value>> {
        self.api.destroy(&path("/users", id)).await
    }

    // ── invitations ──────────────────────────────────────────────────────

    /// `GET /site-invitations`
    pub async fn list_invitations(&self) -> Result<Page> {
        self.api.list("/site-invitations", &[]).await
    }

    /// `POST /site-invitations`
    pub async fn invite(&self, invitation: Value) -> Result<Value> {
        self.api
            .create("/site-invitations", "site_invitation", invitation)
            .await
    }

    /// `POST /site-invitations/{id}/resend`
    pub async fn resend_invitation(&self, id: &str) -> Result<Value> {
        self.api
            .perform(
                Verb::Post,
                &format!("{}/resend", path("/site-invitations", id)),
                None,
            )
            .await
    }

    /// `DELETE /site-invitations/{id}`
    pub async fn destroy_invitation(&self, id: &str) -> Result<Option<Value>> {
        self.api.destroy(&path("/site-invitations", id)).await
    }

    // ── roles ────────────────────────────────────────────────────────────

    /// `GET /roles`
    pub async fn list_roles(&self) -> Result<Page> {
        self.api.list("/roles", &[]).await
    }

    /// `GET /roles/{id}`
    pub async fn find_role(&self, id: &str) -> Result<Option<Value>> {
        self.api.find(&path("/roles", id), &[]).await
    }

    /// `POST /roles`
    pub async fn create_role(&self, role: Value) -> Result<Value> {
        self.api.create("/roles", "role", role).await
    }

    /// `PUT /roles/{id}`
    pub async fn update_role(&self, id: &str, role: Value) -> Result<Value> {
        self.api.update(&path("/roles", id), "role", role).await
    }

    /// `DELETE /roles/{id}`
    pub async fn destroy_role(&self, id: &str) -> Result<Option<Value>> {
        self.api.destroy(&path("/roles", id)).await
    }

    // ── API tokens ───────────────────────────────────────────────────────

    /// `GET /access_tokens`
    pub async fn list_tokens(&self) -> Result<Page> {
        self.api.list("/access_tokens", &[]).await
    }

    /// `GET /access_tokens/{id}`
    pub async fn find_token(&self, id: &str) -> Result<Option<Value>> {
        self.api.find(&path("/access_tokens", id), &[]).await
    }

    /// `POST /access_tokens`
    pub async fn create_token(&self, token: Value) -> Result<Value> {
        self.api
            .create("/access_tokens", "access_token", token)
            .await
    }

    /// `PUT /access_tokens/{id}`
    pub async fn update_token(&self, id: &str, token: Value) -> Result<Value> {
        self.api
            .update(&path("/access_tokens", id), "access_token", token)
            .await
    }

    /// `DELETE /access_tokens/{id}`
    pub async fn destroy_token(&self, id: &str) -> Result<Option<Value>> {
        self.api.destroy(&path("/access_tokens", id)).await
    }

    /// `POST /access_tokens/{id}/regenerate_token`
    pub async fn regenerate_token(&self, id: &str) -> Result<Value> {
        self.api
            .perform(
                Verb::Post,
                &format!("{}/regenerate_token", path("/access_tokens", id)),
                None,
            )
            .await
    }
}

fn path(collection: &str, id: &str) -> String {
    format!("{collection}/{}", segment(id))
}
