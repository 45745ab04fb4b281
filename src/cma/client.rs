//! `reqwest`-backed [`CmaApi`] implementation

use std::fmt;

use async_trait::async_trait;
use backon::{ConstantBuilder, Retryable};
use reqwest::{
    Client, StatusCode,
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue},
};
use serde_json::Value;
use tracing::debug;

use super::{CmaApi, Page, Query, UpstreamError, Verb, jsonapi, segment};
use crate::clients::Credential;
use crate::config::{CmaConfig, JobPollConfig};
use crate::{Error, Result, trace};

const JSON_API: &str = "application/vnd.api+json";

/// CMA client bound to one credential.
///
/// The underlying [`reqwest::Client`] is shared between all instances so
/// connection pooling spans credentials.
pub struct HttpCmaClient {
    http: Client,
    base_url: String,
    api_version: String,
    token: String,
    environment: Option<String>,
    job_poll: JobPollConfig,
}

impl fmt::Debug for HttpCmaClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // never print the token
        f.debug_struct("HttpCmaClient")
            .field("base_url", &self.base_url)
            .field("environment", &self.environment)
            .finish_non_exhaustive()
    }
}

impl HttpCmaClient {
    /// Create a client for `credential` on top of a shared HTTP client
    #[must_use]
    pub fn new(http: Client, config: &CmaConfig, credential: &Credential) -> Self {
        Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_version: config.api_version.clone(),
            token: credential.token().to_string(),
            environment: credential.environment().map(String::from),
            job_poll: config.job_poll.clone(),
        }
    }

    /// Build request headers.
    ///
    /// A malformed token only fails here, on first use.
    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_API));

        let auth: HeaderValue = format!("Bearer {}", self.token)
            .parse()
            // Don't include credential in error message
            .map_err(|_| Error::Config("Invalid API token format".to_string()))?;
        headers.insert(AUTHORIZATION, auth);

        let version: HeaderValue = self
            .api_version
            .parse()
            .map_err(|_| Error::Config("Invalid API version".to_string()))?;
        headers.insert(HeaderName::from_static("x-api-version"), version);

        if let Some(ref env) = self.environment {
            let value: HeaderValue = env
                .parse()
                .map_err(|_| Error::Config(format!("Invalid environment name: {env}")))?;
            headers.insert(HeaderName::from_static("x-environment"), value);
        }

        if let Some(ctx) = trace::current() {
            if let Ok(value) = ctx.request_id.parse() {
                headers.insert(HeaderName::from_static("x-request-id"), value);
            }
        }

        Ok(headers)
    }

    /// Issue one HTTP request and return `(status, document)`.
    async fn execute(
        &self,
        verb: Verb,
        path: &str,
        query: &Query,
        body: Option<&Value>,
    ) -> Result<(StatusCode, Value)> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.http.request(verb.as_method(), &url).headers(self.headers()?);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        trace::record_api_call();
        let response = request
            .send()
            .await
            .map_err(|e| Error::Transport(format!("Request failed: {e}")))?;

        let status = response.status();
        debug!(method = %verb, path, status = status.as_u16(), "CMA request");

        let text = response
            .text()
            .await
            .map_err(|e| Error::Transport(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(UpstreamError::from_response(status.as_u16(), &text).into());
        }
        if text.trim().is_empty() {
            return Ok((status, Value::Null));
        }

        let document = serde_json::from_str(&text)
            .map_err(|e| Error::Protocol(format!("Failed to parse response: {e}")))?;
        Ok((status, document))
    }

    /// Execute a request, waiting for the job result when the API answers
    /// `202 Accepted` with a job.
    async fn send(
        &self,
        verb: Verb,
        path: &str,
        query: &Query,
        body: Option<&Value>,
    ) -> Result<Value> {
        let (status, document) = self.execute(verb, path, query, body).await?;

        if status == StatusCode::ACCEPTED {
            if let Some(job_id) = job_id(&document) {
                return self.await_job(&job_id).await;
            }
        }
        Ok(document)
    }

    /// Poll `/job-results/{id}` until the job finishes.
    ///
    /// The endpoint answers 404 while the job is still running.
    async fn await_job(&self, job_id: &str) -> Result<Value> {
        let path = format!("/job-results/{}", segment(job_id));
        debug!(job_id, "Waiting for job result");

        let poll = || async { self.execute(Verb::Get, &path, &[], None).await };
        // `max_times` counts retries; the first poll is not one
        let result = poll
            .retry(
                ConstantBuilder::default()
                    .with_delay(self.job_poll.interval)
                    .with_max_times(self.job_poll.max_attempts.saturating_sub(1)),
            )
            .when(is_pending)
            .await;

        let (_, document) = match result {
            Ok(ok) => ok,
            Err(e) if is_pending(&e) => {
                return Err(Error::Transport(format!(
                    "Job {job_id} did not complete after {} polls",
                    self.job_poll.max_attempts
                )));
            }
            Err(e) => return Err(e),
        };

        let result = jsonapi::deserialize(&document);
        let status = result
            .get("status")
            .and_then(Value::as_u64)
            .and_then(|s| u16::try_from(s).ok())
            .unwrap_or(200);
        let payload = result.get("payload").cloned().unwrap_or(Value::Null);

        if status >= 400 {
            return Err(UpstreamError::from_response(status, &payload.to_string()).into());
        }
        Ok(payload)
    }
}

#[async_trait]
impl CmaApi for HttpCmaClient {
    async fn find(&self, path: &str, query: &Query) -> Result<Option<Value>> {
        let document = self.send(Verb::Get, path, query, None).await?;
        Ok(non_null(jsonapi::deserialize(&document)))
    }

    async fn list(&self, path: &str, query: &Query) -> Result<Page> {
        let document = self.send(Verb::Get, path, query, None).await?;
        let data = match jsonapi::deserialize(&document) {
            Value::Array(items) => items,
            Value::Null => Vec::new(),
            other => vec![other],
        };
        Ok(Page {
            data,
            total: jsonapi::total_count(&document),
        })
    }

    async fn create(&self, path: &str, kind: &str, entity: Value) -> Result<Value> {
        let body = jsonapi::serialize(kind, &entity);
        let document = self.send(Verb::Post, path, &[], Some(&body)).await?;
        Ok(jsonapi::deserialize(&document))
    }

    async fn update(&self, path: &str, kind: &str, entity: Value) -> Result<Value> {
        let body = jsonapi::serialize(kind, &entity);
        let document = self.send(Verb::Put, path, &[], Some(&body)).await?;
        Ok(jsonapi::deserialize(&document))
    }

    async fn destroy(&self, path: &str) -> Result<Option<Value>> {
        let document = self.send(Verb::Delete, path, &[], None).await?;
        Ok(non_null(jsonapi::deserialize(&document)))
    }

    async fn perform(&self, verb: Verb, path: &str, document: Option<Value>) -> Result<Value> {
        let response = self.send(verb, path, &[], document.as_ref()).await?;
        Ok(jsonapi::deserialize(&response))
    }
}

fn non_null(value: Value) -> Option<Value> {
    if value.is_null() { None } else { Some(value) }
}

fn job_id(document: &Value) -> Option<String> {
    let data = document.get("data")?;
    if data.get("type").and_then(Value::as_str) != Some("job") {
        return None;
    }
    data.get("id").and_then(Value::as_str).map(String::from)
}

fn is_pending(error: &Error) -> bool {
    matches!(error, Error::Upstream(e) if e.status == Some(404))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use axum::extract::State;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tokio::net::TcpListener;

    fn client(environment: Option<&str>) -> HttpCmaClient {
        let credential = Credential::new("secret-token", environment.map(String::from));
        HttpCmaClient::new(Client::new(), &CmaConfig::default(), &credential)
    }

    #[test]
    fn headers_carry_auth_version_and_environment() {
        let headers = client(Some("sandbox")).headers().unwrap();
        assert_eq!(headers[AUTHORIZATION], "Bearer secret-token");
        assert_eq!(headers["x-api-version"], "3");
        assert_eq!(headers["x-environment"], "sandbox");
        assert_eq!(headers[CONTENT_TYPE], JSON_API);
    }

    #[test]
    fn primary_environment_sends_no_environment_header() {
        let headers = client(None).headers().unwrap();
        assert!(headers.get("x-environment").is_none());
    }

    #[test]
    fn malformed_token_fails_lazily_without_leaking() {
        let credential = Credential::new("bad\ntoken", None);
        let client = HttpCmaClient::new(Client::new(), &CmaConfig::default(), &credential);
        let err = client.headers().unwrap_err();
        assert!(!err.to_string().contains("bad"));
    }

    #[test]
    fn debug_output_hides_token() {
        let rendered = format!("{:?}", client(None));
        assert!(!rendered.contains("secret-token"));
    }

    #[test]
    fn job_id_only_matches_job_documents() {
        assert_eq!(
            job_id(&json!({"data": {"type": "job", "id": "j1"}})),
            Some("j1".to_string())
        );
        assert_eq!(job_id(&json!({"data": {"type": "item", "id": "i1"}})), None);
    }

    #[test]
    fn pending_means_upstream_404() {
        assert!(is_pending(&UpstreamError::message("nope").with_status(404).into()));
        assert!(!is_pending(&UpstreamError::message("nope").with_status(500).into()));
        assert!(!is_pending(&Error::Transport("down".into())));
    }
    // ── Against a local CMA ─────────────────────────────────────────────

    /// Job endpoints: `/job-results/j1` answers 404 `pending` times, then
    /// the job result with `job_status`
    struct MockCma {
        pending: usize,
        job_status: u16,
        polls: AtomicUsize,
    }

    fn field_error() -> Value {
        json!({"data": [{
            "id": "e1",
            "type": "api_error",
            "attributes": {"code": "INVALID_FIELD", "details": {"field": "title", "code": "VALIDATION_REQUIRED"}}
        }]})
    }

    async fn accept_job() -> (StatusCode, Json<Value>) {
        (StatusCode::ACCEPTED, Json(json!({"data": {"type": "job", "id": "j1"}})))
    }

    async fn reject_item() -> (StatusCode, Json<Value>) {
        (StatusCode::UNPROCESSABLE_ENTITY, Json(field_error()))
    }

    async fn job_result(State(mock): State<Arc<MockCma>>) -> (StatusCode, Json<Value>) {
        if mock.polls.fetch_add(1, Ordering::SeqCst) < mock.pending {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({"data": [{"attributes": {"code": "NOT_FOUND"}}]})),
            );
        }
        let payload = if mock.job_status >= 400 {
            field_error()
        } else {
            json!({"data": {"type": "item", "id": "2", "attributes": {"title": "copy"}}})
        };
        let document = json!({"data": {
            "type": "job_result",
            "id": "j1",
            "attributes": {"status": mock.job_status, "payload": payload}
        }});
        (StatusCode::OK, Json(document))
    }

    async fn serve_mock(pending: usize, job_status: u16, max_attempts: usize) -> (HttpCmaClient, Arc<MockCma>) {
        let mock = Arc::new(MockCma {
            pending,
            job_status,
            polls: AtomicUsize::new(0),
        });
        let app = Router::new()
            .route("/items", post(reject_item))
            .route("/items/1/duplicate", post(accept_job))
            .route("/job-results/j1", get(job_result))
            .with_state(Arc::clone(&mock));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        let config = CmaConfig {
            base_url: format!("http://{addr}"),
            job_poll: JobPollConfig {
                interval: Duration::from_millis(1),
                max_attempts,
            },
            ..CmaConfig::default()
        };
        let client = HttpCmaClient::new(Client::new(), &config, &Credential::new("tok", None));
        (client, mock)
    }

    #[tokio::test]
    async fn accepted_jobs_are_polled_until_the_result_lands() {
        // GIVEN: a job that is still running for two polls
        let (client, mock) = serve_mock(2, 200, 10).await;

        // WHEN: duplicating a record
        let copy = client
            .perform(Verb::Post, "/items/1/duplicate", None)
            .await
            .unwrap();

        // THEN: the job payload comes back flattened after the third poll
        assert_eq!(copy, json!({"id": "2", "type": "item", "title": "copy"}));
        assert_eq!(mock.polls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn failed_job_results_become_upstream_errors() {
        let (client, _) = serve_mock(0, 422, 10).await;

        let err = client
            .perform(Verb::Post, "/items/1/duplicate", None)
            .await
            .unwrap_err();

        let Error::Upstream(upstream) = err else {
            panic!("expected an upstream error, got {err:?}");
        };
        assert_eq!(upstream.status, Some(422));
        assert_eq!(upstream.code.as_deref(), Some("INVALID_FIELD"));
    }

    #[tokio::test]
    async fn polling_gives_up_after_max_attempts() {
        // GIVEN: a job that never finishes
        let (client, mock) = serve_mock(usize::MAX, 200, 3).await;

        // WHEN: waiting for it
        let err = client
            .perform(Verb::Post, "/items/1/duplicate", None)
            .await
            .unwrap_err();

        // THEN: a transport error after exactly the configured polls
        assert!(matches!(err, Error::Transport(_)), "{err:?}");
        assert!(err.to_string().contains("did not complete after 3 polls"));
        assert_eq!(mock.polls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn error_bodies_are_parsed_into_upstream_errors() {
        let (client, _) = serve_mock(0, 200, 1).await;

        let err = client
            .create("/items", "item", json!({"title": ""}))
            .await
            .unwrap_err();

        let Error::Upstream(upstream) = err else {
            panic!("expected an upstream error, got {err:?}");
        };
        assert_eq!(upstream.status, Some(422));
        assert_eq!(upstream.code.as_deref(), Some("INVALID_FIELD"));
        assert_eq!(upstream.details[0]["details"]["field"], "title");
    }
}
