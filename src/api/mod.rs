//! One-shot HTTP calls: snapshot fetch, create mutation, token exchange.
//!
//! No retry lives here — the snapshot is fetched exactly once per
//! synchronizer startup and a failed fetch is a terminal startup error.

use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::auth::AccessToken;
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::tasks::{Task, TaskDraft};

/// HTTP client for the task API.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<AccessToken>,
}

impl ApiClient {
    pub fn new(config: &ClientConfig, token: Option<AccessToken>) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(ClientError::transport)?;
        Ok(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_owned(),
            token,
        })
    }

    /// Fetch the full task collection. Called once per synchronizer startup.
    pub async fn fetch_tasks(&self) -> Result<Vec<Task>, ClientError> {
        let resp = self.authorized(self.http.get(self.url("/tasks"))).send().await?;
        let resp = check_status(resp).await?;
        let tasks: Vec<Task> = resp.json().await?;
        debug!(count = tasks.len(), "api: snapshot fetched");
        Ok(tasks)
    }

    /// Submit a create mutation.
    ///
    /// The returned task carries the server-assigned id — that id, not
    /// anything client-generated, is what the store deduplicates on when the
    /// live channel later echoes the same creation.
    pub async fn create_task(&self, draft: &TaskDraft) -> Result<Task, ClientError> {
        let resp = self
            .authorized(self.http.post(self.url("/tasks")))
            .json(draft)
            .send()
            .await?;
        let resp = check_status(resp).await?;
        let task: Task = resp.json().await?;
        debug!(id = %task.id, "api: task created");
        Ok(task)
    }

    /// Exchange credentials for a bearer token (OAuth2 password form).
    pub async fn login(
        config: &ClientConfig,
        username: &str,
        password: &str,
    ) -> Result<AccessToken, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(ClientError::transport)?;
        let url = format!("{}/token", config.api_base_url.trim_end_matches('/'));
        let resp = http
            .post(url)
            .form(&[("username", username), ("password", password)])
            .send()
            .await?;
        let resp = check_status(resp).await?;
        let body: TokenResponse = resp.json().await?;
        Ok(AccessToken::new(body.access_token))
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token.as_str()),
            None => builder,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Map non-success statuses onto the error taxonomy. Rejections of the
/// caller's input (400/401/403/422) carry the server's detail text;
/// everything else is transport-level.
async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, ClientError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let detail = resp.text().await.unwrap_or_default();
    let rejected = matches!(status.as_u16(), 400 | 401 | 403 | 422);
    if rejected {
        Err(ClientError::Validation(if detail.is_empty() {
            status.to_string()
        } else {
            detail
        }))
    } else {
        Err(ClientError::Transport(format!("{status}: {detail}")))
    }
}
