use crate::api::types::{
    Article, ArticleList, ArticlePage, CategoryList, CategoryUpdate, CreatedId, ErrorBody,
    SubscriptionResponse, SubscriptionUpdate, Synchronization, SynchronizationList, TreePayload,
};
use crate::util::{validate_server_url, UrlValidationError};
use futures::StreamExt;
use reqwest::header::COOKIE;
use reqwest::{Method, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use url::Url;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);
const MAX_RESPONSE_SIZE: usize = 8 * 1024 * 1024; // 8MB
const MAX_RETRIES: u32 = 3;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Request timed out after 20s")]
    Timeout,
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("HTTP error {status}: {}", .message.as_deref().unwrap_or("request failed"))]
    HttpStatus { status: u16, message: Option<String> },
    #[error("Malformed response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Response too large (exceeds {0} bytes)")]
    ResponseTooLarge(usize),
    #[error("Invalid server URL: {0}")]
    InvalidBaseUrl(UrlValidationError),
    #[error("Refusing to send the auth token over plain HTTP to {0}")]
    InsecureBaseUrl(String),
}

impl From<UrlValidationError> for ApiError {
    fn from(e: UrlValidationError) -> Self {
        match e {
            UrlValidationError::InsecureServer(host) => ApiError::InsecureBaseUrl(host),
            other => ApiError::InvalidBaseUrl(other),
        }
    }
}

impl ApiError {
    /// Returns true if this error is transient and an idempotent request
    /// may be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Timeout | ApiError::Network(_) => true,
            ApiError::HttpStatus { status, .. } => *status >= 500,
            ApiError::Decode(_)
            | ApiError::ResponseTooLarge(_)
            | ApiError::InvalidBaseUrl(_)
            | ApiError::InsecureBaseUrl(_) => false,
        }
    }

    /// Text suitable for the status bar: the server's own message when it
    /// sent one.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::HttpStatus {
                message: Some(message),
                ..
            } => message.clone(),
            other => other.to_string(),
        }
    }
}

// ============================================================================
// Client
// ============================================================================

/// Typed client for the reader's REST API.
///
/// Cheap to clone: the underlying `reqwest::Client` pools connections and
/// the token is shared.
#[derive(Clone)]
pub struct ReaderClient {
    http: reqwest::Client,
    base: Url,
    auth_token: Option<Arc<SecretString>>,
    retry_delay: Duration,
}

impl std::fmt::Debug for ReaderClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReaderClient")
            .field("base", &self.base.as_str())
            .field("auth_token", &self.auth_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl ReaderClient {
    /// Build a client for `base_url`.
    ///
    /// The token, when present, travels as the `auth_token` cookie, so a
    /// plain-HTTP base URL is only accepted for loopback hosts in that case.
    pub fn new(base_url: &str, auth_token: Option<SecretString>) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(4)
            .pool_idle_timeout(Duration::from_secs(30))
            .tcp_keepalive(Duration::from_secs(60))
            .timeout(Duration::from_secs(30))
            .build()?;
        Self::with_http_client(http, base_url, auth_token)
    }

    pub fn with_http_client(
        http: reqwest::Client,
        base_url: &str,
        auth_token: Option<SecretString>,
    ) -> Result<Self, ApiError> {
        let mut base = validate_server_url(base_url, auth_token.is_some())?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        tracing::debug!(base = %base, authenticated = auth_token.is_some(), "Reader client configured");
        Ok(Self {
            http,
            base,
            auth_token: auth_token.map(Arc::new),
            retry_delay: Duration::from_secs(1),
        })
    }

    /// Override the first backoff step (doubles on each retry).
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    // ------------------------------------------------------------------------
    // Subscriptions
    // ------------------------------------------------------------------------

    /// Fetch the whole subscription tree, optionally filtered server-side
    /// to subscriptions with unread articles.
    pub async fn list_tree(&self, unread: bool) -> Result<TreePayload, ApiError> {
        self.get_json(&["subscription", "list"], &[("unread", unread)])
            .await
    }

    /// Subscribe to a feed. Returns the new subscription id.
    pub async fn add_subscription(&self, url: &str) -> Result<String, ApiError> {
        let created: CreatedId = self
            .send_form_json(Method::PUT, &["subscription"], &[("url", url)])
            .await?;
        Ok(created.id)
    }

    pub async fn update_subscription(
        &self,
        id: &str,
        update: &SubscriptionUpdate,
    ) -> Result<(), ApiError> {
        self.send_form(Method::POST, &["subscription", id], update)
            .await
    }

    pub async fn delete_subscription(&self, id: &str) -> Result<(), ApiError> {
        self.send_empty(Method::DELETE, &["subscription", id]).await
    }

    pub async fn subscription(
        &self,
        id: &str,
        page: &ArticlePage,
    ) -> Result<SubscriptionResponse, ApiError> {
        self.get_json(&["subscription", id], page).await
    }

    pub async fn synchronizations(&self, id: &str) -> Result<Vec<Synchronization>, ApiError> {
        let list: SynchronizationList = self
            .get_json(&["subscription", id, "sync"], &[] as &[(&str, &str)])
            .await?;
        Ok(list.synchronizations)
    }

    pub async fn mark_subscription_read(&self, id: &str) -> Result<(), ApiError> {
        self.send_empty(Method::POST, &["subscription", id, "read"])
            .await
    }

    // ------------------------------------------------------------------------
    // Categories
    // ------------------------------------------------------------------------

    /// Create a top-level category. Returns the new category id.
    pub async fn create_category(&self, name: &str) -> Result<String, ApiError> {
        let created: CreatedId = self
            .send_form_json(Method::PUT, &["category"], &[("name", name)])
            .await?;
        Ok(created.id)
    }

    pub async fn update_category(&self, id: &str, update: &CategoryUpdate) -> Result<(), ApiError> {
        self.send_form(Method::POST, &["category", id], update).await
    }

    pub async fn delete_category(&self, id: &str) -> Result<(), ApiError> {
        self.send_empty(Method::DELETE, &["category", id]).await
    }

    pub async fn mark_category_read(&self, id: &str) -> Result<(), ApiError> {
        self.send_empty(Method::POST, &["category", id, "read"]).await
    }

    pub async fn category_list(&self) -> Result<CategoryList, ApiError> {
        self.get_json(&["category", "list"], &[] as &[(&str, &str)])
            .await
    }

    // ------------------------------------------------------------------------
    // Articles
    // ------------------------------------------------------------------------

    pub async fn category_articles(
        &self,
        id: &str,
        page: &ArticlePage,
    ) -> Result<Vec<Article>, ApiError> {
        let list: ArticleList = self.get_json(&["category", id], page).await?;
        Ok(list.articles)
    }

    pub async fn all_articles(&self, page: &ArticlePage) -> Result<Vec<Article>, ApiError> {
        let list: ArticleList = self.get_json(&["all"], page).await?;
        Ok(list.articles)
    }

    /// Mark a batch of articles read (or unread) in one request.
    pub async fn mark_articles(&self, ids: &[String], read: bool) -> Result<(), ApiError> {
        let endpoint = if read { "read" } else { "unread" };
        let form: Vec<(&str, &str)> = ids.iter().map(|id| ("id", id.as_str())).collect();
        self.send_form(Method::POST, &["article", endpoint], &form)
            .await
    }

    // ------------------------------------------------------------------------
    // Transport
    // ------------------------------------------------------------------------

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidBaseUrl(UrlValidationError::MissingHost))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let request = self.http.request(method, url);
        match &self.auth_token {
            Some(token) => request.header(COOKIE, format!("auth_token={}", token.expose_secret())),
            None => request,
        }
    }

    /// GET with retry for transient failures.
    /// Uses exponential backoff from `retry_delay`: 1s, 2s, 4s by default.
    async fn get_json<T, Q>(&self, segments: &[&str], query: &Q) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let url = self.endpoint(segments)?;
        let mut retry_count = 0;

        loop {
            let request = self.request(Method::GET, url.clone()).query(query);
            let result = match execute(request).await {
                Ok(bytes) => serde_json::from_slice(&bytes).map_err(ApiError::from),
                Err(e) => Err(e),
            };
            match result {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && retry_count < MAX_RETRIES => {
                    let delay = self.retry_delay * (1u32 << retry_count);
                    tracing::debug!(
                        error = %e,
                        path = %url.path(),
                        retry = retry_count + 1,
                        delay_ms = delay.as_millis() as u64,
                        "Retrying GET after transient error"
                    );
                    tokio::time::sleep(delay).await;
                    retry_count += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn send_form<F>(&self, method: Method, segments: &[&str], form: &F) -> Result<(), ApiError>
    where
        F: Serialize + ?Sized,
    {
        let url = self.endpoint(segments)?;
        execute(self.request(method, url).form(form)).await?;
        Ok(())
    }

    async fn send_form_json<T, F>(
        &self,
        method: Method,
        segments: &[&str],
        form: &F,
    ) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        F: Serialize + ?Sized,
    {
        let url = self.endpoint(segments)?;
        let bytes = execute(self.request(method, url).form(form)).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn send_empty(&self, method: Method, segments: &[&str]) -> Result<(), ApiError> {
        let url = self.endpoint(segments)?;
        execute(self.request(method, url)).await?;
        Ok(())
    }
}

/// Send a request and read its body, mapping non-2xx statuses to
/// `ApiError::HttpStatus` with the server's message when one is present.
async fn execute(request: RequestBuilder) -> Result<Vec<u8>, ApiError> {
    let response = tokio::time::timeout(REQUEST_TIMEOUT, request.send())
        .await
        .map_err(|_| ApiError::Timeout)?
        .map_err(ApiError::Network)?;

    let status = response.status();
    if !status.is_success() {
        let message = read_limited(response, MAX_RESPONSE_SIZE)
            .await
            .ok()
            .and_then(|body| serde_json::from_slice::<ErrorBody>(&body).ok())
            .and_then(|body| {
                if let Some(kind) = &body.kind {
                    tracing::debug!(status = status.as_u16(), kind = %kind, "Server returned error");
                }
                body.message
            });
        return Err(ApiError::HttpStatus {
            status: status.as_u16(),
            message,
        });
    }

    read_limited(response, MAX_RESPONSE_SIZE).await
}

async fn read_limited(response: reqwest::Response, limit: usize) -> Result<Vec<u8>, ApiError> {
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(ApiError::ResponseTooLarge(limit));
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(ApiError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(ApiError::ResponseTooLarge(limit));
        }
        bytes.extend_from_slice(&chunk);
    }
    Ok(bytes)
}
