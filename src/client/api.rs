//! HTTP client for the article service.
//!
//! Thin typed wrapper over the REST endpoints: camelCase JSON in and out,
//! bearer token attached when one is set, response bodies size-capped before
//! parsing. No retries live here; callers decide what a failed call means
//! (the session layer keeps working against the local cache).

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{Article, Highlight, LocalArticle, NewHighlight, NewNote, Note, ScrollPosition};
use crate::util::{validate_api_base, UrlValidationError};

/// Per-request time budget, also set on the underlying client.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Response body cap. Endpoint payloads are JSON lists of article metadata,
/// so anything beyond this is a misbehaving server.
const MAX_RESPONSE_SIZE: usize = 2 * 1024 * 1024; // 2MB

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid API base URL: {0}")]
    InvalidBaseUrl(#[from] UrlValidationError),
    #[error("authentication required or token rejected")]
    Unauthorized,
    #[error("not found on server")]
    NotFound,
    #[error("conflict with server state")]
    Conflict,
    #[error("HTTP error: status {0}")]
    Http(u16),
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("request timed out after 20s")]
    Timeout,
    #[error("response too large (exceeds {0} bytes)")]
    ResponseTooLarge(usize),
    #[error("invalid UTF-8 in response")]
    InvalidUtf8,
    #[error("malformed JSON payload: {0}")]
    Json(#[from] serde_json::Error),
}

impl ApiError {
    /// Returns true if this error is transient and the call is worth
    /// repeating later.
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Timeout | ApiError::Network(_) => true,
            ApiError::Http(status) => *status >= 500,
            ApiError::InvalidBaseUrl(_)
            | ApiError::Unauthorized
            | ApiError::NotFound
            | ApiError::Conflict
            | ApiError::ResponseTooLarge(_)
            | ApiError::InvalidUtf8
            | ApiError::Json(_) => false,
        }
    }
}

// Endpoint envelopes. The service wraps every payload in a named field
// (plus a human-readable message this client discards).

#[derive(Deserialize)]
struct ArticleEnvelope {
    article: Article,
}

#[derive(Deserialize)]
struct ArticlesEnvelope {
    articles: Vec<Article>,
}

#[derive(Deserialize)]
struct SyncEnvelope {
    #[serde(rename = "syncedArticles")]
    synced_articles: Vec<LocalArticle>,
}

#[derive(Deserialize)]
struct HighlightEnvelope {
    highlight: Highlight,
}

#[derive(Deserialize)]
struct HighlightsEnvelope {
    highlights: Vec<Highlight>,
}

#[derive(Deserialize)]
struct NoteEnvelope {
    note: Note,
}

#[derive(Serialize)]
struct SyncRequest<'a> {
    articles: &'a [LocalArticle],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProgressRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    scroll_position: Option<&'a ScrollPosition>,
    progress_percent: u8,
}

/// Typed client for the article service REST API.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<SecretString>,
}

impl ApiClient {
    /// Builds a client against `base_url`. The base must be https (plain
    /// http is allowed for loopback hosts only); credentials ride on every
    /// authenticated request.
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let validated = validate_api_base(base_url)?;

        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(2)
            .pool_idle_timeout(Duration::from_secs(30))
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            base_url: validated.as_str().trim_end_matches('/').to_string(),
            token: None,
        })
    }

    pub fn set_token(&mut self, token: Option<SecretString>) {
        self.token = token;
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    // ========================================================================
    // Article endpoints
    // ========================================================================

    /// `POST /articles`. The service upserts by URL and returns its copy,
    /// with `id` and `updatedAt` assigned.
    pub async fn save_article(&self, article: &LocalArticle) -> Result<Article, ApiError> {
        let url = format!("{}/articles", self.base_url);
        let request = self.post_json(&url, article)?;
        let envelope: ArticleEnvelope = self.send(request).await?;
        Ok(envelope.article)
    }

    /// `GET /articles`. Returns the caller's full article list.
    pub async fn fetch_articles(&self) -> Result<Vec<Article>, ApiError> {
        let url = format!("{}/articles", self.base_url);
        let envelope: ArticlesEnvelope = self.send(self.get(&url)).await?;
        Ok(envelope.articles)
    }

    /// `POST /articles/sync`. Sends the local list and returns the merged
    /// list the client should adopt wholesale.
    pub async fn sync(&self, articles: &[LocalArticle]) -> Result<Vec<LocalArticle>, ApiError> {
        let url = format!("{}/articles/sync", self.base_url);
        let request = self.post_json(&url, &SyncRequest { articles })?;
        let envelope: SyncEnvelope = self.send(request).await?;
        Ok(envelope.synced_articles)
    }

    /// `PUT /articles/{id}/progress`.
    pub async fn update_progress(
        &self,
        article_id: i64,
        scroll_position: Option<&ScrollPosition>,
        progress_percent: u8,
    ) -> Result<Article, ApiError> {
        let url = format!("{}/articles/{}/progress", self.base_url, article_id);
        let request = self.put_json(
            &url,
            &ProgressRequest {
                scroll_position,
                progress_percent,
            },
        )?;
        let envelope: ArticleEnvelope = self.send(request).await?;
        Ok(envelope.article)
    }

    // ========================================================================
    // Highlight and note endpoints
    // ========================================================================

    /// `GET /highlights/article/{articleId}`, oldest first.
    pub async fn highlights_for_article(&self, article_id: i64) -> Result<Vec<Highlight>, ApiError> {
        let url = format!("{}/highlights/article/{}", self.base_url, article_id);
        let envelope: HighlightsEnvelope = self.send(self.get(&url)).await?;
        Ok(envelope.highlights)
    }

    /// `POST /highlights/article/{articleId}`.
    pub async fn create_highlight(
        &self,
        article_id: i64,
        highlight: &NewHighlight,
    ) -> Result<Highlight, ApiError> {
        let url = format!("{}/highlights/article/{}", self.base_url, article_id);
        let request = self.post_json(&url, highlight)?;
        let envelope: HighlightEnvelope = self.send(request).await?;
        Ok(envelope.highlight)
    }

    /// `DELETE /highlights/{highlightId}`.
    pub async fn delete_highlight(&self, highlight_id: i64) -> Result<(), ApiError> {
        let url = format!("{}/highlights/{}", self.base_url, highlight_id);
        self.send_unit(self.delete(&url)).await
    }

    /// `POST /notes/article/{articleId}`.
    pub async fn create_note(&self, article_id: i64, note: &NewNote) -> Result<Note, ApiError> {
        let url = format!("{}/notes/article/{}", self.base_url, article_id);
        let request = self.post_json(&url, note)?;
        let envelope: NoteEnvelope = self.send(request).await?;
        Ok(envelope.note)
    }

    // ========================================================================
    // Request plumbing
    // ========================================================================

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.header(
                "Authorization",
                format!("Bearer {}", token.expose_secret()),
            ),
            None => request,
        }
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        self.authorized(self.http.get(url))
    }

    fn delete(&self, url: &str) -> reqwest::RequestBuilder {
        self.authorized(self.http.delete(url))
    }

    fn post_json<B: Serialize>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<reqwest::RequestBuilder, ApiError> {
        let payload = serde_json::to_string(body)?;
        Ok(self
            .authorized(self.http.post(url))
            .header("Content-Type", "application/json")
            .body(payload))
    }

    fn put_json<B: Serialize>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<reqwest::RequestBuilder, ApiError> {
        let payload = serde_json::to_string(body)?;
        Ok(self
            .authorized(self.http.put(url))
            .header("Content-Type", "application/json")
            .body(payload))
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ApiError> {
        let response = check_status(self.dispatch(request).await?)?;
        let body = read_limited_text(response, MAX_RESPONSE_SIZE).await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn send_unit(&self, request: reqwest::RequestBuilder) -> Result<(), ApiError> {
        check_status(self.dispatch(request).await?)?;
        Ok(())
    }

    async fn dispatch(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, ApiError> {
        tokio::time::timeout(REQUEST_TIMEOUT, request.send())
            .await
            .map_err(|_| ApiError::Timeout)?
            .map_err(ApiError::Network)
    }
}

fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = response.status();
    match status.as_u16() {
        401 | 403 => Err(ApiError::Unauthorized),
        404 => Err(ApiError::NotFound),
        409 => Err(ApiError::Conflict),
        _ if status.is_success() => Ok(response),
        code => Err(ApiError::Http(code)),
    }
}

async fn read_limited_text(
    response: reqwest::Response,
    limit: usize,
) -> Result<String, ApiError> {
    use futures::StreamExt;

    // Fast path: check Content-Length header
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

    String::from_utf8(bytes).map_err(|_| ApiError::InvalidUtf8)
}
