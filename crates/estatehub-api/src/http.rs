//! reqwest implementation of [`BackendApi`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::debug;

use estatehub_schema::{
    AckResponse, Envelope, LeadRequest, LeadResponse, RatingUpdate, SaveMatchRequest,
    SaveMatchResponse, UnifiedListResponse, UnmatchedResponse,
};

use crate::{ApiError, BackendApi, BackendConfig, DEFAULT_TIMEOUT_SECS};

const CHAT_REQUEST_PATH: &str = "/api/chat-request/";
const UNMATCHED_PATH: &str = "/api/manual-matching/unmatched/";
const SAVE_MATCH_PATH: &str = "/api/manual-matching/save/";
const UNIFIED_PATH: &str = "/api/manual-matching/unified/";
const CSRF_HEADER: &str = "X-CSRFToken";
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
    csrf_token: Option<String>,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_timeout(base_url, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            csrf_token: None,
        }
    }

    pub fn from_config(config: &BackendConfig) -> Result<Self, ApiError> {
        let base = config.base_url.trim();
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(ApiError::InvalidBaseUrl(config.base_url.clone()));
        }
        let mut backend = Self::with_timeout(base, Duration::from_secs(config.timeout_secs));
        backend.csrf_token = config.csrf_token.clone().filter(|t| !t.is_empty());
        Ok(backend)
    }

    pub fn with_csrf_token(mut self, token: impl Into<String>) -> Self {
        self.csrf_token = Some(token.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn post(&self, path: &str) -> RequestBuilder {
        let builder = self
            .client
            .post(self.url(path))
            .header("content-type", "application/json");
        match &self.csrf_token {
            Some(token) => builder.header(CSRF_HEADER, token),
            None => builder,
        }
    }

    async fn send(&self, endpoint: &str, request: RequestBuilder) -> Result<Response, ApiError> {
        debug!(endpoint, "sending backend request");
        match request.send().await {
            Ok(resp) => Ok(resp),
            Err(e) if e.is_timeout() => Err(ApiError::Timeout(e)),
            Err(e) if e.is_connect() => Err(ApiError::Connect(e)),
            Err(e) => Err(ApiError::Transport(e)),
        }
    }
}

/// Decode a `{success, error, ...}` envelope, turning `success: false` and
/// non-2xx answers into errors.
async fn read_envelope<T>(resp: Response) -> Result<T, ApiError>
where
    T: DeserializeOwned + Envelope,
{
    let status = resp.status();
    let text = resp.text().await?;

    match serde_json::from_str::<T>(&text) {
        Ok(body) if body.success() && status.is_success() => Ok(body),
        Ok(body) => Err(ApiError::Rejected {
            status: status.as_u16(),
            message: body.error().map(str::to_string),
        }),
        Err(_) if !status.is_success() => Err(ApiError::Status {
            status: status.as_u16(),
            body: truncate(&text, MAX_ERROR_BODY),
        }),
        Err(e) => Err(ApiError::Decode(e)),
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[async_trait]
impl BackendApi for HttpBackend {
    async fn submit_lead(&self, lead: &LeadRequest) -> Result<LeadResponse, ApiError> {
        let resp = self
            .send(CHAT_REQUEST_PATH, self.post(CHAT_REQUEST_PATH).json(lead))
            .await?;
        read_envelope(resp).await
    }

    async fn fetch_unmatched(&self, search: &str) -> Result<UnmatchedResponse, ApiError> {
        let request = self
            .client
            .get(self.url(UNMATCHED_PATH))
            .query(&[("search", search)]);
        let resp = self.send(UNMATCHED_PATH, request).await?;
        read_envelope(resp).await
    }

    async fn save_match(&self, request: &SaveMatchRequest) -> Result<SaveMatchResponse, ApiError> {
        let resp = self
            .send(SAVE_MATCH_PATH, self.post(SAVE_MATCH_PATH).json(request))
            .await?;
        read_envelope(resp).await
    }

    async fn fetch_unified(&self) -> Result<UnifiedListResponse, ApiError> {
        let resp = self
            .send(UNIFIED_PATH, self.client.get(self.url(UNIFIED_PATH)))
            .await?;
        read_envelope(resp).await
    }

    async fn update_rating(&self, unified_id: &str, update: &RatingUpdate) -> Result<(), ApiError> {
        let path = format!(
            "{}{}/update/",
            UNIFIED_PATH,
            urlencoding::encode(unified_id)
        );
        let resp = self.send(&path, self.post(&path).json(update)).await?;
        read_envelope::<AckResponse>(resp).await.map(|_| ())
    }
}
