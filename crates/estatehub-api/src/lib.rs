pub mod http;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use estatehub_schema as schema;
pub use http::HttpBackend;

use estatehub_schema::{
    LeadRequest, LeadResponse, RatingUpdate, SaveMatchRequest, SaveMatchResponse,
    UnifiedListResponse, UnmatchedResponse,
};

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// The REST contract of the listing backend. Every method returns the
/// response only when the backend reported `success: true`; everything
/// else is folded into [`ApiError`].
#[async_trait]
pub trait BackendApi: Send + Sync {
    async fn submit_lead(&self, lead: &LeadRequest) -> Result<LeadResponse, ApiError>;

    async fn fetch_unmatched(&self, search: &str) -> Result<UnmatchedResponse, ApiError>;

    async fn save_match(&self, request: &SaveMatchRequest) -> Result<SaveMatchResponse, ApiError>;

    async fn fetch_unified(&self) -> Result<UnifiedListResponse, ApiError>;

    async fn update_rating(&self, unified_id: &str, update: &RatingUpdate) -> Result<(), ApiError>;
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("backend request timed out: {0}")]
    Timeout(#[source] reqwest::Error),
    #[error("backend unreachable: {0}")]
    Connect(#[source] reqwest::Error),
    #[error("backend request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("backend rejected request (HTTP {status}): {}", .message.as_deref().unwrap_or("no details"))]
    Rejected {
        status: u16,
        message: Option<String>,
    },
    #[error("malformed backend response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid backend base url: {0}")]
    InvalidBaseUrl(String),
}

impl ApiError {
    /// The human-readable `error` field the backend sent, if any.
    pub fn backend_message(&self) -> Option<&str> {
        match self {
            Self::Rejected { message, .. } => message.as_deref(),
            _ => None,
        }
    }

    /// True when the request never produced an HTTP response.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::Connect(_) | Self::Transport(_)
        )
    }
}

/// Connection settings for the listing backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BackendConfig {
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Sent as `X-CSRFToken` on mutating requests
    #[serde(default)]
    pub csrf_token: Option<String>,
}

impl BackendConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout_secs: default_timeout_secs(),
            csrf_token: None,
        }
    }

    pub fn with_csrf_token(mut self, token: impl Into<String>) -> Self {
        self.csrf_token = Some(token.into());
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_config_defaults_from_yaml_like_json() {
        let cfg: BackendConfig =
            serde_json::from_value(serde_json::json!({"base_url": "http://localhost:8000"}))
                .unwrap();
        assert_eq!(cfg.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert!(cfg.csrf_token.is_none());
    }

    #[test]
    fn rejected_error_exposes_backend_message() {
        let err = ApiError::Rejected {
            status: 400,
            message: Some("Некорректный формат телефона".to_string()),
        };
        assert_eq!(err.backend_message(), Some("Некорректный формат телефона"));
        assert!(!err.is_transport());
        assert!(err.to_string().contains("Некорректный формат телефона"));
    }

    #[test]
    fn status_error_has_no_backend_message() {
        let err = ApiError::Status {
            status: 502,
            body: "<html>bad gateway</html>".to_string(),
        };
        assert!(err.backend_message().is_none());
        assert!(err.to_string().contains("502"));
    }
}
