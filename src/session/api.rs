//! Auth API collaborator: token refresh and the "who am I" probe.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Access token plus the refresh token used to renew it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub token: String,
    pub refresh_token: String,
}

impl TokenPair {
    pub fn new(token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            refresh_token: refresh_token.into(),
        }
    }
}

/// The signed-in employee as returned by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Fields this crate does not interpret, kept so nothing is lost on save.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl UserProfile {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: None,
            name: None,
            role: None,
            extra: serde_json::Map::new(),
        }
    }
}

/// Outcome of a refresh call that reached the backend and was understood.
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshResult {
    Success {
        tokens: TokenPair,
        user: Option<UserProfile>,
    },
    Failure {
        message: String,
    },
}

#[derive(Debug, Error)]
pub enum AuthApiError {
    #[error("auth request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid auth endpoint URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("auth endpoint returned HTTP {status}")]
    Status { status: u16 },
    #[error("malformed auth response: {0}")]
    MalformedResponse(String),
    #[error("auth service unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait AuthApi: Send + Sync {
    /// Exchange a refresh token for a new token pair.
    async fn refresh(&self, refresh_token: &str) -> Result<RefreshResult, AuthApiError>;

    /// Ask the backend whether `access_token` still identifies a user.
    async fn current_user(&self, access_token: &str) -> Result<bool, AuthApiError>;
}
