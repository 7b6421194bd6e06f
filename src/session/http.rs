//! [`AuthApi`] over the backend's REST endpoints.

use super::api::{AuthApi, AuthApiError, RefreshResult, TokenPair, UserProfile};
use crate::config::SessionConfig;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

const REFRESH_PATH: &str = "auth/refresh";
const CURRENT_USER_PATH: &str = "auth/me";

/// Response envelope used by every backend route.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    #[serde(default = "Option::default")]
    data: Option<T>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshData {
    token: String,
    refresh_token: String,
    #[serde(default)]
    user: Option<UserProfile>,
}

pub struct HttpAuthApi {
    client: reqwest::Client,
    base: Url,
}

impl HttpAuthApi {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, AuthApiError> {
        let mut base = Url::parse(base_url)?;
        // `Url::join` replaces the last segment unless the path ends with '/'.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base })
    }

    pub fn from_config(config: &SessionConfig) -> Result<Self, AuthApiError> {
        Self::new(&config.api_base_url, config.request_timeout())
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str) -> Result<Url, AuthApiError> {
        Ok(self.base.join(path)?)
    }
}

fn parse_envelope<T: for<'de> Deserialize<'de>>(
    status: StatusCode,
    body: &str,
) -> Result<Envelope<T>, AuthApiError> {
    serde_json::from_str::<Envelope<T>>(body).map_err(|e| {
        if status.is_success() {
            AuthApiError::MalformedResponse(e.to_string())
        } else {
            AuthApiError::Status {
                status: status.as_u16(),
            }
        }
    })
}

#[async_trait]
impl AuthApi for HttpAuthApi {
    async fn refresh(&self, refresh_token: &str) -> Result<RefreshResult, AuthApiError> {
        let response = self
            .client
            .post(self.endpoint(REFRESH_PATH)?)
            .json(&serde_json::json!({ "refreshToken": refresh_token }))
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;

        let envelope = parse_envelope::<RefreshData>(status, &body)?;
        if !envelope.success || !status.is_success() {
            return Ok(RefreshResult::Failure {
                message: envelope
                    .message
                    .unwrap_or_else(|| format!("refresh rejected with HTTP {}", status.as_u16())),
            });
        }

        let data = envelope.data.ok_or_else(|| {
            AuthApiError::MalformedResponse("successful refresh without data".to_string())
        })?;
        Ok(RefreshResult::Success {
            tokens: TokenPair::new(data.token, data.refresh_token),
            user: data.user,
        })
    }

    async fn current_user(&self, access_token: &str) -> Result<bool, AuthApiError> {
        let response = self
            .client
            .get(self.endpoint(CURRENT_USER_PATH)?)
            .bearer_auth(access_token)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;

        match parse_envelope::<serde_json::Value>(status, &body) {
            Ok(envelope) => Ok(envelope.success && status.is_success()),
            Err(_) if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) => {
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gets_trailing_slash() {
        let api = HttpAuthApi::new("http://localhost:5000/api", Duration::from_secs(1)).unwrap();
        assert_eq!(
            api.endpoint(REFRESH_PATH).unwrap().as_str(),
            "http://localhost:5000/api/auth/refresh"
        );

        let api = HttpAuthApi::new("http://localhost:5000/api/", Duration::from_secs(1)).unwrap();
        assert_eq!(
            api.endpoint(CURRENT_USER_PATH).unwrap().as_str(),
            "http://localhost:5000/api/auth/me"
        );
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        assert!(matches!(
            HttpAuthApi::new("::nope", Duration::from_secs(1)),
            Err(AuthApiError::InvalidUrl(_))
        ));
    }

    #[test]
    fn envelope_shape_drift_is_loud() {
        let err = parse_envelope::<RefreshData>(StatusCode::OK, r#"{"ok": true}"#).unwrap_err();
        assert!(matches!(err, AuthApiError::MalformedResponse(_)));

        let err =
            parse_envelope::<RefreshData>(StatusCode::BAD_GATEWAY, "<html>").unwrap_err();
        assert!(matches!(err, AuthApiError::Status { status: 502 }));
    }

    #[test]
    fn refresh_data_requires_both_tokens() {
        let parsed = parse_envelope::<RefreshData>(
            StatusCode::OK,
            r#"{"success": true, "data": {"token": "a"}}"#,
        );
        assert!(parsed.is_err());
    }
}
