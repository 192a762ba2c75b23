//! Auth endpoints of the studio API.
//!
//! `AuthApi` is the seam the refresh coordinator and session facade talk
//! through; `HttpAuthApi` is the reqwest implementation used outside tests.

use serde::Deserialize;

use crate::config::ClientConfig;
use crate::error::AuthError;
use crate::types::{LoginCredentials, LoginResponse, RefreshResponse};

pub const LOGIN_PATH: &str = "/user/login/";
pub const REFRESH_PATH: &str = "/user/token/refresh/";

/// Login and token exchange against the remote API. Enables mocking in tests.
#[async_trait::async_trait]
pub trait AuthApi: Send + Sync {
    /// Exchange credentials for a token pair and user identity.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidCredentials`] on a non-2xx response,
    /// [`AuthError::Network`] on transport failure.
    async fn login(&self, credentials: &LoginCredentials) -> Result<LoginResponse, AuthError>;

    /// Exchange a refresh token for a new access token.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::RefreshFailed`] on a non-2xx response or malformed body,
    /// [`AuthError::Network`] on transport failure.
    async fn refresh(&self, refresh_token: &str) -> Result<RefreshResponse, AuthError>;
}

pub struct HttpAuthApi {
    http: reqwest::Client,
    config: ClientConfig,
}

impl HttpAuthApi {
    #[must_use]
    pub fn new(http: reqwest::Client, config: ClientConfig) -> Self {
        Self { http, config }
    }
}

#[async_trait::async_trait]
impl AuthApi for HttpAuthApi {
    async fn login(&self, credentials: &LoginCredentials) -> Result<LoginResponse, AuthError> {
        let response = self.http.post(self.config.endpoint(LOGIN_PATH)).json(credentials).send().await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            let message = error_message(&text).unwrap_or_else(|| "Login failed".to_owned());
            return Err(AuthError::InvalidCredentials { message });
        }
        serde_json::from_str(&text).map_err(|e| AuthError::Decode(e.to_string()))
    }

    async fn refresh(&self, refresh_token: &str) -> Result<RefreshResponse, AuthError> {
        let response = self
            .http
            .post(self.config.endpoint(REFRESH_PATH))
            .json(&serde_json::json!({ "refresh": refresh_token }))
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(AuthError::RefreshFailed(format!("status {}", status.as_u16())));
        }
        serde_json::from_str(&text).map_err(|e| AuthError::RefreshFailed(format!("unexpected response: {e}")))
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    detail: Option<String>,
    error: Option<String>,
}

/// Human-readable message from an API error body (`message`, `detail` or `error`).
pub(crate) fn error_message(body: &str) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    parsed
        .message
        .or(parsed.detail)
        .or(parsed.error)
        .filter(|m| !m.trim().is_empty())
}

#[cfg(test)]
#[path = "api_test.rs"]
mod tests;
