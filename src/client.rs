//! Authenticated fetch wrapper.
//!
//! DESIGN
//! ======
//! Every request carries `Authorization: Bearer <access>` read from the store
//! at send time. A 401 triggers one refresh through the shared coordinator and
//! exactly one retry; the request is rebuilt by calling the caller's builder
//! again, so bodies that cannot be cloned (multipart uploads) still retry.
//!
//! ERROR HANDLING
//! ==============
//! A 401 on the retry logs the session out and surfaces as
//! `AuthError::Unauthorized`. A failed refresh has already logged out inside
//! the coordinator and its error is returned unchanged. Other statuses are
//! left to the caller; the JSON helpers map non-2xx to `AuthError::Api`.

use std::sync::Arc;

use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::api::error_message;
use crate::config::ClientConfig;
use crate::error::AuthError;
use crate::refresh::RefreshCoordinator;
use crate::store::SessionStore;

pub struct AuthClient {
    http: reqwest::Client,
    config: ClientConfig,
    coordinator: Arc<RefreshCoordinator>,
}

impl AuthClient {
    #[must_use]
    pub fn new(http: reqwest::Client, config: ClientConfig, coordinator: Arc<RefreshCoordinator>) -> Self {
        Self { http, config, coordinator }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<SessionStore> {
        self.coordinator.store()
    }

    /// Absolute URL for an API path.
    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        self.config.endpoint(path)
    }

    /// Send an authenticated request, refreshing and retrying once on 401.
    ///
    /// `build` is called once per attempt with the shared HTTP client.
    ///
    /// # Errors
    ///
    /// - [`AuthError::NotAuthenticated`] when no session is present (nothing is sent)
    /// - [`AuthError::RefreshFailed`] when the refresh after a 401 failed
    /// - [`AuthError::Unauthorized`] when the retry is still rejected
    /// - [`AuthError::Network`] on transport failure
    pub async fn request<F>(&self, build: F) -> Result<Response, AuthError>
    where
        F: Fn(&reqwest::Client) -> RequestBuilder + Send + Sync,
    {
        let store = self.store();
        let sent_with = store.access_token().ok_or(AuthError::NotAuthenticated)?;
        let response = build(&self.http).bearer_auth(&sent_with).send().await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        let access = match store.access_token() {
            // Another caller already refreshed after our request went out.
            Some(current) if current != sent_with => current,
            Some(_) => {
                let refresh_token = store.refresh_token().ok_or(AuthError::NotAuthenticated)?;
                debug!("request unauthorized; refreshing access token");
                self.coordinator.refresh(&refresh_token).await?
            }
            None => return Err(AuthError::NotAuthenticated),
        };

        let retry = build(&self.http).bearer_auth(&access).send().await?;
        if retry.status() == StatusCode::UNAUTHORIZED {
            warn!(url = %retry.url(), "request still unauthorized after refresh; logging out");
            store.logout();
            return Err(AuthError::Unauthorized);
        }
        Ok(retry)
    }

    /// `GET path` and decode the JSON body.
    ///
    /// # Errors
    ///
    /// As [`AuthClient::request`], plus [`AuthError::Api`] on non-2xx and
    /// [`AuthError::Decode`] on a malformed body.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, AuthError> {
        let url = self.endpoint(path);
        let response = self.request(|http| http.get(&url)).await?;
        read_json(response).await
    }

    /// Send `body` as JSON with `method` and decode the JSON response.
    ///
    /// # Errors
    ///
    /// As [`AuthClient::get_json`].
    pub async fn send_json<B, T>(&self, method: Method, path: &str, body: &B) -> Result<T, AuthError>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.endpoint(path);
        let response = self.request(|http| http.request(method.clone(), &url).json(body)).await?;
        read_json(response).await
    }

    /// Send a bodiless request and discard the response body.
    ///
    /// # Errors
    ///
    /// As [`AuthClient::request`], plus [`AuthError::Api`] on non-2xx.
    pub async fn send_empty(&self, method: Method, path: &str) -> Result<(), AuthError> {
        let url = self.endpoint(path);
        let response = self.request(|http| http.request(method.clone(), &url)).await?;
        ensure_success(response).await.map(drop)
    }
}

/// Pass 2xx responses through; turn anything else into [`AuthError::Api`].
pub(crate) async fn ensure_success(response: Response) -> Result<Response, AuthError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let text = response.text().await.unwrap_or_default();
    let message = error_message(&text)
        .or_else(|| status.canonical_reason().map(str::to_owned))
        .unwrap_or_else(|| "request failed".to_owned());
    Err(AuthError::Api { status: status.as_u16(), message })
}

pub(crate) async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, AuthError> {
    let response = ensure_success(response).await?;
    let text = response.text().await?;
    serde_json::from_str(&text).map_err(|e| AuthError::Decode(e.to_string()))
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
