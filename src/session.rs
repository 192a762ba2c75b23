//! Session manager facade.
//!
//! DESIGN
//! ======
//! `AuthSession` owns one store, one refresh coordinator, one fetch wrapper
//! and at most one scheduler task, and is what front ends hold. There is no
//! global: every consumer gets the session it was handed, so tests build as
//! many independent sessions as they need.
//!
//! SYSTEM CONTEXT
//! ==============
//! `initialize` is the startup step: it restores the durable record and, when
//! the restored access token has already expired, refreshes it before any
//! route is evaluated.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::{info, warn};

use crate::api::{AuthApi, HttpAuthApi};
use crate::client::AuthClient;
use crate::config::ClientConfig;
use crate::cookie::CookieMirror;
use crate::dashboard::Dashboard;
use crate::error::AuthError;
use crate::guard::{self, GuardDecision};
use crate::refresh::RefreshCoordinator;
use crate::scheduler::RefreshScheduler;
use crate::storage::{FileStorage, MemoryStorage, SessionStorage};
use crate::store::{Navigator, SessionStore};
use crate::token;
use crate::types::{LoginCredentials, User};

pub struct AuthSession {
    config: ClientConfig,
    api: Arc<dyn AuthApi>,
    coordinator: Arc<RefreshCoordinator>,
    client: AuthClient,
    scheduler: Mutex<Option<RefreshScheduler>>,
}

impl AuthSession {
    /// Wire a session from config: file-backed storage and cookie when
    /// `session_path` is set, memory otherwise; HTTP auth API.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Config`] if the config is invalid or the HTTP client cannot be built.
    pub fn from_config(config: ClientConfig, navigator: Arc<dyn Navigator>) -> Result<Self, AuthError> {
        config.validate()?;
        let http = config.http_client()?;
        let (storage, cookie): (Arc<dyn SessionStorage>, CookieMirror) = match &config.session_path {
            Some(path) => (
                Arc::new(FileStorage::new(path)),
                CookieMirror::with_file(config.cookie_max_age_secs, path.with_extension("cookie")),
            ),
            None => (Arc::new(MemoryStorage::new()), CookieMirror::new(config.cookie_max_age_secs)),
        };
        let store = Arc::new(SessionStore::new(storage, Arc::new(cookie), navigator));
        let api = Arc::new(HttpAuthApi::new(http.clone(), config.clone()));
        Ok(Self::with_parts(config, http, api, store))
    }

    /// Assemble a session from explicit parts.
    #[must_use]
    pub fn with_parts(
        config: ClientConfig,
        http: reqwest::Client,
        api: Arc<dyn AuthApi>,
        store: Arc<SessionStore>,
    ) -> Self {
        let coordinator = Arc::new(RefreshCoordinator::new(api.clone(), store));
        let client = AuthClient::new(http, config.clone(), coordinator.clone());
        Self { config, api, coordinator, client, scheduler: Mutex::new(None) }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<SessionStore> {
        self.coordinator.store()
    }

    #[must_use]
    pub fn coordinator(&self) -> &Arc<RefreshCoordinator> {
        &self.coordinator
    }

    #[must_use]
    pub fn client(&self) -> &AuthClient {
        &self.client
    }

    #[must_use]
    pub fn dashboard(&self) -> Dashboard<'_> {
        Dashboard::new(&self.client)
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Restore the persisted session and refresh it if its access token has expired.
    ///
    /// Returns whether a session is active afterwards. A failed refresh has
    /// already logged the session out.
    pub async fn initialize(&self) -> bool {
        let store = self.store();
        if !store.restore() {
            return false;
        }
        let expired = store.access_token().is_none_or(|t| token::is_expired(&t));
        if expired {
            info!("restored access token expired; refreshing");
            store.set_loading(true);
            let result = self.coordinator.refresh_current().await;
            store.set_loading(false);
            if let Err(e) = result {
                warn!(error = %e, "startup refresh failed");
            }
        }
        store.is_authenticated()
    }

    /// Validate credentials locally, then log in against the API.
    ///
    /// # Errors
    ///
    /// [`AuthError::InvalidInput`] before any request; [`AuthError::InvalidCredentials`]
    /// when the API rejects them. A failed login leaves any existing session untouched.
    pub async fn login(&self, credentials: &LoginCredentials) -> Result<User, AuthError> {
        credentials.validate()?;
        let store = self.store();
        store.set_loading(true);
        let result = self.api.login(credentials).await;
        store.set_loading(false);

        let response = result?;
        store.login(&response);
        Ok(response.user())
    }

    /// End the session. A running scheduler idles until the next login.
    pub fn logout(&self) {
        self.store().logout();
    }

    /// Start the proactive refresh task if it is not already running.
    pub fn start_scheduler(&self) {
        let mut slot = self.scheduler.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_none_or(RefreshScheduler::is_finished) {
            *slot = Some(RefreshScheduler::spawn(self.coordinator.clone(), self.config.refresh_lead()));
        }
    }

    pub fn stop_scheduler(&self) {
        if let Some(scheduler) = self.scheduler.lock().unwrap_or_else(PoisonError::into_inner).take() {
            scheduler.shutdown();
        }
    }

    #[must_use]
    pub fn scheduler_running(&self) -> bool {
        self.scheduler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|s| !s.is_finished())
    }

    /// Client-side route guard against this session.
    #[must_use]
    pub fn guard(&self, path: &str) -> GuardDecision {
        guard::evaluate_store(self.store(), path)
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
