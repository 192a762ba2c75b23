//! Process-wide auth state store.
//!
//! DESIGN
//! ======
//! The session lives in a `tokio::sync::watch` channel: the sender's lock
//! serializes writers, and the refresh scheduler subscribes to learn about
//! token changes and logouts. Only the mutators below write session fields.
//! Durable storage and the cookie mirror are updated as side effects of each
//! mutation and are never read back while the process runs (`restore` is the
//! single startup exception).
//!
//! The store does not coordinate token writers itself; the refresh
//! coordinator guarantees a single in-flight refresh.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::cookie::CookieMirror;
use crate::guard::LOGIN_PATH;
use crate::storage::SessionStorage;
use crate::types::{LoginResponse, PersistedSession, TokenPair, User};

// =============================================================================
// SESSION
// =============================================================================

/// Snapshot of the current session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub user: Option<User>,
    pub tokens: Option<TokenPair>,
    pub is_loading: bool,
}

impl Session {
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.tokens.is_some()
    }

    #[must_use]
    pub fn access_token(&self) -> Option<&str> {
        self.tokens.as_ref().map(|t| t.access.as_str())
    }

    #[must_use]
    pub fn refresh_token(&self) -> Option<&str> {
        self.tokens.as_ref().map(|t| t.refresh.as_str())
    }

    fn to_record(&self) -> PersistedSession {
        PersistedSession {
            user: self.user.clone(),
            access_token: self.access_token().map(str::to_owned),
            refresh_token: self.refresh_token().map(str::to_owned),
            is_authenticated: self.is_authenticated(),
        }
    }
}

// =============================================================================
// NAVIGATION
// =============================================================================

/// Receives forced navigations (logout sends the user to the login screen).
pub trait Navigator: Send + Sync {
    fn navigate(&self, path: &str);
}

/// Navigator for headless front ends: records the redirect in the log.
pub struct LogNavigator;

impl Navigator for LogNavigator {
    fn navigate(&self, path: &str) {
        info!(%path, "redirect");
    }
}

// =============================================================================
// STORE
// =============================================================================

pub struct SessionStore {
    state: watch::Sender<Session>,
    storage: Arc<dyn SessionStorage>,
    cookie: Arc<CookieMirror>,
    navigator: Arc<dyn Navigator>,
}

impl SessionStore {
    /// Empty (logged-out) store. Call [`SessionStore::restore`] to pick up a persisted session.
    #[must_use]
    pub fn new(storage: Arc<dyn SessionStorage>, cookie: Arc<CookieMirror>, navigator: Arc<dyn Navigator>) -> Self {
        let (state, _) = watch::channel(Session::default());
        Self { state, storage, cookie, navigator }
    }

    /// Hydrate from durable storage. Returns whether a session was restored.
    ///
    /// A record holding only one of the two tokens breaks the pairing
    /// invariant and is discarded.
    pub fn restore(&self) -> bool {
        let record = match self.storage.load() {
            Ok(Some(record)) => record,
            Ok(None) => return false,
            Err(e) => {
                warn!(error = %e, "session storage unreadable; starting logged out");
                return false;
            }
        };

        let tokens = match (record.access_token, record.refresh_token) {
            (Some(access), Some(refresh)) if !access.is_empty() && !refresh.is_empty() => TokenPair { access, refresh },
            (None, None) => return false,
            _ => {
                warn!("persisted session has an unpaired token; discarding");
                self.clear_storage();
                return false;
            }
        };

        self.cookie.set_token(&tokens.access);
        self.state.send_replace(Session { user: record.user, tokens: Some(tokens), is_loading: false });
        debug!("session restored from storage");
        true
    }

    /// Start a session from a successful login response.
    pub fn login(&self, response: &LoginResponse) {
        let session = Session { user: Some(response.user()), tokens: Some(response.tokens()), is_loading: false };
        self.cookie.set_token(&response.access);
        self.persist(&session);
        self.state.send_replace(session);
        info!(email = %response.email, role = %response.role, "logged in");
    }

    /// Clear the session, both mirrors, and navigate to the login screen.
    pub fn logout(&self) {
        let was_authenticated = self.state.send_if_modified(|session| {
            let changed = *session != Session::default();
            *session = Session::default();
            changed
        });
        self.cookie.clear();
        self.clear_storage();
        if was_authenticated {
            info!("logged out");
        }
        self.navigator.navigate(LOGIN_PATH);
    }

    /// Replace the token pair in place, leaving `user` untouched.
    ///
    /// Returns `false` without writing when no session is present, so a late
    /// refresh cannot resurrect a cleared session.
    pub fn set_tokens(&self, access: impl Into<String>, refresh: impl Into<String>) -> bool {
        let next = TokenPair { access: access.into(), refresh: refresh.into() };
        let mut snapshot = None;
        let updated = self.state.send_if_modified(|session| {
            if session.tokens.is_none() {
                return false;
            }
            session.tokens = Some(next.clone());
            snapshot = Some(session.clone());
            true
        });
        if let Some(session) = snapshot {
            self.cookie.set_token(&next.access);
            self.persist(&session);
        }
        updated
    }

    /// Flag an in-flight auth operation. Does not affect authentication.
    pub fn set_loading(&self, loading: bool) {
        self.state.send_if_modified(|session| {
            let changed = session.is_loading != loading;
            session.is_loading = loading;
            changed
        });
    }

    #[must_use]
    pub fn snapshot(&self) -> Session {
        self.state.borrow().clone()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.state.borrow().is_loading
    }

    #[must_use]
    pub fn tokens(&self) -> Option<TokenPair> {
        self.state.borrow().tokens.clone()
    }

    #[must_use]
    pub fn access_token(&self) -> Option<String> {
        self.state.borrow().access_token().map(str::to_owned)
    }

    #[must_use]
    pub fn refresh_token(&self) -> Option<String> {
        self.state.borrow().refresh_token().map(str::to_owned)
    }

    #[must_use]
    pub fn user(&self) -> Option<User> {
        self.state.borrow().user.clone()
    }

    #[must_use]
    pub fn cookie(&self) -> &CookieMirror {
        &self.cookie
    }

    /// Receiver notified after every session mutation.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }

    fn persist(&self, session: &Session) {
        if let Err(e) = self.storage.save(&session.to_record()) {
            warn!(error = %e, "session storage write failed");
        }
    }

    fn clear_storage(&self) {
        if let Err(e) = self.storage.clear() {
            warn!(error = %e, "session storage clear failed");
        }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================


#[cfg(test)]
#[path = "store_test.rs"]
mod tests;
