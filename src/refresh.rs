//! Single-flight access-token refresh.
//!
//! DESIGN
//! ======
//! The in-flight exchange is a `futures::future::Shared` parked in a slot
//! behind a mutex. Callers that arrive while it is outstanding clone the
//! shared future instead of issuing a second request, so N concurrent callers
//! cost one network exchange and all observe the same result. The exchange
//! clears its own slot when it settles, keyed by a generation number so a
//! settled attempt never clears a newer one.
//!
//! Joining is per refresh token. A caller holding a different refresh token
//! (a new login after logout) starts its own exchange and takes over the slot;
//! the superseded exchange still settles, and finds the session changed.
//!
//! ERROR HANDLING
//! ==============
//! Any failure of the exchange (non-2xx, transport, malformed body) logs the
//! session out before the error reaches callers, and surfaces as
//! `AuthError::RefreshFailed` so callers know not to retry.

use std::sync::{Arc, Mutex, PoisonError};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use tracing::{debug, info, warn};

use crate::api::AuthApi;
use crate::error::AuthError;
use crate::store::SessionStore;

type RefreshFuture = Shared<BoxFuture<'static, Result<String, AuthError>>>;

struct InFlight {
    generation: u64,
    refresh_token: String,
    future: RefreshFuture,
}

#[derive(Default)]
struct Slot {
    next_generation: u64,
    in_flight: Option<InFlight>,
}

pub struct RefreshCoordinator {
    api: Arc<dyn AuthApi>,
    store: Arc<SessionStore>,
    slot: Arc<Mutex<Slot>>,
}

impl RefreshCoordinator {
    #[must_use]
    pub fn new(api: Arc<dyn AuthApi>, store: Arc<SessionStore>) -> Self {
        Self { api, store, slot: Arc::new(Mutex::new(Slot::default())) }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Whether an exchange is currently outstanding.
    #[must_use]
    pub fn in_flight(&self) -> bool {
        lock(&self.slot).in_flight.is_some()
    }

    /// Exchange `refresh_token` for a new access token, joining any refresh already in flight.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::RefreshFailed`] after logging the session out when
    /// the exchange fails, or [`AuthError::SessionChanged`] when the session
    /// was cleared or replaced while the exchange was outstanding.
    pub async fn refresh(&self, refresh_token: &str) -> Result<String, AuthError> {
        let future = {
            let mut slot = lock(&self.slot);
            let joinable = slot.in_flight.as_ref().filter(|f| f.refresh_token == refresh_token);
            if let Some(in_flight) = joinable {
                debug!(generation = in_flight.generation, "joining in-flight token refresh");
                in_flight.future.clone()
            } else {
                if let Some(superseded) = &slot.in_flight {
                    debug!(generation = superseded.generation, "superseding refresh for a previous session");
                }
                slot.next_generation += 1;
                let generation = slot.next_generation;
                let future = exchange(
                    self.api.clone(),
                    self.store.clone(),
                    self.slot.clone(),
                    generation,
                    refresh_token.to_owned(),
                )
                .boxed()
                .shared();
                slot.in_flight =
                    Some(InFlight { generation, refresh_token: refresh_token.to_owned(), future: future.clone() });
                future
            }
        };
        future.await
    }

    /// Refresh using whatever refresh token the store currently holds.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::NotAuthenticated`] when no session is present,
    /// otherwise as [`RefreshCoordinator::refresh`].
    pub async fn refresh_current(&self) -> Result<String, AuthError> {
        let refresh_token = self.store.refresh_token().ok_or(AuthError::NotAuthenticated)?;
        self.refresh(&refresh_token).await
    }
}

async fn exchange(
    api: Arc<dyn AuthApi>,
    store: Arc<SessionStore>,
    slot: Arc<Mutex<Slot>>,
    generation: u64,
    refresh_token: String,
) -> Result<String, AuthError> {
    debug!(generation, "refreshing access token");
    let result = api.refresh(&refresh_token).await;
    let outcome = settle(&store, generation, refresh_token, result);

    let mut guard = lock(&slot);
    if guard.in_flight.as_ref().is_some_and(|f| f.generation == generation) {
        guard.in_flight = None;
    }
    outcome
}

/// Apply an exchange result to the store. The store is updated before the
/// in-flight slot is released.
fn settle(
    store: &SessionStore,
    generation: u64,
    refresh_token: String,
    result: Result<crate::types::RefreshResponse, AuthError>,
) -> Result<String, AuthError> {
    let current = store.refresh_token();
    match result {
        Ok(response) => {
            if current.as_deref() != Some(refresh_token.as_str()) {
                warn!(generation, "session changed during refresh; discarding new token");
                return Err(AuthError::SessionChanged);
            }
            let next_refresh = response.refresh.unwrap_or(refresh_token);
            if !store.set_tokens(response.access.clone(), next_refresh) {
                return Err(AuthError::SessionChanged);
            }
            info!(generation, "access token refreshed");
            Ok(response.access)
        }
        Err(e) => {
            match current {
                Some(other) if other != refresh_token => {
                    warn!(generation, error = %e, "stale refresh failed; current session left intact");
                }
                _ => {
                    warn!(generation, error = %e, "token refresh failed; logging out");
                    store.logout();
                }
            }
            Err(match e {
                AuthError::RefreshFailed(_) => e,
                other => AuthError::RefreshFailed(other.to_string()),
            })
        }
    }
}

fn lock(slot: &Mutex<Slot>) -> std::sync::MutexGuard<'_, Slot> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}


#[cfg(test)]
#[path = "refresh_test.rs"]
mod tests;
