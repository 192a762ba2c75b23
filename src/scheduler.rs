//! Proactive access-token refresh.
//!
//! DESIGN
//! ======
//! One background task per session manager, owned through
//! [`RefreshScheduler`]; dropping the handle aborts it. The task watches the
//! store: while a token pair is present it sleeps until `lead` before the
//! access token's expiry, racing that deadline against store changes. A new
//! access token cancels the pending deadline and schedules against the new
//! expiry; a logout leaves the task idle until the next login.
//!
//! A deadline that fires re-reads the store first, so a timer can never act
//! on a session that has since been cleared or replaced.
//!
//! Only the first evaluation of a token may fire immediately. When a refresh
//! the task performed itself yields a token already inside the lead window
//! (server lifetime shorter than the lead, or client clock running ahead),
//! the next wait is [`backoff_delay`]; a token with no expiry parks the task
//! until the store changes.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::refresh::RefreshCoordinator;
use crate::token;

/// Owned handle to the scheduler task.
pub struct RefreshScheduler {
    handle: JoinHandle<()>,
}

impl RefreshScheduler {
    /// Spawn the scheduler on the current tokio runtime.
    #[must_use]
    pub fn spawn(coordinator: Arc<RefreshCoordinator>, lead: Duration) -> Self {
        info!(lead_secs = lead.as_secs(), "token refresh scheduler started");
        Self { handle: tokio::spawn(run(coordinator, lead)) }
    }

    /// Stop the task. Equivalent to dropping the handle.
    pub fn shutdown(self) {
        drop(self);
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Time to wait before refreshing a token with expiry `exp_secs`, `lead` ahead
/// of it. Clamped at zero; an unknown expiry refreshes immediately.
#[must_use]
pub fn refresh_delay(exp_secs: Option<u64>, now_ms: u64, lead: Duration) -> Duration {
    let Some(exp) = exp_secs else {
        return Duration::ZERO;
    };
    let lead_ms = u64::try_from(lead.as_millis()).unwrap_or(u64::MAX);
    Duration::from_millis(exp.saturating_mul(1000).saturating_sub(now_ms).saturating_sub(lead_ms))
}

/// Floor for the wait after a refresh that returned an already-due token.
pub const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

/// Wait before re-refreshing a token this task just obtained that is already
/// inside the lead window: half its remaining lifetime, never below
/// [`MIN_REFRESH_INTERVAL`].
#[must_use]
pub fn backoff_delay(exp_secs: u64, now_ms: u64) -> Duration {
    let remaining = Duration::from_millis(exp_secs.saturating_mul(1000).saturating_sub(now_ms));
    (remaining / 2).max(MIN_REFRESH_INTERVAL)
}

async fn run(coordinator: Arc<RefreshCoordinator>, lead: Duration) {
    let mut rx = coordinator.store().subscribe();
    // Access token returned by this task's last successful refresh.
    let mut refreshed: Option<String> = None;

    loop {
        let tokens = rx.borrow_and_update().tokens.clone();
        let Some(tokens) = tokens else {
            if rx.changed().await.is_err() {
                return;
            }
            continue;
        };

        let own = refreshed.as_deref() == Some(tokens.access.as_str());
        let exp = token::expiration(&tokens.access);
        if own && exp.is_none() {
            if rx.changed().await.is_err() {
                return;
            }
            continue;
        }

        let now_ms = token::now_millis();
        let mut delay = refresh_delay(exp, now_ms, lead);
        if own && delay.is_zero() {
            if let Some(exp) = exp {
                delay = backoff_delay(exp, now_ms);
                debug!(
                    backoff_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "refreshed token already due; backing off"
                );
            }
        }
        debug!(delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX), "token refresh scheduled");
        let deadline = Instant::now() + delay;

        let fired = loop {
            let changed = tokio::select! {
                () = tokio::time::sleep_until(deadline) => None,
                res = rx.changed() => Some(res),
            };
            match changed {
                None => break true,
                Some(Err(_)) => return,
                Some(Ok(())) => {
                    // Loading-flag updates also notify; only a token change reschedules.
                    if rx.borrow_and_update().access_token() != Some(tokens.access.as_str()) {
                        break false;
                    }
                }
            }
        };
        if !fired {
            debug!("session changed; pending refresh cancelled");
            continue;
        }

        if coordinator.store().access_token().as_deref() != Some(tokens.access.as_str()) {
            debug!("stale refresh timer ignored");
            continue;
        }

        match coordinator.refresh(&tokens.refresh).await {
            Ok(access) => {
                if token::expiration(&access).is_none() {
                    warn!("refreshed token has no expiry; proactive refresh paused until next change");
                }
                refreshed = Some(access);
            }
            Err(e) => {
                warn!(error = %e, "scheduled token refresh failed");
            }
        }
    }
}

#[cfg(test)]
#[path = "scheduler_test.rs"]
mod tests;
