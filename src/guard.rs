//! Route guard.
//!
//! A pure decision over `(path, session_valid)`, evaluated either server-side
//! from the `auth-token` cookie (axum middleware) or client-side from the
//! store. Each navigation is decided on its own; nothing is remembered
//! between calls.

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use tracing::debug;

use crate::cookie::AUTH_COOKIE;
use crate::store::{Session, SessionStore};
use crate::token;

pub const LOGIN_PATH: &str = "/login";
pub const LANDING_PATH: &str = "/dashboard";

/// Screens only meaningful without a session.
pub const PUBLIC_PREFIXES: &[&str] = &["/login", "/register", "/forgot-password"];

/// Asset paths the guard never looks at.
pub const STATIC_PREFIXES: &[&str] = &["/_next", "/favicon.ico", "/pkg"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Allowed,
    Redirected { to: &'static str },
}

impl GuardDecision {
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

fn matches_prefix(path: &str, prefix: &str) -> bool {
    path.strip_prefix(prefix).is_some_and(|rest| rest.is_empty() || rest.starts_with('/') || rest.starts_with('?'))
}

#[must_use]
pub fn is_public(path: &str) -> bool {
    PUBLIC_PREFIXES.iter().any(|p| matches_prefix(path, p))
}

#[must_use]
pub fn is_static(path: &str) -> bool {
    STATIC_PREFIXES.iter().any(|p| matches_prefix(path, p))
}

/// Decide a navigation to `path` given whether the session is valid.
#[must_use]
pub fn evaluate(path: &str, session_valid: bool) -> GuardDecision {
    if is_static(path) {
        return GuardDecision::Allowed;
    }
    if path == "/" || path.is_empty() {
        let to = if session_valid { LANDING_PATH } else { LOGIN_PATH };
        return GuardDecision::Redirected { to };
    }
    match (is_public(path), session_valid) {
        (true, true) => GuardDecision::Redirected { to: LANDING_PATH },
        (false, false) => GuardDecision::Redirected { to: LOGIN_PATH },
        _ => GuardDecision::Allowed,
    }
}

/// Client-side evaluation: valid means authenticated with an unexpired access token.
#[must_use]
pub fn evaluate_store(store: &SessionStore, path: &str) -> GuardDecision {
    let valid = store.access_token().is_some_and(|t| !token::is_expired(&t));
    evaluate(path, valid)
}

/// Whether the session's user holds `role` (case-insensitive).
#[must_use]
pub fn has_role(session: &Session, role: &str) -> bool {
    session.is_authenticated() && session.user.as_ref().is_some_and(|u| u.role.eq_ignore_ascii_case(role))
}

/// Axum middleware guarding every route by the `auth-token` cookie.
///
/// Mount with `axum::middleware::from_fn(require_session)`.
pub async fn require_session(jar: CookieJar, request: Request, next: Next) -> Response {
    let path = request.uri().path().to_owned();
    let valid = jar
        .get(AUTH_COOKIE)
        .map(Cookie::value)
        .is_some_and(|t| !t.is_empty() && !token::is_expired(t));

    match evaluate(&path, valid) {
        GuardDecision::Allowed => next.run(request).await,
        GuardDecision::Redirected { to } => {
            debug!(%path, %to, "route guard redirect");
            Redirect::temporary(to).into_response()
        }
    }
}

#[cfg(test)]
#[path = "guard_test.rs"]
mod tests;
