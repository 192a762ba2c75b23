//! `auth-token` cookie mirror of the access token.
//!
//! SYSTEM CONTEXT
//! ==============
//! Server-evaluated route guards cannot see the in-process store, so the
//! store mirrors the access token into a cookie on every token change and
//! expires it on logout. Optionally the cookie is written to a file so a
//! later process can present it as a `Cookie` header.

use std::path::PathBuf;
use std::sync::Mutex;

use axum_extra::extract::cookie::Cookie;
use time::{Duration, OffsetDateTime};

pub const AUTH_COOKIE: &str = "auth-token";

pub struct CookieMirror {
    current: Mutex<Option<Cookie<'static>>>,
    max_age: Duration,
    file: Option<PathBuf>,
}

impl CookieMirror {
    /// In-memory mirror with the given max-age.
    #[must_use]
    pub fn new(max_age_secs: i64) -> Self {
        Self { current: Mutex::new(None), max_age: Duration::seconds(max_age_secs), file: None }
    }

    /// Mirror that also persists the `Set-Cookie` line to `path`, reloading it if present.
    #[must_use]
    pub fn with_file(max_age_secs: i64, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let loaded = std::fs::read_to_string(&path)
            .ok()
            .and_then(|line| Cookie::parse(line.trim().to_owned()).ok())
            .filter(|c| c.name() == AUTH_COOKIE);
        Self { current: Mutex::new(loaded), max_age: Duration::seconds(max_age_secs), file: Some(path) }
    }

    /// Write the access token into the cookie, restarting its max-age.
    pub fn set_token(&self, token: &str) {
        let cookie = Cookie::build((AUTH_COOKIE, token.to_owned()))
            .path("/")
            .max_age(self.max_age)
            .expires(OffsetDateTime::now_utc() + self.max_age)
            .build();
        self.replace(Some(cookie));
    }

    /// Expire the cookie.
    pub fn clear(&self) {
        self.replace(None);
    }

    /// The mirrored token, if the cookie is set and has not passed its max-age.
    #[must_use]
    pub fn token(&self) -> Option<String> {
        let guard = self.current.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let cookie = guard.as_ref()?;
        if cookie.expires_datetime().is_some_and(|at| at <= OffsetDateTime::now_utc()) {
            return None;
        }
        Some(cookie.value().to_owned())
    }

    /// `Set-Cookie` value describing the current state; an expiring cookie after logout.
    #[must_use]
    pub fn set_cookie_header(&self) -> String {
        let guard = self.current.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        match guard.as_ref() {
            Some(cookie) => cookie.to_string(),
            None => removal_cookie().to_string(),
        }
    }

    /// `Cookie` request header carrying the token, `None` when cleared or past max-age.
    #[must_use]
    pub fn request_header(&self) -> Option<String> {
        self.token().map(|token| format!("{AUTH_COOKIE}={token}"))
    }

    fn replace(&self, next: Option<Cookie<'static>>) {
        let line = next.as_ref().map(ToString::to_string);
        *self.current.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = next;

        let Some(path) = &self.file else {
            return;
        };
        let result = match line {
            Some(line) => match path.parent().filter(|p| !p.as_os_str().is_empty()) {
                Some(parent) => std::fs::create_dir_all(parent).and_then(|()| std::fs::write(path, line)),
                None => std::fs::write(path, line),
            },
            None => match std::fs::remove_file(path) {
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                other => other,
            },
        };
        if let Err(e) = result {
            tracing::warn!(error = %e, path = %path.display(), "auth cookie mirror write failed");
        }
    }
}

fn removal_cookie() -> Cookie<'static> {
    Cookie::build((AUTH_COOKIE, ""))
        .path("/")
        .max_age(Duration::ZERO)
        .expires(OffsetDateTime::UNIX_EPOCH)
        .build()
}

#[cfg(test)]
#[path = "cookie_test.rs"]
mod tests;
