//! Client configuration parsed from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::AuthError;

pub const DEFAULT_COOKIE_MAX_AGE_SECS: i64 = 60 * 60;
pub const DEFAULT_REFRESH_LEAD_SECS: u64 = 5 * 60;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self { request_secs: DEFAULT_REQUEST_TIMEOUT_SECS, connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// API host, without trailing slash (e.g. `https://api.example.com/api`).
    pub api_base_url: String,
    /// Where the durable session record lives. `None` keeps it in memory only.
    pub session_path: Option<PathBuf>,
    /// Max-age of the mirrored `auth-token` cookie.
    pub cookie_max_age_secs: i64,
    /// How long before expiry the scheduler refreshes.
    pub refresh_lead_secs: u64,
    pub timeouts: HttpTimeouts,
}

impl ClientConfig {
    /// Config with defaults for everything but the API host.
    #[must_use]
    pub fn new(api_base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: normalize_base_url(&api_base_url.into()),
            session_path: None,
            cookie_max_age_secs: DEFAULT_COOKIE_MAX_AGE_SECS,
            refresh_lead_secs: DEFAULT_REFRESH_LEAD_SECS,
            timeouts: HttpTimeouts::default(),
        }
    }

    /// Build typed client config from environment variables.
    ///
    /// Required:
    /// - `STUDIO_API_BASE_URL`
    ///
    /// Optional:
    /// - `STUDIO_SESSION_PATH`: session record file (memory-only when absent)
    /// - `STUDIO_COOKIE_MAX_AGE_SECS`: default 3600
    /// - `STUDIO_REFRESH_LEAD_SECS`: default 300
    /// - `STUDIO_REQUEST_TIMEOUT_SECS`: default 30
    /// - `STUDIO_CONNECT_TIMEOUT_SECS`: default 10
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Config`] if the base URL is missing or not http(s).
    pub fn from_env() -> Result<Self, AuthError> {
        Self::from_env_with_base(None)
    }

    /// As [`ClientConfig::from_env`], with `base_url` taking precedence over
    /// `STUDIO_API_BASE_URL` when given.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Config`] if no base URL is available or it is not http(s).
    pub fn from_env_with_base(base_url: Option<String>) -> Result<Self, AuthError> {
        let base = match base_url {
            Some(base) => base,
            None => std::env::var("STUDIO_API_BASE_URL")
                .map_err(|_| AuthError::Config("STUDIO_API_BASE_URL not set".into()))?,
        };
        let mut config = Self::new(base);
        config.validate()?;

        config.session_path = std::env::var("STUDIO_SESSION_PATH")
            .ok()
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);
        config.cookie_max_age_secs = env_parse("STUDIO_COOKIE_MAX_AGE_SECS", DEFAULT_COOKIE_MAX_AGE_SECS);
        config.refresh_lead_secs = env_parse("STUDIO_REFRESH_LEAD_SECS", DEFAULT_REFRESH_LEAD_SECS);
        config.timeouts = HttpTimeouts {
            request_secs: env_parse("STUDIO_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS),
            connect_secs: env_parse("STUDIO_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS),
        };
        Ok(config)
    }

    /// Reject base URLs that are empty or not http(s).
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Config`] describing the problem.
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.api_base_url.is_empty() {
            return Err(AuthError::Config("api base URL is empty".into()));
        }
        if !(self.api_base_url.starts_with("http://") || self.api_base_url.starts_with("https://")) {
            return Err(AuthError::Config(format!("api base URL must be http(s): {}", self.api_base_url)));
        }
        Ok(())
    }

    /// Join an API path (leading slash expected) onto the base URL.
    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{path}", self.api_base_url)
        } else {
            format!("{}/{path}", self.api_base_url)
        }
    }

    #[must_use]
    pub fn refresh_lead(&self) -> Duration {
        Duration::from_secs(self.refresh_lead_secs)
    }

    /// Shared HTTP client honoring the configured timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Config`] if the TLS backend cannot be initialized.
    pub fn http_client(&self) -> Result<reqwest::Client, AuthError> {
        reqwest::Client::builder()
            .timeout(Duration::from_secs(self.timeouts.request_secs))
            .connect_timeout(Duration::from_secs(self.timeouts.connect_secs))
            .build()
            .map_err(|e| AuthError::Config(format!("http client build failed: {e}")))
    }
}

fn normalize_base_url(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_string()
}

fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
