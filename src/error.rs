//! Error taxonomy for session and API operations.
//!
//! ERROR HANDLING
//! ==============
//! Session-breaking failures (`RefreshFailed`, `Unauthorized`) are raised only
//! after the store has already been logged out, so callers never need to
//! clean up session state themselves. Everything else is returned to the
//! caller for local display. Malformed tokens are not an error at all: the
//! codec reports them as expired.

/// Errors produced by login, refresh and authenticated requests.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AuthError {
    /// The API rejected the login credentials.
    #[error("login failed: {message}")]
    InvalidCredentials { message: String },

    /// Credentials failed local validation before any request was sent.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The refresh exchange failed; the session has been logged out.
    #[error("token refresh failed: {0}")]
    RefreshFailed(String),

    /// No token pair is present.
    #[error("not authenticated")]
    NotAuthenticated,

    /// The API still returned 401 after one refresh; the session has been logged out.
    #[error("request unauthorized after token refresh")]
    Unauthorized,

    /// A refresh finished after the session it belonged to was cleared or replaced.
    #[error("session changed while refresh was in flight")]
    SessionChanged,

    /// Transport-level failure (connect, timeout, TLS).
    #[error("network error: {0}")]
    Network(String),

    /// The API returned a non-success status for a feature request.
    #[error("api error: status {status}: {message}")]
    Api { status: u16, message: String },

    /// The response body could not be decoded.
    #[error("response decode failed: {0}")]
    Decode(String),

    /// Client configuration is missing or invalid.
    #[error("config error: {0}")]
    Config(String),
}

impl AuthError {
    /// Stable machine-readable code for the error variant.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidCredentials { .. } => "E_INVALID_CREDENTIALS",
            Self::InvalidInput(_) => "E_INVALID_INPUT",
            Self::RefreshFailed(_) => "E_REFRESH_FAILED",
            Self::NotAuthenticated => "E_NOT_AUTHENTICATED",
            Self::Unauthorized => "E_UNAUTHORIZED",
            Self::SessionChanged => "E_SESSION_CHANGED",
            Self::Network(_) => "E_NETWORK",
            Self::Api { .. } => "E_API",
            Self::Decode(_) => "E_DECODE",
            Self::Config(_) => "E_CONFIG",
        }
    }

    /// Whether the caller may retry the operation as-is.
    #[must_use]
    pub fn retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Api { status: 429 | 500..=599, .. })
    }

    /// Whether the error ended the session (caller should stop retrying and re-login).
    #[must_use]
    pub fn ends_session(&self) -> bool {
        matches!(self, Self::RefreshFailed(_) | Self::Unauthorized | Self::NotAuthenticated)
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() { Self::Decode(e.to_string()) } else { Self::Network(e.to_string()) }
    }
}

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;
