//! Session and auth wire types.

use serde::{Deserialize, Serialize};

use crate::error::AuthError;

pub const MIN_PASSWORD_LEN: usize = 8;

/// Identity of the logged-in dashboard user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub email: String,
    pub full_name: String,
    pub role: String,
}

/// Access/refresh pair. Held as one value so the two can never diverge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// Body of `POST /user/login/`.
#[derive(Debug, Clone, Serialize)]
pub struct LoginCredentials {
    pub email: String,
    pub password: String,
}

impl LoginCredentials {
    #[must_use]
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self { email: email.into(), password: password.into() }
    }

    /// Local sanity checks run before the login request is sent.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidInput`] for a malformed email or a short password.
    pub fn validate(&self) -> Result<(), AuthError> {
        let email = self.email.trim();
        let valid_email = email
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.') && !domain.ends_with('.'));
        if !valid_email {
            return Err(AuthError::InvalidInput("please enter a valid email".into()));
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::InvalidInput(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        Ok(())
    }
}

/// Response of `POST /user/login/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access: String,
    pub refresh: String,
    pub email: String,
    pub full_name: String,
    pub role: String,
}

impl LoginResponse {
    #[must_use]
    pub fn user(&self) -> User {
        User { email: self.email.clone(), full_name: self.full_name.clone(), role: self.role.clone() }
    }

    #[must_use]
    pub fn tokens(&self) -> TokenPair {
        TokenPair { access: self.access.clone(), refresh: self.refresh.clone() }
    }
}

/// Response of `POST /user/token/refresh/`. `refresh` is present only when the server rotates it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RefreshResponse {
    pub access: String,
    #[serde(default)]
    pub refresh: Option<String>,
}

/// The durable `auth-storage` record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSession {
    pub user: Option<User>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub is_authenticated: bool,
}
