//! Client-side session lifecycle for the studio dashboard API.
//!
//! Holds the logged-in user and token pair, refreshes the access token
//! before it expires (one exchange at a time, however many callers ask),
//! retries a rejected request once after a transparent refresh, and decides
//! whether a route may be entered.
//!
//! [`AuthSession`] is the entry point front ends hold; the modules below are
//! public so servers can mount [`guard::require_session`] or build a store
//! with their own storage and navigation backends.

pub mod api;
pub mod client;
pub mod config;
pub mod cookie;
pub mod dashboard;
pub mod error;
pub mod guard;
pub mod refresh;
pub mod scheduler;
pub mod session;
pub mod storage;
pub mod store;
pub mod token;
pub mod types;

#[cfg(test)]
mod test_support;

pub use client::AuthClient;
pub use config::ClientConfig;
pub use error::AuthError;
pub use guard::GuardDecision;
pub use session::AuthSession;
pub use store::{LogNavigator, Navigator, Session, SessionStore};
pub use types::{LoginCredentials, TokenPair, User};
