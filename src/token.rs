//! Bearer token payload decoding and expiry checks.
//!
//! TRUST BOUNDARY
//! ==============
//! Tokens are issued by the studio API and are never verified here. The
//! decoded claims only drive display and refresh scheduling; the API stays
//! the sole authority on validity. Anything ambiguous reads as expired, which
//! at worst costs one extra refresh.

use std::time::{SystemTime, UNIX_EPOCH};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::{Map, Value};

/// Decoded, unverified claims of a JWT-shaped token.
#[derive(Debug, Clone, PartialEq)]
pub struct Claims {
    inner: Map<String, Value>,
}

impl Claims {
    /// Gets a claim value by key.
    #[must_use]
    pub fn get_claim(&self, key: &str) -> Option<&Value> {
        self.inner.get(key)
    }

    /// Expiry in seconds since the epoch. `None` when absent or not a non-negative number.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn exp(&self) -> Option<u64> {
        let exp = self.inner.get("exp")?;
        exp.as_u64().or_else(|| {
            exp.as_f64()
                .filter(|v| v.is_finite() && *v >= 0.0)
                .map(|v| v as u64)
        })
    }
}

/// Current wall-clock time in milliseconds since the epoch.
#[must_use]
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

/// Decode the payload segment of `token`. Returns `None` on any malformed input.
#[must_use]
pub fn decode(token: &str) -> Option<Claims> {
    let mut parts = token.split('.');
    let (_header, payload, _signature) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() || payload.is_empty() {
        return None;
    }

    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    match serde_json::from_slice::<Value>(&bytes).ok()? {
        Value::Object(inner) => Some(Claims { inner }),
        _ => None,
    }
}

/// The `exp` claim of `token` in seconds, if it decodes and carries one.
#[must_use]
pub fn expiration(token: &str) -> Option<u64> {
    decode(token)?.exp()
}

/// True when `token` is expired, malformed, or has no `exp` claim.
#[must_use]
pub fn is_expired(token: &str) -> bool {
    is_expired_at(token, now_millis())
}

/// [`is_expired`] against an explicit clock reading.
#[must_use]
pub fn is_expired_at(token: &str, now_ms: u64) -> bool {
    match expiration(token) {
        Some(exp) => exp.saturating_mul(1000) < now_ms,
        None => true,
    }
}

#[cfg(test)]
pub(crate) mod test_tokens {
    use super::*;

    /// Build an unsigned JWT-shaped token carrying `claims`.
    pub(crate) fn token_with_claims(claims: &Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
        format!("{header}.{payload}.signature")
    }

    /// Token expiring `secs_from_now` seconds from the real clock (negative = past).
    pub(crate) fn token_expiring_in(secs_from_now: i64) -> String {
        let now = i64::try_from(now_millis() / 1000).unwrap();
        token_with_claims(&serde_json::json!({ "exp": now + secs_from_now, "user_id": 7 }))
    }
}

#[cfg(test)]
#[path = "token_test.rs"]
mod tests;
