//! Bearer token types and the expiry codec.
//!
//! Tokens are compact three-segment JWTs. The client never validates the
//! signature; it only reads the `exp` claim of the payload segment as a hint
//! for when to refresh. Anything that cannot be decoded counts as expired.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};

/// Seconds before the real `exp` at which a token is already treated as
/// expired, so a request issued right before expiry does not race it.
pub const EXPIRY_SKEW_SECS: i64 = 30;

/// An access token attached to REST requests and to the stream URL.
///
/// Never logged or displayed in Debug output.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessToken(String);

impl AccessToken {
    /// Create a new access token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the raw token for authorization headers and stream URLs.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the `exp` claim in Unix seconds, if it can be decoded.
    pub fn expires_at(&self) -> Option<i64> {
        decode_expiry(&self.0)
    }

    /// Returns true if the token expires within the skew window of `now`.
    pub fn is_expired_at(&self, now: i64) -> bool {
        is_expired_at(&self.0, now)
    }

    /// Returns true if the token is expired relative to the system clock.
    pub fn is_expired(&self) -> bool {
        is_expired(&self.0)
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AccessToken").field(&"[REDACTED]").finish()
    }
}

/// A refresh token, used solely to mint a new token pair.
///
/// Never logged or displayed in Debug output.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RefreshToken(String);

impl RefreshToken {
    /// Create a new refresh token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the raw token for refresh requests.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn expires_at(&self) -> Option<i64> {
        decode_expiry(&self.0)
    }

    pub fn is_expired_at(&self, now: i64) -> bool {
        is_expired_at(&self.0, now)
    }

    pub fn is_expired(&self) -> bool {
        is_expired(&self.0)
    }
}

impl fmt::Debug for RefreshToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RefreshToken").field(&"[REDACTED]").finish()
    }
}

/// A freshly issued access/refresh pair.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: AccessToken,
    pub refresh_token: RefreshToken,
    /// Lifetime of the access token in seconds, as reported by the server.
    pub expires_in: Option<u64>,
}

/// Decode the `exp` claim of a token without checking its signature.
///
/// Returns `None` when the token does not have exactly three segments, the
/// payload is not base64 JSON, or `exp` is missing or not numeric.
pub fn decode_expiry(token: &str) -> Option<i64> {
    let mut segments = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return None;
    };

    let payload = payload.trim_end_matches('=');
    let decoded = URL_SAFE_NO_PAD
        .decode(payload)
        .or_else(|_| STANDARD_NO_PAD.decode(payload))
        .ok()?;

    let claims: serde_json::Value = serde_json::from_slice(&decoded).ok()?;
    let exp = claims.get("exp")?;
    exp.as_i64().or_else(|| exp.as_f64().map(|f| f.floor() as i64))
}

/// Returns true unless the token's `exp` lies more than the skew window
/// after `now`. Undecodable tokens are expired.
pub fn is_expired_at(token: &str, now: i64) -> bool {
    match decode_expiry(token) {
        Some(exp) => exp.saturating_sub(now) <= EXPIRY_SKEW_SECS,
        None => true,
    }
}

/// [`is_expired_at`] against the current system time.
pub fn is_expired(token: &str) -> bool {
    is_expired_at(token, chrono::Utc::now().timestamp())
}
