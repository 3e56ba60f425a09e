//! The authenticated session record.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::tokens::{AccessToken, RefreshToken, TokenPair};

/// The operator profile attached to a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Fields this crate does not interpret.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// The current authenticated identity and its tokens.
///
/// Replaced wholesale on login, logout and token rotation. The persisted
/// form is a cold-start hint only and must be re-validated before use.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default)]
    pub user: Option<UserProfile>,
    #[serde(default)]
    pub access_token: Option<AccessToken>,
    #[serde(default)]
    pub refresh_token: Option<RefreshToken>,
    #[serde(default)]
    pub is_authenticated: bool,
    /// Which login this session came from. Bumped whenever a login or
    /// registration replaces the session; token rotation keeps it.
    #[serde(default)]
    pub epoch: u64,
}

impl Session {
    /// The empty, unauthenticated session.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A fresh authenticated session from a newly issued token pair.
    pub fn authenticated(tokens: TokenPair, user: Option<UserProfile>) -> Self {
        Self {
            user,
            access_token: Some(tokens.access_token),
            refresh_token: Some(tokens.refresh_token),
            is_authenticated: true,
            epoch: 0,
        }
    }

    /// A read-only view for request signing.
    pub fn view(&self) -> SessionView {
        SessionView {
            access_token: self.access_token.clone(),
            is_authenticated: self.is_authenticated,
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("user", &self.user.as_ref().map(|u| &u.username))
            .field("is_authenticated", &self.is_authenticated)
            .field("epoch", &self.epoch)
            .field("tokens", &"[REDACTED]")
            .finish()
    }
}

/// What the HTTP layer needs to sign a request.
#[derive(Debug, Clone, Default)]
pub struct SessionView {
    pub access_token: Option<AccessToken>,
    pub is_authenticated: bool,
}

impl SessionView {
    /// The token to send as a bearer credential, if the session is live.
    pub fn bearer(&self) -> Option<&AccessToken> {
        if self.is_authenticated {
            self.access_token.as_ref()
        } else {
            None
        }
    }
}
