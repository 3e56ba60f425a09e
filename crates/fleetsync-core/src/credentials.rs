//! Login credential types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Credentials exchanged for a token pair.
///
/// Secrets are never exposed in Debug output.
#[derive(Clone)]
pub enum Credentials {
    /// Username and password.
    Password { username: String, password: String },
    /// A signed identity assertion from the Telegram login widget.
    Telegram(TelegramAuth),
}

impl Credentials {
    /// Create username/password credentials.
    pub fn password(username: impl Into<String>, password: impl Into<String>) -> Self {
        Credentials::Password {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Returns a loggable identifier for these credentials.
    pub fn identifier(&self) -> String {
        match self {
            Credentials::Password { username, .. } => username.clone(),
            Credentials::Telegram(auth) => format!("telegram:{}", auth.id),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Password { username, .. } => f
                .debug_struct("Password")
                .field("username", username)
                .field("password", &"[REDACTED]")
                .finish(),
            Credentials::Telegram(auth) => f.debug_tuple("Telegram").field(auth).finish(),
        }
    }
}

/// Telegram login widget payload, forwarded verbatim to the server.
#[derive(Clone, Serialize, Deserialize)]
pub struct TelegramAuth {
    pub id: i64,
    pub first_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    pub auth_date: i64,
    pub hash: String,
}

impl fmt::Debug for TelegramAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramAuth")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("auth_date", &self.auth_date)
            .field("hash", &"[REDACTED]")
            .finish()
    }
}
