//! Error types for fleetsync.
//!
//! A unified error type with explicit variants for transport, authentication,
//! protocol, storage and input validation failures.

use std::fmt;
use thiserror::Error;

/// The unified error type for fleetsync operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Network transport errors (DNS, TLS, connection, timeout).
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Authentication errors (invalid credentials, expired session).
    #[error("authentication error: {0}")]
    Auth(#[from] AuthError),

    /// Protocol errors (non-success HTTP status, unexpected responses).
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Persisted state errors.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Input validation errors (invalid URL, malformed payload).
    #[error("invalid input: {0}")]
    InvalidInput(#[from] InvalidInputError),
}

/// Transport-level errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Network connection failed.
    #[error("connection failed: {message}")]
    Connection { message: String },

    /// Request timed out.
    #[error("request timed out")]
    Timeout,

    /// Generic HTTP error.
    #[error("HTTP error: {message}")]
    Http { message: String },

    /// WebSocket handshake or framing error.
    #[error("websocket error: {message}")]
    WebSocket { message: String },
}

/// Authentication-related errors.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No authenticated session is available.
    #[error("not authenticated")]
    NotAuthenticated,

    /// Refresh token is missing, expired or rejected.
    #[error("refresh token invalid")]
    RefreshTokenInvalid,
}

/// Protocol-level errors from REST responses.
#[derive(Debug)]
pub struct ProtocolError {
    /// HTTP status code.
    pub status: u16,
    /// Server-supplied `detail` message, if present.
    pub detail: Option<String>,
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP {}", self.status)?;
        if let Some(ref detail) = self.detail {
            write!(f, ": {}", detail)?;
        }
        Ok(())
    }
}

impl std::error::Error for ProtocolError {}

impl ProtocolError {
    /// Create a new protocol error.
    pub fn new(status: u16, detail: Option<String>) -> Self {
        Self { status, detail }
    }

    /// Credentials were rejected (401 or 403).
    pub fn is_auth_error(&self) -> bool {
        self.status == 401 || self.status == 403
    }

    /// The server is rate limiting this client.
    pub fn is_rate_limited(&self) -> bool {
        self.status == 429
    }
}

/// Persisted state errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backing store has no room for the entry.
    #[error("storage quota exceeded")]
    QuotaExceeded,

    /// The stored entry could not be read or written.
    #[error("storage I/O failed: {message}")]
    Io { message: String },

    /// The stored entry is not a valid session.
    #[error("stored session is corrupt: {message}")]
    Corrupt { message: String },
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::StorageFull | std::io::ErrorKind::FileTooLarge => {
                StorageError::QuotaExceeded
            }
            _ => StorageError::Io {
                message: err.to_string(),
            },
        }
    }
}

/// Input validation errors.
#[derive(Debug, Error)]
pub enum InvalidInputError {
    /// Invalid API URL format.
    #[error("invalid API URL '{value}': {reason}")]
    ApiUrl { value: String, reason: String },

    /// Response body did not have the expected shape.
    #[error("unexpected response body: {message}")]
    Body { message: String },

    /// Generic invalid input.
    #[error("invalid input: {message}")]
    Other { message: String },
}

impl Error {
    /// A message suitable for showing to the operator.
    ///
    /// Credential rejection, rate limiting and transport failures each map to
    /// a distinct string; everything else falls back to the server detail.
    pub fn user_message(&self) -> String {
        match self {
            Error::Protocol(e) => match e.status {
                401 => "Invalid username or password".to_string(),
                403 => match e.detail {
                    Some(ref detail) => format!("Access denied: {}", detail),
                    None => "Access denied".to_string(),
                },
                429 => match e.detail {
                    Some(ref detail) => {
                        format!("Too many attempts. Please try again later ({})", detail)
                    }
                    None => "Too many attempts. Please try again later".to_string(),
                },
                _ => e
                    .detail
                    .clone()
                    .unwrap_or_else(|| format!("Request failed (HTTP {})", e.status)),
            },
            Error::Transport(_) => "Network error. Check your connection and try again".to_string(),
            Error::Auth(AuthError::NotAuthenticated) => "You are not logged in".to_string(),
            Error::Auth(AuthError::RefreshTokenInvalid) => {
                "Your session has expired. Please log in again".to_string()
            }
            other => other.to_string(),
        }
    }
}
