//! fleetsync-core - Core session, token and realtime event types.
//!
//! This crate holds everything the HTTP layer and the session lifecycle
//! manager share without depending on each other: the error taxonomy, the
//! token codec, the [`Session`] data model, realtime topics and the
//! [`registry`] that lets the HTTP layer read the current credentials.

pub mod credentials;
pub mod error;
pub mod events;
pub mod registry;
pub mod session;
pub mod tokens;
pub mod traits;
pub mod types;

pub use credentials::{Credentials, TelegramAuth};
pub use error::Error;
pub use events::{CacheKey, ControlMessage, Envelope, SUBSCRIBED_TOPICS, Topic};
pub use session::{Session, SessionView, UserProfile};
pub use tokens::{AccessToken, RefreshToken, TokenPair};
pub use traits::{AuthApi, CacheInvalidator, SessionStore};
pub use types::ApiUrl;

/// Result type alias using the crate's Error type.
pub type Result<T> = std::result::Result<T, Error>;
