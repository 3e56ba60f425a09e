//! Collaborator traits at the seams of the session and realtime layers.

mod auth;
mod cache;
mod store;

pub use auth::AuthApi;
pub use cache::CacheInvalidator;
pub use store::SessionStore;
