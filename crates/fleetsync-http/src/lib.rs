//! fleetsync-http - REST client, credential exchange and realtime stream.
//!
//! Requests are signed with the token read from
//! [`fleetsync_core::registry`]; this crate never depends on the session
//! manager that owns that token.

mod auth;
mod client;
pub mod realtime;

pub use auth::HttpAuthApi;
pub use client::ApiClient;
pub use realtime::{
    ConnectionState, ConnectionStatus, RealtimeConfig, RealtimeHandle, RealtimeManager,
    RegistryTokenSource, TokenSource,
};
