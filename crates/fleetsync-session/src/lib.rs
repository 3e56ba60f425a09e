//! fleetsync-session - Session lifecycle management.
//!
//! [`SessionManager`] owns the authenticated session for the lifetime of the
//! process: login, logout, token rotation and validation. It publishes a read
//! accessor through [`fleetsync_core::registry`] so the HTTP layer can sign
//! requests without depending on this crate.

mod manager;
mod store;
mod supervisor;

pub use manager::{SessionManager, Validation};
pub use store::{FileSessionStore, SESSION_KEY};
pub use supervisor::{SupervisorHandle, supervise_realtime};
