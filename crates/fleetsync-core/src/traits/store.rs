//! Session persistence trait.

use crate::Result;
use crate::session::Session;

/// Durable storage for the session across process restarts.
///
/// Persistence is best-effort; the in-memory session stays authoritative.
pub trait SessionStore: Send + Sync {
    /// Load the stored session, if any.
    fn load(&self) -> Result<Option<Session>>;

    /// Replace the stored session.
    ///
    /// Fails with [`StorageError::QuotaExceeded`](crate::error::StorageError)
    /// when the backing store is full.
    fn save(&self, session: &Session) -> Result<()>;

    /// Remove the stored session.
    fn clear(&self) -> Result<()>;
}
