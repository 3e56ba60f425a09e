//! Process-wide accessor for the current credentials.
//!
//! The HTTP layer signs every request with the current access token, and the
//! session manager depends on the HTTP layer to talk to the server. Neither
//! imports the other: the session manager publishes a getter here when it is
//! constructed and the HTTP layer reads through it.
//!
//! The registry holds nothing but the function reference. The last
//! registration wins.

use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use crate::session::SessionView;

type Getter = Arc<dyn Fn() -> SessionView + Send + Sync>;

static GETTER: RwLock<Option<Getter>> = RwLock::new(None);

/// Publish the accessor the HTTP layer uses to read credentials.
pub fn register_getter<F>(getter: F)
where
    F: Fn() -> SessionView + Send + Sync + 'static,
{
    let mut slot = GETTER.write().unwrap_or_else(PoisonError::into_inner);
    if slot.is_some() {
        debug!("Replacing registered auth state getter");
    }
    *slot = Some(Arc::new(getter));
}

/// Read the current credentials.
///
/// Returns `None` when nothing has registered yet; callers treat that as
/// unauthenticated.
pub fn auth_state() -> Option<SessionView> {
    // Release the lock before calling out so the getter may itself register.
    let getter = GETTER
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()?;
    Some(getter())
}

/// Drop the registered getter. Test harnesses only.
#[doc(hidden)]
pub fn clear_getter() {
    *GETTER.write().unwrap_or_else(PoisonError::into_inner) = None;
}
