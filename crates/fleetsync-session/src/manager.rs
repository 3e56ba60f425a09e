//! The session lifecycle manager.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use tokio::sync::{Mutex, watch};
use tracing::{debug, info, instrument, warn};

use fleetsync_core::error::{AuthError, StorageError};
use fleetsync_core::registry;
use fleetsync_core::traits::{AuthApi, SessionStore};
use fleetsync_core::types::ApiUrl;
use fleetsync_core::{Credentials, Error, Result, Session, SessionView, TokenPair};
use fleetsync_http::HttpAuthApi;

/// Outcome of [`SessionManager::validate_session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validation {
    /// Nothing to validate.
    Unauthenticated,
    /// The access token is valid for longer than the expiry skew.
    Healthy,
    /// The token pair was rotated.
    Refreshed,
    /// The session could not be recovered and was cleared.
    Cleared,
    /// The session changed while a refresh was in flight. The newer
    /// session was kept.
    Superseded,
}

struct Inner {
    api: Arc<dyn AuthApi>,
    store: Option<Arc<dyn SessionStore>>,
    state: watch::Sender<Session>,
    validating: Mutex<()>,
    /// Last epoch handed out; never goes backwards, even across logouts.
    epoch: AtomicU64,
}

/// Owns the authenticated session.
///
/// Cloning is cheap and every clone shares the same state. Constructing a
/// manager registers it with [`registry`] as the source of request
/// credentials.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl SessionManager {
    /// Create a manager, loading any persisted session as a cold-start hint.
    ///
    /// The loaded session is not trusted until [`validate_session`]
    /// has run.
    ///
    /// [`validate_session`]: Self::validate_session
    pub fn new(api: Arc<dyn AuthApi>, store: Option<Arc<dyn SessionStore>>) -> Self {
        let initial = match store.as_deref().map(|store| store.load()) {
            Some(Ok(Some(session))) => {
                debug!(
                    authenticated = session.is_authenticated,
                    "Loaded persisted session"
                );
                session
            }
            Some(Ok(None)) | None => Session::empty(),
            Some(Err(e)) => {
                warn!(error = %e, "Discarding unreadable persisted session");
                Session::empty()
            }
        };

        let epoch = AtomicU64::new(initial.epoch);
        let (state, _) = watch::channel(initial);
        let inner = Arc::new(Inner {
            api,
            store,
            state,
            validating: Mutex::new(()),
            epoch,
        });

        let weak: Weak<Inner> = Arc::downgrade(&inner);
        registry::register_getter(move || {
            weak.upgrade()
                .map(|inner| inner.state.borrow().view())
                .unwrap_or_default()
        });

        Self { inner }
    }

    /// A manager talking to the HTTP API at `api`.
    pub fn with_http(api: ApiUrl, store: Option<Arc<dyn SessionStore>>) -> Result<Self> {
        let auth = HttpAuthApi::new(api)?;
        Ok(Self::new(Arc::new(auth), store))
    }

    /// A snapshot of the current session.
    pub fn session(&self) -> Session {
        self.inner.state.borrow().clone()
    }

    pub fn view(&self) -> SessionView {
        self.inner.state.borrow().view()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.state.borrow().is_authenticated
    }

    /// Observe every session replacement.
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.inner.state.subscribe()
    }

    /// Exchange credentials for a new session.
    ///
    /// On failure the current session is left untouched.
    #[instrument(skip(self, credentials), fields(identifier = %credentials.identifier()))]
    pub async fn login(&self, credentials: Credentials) -> Result<Session> {
        let tokens = self.inner.api.login(&credentials).await?;
        let session = self.establish(tokens).await;
        info!("Logged in");
        Ok(session)
    }

    /// Create an account and log into it.
    #[instrument(skip(self, password))]
    pub async fn register(&self, username: &str, password: &str) -> Result<Session> {
        let tokens = self.inner.api.register(username, password).await?;
        let session = self.establish(tokens).await;
        info!("Registered");
        Ok(session)
    }

    async fn establish(&self, tokens: TokenPair) -> Session {
        let user = match self.inner.api.current_user(&tokens.access_token).await {
            Ok(user) => Some(user),
            Err(e) => {
                debug!(error = %e, "Profile fetch failed; continuing without one");
                None
            }
        };

        let mut session = Session::authenticated(tokens, user);
        session.epoch = self.inner.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.state.send_replace(session.clone());
        self.persist(&session);
        session
    }

    /// Clear the session, then tell the server.
    ///
    /// The local session is empty before this awaits anything. A failed
    /// server notification is logged and otherwise ignored.
    #[instrument(skip(self))]
    pub async fn logout(&self) {
        let previous = self.inner.state.send_replace(Session::empty());
        self.persist(&Session::empty());

        let Some(token) = previous.access_token else {
            debug!("Logout without a token; nothing to notify");
            return;
        };

        match self.inner.api.logout(&token).await {
            Ok(()) => info!("Logged out"),
            Err(e) => warn!(error = %e, "Server logout failed; local session already cleared"),
        }
    }

    /// Change the password of the logged-in account.
    #[instrument(skip_all)]
    pub async fn change_password(&self, current_password: &str, new_password: &str) -> Result<()> {
        let view = self.view();
        let token = view.bearer().ok_or(AuthError::NotAuthenticated)?;
        self.inner
            .api
            .change_password(token, current_password, new_password)
            .await?;
        info!("Password changed");
        Ok(())
    }

    /// Make sure an authenticated session is actually usable.
    ///
    /// Safe to call at any time and from several tasks at once. Refresh
    /// and network failures never surface here; an unrecoverable session
    /// is cleared instead.
    pub async fn validate_session(&self) -> Validation {
        self.validate_session_at(chrono::Utc::now().timestamp()).await
    }

    /// [`validate_session`](Self::validate_session) against an explicit
    /// clock, in Unix seconds.
    #[instrument(skip(self))]
    pub async fn validate_session_at(&self, now: i64) -> Validation {
        let _guard = self.inner.validating.lock().await;
        let snapshot = self.session();

        if !snapshot.is_authenticated {
            return Validation::Unauthenticated;
        }

        let access = snapshot.access_token.as_ref();
        let refresh = snapshot.refresh_token.as_ref();
        if access.is_none() && refresh.is_none() {
            warn!("Authenticated session without tokens");
            return self.clear_if_unchanged(&snapshot);
        }

        if access.is_some_and(|t| !t.is_expired_at(now)) {
            return Validation::Healthy;
        }

        let Some(refresh) = refresh.filter(|t| !t.is_expired_at(now)) else {
            info!("Session expired");
            return self.clear_if_unchanged(&snapshot);
        };

        debug!(
            access_exp = ?access.and_then(|t| t.expires_at()),
            refresh_exp = ?refresh.expires_at(),
            "Access token expired; refreshing"
        );

        let tokens = match self.inner.api.refresh(refresh).await {
            Ok(tokens) => tokens,
            Err(e) => {
                info!(error = %e, "Token refresh failed");
                return self.clear_if_unchanged(&snapshot);
            }
        };

        let mut rotated = snapshot.clone();
        rotated.access_token = Some(tokens.access_token);
        rotated.refresh_token = Some(tokens.refresh_token);

        if self.replace_if_unchanged(&snapshot, rotated.clone()) {
            self.persist(&rotated);
            info!(
                exp = ?rotated.access_token.as_ref().and_then(|t| t.expires_at()),
                "Tokens refreshed"
            );
            Validation::Refreshed
        } else {
            debug!("Session replaced during refresh; discarding rotated tokens");
            Validation::Superseded
        }
    }

    fn clear_if_unchanged(&self, snapshot: &Session) -> Validation {
        if self.replace_if_unchanged(snapshot, Session::empty()) {
            self.persist(&Session::empty());
            Validation::Cleared
        } else {
            Validation::Superseded
        }
    }

    /// Replace the session only if it still equals `expected`.
    fn replace_if_unchanged(&self, expected: &Session, next: Session) -> bool {
        self.inner.state.send_if_modified(|current| {
            if current == expected {
                *current = next;
                true
            } else {
                false
            }
        })
    }

    /// Best-effort write-through to the store.
    fn persist(&self, session: &Session) {
        let Some(store) = self.inner.store.as_deref() else {
            return;
        };

        if !session.is_authenticated {
            if let Err(e) = store.clear() {
                warn!(error = %e, "Failed to clear persisted session");
            }
            return;
        }

        match store.save(session) {
            Ok(()) => {}
            Err(Error::Storage(StorageError::QuotaExceeded)) => {
                warn!("Session store full; evicting stored session and retrying");
                if let Err(e) = store.clear() {
                    debug!(error = %e, "Eviction failed");
                }
                if let Err(e) = store.save(session) {
                    warn!(error = %e, "Giving up on persisting session");
                }
            }
            Err(e) => warn!(error = %e, "Failed to persist session"),
        }
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("session", &*self.inner.state.borrow())
            .finish_non_exhaustive()
    }
}

