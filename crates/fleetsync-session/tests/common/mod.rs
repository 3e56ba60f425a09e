//! Shared fixtures for session tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;

use fleetsync_core::error::{AuthError, ProtocolError, StorageError, TransportError};
use fleetsync_core::traits::{AuthApi, SessionStore};
use fleetsync_core::{
    AccessToken, Credentials, RefreshToken, Result, Session, TokenPair, UserProfile,
};
use fleetsync_session::SessionManager;

/// Fixed clock for validation tests, in Unix seconds.
pub const NOW: i64 = 1_700_000_000;

/// A signed-looking token whose `exp` is `NOW + offset`.
pub fn jwt(sub: &str, offset: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#);
    let claims = URL_SAFE_NO_PAD.encode(format!(r#"{{"sub":"{}","exp":{}}}"#, sub, NOW + offset));
    format!("{}.{}.signature", header, claims)
}

pub fn pair(prefix: &str) -> TokenPair {
    TokenPair {
        access_token: AccessToken::new(jwt(&format!("{}-access", prefix), 3600)),
        refresh_token: RefreshToken::new(jwt(&format!("{}-refresh", prefix), 86_400)),
        expires_in: Some(3600),
    }
}

/// An authenticated session with raw token strings.
pub fn session_with(access: Option<&str>, refresh: Option<&str>) -> Session {
    Session {
        user: Some(profile()),
        access_token: access.map(AccessToken::new),
        refresh_token: refresh.map(RefreshToken::new),
        is_authenticated: true,
        epoch: 1,
    }
}

/// An authenticated session whose tokens expire at the given offsets.
pub fn session_expiring(access_offset: i64, refresh_offset: i64) -> Session {
    session_with(
        Some(&jwt("seed-access", access_offset)),
        Some(&jwt("seed-refresh", refresh_offset)),
    )
}

pub fn profile() -> UserProfile {
    UserProfile {
        uuid: Some("u-1".to_string()),
        username: "operator".to_string(),
        role: Some("admin".to_string()),
        extra: Default::default(),
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub enum RefreshBehavior {
    #[default]
    Succeed,
    Reject,
    Network,
}

/// Scripted [`AuthApi`] that counts calls.
#[derive(Default)]
pub struct MockAuth {
    pub refresh: RefreshBehavior,
    pub refresh_delay: Option<Duration>,
    pub reject_login: bool,
    pub profile_fails: bool,
    pub logout_fails: bool,
    pub login_calls: AtomicUsize,
    pub refresh_calls: AtomicUsize,
    pub logout_calls: AtomicUsize,
    pub change_password_calls: AtomicUsize,
}

impl MockAuth {
    pub fn refreshes(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn logouts(&self) -> usize {
        self.logout_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthApi for MockAuth {
    async fn login(&self, _credentials: &Credentials) -> Result<TokenPair> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        if self.reject_login {
            return Err(ProtocolError::new(401, Some("Invalid credentials".to_string())).into());
        }
        Ok(pair("login"))
    }

    async fn register(&self, _username: &str, _password: &str) -> Result<TokenPair> {
        Ok(pair("register"))
    }

    async fn refresh(&self, _refresh_token: &RefreshToken) -> Result<TokenPair> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.refresh_delay {
            tokio::time::sleep(delay).await;
        }
        match self.refresh {
            RefreshBehavior::Succeed => Ok(pair("refreshed")),
            RefreshBehavior::Reject => Err(AuthError::RefreshTokenInvalid.into()),
            RefreshBehavior::Network => Err(TransportError::Timeout.into()),
        }
    }

    async fn logout(&self, _access_token: &AccessToken) -> Result<()> {
        self.logout_calls.fetch_add(1, Ordering::SeqCst);
        if self.logout_fails {
            return Err(TransportError::Connection {
                message: "connection refused".to_string(),
            }
            .into());
        }
        Ok(())
    }

    async fn current_user(&self, _access_token: &AccessToken) -> Result<UserProfile> {
        if self.profile_fails {
            return Err(ProtocolError::new(500, None).into());
        }
        Ok(profile())
    }

    async fn change_password(
        &self,
        _access_token: &AccessToken,
        current_password: &str,
        _new_password: &str,
    ) -> Result<()> {
        self.change_password_calls.fetch_add(1, Ordering::SeqCst);
        if current_password != "old-password" {
            return Err(ProtocolError::new(400, Some("Wrong password".to_string())).into());
        }
        Ok(())
    }
}

/// In-memory [`SessionStore`] that can simulate a full store.
#[derive(Default)]
pub struct MemoryStore {
    pub entry: Mutex<Option<Session>>,
    /// Number of upcoming saves that fail with a quota error.
    pub quota_failures: AtomicUsize,
    pub corrupt: AtomicBool,
    pub saves: AtomicUsize,
    pub clears: AtomicUsize,
}

impl MemoryStore {
    pub fn seeded(session: Session) -> Self {
        Self {
            entry: Mutex::new(Some(session)),
            ..Self::default()
        }
    }

    pub fn stored(&self) -> Option<Session> {
        self.entry.lock().unwrap().clone()
    }
}

impl SessionStore for MemoryStore {
    fn load(&self) -> Result<Option<Session>> {
        if self.corrupt.load(Ordering::SeqCst) {
            return Err(StorageError::Corrupt {
                message: "expected value at line 1 column 1".to_string(),
            }
            .into());
        }
        Ok(self.stored())
    }

    fn save(&self, session: &Session) -> Result<()> {
        let remaining = self.quota_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.quota_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(StorageError::QuotaExceeded.into());
        }
        self.saves.fetch_add(1, Ordering::SeqCst);
        *self.entry.lock().unwrap() = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.clears.fetch_add(1, Ordering::SeqCst);
        *self.entry.lock().unwrap() = None;
        Ok(())
    }
}

pub fn manager(api: &Arc<MockAuth>, store: Option<&Arc<MemoryStore>>) -> SessionManager {
    let store = store.map(|store| Arc::clone(store) as Arc<dyn SessionStore>);
    SessionManager::new(Arc::clone(api) as Arc<dyn AuthApi>, store)
}
