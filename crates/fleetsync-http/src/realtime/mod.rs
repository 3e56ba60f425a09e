//! Realtime event stream that keeps external caches fresh.
//!
//! One [`RealtimeManager`] owns one socket at a time. It subscribes to the
//! fixed topic set on every open, turns inbound events into cache
//! invalidations and reconnects with a capped backoff when the socket drops.
//! Failures never reach the caller; they only delay the next invalidation.

mod backoff;
mod manager;

use std::collections::BTreeSet;
use std::time::Duration;

use fleetsync_core::{AccessToken, Topic, registry};

pub use backoff::{Backoff, DEFAULT_RECONNECT_DELAYS};
pub use manager::{RealtimeHandle, RealtimeManager};

/// Socket lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Open,
    Closing,
}

/// Observable connection snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    pub subscribed_topics: BTreeSet<Topic>,
    /// Consecutive drops since the last successful open.
    pub reconnect_attempt: u32,
}

impl Default for ConnectionStatus {
    fn default() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            subscribed_topics: BTreeSet::new(),
            reconnect_attempt: 0,
        }
    }
}

/// Timing knobs for the realtime stream.
#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    /// Ascending reconnect delays; the last entry caps every later attempt.
    pub reconnect_delays: Vec<Duration>,
    /// Interval between outbound `"ping"` frames while open.
    pub ping_interval: Duration,
    /// How long after a ping the socket may stay silent before it is closed.
    pub pong_timeout: Duration,
    /// Upper bound on the TCP connect plus WebSocket upgrade.
    pub connect_timeout: Duration,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            reconnect_delays: DEFAULT_RECONNECT_DELAYS.to_vec(),
            ping_interval: Duration::from_secs(30),
            pong_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// Where the manager reads the access token on every (re)connect.
pub trait TokenSource: Send + Sync {
    fn access_token(&self) -> Option<AccessToken>;
}

impl<F> TokenSource for F
where
    F: Fn() -> Option<AccessToken> + Send + Sync,
{
    fn access_token(&self) -> Option<AccessToken> {
        self()
    }
}

/// Reads the token through the auth registry, like every signed request.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegistryTokenSource;

impl TokenSource for RegistryTokenSource {
    fn access_token(&self) -> Option<AccessToken> {
        registry::auth_state().and_then(|state| state.bearer().cloned())
    }
}
