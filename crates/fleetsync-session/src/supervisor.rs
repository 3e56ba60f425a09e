//! Ties the realtime connection to the session lifecycle.

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use fleetsync_core::Session;
use fleetsync_http::{RealtimeHandle, RealtimeManager};

use crate::manager::SessionManager;

/// Keep one realtime connection alive per authenticated session.
///
/// A connection is built with `factory` whenever a session becomes
/// authenticated. It is shut down as soon as the session is cleared, and
/// replaced when a later login supersedes the session it was opened for.
/// Token rotation keeps the connection. Shutting a connection down cancels
/// any pending reconnect, so a logout never leaves a socket reconnecting
/// behind it.
pub fn supervise_realtime<F>(session: &SessionManager, factory: F) -> SupervisorHandle
where
    F: Fn() -> RealtimeManager + Send + 'static,
{
    let cancel = CancellationToken::new();
    let task = tokio::spawn(run(session.subscribe(), factory, cancel.clone()));
    SupervisorHandle {
        cancel,
        task: Some(task),
    }
}

fn is_live(session: &Session) -> bool {
    session.is_authenticated && session.access_token.is_some()
}

/// A running connection and the session epoch it was opened for.
struct Connection {
    epoch: u64,
    handle: RealtimeHandle,
}

async fn run<F>(mut sessions: watch::Receiver<Session>, factory: F, cancel: CancellationToken)
where
    F: Fn() -> RealtimeManager,
{
    let mut current: Option<Connection> = None;

    loop {
        let (live, epoch) = {
            let session = sessions.borrow_and_update();
            (is_live(&session), session.epoch)
        };

        if let Some(conn) = current.take() {
            if live && conn.epoch == epoch && !conn.handle.is_finished() {
                current = Some(conn);
            } else {
                if live {
                    info!(
                        from = conn.epoch,
                        to = epoch,
                        "Session replaced; restarting realtime connection"
                    );
                } else {
                    info!("Session cleared; stopping realtime connection");
                }
                conn.handle.shutdown().await;
            }
        }

        if live && current.is_none() {
            info!(epoch, "Session authenticated; starting realtime connection");
            current = Some(Connection {
                epoch,
                handle: factory().spawn(),
            });
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            changed = sessions.changed() => {
                if changed.is_err() {
                    debug!("Session manager dropped");
                    break;
                }
            }
        }
    }

    if let Some(conn) = current.take() {
        conn.handle.shutdown().await;
    }
}

/// Handle to the supervisor task. Dropping it stops supervision and the
/// connection it owns.
#[derive(Debug)]
pub struct SupervisorHandle {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl SupervisorHandle {
    /// Stop supervising and wait for the connection to close.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "Realtime supervisor ended abnormally");
            }
        }
    }
}

impl Drop for SupervisorHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
