//! Realtime connection manager.

use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace, warn};

use fleetsync_core::traits::CacheInvalidator;
use fleetsync_core::{ApiUrl, ControlMessage, Envelope, SUBSCRIBED_TOPICS};

use super::backoff::Backoff;
use super::{ConnectionState, ConnectionStatus, RealtimeConfig, RegistryTokenSource, TokenSource};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Upper bound on flushing a close frame during teardown.
const CLOSE_FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

/// How a single open socket ended.
#[derive(Debug, PartialEq, Eq)]
enum SocketEnd {
    /// Closed by the server, the network or the pong timeout.
    Dropped,
    /// Torn down by [`RealtimeHandle::shutdown`] or drop.
    Cancelled,
}

/// Builder and owner of the realtime loop.
pub struct RealtimeManager {
    api: ApiUrl,
    config: RealtimeConfig,
    invalidator: Arc<dyn CacheInvalidator>,
    tokens: Arc<dyn TokenSource>,
}

impl RealtimeManager {
    /// Create a manager that reads its token through the auth registry.
    pub fn new(api: ApiUrl, invalidator: Arc<dyn CacheInvalidator>) -> Self {
        Self {
            api,
            config: RealtimeConfig::default(),
            invalidator,
            tokens: Arc::new(RegistryTokenSource),
        }
    }

    pub fn with_config(mut self, config: RealtimeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_token_source(mut self, tokens: Arc<dyn TokenSource>) -> Self {
        self.tokens = tokens;
        self
    }

    /// Start the loop on the current tokio runtime.
    ///
    /// The returned handle is the only way to stop it; dropping the handle
    /// stops it too.
    pub fn spawn(self) -> RealtimeHandle {
        let cancel = CancellationToken::new();
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::default());
        let task = tokio::spawn(self.run(cancel.clone(), status_tx));

        RealtimeHandle {
            cancel,
            status: status_rx,
            task: Some(task),
        }
    }

    #[instrument(skip_all, fields(api = %self.api))]
    async fn run(self, cancel: CancellationToken, status: watch::Sender<ConnectionStatus>) {
        let mut backoff = Backoff::new(self.config.reconnect_delays.clone());

        loop {
            let Some(token) = self.tokens.access_token() else {
                info!("No access token available, realtime stream stopped");
                break;
            };

            status.send_modify(|s| s.state = ConnectionState::Connecting);
            debug!(attempt = backoff.attempt(), "Connecting to realtime stream");

            let connect = connect_async(self.api.stream_url(token.as_str()));
            let connected = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                result = tokio::time::timeout(self.config.connect_timeout, connect) => result,
            };

            match connected {
                Ok(Ok((socket, _))) => {
                    backoff.reset();
                    status.send_modify(|s| {
                        s.state = ConnectionState::Open;
                        s.reconnect_attempt = 0;
                    });
                    info!("Realtime stream connected");

                    if self.drive(socket, &cancel, &status).await == SocketEnd::Cancelled {
                        break;
                    }
                }
                Ok(Err(e)) => {
                    warn!(error = %e, "Realtime stream connection failed");
                }
                Err(_) => {
                    warn!(
                        timeout_ms = self.config.connect_timeout.as_millis() as u64,
                        "Realtime stream handshake timed out"
                    );
                }
            }

            let delay = backoff.next_delay();
            status.send_modify(|s| {
                s.state = ConnectionState::Disconnected;
                s.subscribed_topics.clear();
                s.reconnect_attempt = backoff.attempt();
            });
            debug!(
                delay_ms = delay.as_millis() as u64,
                attempt = backoff.attempt(),
                "Scheduling reconnect"
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        status.send_modify(|s| {
            s.state = ConnectionState::Disconnected;
            s.subscribed_topics.clear();
        });
        debug!("Realtime loop finished");
    }

    /// Pump one open socket until it ends.
    async fn drive(
        &self,
        socket: Socket,
        cancel: &CancellationToken,
        status: &watch::Sender<ConnectionStatus>,
    ) -> SocketEnd {
        let (mut write, mut read) = socket.split();

        let subscribe = ControlMessage::subscribe_all().to_json();
        if let Err(e) = write.send(Message::text(subscribe)).await {
            warn!(error = %e, "Failed to send subscribe message");
            return SocketEnd::Dropped;
        }
        status.send_modify(|s| s.subscribed_topics = SUBSCRIBED_TOPICS.into_iter().collect());

        let ping_every = self.config.ping_interval;
        let mut ping = tokio::time::interval_at(Instant::now() + ping_every, ping_every);
        ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut pong_deadline: Option<Instant> = None;

        loop {
            let deadline = pong_deadline;
            let silence = async move {
                match deadline {
                    Some(deadline) => tokio::time::sleep_until(deadline).await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    status.send_modify(|s| s.state = ConnectionState::Closing);
                    close(&mut write).await;
                    return SocketEnd::Cancelled;
                }
                msg = read.next() => {
                    // Any inbound frame proves the socket is alive.
                    pong_deadline = None;
                    match msg {
                        Some(Ok(Message::Text(text))) => self.dispatch(text.as_str()),
                        // The protocol layer queues the pong reply itself.
                        Some(Ok(Message::Ping(_))) => trace!("Received ping"),
                        Some(Ok(Message::Pong(_))) => trace!("Received pong"),
                        Some(Ok(Message::Binary(data))) => {
                            trace!(len = data.len(), "Ignoring binary frame");
                        }
                        Some(Ok(Message::Frame(_))) => {}
                        Some(Ok(Message::Close(frame))) => {
                            info!(?frame, "Realtime stream closed by server");
                            return SocketEnd::Dropped;
                        }
                        Some(Err(e)) => {
                            warn!(error = %e, "Realtime stream error");
                            return SocketEnd::Dropped;
                        }
                        None => {
                            info!("Realtime stream ended");
                            return SocketEnd::Dropped;
                        }
                    }
                }
                _ = ping.tick() => {
                    trace!("Sending ping");
                    if let Err(e) = write.send(Message::text("ping")).await {
                        warn!(error = %e, "Failed to send ping");
                        return SocketEnd::Dropped;
                    }
                    if pong_deadline.is_none() {
                        pong_deadline = Some(Instant::now() + self.config.pong_timeout);
                    }
                }
                _ = silence => {
                    warn!(
                        timeout_ms = self.config.pong_timeout.as_millis() as u64,
                        "No reply to ping, closing stale realtime stream"
                    );
                    status.send_modify(|s| s.state = ConnectionState::Closing);
                    close(&mut write).await;
                    return SocketEnd::Dropped;
                }
            }
        }
    }

    /// Turn one text frame into cache invalidations.
    fn dispatch(&self, text: &str) {
        let Some(envelope) = Envelope::parse(text) else {
            trace!("Ignoring non-envelope text frame");
            return;
        };

        let Some(topic) = envelope.topic() else {
            debug!(kind = %envelope.kind, "Ignoring event with unknown type");
            return;
        };

        for key in envelope.invalidations() {
            debug!(%topic, cache = %key, "Invalidating cache");
            self.invalidator.invalidate(&key);
        }
    }
}

impl std::fmt::Debug for RealtimeManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeManager")
            .field("api", &self.api)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

async fn close(write: &mut SplitSink<Socket, Message>) {
    match tokio::time::timeout(CLOSE_FLUSH_TIMEOUT, write.send(Message::Close(None))).await {
        Ok(Ok(())) => trace!("Close frame sent"),
        Ok(Err(e)) => trace!(error = %e, "Failed to send close frame"),
        Err(_) => trace!("Timed out sending close frame"),
    }
}

/// Handle to a running realtime loop.
#[derive(Debug)]
pub struct RealtimeHandle {
    cancel: CancellationToken,
    status: watch::Receiver<ConnectionStatus>,
    task: Option<JoinHandle<()>>,
}

impl RealtimeHandle {
    /// The current connection snapshot.
    pub fn status(&self) -> ConnectionStatus {
        self.status.borrow().clone()
    }

    /// A receiver notified on every status change.
    pub fn subscribe_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    /// Returns true once the loop has exited.
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Stop the loop and wait for it to exit.
    ///
    /// Cancels any pending reconnect and closes the open socket without
    /// scheduling another attempt.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "Realtime task ended abnormally");
            }
        }
    }
}

impl Drop for RealtimeHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
