//! Realtime stream tests against a local WebSocket server.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::{WebSocketStream, accept_hdr_async};

use fleetsync_core::traits::CacheInvalidator;
use fleetsync_core::{AccessToken, ApiUrl, CacheKey};
use fleetsync_http::{ConnectionState, RealtimeConfig, RealtimeHandle, RealtimeManager};

const TIMEOUT: Duration = Duration::from_secs(5);

type ServerSocket = WebSocketStream<TcpStream>;

/// Accepts stream connections and hands them to the test.
struct TestServer {
    api: ApiUrl,
    accepted: Arc<AtomicUsize>,
    sockets: mpsc::UnboundedReceiver<(String, ServerSocket)>,
}

impl TestServer {
    async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepted = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = mpsc::unbounded_channel();

        let counter = Arc::clone(&accepted);
        tokio::spawn(async move {
            while let Ok((tcp, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                let tx = tx.clone();
                tokio::spawn(async move {
                    let mut uri = String::new();
                    let callback = |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
                        uri = req.uri().to_string();
                        Ok(resp)
                    };
                    let result = accept_hdr_async(tcp, callback).await;
                    if let Ok(ws) = result {
                        let _ = tx.send((uri, ws));
                    }
                });
            }
        });

        Self {
            api: ApiUrl::new(format!("http://{}", addr)).unwrap(),
            accepted,
            sockets: rx,
        }
    }

    async fn next_socket(&mut self) -> (String, ServerSocket) {
        timeout(TIMEOUT, self.sockets.recv())
            .await
            .expect("timeout waiting for connection")
            .expect("listener stopped")
    }

    fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }
}

async fn next_text(ws: &mut ServerSocket) -> String {
    loop {
        let msg = timeout(TIMEOUT, ws.next())
            .await
            .expect("timeout waiting for message")
            .expect("stream closed")
            .expect("ws error");
        if let Message::Text(text) = msg {
            return text.as_str().to_string();
        }
    }
}

fn recorder() -> (Arc<dyn CacheInvalidator>, mpsc::UnboundedReceiver<CacheKey>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let invalidator = move |key: &CacheKey| {
        let _ = tx.send(key.clone());
    };
    (Arc::new(invalidator), rx)
}

async fn next_key(rx: &mut mpsc::UnboundedReceiver<CacheKey>) -> CacheKey {
    timeout(TIMEOUT, rx.recv())
        .await
        .expect("timeout waiting for invalidation")
        .expect("invalidator dropped")
}

fn config(delays: &[u64]) -> RealtimeConfig {
    RealtimeConfig {
        reconnect_delays: delays.iter().map(|ms| Duration::from_millis(*ms)).collect(),
        ping_interval: Duration::from_secs(30),
        pong_timeout: Duration::from_secs(10),
        connect_timeout: Duration::from_secs(5),
    }
}

fn spawn(
    server: &TestServer,
    config: RealtimeConfig,
    invalidator: Arc<dyn CacheInvalidator>,
) -> RealtimeHandle {
    RealtimeManager::new(server.api.clone(), invalidator)
        .with_config(config)
        .with_token_source(Arc::new(|| Some(AccessToken::new("test-token"))))
        .spawn()
}

async fn wait_open(handle: &RealtimeHandle) {
    let mut status = handle.subscribe_status();
    timeout(
        TIMEOUT,
        status.wait_for(|s| s.state == ConnectionState::Open && s.subscribed_topics.len() == 4),
    )
    .await
    .expect("timeout waiting for open")
    .expect("status sender dropped");
}

#[tokio::test]
async fn test_subscribes_on_open_with_token_in_url() {
    let mut server = TestServer::start().await;
    let (invalidator, _keys) = recorder();
    let handle = spawn(&server, config(&[50]), invalidator);

    let (uri, mut ws) = server.next_socket().await;
    assert_eq!(uri, "/api/v2/ws?token=test-token");

    let subscribe: serde_json::Value = serde_json::from_str(&next_text(&mut ws).await).unwrap();
    assert_eq!(
        subscribe,
        json!({
            "type": "subscribe",
            "topics": ["node_status", "user_update", "violation", "connection"]
        })
    );

    wait_open(&handle).await;
    assert_eq!(handle.status().reconnect_attempt, 0);
    handle.shutdown().await;
}

#[tokio::test]
async fn test_user_update_invalidates_collection_and_entry_once() {
    let mut server = TestServer::start().await;
    let (invalidator, mut keys) = recorder();
    let handle = spawn(&server, config(&[50]), invalidator);

    let (_, mut ws) = server.next_socket().await;
    next_text(&mut ws).await;

    ws.send(Message::text(r#"{"type":"user_update","data":{"uuid":"abc"}}"#))
        .await
        .unwrap();
    // Sentinel: anything duplicated above would arrive before this.
    ws.send(Message::text(r#"{"type":"violation"}"#)).await.unwrap();

    let mut received = Vec::new();
    for _ in 0..3 {
        received.push(next_key(&mut keys).await);
    }
    assert_eq!(
        received,
        vec![
            CacheKey::Users,
            CacheKey::User("abc".to_string()),
            CacheKey::Violations
        ]
    );

    handle.shutdown().await;
}

#[tokio::test]
async fn test_unknown_topics_and_keepalives_are_ignored() {
    let mut server = TestServer::start().await;
    let (invalidator, mut keys) = recorder();
    let handle = spawn(&server, config(&[50]), invalidator);

    let (_, mut ws) = server.next_socket().await;
    next_text(&mut ws).await;

    ws.send(Message::text("pong")).await.unwrap();
    ws.send(Message::text("ping")).await.unwrap();
    ws.send(Message::text("{not json")).await.unwrap();
    ws.send(Message::text(r#"{"type":"unknown_topic"}"#)).await.unwrap();
    ws.send(Message::binary(vec![0u8, 1, 2])).await.unwrap();
    ws.send(Message::text(r#"{"type":"node_status","data":{"status":"up"}}"#))
        .await
        .unwrap();

    assert_eq!(next_key(&mut keys).await, CacheKey::Nodes);
    assert_eq!(handle.status().state, ConnectionState::Open);
    assert_eq!(server.accepted(), 1);

    handle.shutdown().await;
}

#[tokio::test]
async fn test_reconnects_after_drop_and_resets_attempts() {
    let mut server = TestServer::start().await;
    let (invalidator, _keys) = recorder();
    // A second consecutive drop would wait 30s; every reconnect below must
    // therefore come from the first table entry.
    let handle = spawn(&server, config(&[50, 30_000]), invalidator);

    let (_, ws) = server.next_socket().await;
    drop(ws);

    let (_, mut ws) = server.next_socket().await;
    next_text(&mut ws).await;
    wait_open(&handle).await;
    assert_eq!(handle.status().reconnect_attempt, 0);
    drop(ws);

    let (_, mut ws) = server.next_socket().await;
    next_text(&mut ws).await;
    assert_eq!(server.accepted(), 3);

    handle.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_while_reconnect_pending_opens_no_socket() {
    let mut server = TestServer::start().await;
    let (invalidator, _keys) = recorder();
    let handle = spawn(&server, config(&[400]), invalidator);

    let (_, ws) = server.next_socket().await;
    drop(ws);

    let mut status = handle.subscribe_status();
    timeout(
        TIMEOUT,
        status.wait_for(|s| s.state == ConnectionState::Disconnected && s.reconnect_attempt == 1),
    )
    .await
    .expect("timeout waiting for disconnect")
    .expect("status sender dropped");

    handle.shutdown().await;
    tokio::time::sleep(Duration::from_millis(800)).await;

    assert_eq!(server.accepted(), 1);
}

#[tokio::test]
async fn test_shutdown_closes_open_socket_without_reconnect() {
    let mut server = TestServer::start().await;
    let (invalidator, _keys) = recorder();
    let handle = spawn(&server, config(&[20]), invalidator);

    let (_, mut ws) = server.next_socket().await;
    next_text(&mut ws).await;
    wait_open(&handle).await;

    handle.shutdown().await;

    let closed = timeout(TIMEOUT, async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => continue,
            }
        }
    })
    .await;
    assert!(closed.is_ok());

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(server.accepted(), 1);
}

#[tokio::test]
async fn test_silent_socket_is_closed_after_pong_timeout() {
    let mut server = TestServer::start().await;
    let (invalidator, _keys) = recorder();
    let config = RealtimeConfig {
        reconnect_delays: vec![Duration::from_millis(20)],
        ping_interval: Duration::from_millis(50),
        pong_timeout: Duration::from_millis(50),
        connect_timeout: Duration::from_secs(5),
    };
    let handle = spawn(&server, config, invalidator);

    // Held open but never answered.
    let (_, _silent) = server.next_socket().await;

    let (_, mut ws) = server.next_socket().await;
    next_text(&mut ws).await;
    assert_eq!(server.accepted(), 2);

    handle.shutdown().await;
}

#[tokio::test]
async fn test_answered_pings_keep_socket_open() {
    let mut server = TestServer::start().await;
    let (invalidator, _keys) = recorder();
    let config = RealtimeConfig {
        reconnect_delays: vec![Duration::from_millis(20)],
        ping_interval: Duration::from_millis(50),
        pong_timeout: Duration::from_millis(100),
        connect_timeout: Duration::from_secs(5),
    };
    let handle = spawn(&server, config, invalidator);

    let (_, mut ws) = server.next_socket().await;
    let responder = tokio::spawn(async move {
        let mut pings = 0;
        while let Some(Ok(msg)) = ws.next().await {
            if let Message::Text(text) = msg {
                if text.as_str() == "ping" {
                    pings += 1;
                    if ws.send(Message::text("pong")).await.is_err() {
                        break;
                    }
                }
            }
        }
        pings
    });

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(handle.status().state, ConnectionState::Open);
    assert_eq!(server.accepted(), 1);

    handle.shutdown().await;
    let pings = timeout(TIMEOUT, responder).await.unwrap().unwrap();
    assert!(pings >= 3);
}

#[tokio::test]
async fn test_stops_when_no_token_is_available() {
    let server = TestServer::start().await;
    let (invalidator, _keys) = recorder();
    let handle = RealtimeManager::new(server.api.clone(), invalidator)
        .with_config(config(&[20]))
        .with_token_source(Arc::new(|| -> Option<AccessToken> { None }))
        .spawn();

    timeout(TIMEOUT, async {
        while !handle.is_finished() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("loop should stop without a token");

    assert_eq!(handle.status().state, ConnectionState::Disconnected);
    assert_eq!(server.accepted(), 0);
}

#[tokio::test]
async fn test_server_ping_is_answered_once() {
    let mut server = TestServer::start().await;
    let (invalidator, _keys) = recorder();
    let handle = spawn(&server, config(&[50]), invalidator);

    let (_, mut ws) = server.next_socket().await;
    next_text(&mut ws).await;
    wait_open(&handle).await;

    ws.send(Message::Ping(b"hb".to_vec().into())).await.unwrap();
    let reply = timeout(TIMEOUT, ws.next())
        .await
        .expect("timeout waiting for pong")
        .expect("stream closed")
        .expect("ws error");
    assert_eq!(reply, Message::Pong(b"hb".to_vec().into()));

    // The next frame is the close from shutdown, not a second pong.
    handle.shutdown().await;
    let next = timeout(TIMEOUT, ws.next())
        .await
        .expect("timeout waiting for close")
        .expect("stream closed")
        .expect("ws error");
    assert!(matches!(next, Message::Close(_)), "unexpected frame: {:?}", next);
}

#[tokio::test]
async fn test_stalled_handshake_times_out_and_retries() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let api = ApiUrl::new(format!("http://{}", listener.local_addr().unwrap())).unwrap();
    let accepted = Arc::new(AtomicUsize::new(0));

    // Accepts TCP but never answers the upgrade request.
    let counter = Arc::clone(&accepted);
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((tcp, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            held.push(tcp);
        }
    });

    let (invalidator, _keys) = recorder();
    let handle = RealtimeManager::new(api, invalidator)
        .with_config(RealtimeConfig {
            connect_timeout: Duration::from_millis(100),
            ..config(&[20])
        })
        .with_token_source(Arc::new(|| Some(AccessToken::new("test-token"))))
        .spawn();

    let mut status = handle.subscribe_status();
    timeout(TIMEOUT, status.wait_for(|s| s.reconnect_attempt >= 2))
        .await
        .expect("handshake never timed out")
        .expect("status sender dropped");
    assert!(accepted.load(Ordering::SeqCst) >= 2);
    assert_ne!(handle.status().state, ConnectionState::Open);

    handle.shutdown().await;
}

/// A local port with nothing listening on it.
async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

#[tokio::test(start_paused = true)]
async fn test_failed_connects_follow_backoff_table() {
    let port = closed_port().await;
    let api = ApiUrl::new(format!("http://127.0.0.1:{}", port)).unwrap();
    let (invalidator, _keys) = recorder();
    // A zero connect budget fails every attempt at the instant it starts,
    // so only the backoff sleeps move the paused clock.
    let handle = RealtimeManager::new(api, invalidator)
        .with_config(RealtimeConfig {
            connect_timeout: Duration::ZERO,
            ..RealtimeConfig::default()
        })
        .with_token_source(Arc::new(|| Some(AccessToken::new("test-token"))))
        .spawn();

    // Record when each failed attempt starts waiting.
    let mut status = handle.subscribe_status();
    let mut failures: Vec<(u32, tokio::time::Instant)> = Vec::new();
    while failures.len() < 7 {
        timeout(Duration::from_secs(60), status.changed())
            .await
            .expect("no status change")
            .expect("status sender dropped");
        let snapshot = status.borrow_and_update().clone();
        let is_new = failures
            .last()
            .is_none_or(|(attempt, _)| *attempt != snapshot.reconnect_attempt);
        if snapshot.state == ConnectionState::Disconnected
            && snapshot.reconnect_attempt > 0
            && is_new
        {
            failures.push((snapshot.reconnect_attempt, tokio::time::Instant::now()));
        }
    }

    let attempts: Vec<u32> = failures.iter().map(|(attempt, _)| *attempt).collect();
    assert_eq!(attempts, vec![1, 2, 3, 4, 5, 6, 7]);

    let gaps: Vec<u64> = failures
        .windows(2)
        .map(|pair| (pair[1].1 - pair[0].1).as_secs())
        .collect();
    assert_eq!(gaps, vec![1, 2, 4, 8, 15, 15]);

    handle.shutdown().await;
}
