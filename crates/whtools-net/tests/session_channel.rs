//! Session channel tests against a local WebSocket server.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::header::COOKIE;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{WebSocketStream, accept_hdr_async};

use whtools_core::error::{ConnectError, SendError};
use whtools_core::{ServiceUrl, SessionId, SessionListener};
use whtools_net::{SessionChannel, SessionState, TlsSettings};

#[derive(Debug, PartialEq)]
enum Event {
    Connect,
    Message(String),
    Close(Option<u16>, String),
    Error,
}

struct RecordingListener {
    events: mpsc::UnboundedSender<Event>,
}

impl SessionListener for RecordingListener {
    fn on_connect(&mut self, _address: &ServiceUrl) {
        let _ = self.events.send(Event::Connect);
    }

    fn on_message(&mut self, text: &str) {
        let _ = self.events.send(Event::Message(text.to_string()));
    }

    fn on_close(&mut self, code: Option<u16>, reason: &str) {
        let _ = self.events.send(Event::Close(code, reason.to_string()));
    }

    fn on_error(&mut self, _error: &str) {
        let _ = self.events.send(Event::Error);
    }
}

fn listener() -> (Box<dyn SessionListener>, mpsc::UnboundedReceiver<Event>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Box::new(RecordingListener { events: tx }), rx)
}

async fn next_event(rx: &mut mpsc::UnboundedReceiver<Event>) -> Event {
    timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for session event")
        .expect("listener dropped")
}

/// Accept one WebSocket client and hand it to `handler` along with the
/// cookie header it presented.
async fn serve_once<F, Fut>(handler: F) -> ServiceUrl
where
    F: FnOnce(WebSocketStream<TcpStream>, Option<String>) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        let mut cookie = None;
        let ws = accept_hdr_async(tcp, |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
            cookie = req
                .headers()
                .get(COOKIE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            Ok(resp)
        })
        .await
        .unwrap();
        handler(ws, cookie).await;
    });

    ServiceUrl::new(format!("ws://{}/whtools/websocket", addr)).unwrap()
}

/// Read until the client goes away.
async fn drain(ws: &mut WebSocketStream<TcpStream>) {
    while let Some(Ok(_)) = ws.next().await {}
}

fn session() -> SessionId {
    SessionId::new("abc123")
}

#[tokio::test]
async fn test_presents_cookie_and_delivers_frames_in_order() {
    let (cookie_tx, cookie_rx) = oneshot::channel();
    let url = serve_once(|mut ws, cookie| async move {
        let _ = cookie_tx.send(cookie);
        for frame in [
            "CONNECTED: welcome",
            r#"START: {"dialogID":156,"resultEncoding":"hex"}"#,
            "0a0b",
            "0c0d",
            "STOP: done",
        ] {
            ws.send(Message::text(frame.to_string())).await.unwrap();
        }
        drain(&mut ws).await;
    })
    .await;

    let channel = SessionChannel::new(url, TlsSettings::system_default());
    let (listener, mut events) = listener();
    channel.connect(&session(), listener).await.unwrap();
    assert_eq!(channel.state(), SessionState::Open);

    assert_eq!(cookie_rx.await.unwrap().as_deref(), Some("JSESSIONID=abc123"));
    assert_eq!(next_event(&mut events).await, Event::Connect);

    let mut received = Vec::new();
    for _ in 0..5 {
        match next_event(&mut events).await {
            Event::Message(text) => received.push(text),
            other => panic!("unexpected event {:?}", other),
        }
    }
    assert_eq!(
        received,
        vec![
            "CONNECTED: welcome",
            r#"START: {"dialogID":156,"resultEncoding":"hex"}"#,
            "0a0b",
            "0c0d",
            "STOP: done",
        ]
    );

    channel.close().await;
    assert_eq!(channel.state(), SessionState::Closed);
}

#[tokio::test]
async fn test_concurrent_sends_arrive_whole() {
    let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
    let url = serve_once(|mut ws, _| async move {
        while let Some(Ok(msg)) = ws.next().await {
            if let Message::Text(text) = msg {
                let _ = seen_tx.send(text.as_str().to_string());
            }
        }
    })
    .await;

    let channel = Arc::new(SessionChannel::new(url, TlsSettings::system_default()));
    let (listener, _events) = listener();
    channel.connect(&session(), listener).await.unwrap();

    let mut tasks = Vec::new();
    for i in 0..16 {
        let channel = Arc::clone(&channel);
        tasks.push(tokio::spawn(async move {
            let body = format!("{:02}:{}", i, "x".repeat(8 * 1024));
            channel.send(&body).await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let mut seen = Vec::new();
    for _ in 0..16 {
        let text = timeout(Duration::from_secs(5), seen_rx.recv())
            .await
            .unwrap()
            .unwrap();
        seen.push(text);
    }
    seen.sort();

    for (i, text) in seen.iter().enumerate() {
        assert_eq!(text, &format!("{:02}:{}", i, "x".repeat(8 * 1024)));
    }

    channel.close().await;
}

#[tokio::test]
async fn test_send_before_connect_is_not_open() {
    let url = ServiceUrl::new("ws://127.0.0.1:9/whtools/websocket").unwrap();
    let channel = SessionChannel::new(url, TlsSettings::system_default());

    let err = channel.send("hello").await.unwrap_err();
    assert!(matches!(err, SendError::NotOpen));
}

#[tokio::test]
async fn test_close_before_connect_is_a_no_op() {
    let url = ServiceUrl::new("ws://127.0.0.1:9/whtools/websocket").unwrap();
    let channel = SessionChannel::new(url, TlsSettings::system_default());

    channel.close().await;
    channel.close().await;
    assert_eq!(channel.state(), SessionState::Unconnected);
}

#[tokio::test]
async fn test_close_twice_and_send_after_close() {
    let (closed_tx, closed_rx) = oneshot::channel();
    let url = serve_once(|mut ws, _| async move {
        let mut saw_close = false;
        while let Some(Ok(msg)) = ws.next().await {
            if msg.is_close() {
                saw_close = true;
            }
        }
        let _ = closed_tx.send(saw_close);
    })
    .await;

    let channel = SessionChannel::new(url, TlsSettings::system_default());
    let (listener, mut events) = listener();
    channel.connect(&session(), listener).await.unwrap();
    assert_eq!(next_event(&mut events).await, Event::Connect);

    channel.close().await;
    channel.close().await;

    assert_eq!(channel.state(), SessionState::Closed);
    assert!(closed_rx.await.unwrap());
    assert!(matches!(
        channel.send("late").await.unwrap_err(),
        SendError::NotOpen
    ));
}

#[tokio::test]
async fn test_remote_close_ends_session() {
    let url = serve_once(|mut ws, _| async move {
        ws.close(Some(CloseFrame {
            code: CloseCode::Normal,
            reason: "bye".to_string().into(),
        }))
        .await
        .unwrap();
        drain(&mut ws).await;
    })
    .await;

    let channel = SessionChannel::new(url, TlsSettings::system_default());
    let (listener, mut events) = listener();
    channel.connect(&session(), listener).await.unwrap();

    assert_eq!(next_event(&mut events).await, Event::Connect);
    assert_eq!(
        next_event(&mut events).await,
        Event::Close(Some(1000), "bye".to_string())
    );
    assert_eq!(channel.state(), SessionState::Closed);
    assert!(matches!(
        channel.send("after").await.unwrap_err(),
        SendError::NotOpen
    ));

    channel.close().await;
}

#[tokio::test]
async fn test_closed_resolves_on_remote_close() {
    let (release_tx, release_rx) = oneshot::channel::<()>();
    let url = serve_once(|mut ws, _| async move {
        let _ = release_rx.await;
        ws.close(None).await.unwrap();
        drain(&mut ws).await;
    })
    .await;

    let channel = SessionChannel::new(url, TlsSettings::system_default());
    let mut states = channel.subscribe();
    assert_eq!(*states.borrow_and_update(), SessionState::Unconnected);

    let (listener, _events) = listener();
    channel.connect(&session(), listener).await.unwrap();
    assert_eq!(*states.borrow_and_update(), SessionState::Open);

    let waiting = timeout(Duration::from_millis(200), channel.closed()).await;
    assert!(waiting.is_err(), "closed() resolved while the session was open");

    release_tx.send(()).unwrap();
    timeout(Duration::from_secs(5), channel.closed())
        .await
        .expect("closed() did not resolve after the remote close");
    assert_eq!(*states.borrow_and_update(), SessionState::Closed);

    channel.close().await;
}

#[tokio::test]
async fn test_handshake_failure_closes_channel() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let url = ServiceUrl::new(format!("ws://127.0.0.1:{}/whtools/websocket", port)).unwrap();
    let channel = SessionChannel::new(url, TlsSettings::system_default());

    let (first, mut events) = listener();
    let err = channel.connect(&session(), first).await.unwrap_err();
    assert!(matches!(err, ConnectError::Handshake { .. }));
    assert_eq!(channel.state(), SessionState::Closed);
    assert!(events.try_recv().is_err());

    let (second, _) = listener();
    let err = channel.connect(&session(), second).await.unwrap_err();
    assert!(matches!(err, ConnectError::AlreadyUsed { .. }));
}

#[tokio::test]
async fn test_connect_twice_is_rejected() {
    let url = serve_once(|mut ws, _| async move { drain(&mut ws).await }).await;

    let channel = SessionChannel::new(url, TlsSettings::system_default());
    let (first, _events) = listener();
    channel.connect(&session(), first).await.unwrap();

    let (second, _) = listener();
    let err = channel.connect(&session(), second).await.unwrap_err();
    assert!(matches!(err, ConnectError::AlreadyUsed { .. }));
    assert_eq!(channel.state(), SessionState::Open);

    channel.close().await;
}

#[tokio::test]
async fn test_send_times_out_when_peer_stops_reading() {
    let (release_tx, release_rx) = oneshot::channel::<()>();
    let url = serve_once(|ws, _| async move {
        // Hold the connection open without reading from it.
        let _ws = ws;
        let _ = release_rx.await;
    })
    .await;

    let channel = SessionChannel::new(url, TlsSettings::system_default())
        .with_send_timeout(Duration::from_millis(200));
    let (listener, _events) = listener();
    channel.connect(&session(), listener).await.unwrap();

    let chunk = "x".repeat(1024 * 1024);
    let mut outcome = None;
    for _ in 0..256 {
        if let Err(e) = channel.send(&chunk).await {
            outcome = Some(e);
            break;
        }
    }

    match outcome {
        Some(SendError::Timeout { duration_ms }) => assert_eq!(duration_ms, 200),
        other => panic!("expected a send timeout, got {:?}", other),
    }

    let _ = release_tx.send(());
    channel.close().await;
}
