//! The persistent warehouse session.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::COOKIE;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async_tls_with_config};
use tracing::{debug, error, info, instrument, trace, warn};

use whtools_core::error::{ConnectError, SendError};
use whtools_core::{MessageSender, ServiceUrl, SessionId, SessionListener};

use crate::tls::TlsSettings;

/// How long a send may wait for the transport before it is reported failed.
pub const SEND_TIMEOUT: Duration = Duration::from_secs(3);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWriter = SplitSink<WsStream, Message>;
type WsReader = SplitStream<WsStream>;

/// Lifecycle of a [`SessionChannel`].
///
/// `Unconnected → Connecting → Open → Closed`, or `Connecting → Closed` when
/// the handshake fails. There is no way back to `Open`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Unconnected,
    Connecting,
    Open,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Unconnected => "unconnected",
            SessionState::Connecting => "connecting",
            SessionState::Open => "open",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// One WebSocket connection to the warehouse.
///
/// Inbound frames go to the [`SessionListener`] given to
/// [`connect`](Self::connect), one at a time and in arrival order. Outbound
/// sends are serialized: a caller that arrives while another send is in
/// flight waits for it. The connection has no idle timeout.
///
/// A channel is used once. Reconnecting needs a new channel and a fresh
/// session id.
pub struct SessionChannel {
    address: ServiceUrl,
    tls: TlsSettings,
    send_timeout: Duration,
    state: Arc<watch::Sender<SessionState>>,
    writer: tokio::sync::Mutex<Option<WsWriter>>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl SessionChannel {
    /// Create an unconnected channel for a `ws://` or `wss://` address.
    pub fn new(address: ServiceUrl, tls: TlsSettings) -> Self {
        Self {
            address,
            tls,
            send_timeout: SEND_TIMEOUT,
            state: Arc::new(watch::Sender::new(SessionState::Unconnected)),
            writer: tokio::sync::Mutex::new(None),
            reader: Mutex::new(None),
        }
    }

    /// Override the bounded wait applied to each send.
    pub fn with_send_timeout(mut self, send_timeout: Duration) -> Self {
        self.send_timeout = send_timeout;
        self
    }

    /// The session address.
    pub fn address(&self) -> &ServiceUrl {
        &self.address
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Follow lifecycle changes, starting from the current state.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Resolves once the session has closed, from either side.
    pub async fn closed(&self) {
        let mut state = self.state.subscribe();
        let _ = state.wait_for(|s| *s == SessionState::Closed).await;
    }

    /// True while the session can carry sends.
    pub fn is_open(&self) -> bool {
        self.state() == SessionState::Open
    }

    /// Open the session, presenting `session` as the `JSESSIONID` cookie on
    /// the upgrade request.
    ///
    /// On success `listener.on_connect` has run and a background task
    /// delivers every inbound text frame to `listener.on_message`.
    ///
    /// # Errors
    ///
    /// Fails if the channel was already used, if the request cannot be
    /// built, or if the TCP, TLS or WebSocket handshake fails.
    #[instrument(skip(self, session, listener), fields(address = %self.address))]
    pub async fn connect(
        &self,
        session: &SessionId,
        mut listener: Box<dyn SessionListener>,
    ) -> Result<(), ConnectError> {
        self.begin_connect()?;

        let stream = match self.handshake(session).await {
            Ok(stream) => stream,
            Err(e) => {
                self.set_state(SessionState::Closed);
                return Err(e);
            }
        };

        let (writer, reader) = stream.split();
        *self.writer.lock().await = Some(writer);
        self.set_state(SessionState::Open);
        info!("Session open");

        listener.on_connect(&self.address);

        let state = Arc::clone(&self.state);
        let task = tokio::spawn(read_frames(reader, listener, state));
        *self.reader.lock().unwrap_or_else(PoisonError::into_inner) = Some(task);

        Ok(())
    }

    /// Send one text frame, waiting at most the send timeout.
    ///
    /// # Errors
    ///
    /// [`SendError::NotOpen`] before connect or after close,
    /// [`SendError::Timeout`] when the transport did not take the frame in
    /// time, [`SendError::Transport`] when the write failed. The message is
    /// not retried.
    pub async fn send(&self, text: &str) -> Result<(), SendError> {
        let mut writer = self.writer.lock().await;
        if !self.is_open() {
            return Err(SendError::NotOpen);
        }
        let Some(sink) = writer.as_mut() else {
            return Err(SendError::NotOpen);
        };

        let result = timeout(self.send_timeout, sink.send(Message::text(text.to_owned()))).await;
        match result {
            Ok(Ok(())) => {
                trace!(len = text.len(), "Sent frame");
                Ok(())
            }
            Ok(Err(e)) => {
                error!(error = %e, "Session write failed");
                writer.take();
                self.set_state(SessionState::Closed);
                Err(SendError::Transport {
                    message: e.to_string(),
                })
            }
            Err(_) => Err(SendError::Timeout {
                duration_ms: self.send_timeout.as_millis() as u64,
            }),
        }
    }

    /// Close the session.
    ///
    /// Waits for any in-flight send, sends a close frame and gives the
    /// reader a bounded time to see the server's reply. Closing twice, or
    /// closing a channel that never connected, does nothing.
    pub async fn close(&self) {
        let writer = self.writer.lock().await.take();

        if let Some(mut sink) = writer {
            match timeout(self.send_timeout, sink.close()).await {
                Ok(Ok(())) => debug!("Close frame sent"),
                Ok(Err(e)) => debug!(error = %e, "Close frame not sent"),
                Err(_) => warn!("Timed out sending close frame"),
            }
            self.set_state(SessionState::Closed);
            info!(address = %self.address, "Session closed");
        }

        let task = self
            .reader
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(mut task) = task {
            if timeout(self.send_timeout, &mut task).await.is_err() {
                debug!("Reader did not finish; aborting");
                task.abort();
            }
        }
    }

    fn begin_connect(&self) -> Result<(), ConnectError> {
        let mut used = None;
        self.state.send_if_modified(|state| {
            if *state != SessionState::Unconnected {
                used = Some(*state);
                return false;
            }
            *state = SessionState::Connecting;
            true
        });

        match used {
            Some(state) => Err(ConnectError::AlreadyUsed {
                state: state.to_string(),
            }),
            None => Ok(()),
        }
    }

    async fn handshake(&self, session: &SessionId) -> Result<WsStream, ConnectError> {
        let invalid = |message: String| ConnectError::InvalidRequest {
            url: self.address.to_string(),
            message,
        };

        let mut request = self
            .address
            .as_str()
            .into_client_request()
            .map_err(|e| invalid(e.to_string()))?;
        let cookie = HeaderValue::from_str(&session.cookie_header())
            .map_err(|e| invalid(e.to_string()))?;
        request.headers_mut().insert(COOKIE, cookie);

        let connector = self.tls.websocket_connector()?;
        debug!(custom_trust = self.tls.has_custom_trust(), "Starting handshake");

        let (stream, response) = connect_async_tls_with_config(request, None, false, connector)
            .await
            .map_err(|e| ConnectError::Handshake {
                url: self.address.to_string(),
                message: e.to_string(),
            })?;
        debug!(status = %response.status(), "Handshake complete");

        Ok(stream)
    }

    fn set_state(&self, next: SessionState) {
        self.state.send_replace(next);
    }
}

impl fmt::Debug for SessionChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionChannel")
            .field("address", &self.address)
            .field("state", &self.state())
            .field("send_timeout", &self.send_timeout)
            .finish()
    }
}

#[async_trait]
impl MessageSender for SessionChannel {
    async fn send(&self, text: &str) -> Result<(), SendError> {
        SessionChannel::send(self, text).await
    }
}

/// Deliver inbound frames to the listener until the session ends.
async fn read_frames(
    mut reader: WsReader,
    mut listener: Box<dyn SessionListener>,
    state: Arc<watch::Sender<SessionState>>,
) {
    let mark_closed = || {
        state.send_replace(SessionState::Closed);
    };

    while let Some(frame) = reader.next().await {
        match frame {
            Ok(Message::Text(text)) => listener.on_message(text.as_str()),
            Ok(Message::Binary(data)) => {
                warn!(len = data.len(), "Ignoring binary frame");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) | Ok(Message::Frame(_)) => {
                trace!("Control frame");
            }
            Ok(Message::Close(frame)) => {
                mark_closed();
                let (code, reason) = match &frame {
                    Some(frame) => (Some(u16::from(frame.code)), frame.reason.as_str()),
                    None => (None, ""),
                };
                info!(?code, reason, "Session close frame received");
                listener.on_close(code, reason);
                return;
            }
            Err(e) => {
                mark_closed();
                error!(error = %e, "Session transport error");
                listener.on_error(&e.to_string());
                return;
            }
        }
    }

    mark_closed();
    debug!("Session stream ended");
    listener.on_close(None, "");
}
