//! Error types for the warehouse client.
//!
//! Each stage of the client has its own error enum so callers can decide
//! what is fatal: authentication and connection failures end the process,
//! send and decode failures are logged and the client keeps running.

use std::fmt;
use thiserror::Error;

/// The unified error type for warehouse client operations.
#[derive(Debug, Error)]
pub enum Error {
    /// CAS ticket exchange failed.
    #[error("authentication error: {0}")]
    Auth(#[from] AuthError),

    /// The warehouse session could not be established.
    #[error("connect error: {0}")]
    Connect(#[from] ConnectError),

    /// An outbound message was not delivered.
    #[error("send error: {0}")]
    Send(#[from] SendError),

    /// An inbound frame could not be decoded.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Input validation errors (URLs, encodings).
    #[error("invalid input: {0}")]
    InvalidInput(#[from] InvalidInputError),

    /// A watched directory could not be set up.
    #[error("watch error: {0}")]
    Watch(#[from] WatchError),
}

/// The step of the CAS exchange that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthStage {
    /// `POST` of username/password for a ticket-granting ticket.
    TicketGrantingTicket,
    /// `POST` of the ticket-granting ticket for a service ticket.
    ServiceTicket,
    /// `GET` of the warehouse with the service ticket.
    SessionRedeem,
}

impl fmt::Display for AuthStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AuthStage::TicketGrantingTicket => "getTicketGrantingTicket",
            AuthStage::ServiceTicket => "getServiceTicket",
            AuthStage::SessionRedeem => "getServiceCall",
        };
        f.write_str(name)
    }
}

/// A failed CAS login, tagged with the stage that failed.
#[derive(Debug, Error)]
#[error("CAS {stage} failed: {reason}")]
pub struct AuthError {
    /// Which of the three exchange steps failed.
    pub stage: AuthStage,
    /// What went wrong.
    pub reason: AuthFailure,
}

impl AuthError {
    /// Create a new authentication error.
    pub fn new(stage: AuthStage, reason: AuthFailure) -> Self {
        Self { stage, reason }
    }

    /// HTTP status observed by the failing step, if it got that far.
    pub fn status(&self) -> Option<u16> {
        match &self.reason {
            AuthFailure::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Reason for an [`AuthError`].
#[derive(Debug, Error)]
pub enum AuthFailure {
    /// The server answered with an unexpected status code.
    #[error("response code {status}, body: {body}")]
    Status { status: u16, body: String },

    /// A 201 response whose body did not reference a ticket.
    #[error("no ticket found in body: {body}")]
    TicketNotFound { body: String },

    /// The request never produced a response (DNS, TLS, connection).
    #[error("transport error: {message}")]
    Transport { message: String },
}

/// Failure to open the warehouse session.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// The upgrade request could not be built.
    #[error("invalid session request for {url}: {message}")]
    InvalidRequest { url: String, message: String },

    /// TCP, TLS or WebSocket handshake failure.
    #[error("handshake with {url} failed: {message}")]
    Handshake { url: String, message: String },

    /// Trust material could not be loaded.
    #[error("TLS setup failed: {message}")]
    Tls { message: String },

    /// `connect` was called on a channel that is not fresh.
    #[error("session channel cannot be reused (state: {state})")]
    AlreadyUsed { state: String },
}

/// An outbound message was not delivered.
#[derive(Debug, Error)]
pub enum SendError {
    /// The session is not open.
    #[error("session is not open")]
    NotOpen,

    /// Delivery was not acknowledged in time.
    #[error("message not sent within {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// The transport rejected the write.
    #[error("message failed to send: {message}")]
    Transport { message: String },
}

/// Problems decoding an inbound frame.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// A `START:` frame whose body is not the expected record.
    #[error("malformed START frame: {message}")]
    MalformedStart { message: String },

    /// Hex payload could not be converted to bytes.
    #[error("hex to byte conversion failed: {message}")]
    InvalidHex { message: String },

    /// Base64 payload could not be converted to bytes.
    #[error("base64 to byte conversion failed: {message}")]
    InvalidBase64 { message: String },

    /// The active result encoding is not one we can decode.
    #[error("unexpected resultEncoding of {encoding}")]
    UnsupportedEncoding { encoding: String },
}

/// Input validation errors.
#[derive(Debug, Error)]
pub enum InvalidInputError {
    /// Invalid warehouse or CAS URL.
    #[error("invalid URL '{value}': {reason}")]
    ServiceUrl { value: String, reason: String },

    /// Unknown deposit encoding.
    #[error("invalid encodeType '{value}': expected hex, base64 or ber")]
    DepositEncoding { value: String },
}

/// Failure to start watching a request or deposit directory.
#[derive(Debug, Error)]
pub enum WatchError {
    /// The directory did not exist and could not be created.
    #[error("failed to create {dir}: {source}")]
    CreateDir {
        dir: String,
        #[source]
        source: std::io::Error,
    },

    /// The platform file watcher could not be started or attached.
    #[error("failed to watch {dir}: {message}")]
    Watcher { dir: String, message: String },
}
