//! Session event listener trait.

use crate::types::ServiceUrl;

/// Receives the events of one warehouse session.
///
/// The session hands the listener to a single reader task, so every method
/// is called from one task at a time and in arrival order. Implementations
/// may therefore keep mutable state without locking.
pub trait SessionListener: Send + 'static {
    /// The upgrade handshake completed.
    fn on_connect(&mut self, address: &ServiceUrl) {
        let _ = address;
    }

    /// A text frame arrived.
    fn on_message(&mut self, text: &str);

    /// The session closed, either locally or by the server.
    fn on_close(&mut self, code: Option<u16>, reason: &str) {
        let _ = (code, reason);
    }

    /// The transport failed; the session is closed after this call.
    fn on_error(&mut self, error: &str) {
        let _ = error;
    }
}
