//! whtools-net - CAS ticket exchange and the warehouse WebSocket session.

mod cas;
mod channel;
mod tls;

pub use cas::CasClient;
pub use channel::{SEND_TIMEOUT, SessionChannel, SessionState};
pub use tls::TlsSettings;
