//! whtools-core - Core types, traits and wire protocol for the warehouse client.

pub mod credentials;
pub mod error;
pub mod inbound;
pub mod protocol;
pub mod tokens;
pub mod traits;
pub mod types;

pub use credentials::Credentials;
pub use error::Error;
pub use inbound::{DecodeContext, DialogTags, FrameOutcome, InboundProcessor, PayloadEncoding};
pub use protocol::{ControlFrame, DepositEncoding, InboundFrame};
pub use tokens::SessionId;
pub use traits::{ArtifactSink, MessageSender, SessionListener};
pub use types::ServiceUrl;

/// Result type alias using the crate's Error type.
pub type Result<T> = std::result::Result<T, Error>;
