//! Core traits at the seams between the session, the processor and storage.

mod listener;
mod sender;
mod sink;

pub use listener::SessionListener;
pub use sender::MessageSender;
pub use sink::ArtifactSink;
