//! Inbound response handling.
//!
//! The processor classifies each frame the session delivers, keeps the
//! decode context announced by `START:` frames, and hands decoded payloads
//! to an [`ArtifactSink`](crate::traits::ArtifactSink).

mod context;
mod processor;

pub use context::{DEFAULT_MESSAGE_KIND, DecodeContext, DialogTags, PayloadEncoding};
pub use processor::{FrameOutcome, InboundProcessor, ProcessorSettings};
