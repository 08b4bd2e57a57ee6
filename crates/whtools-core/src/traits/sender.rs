//! Outbound message trait.

use async_trait::async_trait;

use crate::error::SendError;

/// Something that can deliver a text frame to the warehouse.
#[async_trait]
pub trait MessageSender: Send + Sync {
    /// Deliver one text frame, waiting until it is written or fails.
    async fn send(&self, text: &str) -> Result<(), SendError>;
}
