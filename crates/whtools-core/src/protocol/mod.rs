//! Warehouse wire protocol.
//!
//! Every message in both directions is a UTF-8 text frame. Inbound frames
//! are either control frames, recognised by a fixed prefix, or data frames
//! whose meaning depends on the most recent `START:` frame. Outbound frames
//! are either opaque requests or `DEPOSIT:` frames.

mod deposit;
mod frame;

pub use deposit::{DepositEncoding, DepositMessage, deposit_messages};
pub use frame::{
    CONNECTED_TAG, ControlFrame, ERROR_TAG, InboundFrame, START_TAG, STOP_TAG, StartMessage,
};
