//! Inbound frame classification.

use serde::Deserialize;

use crate::error::DecodeError;

/// Prefix of the frame sent once the server accepted the session.
pub const CONNECTED_TAG: &str = "CONNECTED:";
/// Prefix of the frame announcing the dialog and encoding of what follows.
pub const START_TAG: &str = "START:";
/// Prefix of the frame ending a result set.
pub const STOP_TAG: &str = "STOP:";
/// Prefix of a server-side error report.
pub const ERROR_TAG: &str = "ERROR:";

/// A frame received from the warehouse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundFrame<'a> {
    /// Session lifecycle or configuration information.
    Control(ControlFrame<'a>),
    /// Payload to persist, interpreted through the current decode context.
    Data(&'a str),
}

/// A control frame; each variant holds the text after its prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlFrame<'a> {
    Connected(&'a str),
    Start(&'a str),
    Stop(&'a str),
    Error(&'a str),
}

impl<'a> InboundFrame<'a> {
    /// Classify a raw frame by its prefix.
    pub fn classify(raw: &'a str) -> Self {
        if let Some(rest) = raw.strip_prefix(CONNECTED_TAG) {
            InboundFrame::Control(ControlFrame::Connected(rest))
        } else if let Some(rest) = raw.strip_prefix(START_TAG) {
            InboundFrame::Control(ControlFrame::Start(rest))
        } else if let Some(rest) = raw.strip_prefix(STOP_TAG) {
            InboundFrame::Control(ControlFrame::Stop(rest))
        } else if let Some(rest) = raw.strip_prefix(ERROR_TAG) {
            InboundFrame::Control(ControlFrame::Error(rest))
        } else {
            InboundFrame::Data(raw)
        }
    }

    /// True for control frames.
    pub fn is_control(&self) -> bool {
        matches!(self, InboundFrame::Control(_))
    }
}

impl ControlFrame<'_> {
    /// The prefix that identified this frame.
    pub fn tag(&self) -> &'static str {
        match self {
            ControlFrame::Connected(_) => CONNECTED_TAG,
            ControlFrame::Start(_) => START_TAG,
            ControlFrame::Stop(_) => STOP_TAG,
            ControlFrame::Error(_) => ERROR_TAG,
        }
    }
}

/// Body of a `START:` frame.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StartMessage {
    /// Dialog the following results belong to.
    #[serde(rename = "dialogID")]
    pub dialog_id: i64,
    /// Encoding of the following data frames (`full`, `hex`, `base64`).
    #[serde(rename = "resultEncoding")]
    pub result_encoding: String,
}

impl StartMessage {
    /// Parse the JSON body that follows `START:`.
    pub fn parse(body: &str) -> Result<Self, DecodeError> {
        serde_json::from_str(body).map_err(|e| DecodeError::MalformedStart {
            message: e.to_string(),
        })
    }
}
