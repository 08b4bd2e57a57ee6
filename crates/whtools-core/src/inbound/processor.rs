//! Inbound frame processor.

use std::io;

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use tracing::{debug, error, info, warn};

use crate::error::DecodeError;
use crate::protocol::{ControlFrame, InboundFrame, StartMessage};
use crate::traits::{ArtifactSink, SessionListener};
use crate::types::ServiceUrl;

use super::context::{DEFAULT_MESSAGE_KIND, DecodeContext, DialogTags, PayloadEncoding};

/// Standard alphabet; padding optional, line breaks removed beforehand.
const BASE64_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Switches controlling what the processor logs and persists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessorSettings {
    /// Persist data frames at all.
    pub write_to_disk: bool,
    /// Decode hex/base64 payloads into binary artifacts instead of keeping
    /// every frame as text.
    pub binary_files: bool,
    /// Echo every frame to the log.
    pub log_messages: bool,
}

/// What happened to one frame.
#[derive(Debug)]
pub enum FrameOutcome {
    /// A control frame; nothing persisted.
    Control,
    /// A data frame while persistence is off.
    NotPersisted,
    /// Appended to the text artifact for `kind`.
    AppendedText { kind: String },
    /// Written to a new binary artifact for `kind`.
    WroteBinary { kind: String, len: usize },
    /// Could not be decoded and was dropped.
    Dropped(DecodeError),
    /// Decoded, but the sink failed to store it.
    StorageFailed(io::Error),
}

/// Classifies, decodes and persists inbound frames.
///
/// Frames must be handed over one at a time in arrival order: a `START:`
/// frame changes how every following data frame is decoded.
///
/// # Example
///
/// ```
/// use whtools_core::ArtifactSink;
/// use whtools_core::inbound::{FrameOutcome, InboundProcessor, ProcessorSettings};
///
/// #[derive(Default)]
/// struct Lines(Vec<String>);
///
/// impl ArtifactSink for Lines {
///     fn append_text(&mut self, _kind: &str, text: &str) -> std::io::Result<()> {
///         self.0.push(text.to_string());
///         Ok(())
///     }
///     fn write_binary(&mut self, _kind: &str, _bytes: &[u8]) -> std::io::Result<()> {
///         Ok(())
///     }
/// }
///
/// let settings = ProcessorSettings { write_to_disk: true, ..Default::default() };
/// let mut processor = InboundProcessor::new(settings, Lines::default());
/// processor.handle("CONNECTED:");
/// assert!(matches!(processor.handle("hello"), FrameOutcome::AppendedText { .. }));
/// assert_eq!(processor.sink().0, vec!["hello".to_string()]);
/// ```
pub struct InboundProcessor<S> {
    settings: ProcessorSettings,
    tags: DialogTags,
    context: DecodeContext,
    sink: S,
}

impl<S: ArtifactSink> InboundProcessor<S> {
    /// Create a processor with the standard dialog table.
    pub fn new(settings: ProcessorSettings, sink: S) -> Self {
        Self {
            settings,
            tags: DialogTags::standard(),
            context: DecodeContext::default(),
            sink,
        }
    }

    /// Replace the dialog table.
    pub fn with_dialog_tags(mut self, tags: DialogTags) -> Self {
        self.tags = tags;
        self
    }

    /// The current decode context.
    pub fn context(&self) -> &DecodeContext {
        &self.context
    }

    /// The artifact sink.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Consume the processor, returning the sink.
    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Process one frame.
    ///
    /// Never fails: decode and storage problems are logged and reported in
    /// the returned outcome.
    pub fn handle(&mut self, raw: &str) -> FrameOutcome {
        if self.settings.log_messages {
            info!("{}", raw);
        }

        match InboundFrame::classify(raw) {
            InboundFrame::Control(frame) => {
                self.handle_control(frame);
                FrameOutcome::Control
            }
            InboundFrame::Data(_) if !self.settings.write_to_disk => FrameOutcome::NotPersisted,
            InboundFrame::Data(text) => self.handle_data(text),
        }
    }

    fn handle_control(&mut self, frame: ControlFrame<'_>) {
        match frame {
            ControlFrame::Start(body) => self.apply_start(body),
            ControlFrame::Error(text) => error!(message = %text, "Warehouse reported an error"),
            ControlFrame::Connected(_) | ControlFrame::Stop(_) => {
                debug!(tag = frame.tag(), "Control frame");
            }
        }
    }

    fn apply_start(&mut self, body: &str) {
        let start = match StartMessage::parse(body) {
            Ok(start) => start,
            Err(e) => {
                error!(error = %e, "Resetting decode context");
                self.context.reset();
                return;
            }
        };

        let kind = match self.tags.get(start.dialog_id) {
            Some(tag) => tag.to_string(),
            None => {
                warn!(
                    dialog_id = start.dialog_id,
                    "Unknown dialogID, using '{}' prefix", DEFAULT_MESSAGE_KIND
                );
                self.tags.tag_for(start.dialog_id).to_string()
            }
        };
        let encoding = PayloadEncoding::parse(&start.result_encoding);

        debug!(kind = %kind, encoding = %encoding, "Decode context updated");
        self.context.update(kind, encoding);
    }

    fn handle_data(&mut self, text: &str) -> FrameOutcome {
        if !self.settings.binary_files {
            return self.append_text(text);
        }

        let encoding = self.context.payload_encoding().clone();
        let bytes = match &encoding {
            PayloadEncoding::Full => return self.append_text(text),
            PayloadEncoding::Hex => {
                hex::decode(text.trim()).map_err(|e| DecodeError::InvalidHex {
                    message: e.to_string(),
                })
            }
            PayloadEncoding::Base64 => {
                let compact: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
                BASE64_LENIENT
                    .decode(compact)
                    .map_err(|e| DecodeError::InvalidBase64 {
                        message: e.to_string(),
                    })
            }
            PayloadEncoding::Other(label) => Err(DecodeError::UnsupportedEncoding {
                encoding: label.clone(),
            }),
        };

        let bytes = match bytes {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "Failed to decode bytes, not writing out file");
                return FrameOutcome::Dropped(e);
            }
        };

        let kind = self.context.message_kind().to_string();
        match self.sink.write_binary(&kind, &bytes) {
            Ok(()) => FrameOutcome::WroteBinary {
                kind,
                len: bytes.len(),
            },
            Err(e) => {
                error!(error = %e, "Failed to write binary artifact");
                FrameOutcome::StorageFailed(e)
            }
        }
    }

    fn append_text(&mut self, text: &str) -> FrameOutcome {
        match self.sink.append_text(DEFAULT_MESSAGE_KIND, text) {
            Ok(()) => FrameOutcome::AppendedText {
                kind: DEFAULT_MESSAGE_KIND.to_string(),
            },
            Err(e) => {
                error!(error = %e, "Failed to write received message to disk");
                FrameOutcome::StorageFailed(e)
            }
        }
    }
}

impl<S: ArtifactSink + 'static> SessionListener for InboundProcessor<S> {
    fn on_connect(&mut self, address: &ServiceUrl) {
        info!(url = %address, "Connection opened");
    }

    fn on_message(&mut self, text: &str) {
        debug!(len = text.len(), "Received message");
        self.handle(text);
    }

    fn on_close(&mut self, code: Option<u16>, reason: &str) {
        info!(?code, reason, "Connection closed");
        if let Err(e) = self.sink.finish() {
            warn!(error = %e, "Failed to release response files");
        }
    }

    fn on_error(&mut self, error: &str) {
        error!(error, "Session error");
    }
}
