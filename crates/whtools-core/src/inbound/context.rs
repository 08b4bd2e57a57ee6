//! Decode context and the dialog tag table.

use std::collections::HashMap;
use std::fmt;

/// Tag used before any `START:` frame and whenever a dialog is unknown.
pub const DEFAULT_MESSAGE_KIND: &str = "msg";

/// Encoding of data frames announced by the last `START:` frame.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PayloadEncoding {
    /// Untouched text.
    #[default]
    Full,
    /// Hexadecimal text of a binary message.
    Hex,
    /// Base64 text of a binary message.
    Base64,
    /// Anything else the server announced.
    Other(String),
}

impl PayloadEncoding {
    /// Interpret a `resultEncoding` label, ignoring case.
    pub fn parse(label: &str) -> Self {
        match label.to_ascii_lowercase().as_str() {
            "full" => PayloadEncoding::Full,
            "hex" => PayloadEncoding::Hex,
            "base64" => PayloadEncoding::Base64,
            _ => PayloadEncoding::Other(label.to_string()),
        }
    }

    /// The label as it would appear in a `START:` frame.
    pub fn as_str(&self) -> &str {
        match self {
            PayloadEncoding::Full => "full",
            PayloadEncoding::Hex => "hex",
            PayloadEncoding::Base64 => "base64",
            PayloadEncoding::Other(label) => label,
        }
    }
}

impl fmt::Display for PayloadEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the processor currently believes about incoming data frames.
///
/// Only `START:` frames change it; it stays in effect until the next one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeContext {
    message_kind: String,
    payload_encoding: PayloadEncoding,
}

impl DecodeContext {
    /// The artifact tag for binary payloads.
    pub fn message_kind(&self) -> &str {
        &self.message_kind
    }

    /// The encoding of data frames.
    pub fn payload_encoding(&self) -> &PayloadEncoding {
        &self.payload_encoding
    }

    /// Back to `msg` / `full`.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub(crate) fn update(&mut self, message_kind: impl Into<String>, encoding: PayloadEncoding) {
        self.message_kind = message_kind.into();
        self.payload_encoding = encoding;
    }
}

impl Default for DecodeContext {
    fn default() -> Self {
        Self {
            message_kind: DEFAULT_MESSAGE_KIND.to_string(),
            payload_encoding: PayloadEncoding::Full,
        }
    }
}

/// Maps dialog identifiers to artifact tags.
#[derive(Debug, Clone)]
pub struct DialogTags {
    tags: HashMap<i64, String>,
    fallback: String,
}

impl DialogTags {
    /// Build a table from explicit entries; unknown ids map to `fallback`.
    pub fn new<I, T>(entries: I, fallback: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = (i64, T)>,
        T: Into<String>,
    {
        Self {
            tags: entries.into_iter().map(|(id, tag)| (id, tag.into())).collect(),
            fallback: fallback.into(),
        }
    }

    /// The warehouse's dialog table: all, vehicle situation data,
    /// advisory situation data and intersection situation data.
    pub fn standard() -> Self {
        Self::new(
            [(-1, "all"), (154, "vsd"), (156, "adv"), (162, "isd")],
            DEFAULT_MESSAGE_KIND,
        )
    }

    /// The tag registered for `dialog_id`, if any.
    pub fn get(&self, dialog_id: i64) -> Option<&str> {
        self.tags.get(&dialog_id).map(String::as_str)
    }

    /// The tag for `dialog_id`, or the fallback tag.
    pub fn tag_for(&self, dialog_id: i64) -> &str {
        self.get(dialog_id).unwrap_or(&self.fallback)
    }
}

impl Default for DialogTags {
    fn default() -> Self {
        Self::standard()
    }
}
