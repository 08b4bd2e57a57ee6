//! Artifact storage trait.

use std::io;

/// Persists decoded response payloads.
///
/// `kind` is the short tag (`msg`, `adv`, `vsd`, ...) that prefixes the
/// artifact name.
pub trait ArtifactSink: Send {
    /// Append one line of text to the shared text artifact for `kind`.
    fn append_text(&mut self, kind: &str, text: &str) -> io::Result<()>;

    /// Write `bytes` to a new binary artifact for `kind`.
    fn write_binary(&mut self, kind: &str, bytes: &[u8]) -> io::Result<()>;

    /// Flush and release any open handles.
    fn finish(&mut self) -> io::Result<()> {
        Ok(())
    }
}
