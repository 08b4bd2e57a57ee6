//! Response artifacts on disk.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::{debug, warn};

use whtools_core::ArtifactSink;

/// Timestamp embedded in artifact names.
const STAMP_FORMAT: &str = "%Y.%m.%d.%H.%M.%S%.3f";

/// Writes response artifacts into one directory.
///
/// Text responses are appended, one per line, to a file per kind named
/// `<kind>_<timestamp>_<millis>.txt`. The file is opened on first use and
/// flushed after every line.
///
/// Each binary response goes to its own file,
/// `<kind>_<timestamp>_<millis>_<n>.ber`, where `n` counts binary
/// artifacts written by this sink.
#[derive(Debug)]
pub struct FileArtifactSink {
    dir: PathBuf,
    text_files: HashMap<String, File>,
    binary_count: u64,
}

impl FileArtifactSink {
    /// Create a sink for `dir`, creating the directory if needed.
    pub fn create(dir: impl AsRef<Path>) -> io::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        debug!(dir = %dir.display(), "Response directory ready");

        Ok(Self {
            dir,
            text_files: HashMap::new(),
            binary_count: 0,
        })
    }

    /// The response directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Number of binary artifacts written so far.
    pub fn binary_count(&self) -> u64 {
        self.binary_count
    }

    fn text_file(&mut self, kind: &str) -> io::Result<&mut File> {
        if !self.text_files.contains_key(kind) {
            let path = self.dir.join(format!("{}_{}.txt", kind, stamp()));
            let file = OpenOptions::new().create(true).append(true).open(&path)?;
            debug!(path = %path.display(), "Opened text artifact");
            self.text_files.insert(kind.to_string(), file);
        }

        self.text_files
            .get_mut(kind)
            .ok_or_else(|| io::Error::other("text artifact missing after open"))
    }
}

impl ArtifactSink for FileArtifactSink {
    fn append_text(&mut self, kind: &str, text: &str) -> io::Result<()> {
        let file = self.text_file(kind)?;
        file.write_all(text.as_bytes())?;
        file.write_all(b"\n")?;
        file.flush()
    }

    fn write_binary(&mut self, kind: &str, bytes: &[u8]) -> io::Result<()> {
        let path = self
            .dir
            .join(format!("{}_{}_{}.ber", kind, stamp(), self.binary_count));
        self.binary_count += 1;

        fs::write(&path, bytes)?;
        debug!(path = %path.display(), len = bytes.len(), "Wrote binary artifact");
        Ok(())
    }

    fn finish(&mut self) -> io::Result<()> {
        let mut result = Ok(());
        for (_, mut file) in self.text_files.drain() {
            if let Err(e) = file.flush().and_then(|()| file.sync_all()) {
                result = Err(e);
            }
        }
        result
    }
}

impl Drop for FileArtifactSink {
    fn drop(&mut self) {
        if let Err(e) = self.finish() {
            warn!(error = %e, "Failed to release text artifacts");
        }
    }
}

/// `<local timestamp>_<epoch millis>`.
fn stamp() -> String {
    let now = Local::now();
    format!("{}_{}", now.format(STAMP_FORMAT), now.timestamp_millis())
}
