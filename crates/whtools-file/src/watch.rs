//! Directory watching.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, trace};

use whtools_core::Result;
use whtools_core::error::WatchError;

/// What happened to a watched file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileEventKind {
    Created,
    Changed,
}

/// A regular file that was created or changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEvent {
    pub path: PathBuf,
    pub kind: FileEventKind,
}

/// Watcher notification; `kind` is `None` for a removal.
struct RawEvent {
    path: PathBuf,
    kind: Option<FileEventKind>,
}

/// Watches one directory (not recursively) for new and changed files.
///
/// Filesystems usually report several events for one write. Events for a
/// file whose modification time and length are unchanged since the last
/// reported event are dropped, as are events for files that no longer
/// exist and for directories.
pub struct DirectoryWatch {
    dir: PathBuf,
    _watcher: RecommendedWatcher,
    rx: mpsc::Receiver<RawEvent>,
    seen: HashMap<PathBuf, (Option<SystemTime>, u64)>,
}

impl DirectoryWatch {
    /// Start watching `dir`, creating it if it does not exist.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();

        std::fs::create_dir_all(&dir).map_err(|source| WatchError::CreateDir {
            dir: dir.display().to_string(),
            source,
        })?;

        let watch_failed = |e: notify::Error| WatchError::Watcher {
            dir: dir.display().to_string(),
            message: e.to_string(),
        };

        let (tx, rx) = mpsc::channel::<RawEvent>(100);

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            let Ok(event) = res else {
                return;
            };

            let kind = match event.kind {
                EventKind::Create(_) => Some(FileEventKind::Created),
                EventKind::Modify(_) => Some(FileEventKind::Changed),
                EventKind::Remove(_) => None,
                _ => return,
            };

            for path in event.paths {
                let _ = tx.blocking_send(RawEvent { path, kind });
            }
        })
        .map_err(watch_failed)?;

        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(watch_failed)?;

        debug!(dir = %dir.display(), "Watching directory");

        Ok(Self {
            dir,
            _watcher: watcher,
            rx,
            seen: HashMap::new(),
        })
    }

    /// The watched directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Wait for the next file that was created or changed.
    ///
    /// Returns `None` once the watcher has stopped.
    pub async fn next_event(&mut self) -> Option<FileEvent> {
        while let Some(RawEvent { path, kind }) = self.rx.recv().await {
            let Some(kind) = kind else {
                self.seen.remove(&path);
                continue;
            };

            let Ok(meta) = tokio::fs::metadata(&path).await else {
                trace!(path = %path.display(), "File gone before it was read");
                self.seen.remove(&path);
                continue;
            };
            if !meta.is_file() {
                continue;
            }

            let fingerprint = (meta.modified().ok(), meta.len());
            if self.seen.get(&path) == Some(&fingerprint) {
                trace!(path = %path.display(), "Unchanged since last event");
                continue;
            }
            self.seen.insert(path.clone(), fingerprint);

            return Some(FileEvent { path, kind });
        }

        None
    }
}

impl std::fmt::Debug for DirectoryWatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryWatch")
            .field("dir", &self.dir)
            .finish_non_exhaustive()
    }
}
