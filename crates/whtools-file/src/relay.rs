//! Relays from watched directories to the warehouse session.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use whtools_core::protocol::deposit_messages;
use whtools_core::{DepositEncoding, MessageSender};

use crate::watch::{DirectoryWatch, FileEvent};

/// Sends every created or changed request file as one frame, verbatim.
pub struct RequestRelay<S: ?Sized> {
    watch: DirectoryWatch,
    sender: Arc<S>,
}

impl<S: MessageSender + ?Sized> RequestRelay<S> {
    pub fn new(watch: DirectoryWatch, sender: Arc<S>) -> Self {
        Self { watch, sender }
    }

    /// Relay files until the watcher stops or `cancel` fires.
    ///
    /// Cancellation is only observed between files, so a send that has
    /// started is allowed to finish or time out.
    pub async fn run(mut self, cancel: CancellationToken) {
        info!(dir = %self.watch.dir().display(), "Watching for request files");

        while let Some(FileEvent { path, kind }) = next_file(&mut self.watch, &cancel).await {
            info!(path = %path.display(), ?kind, "Request file");
            self.send_file(&path).await;
        }

        debug!("Request relay stopped");
    }

    /// Send the content of `path`. Returns true if a frame was delivered.
    #[instrument(skip(self, path), fields(path = %path.display()))]
    pub async fn send_file(&self, path: &Path) -> bool {
        let request = match tokio::fs::read_to_string(path).await {
            Ok(request) => request,
            Err(e) => {
                error!(error = %e, "Error reading request file");
                return false;
            }
        };

        if request.trim().is_empty() {
            debug!("Skipping empty request file");
            return false;
        }

        debug!(request = %request, "Sending request");
        match self.sender.send(&request).await {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, "Request not sent");
                false
            }
        }
    }
}

/// How deposit files are turned into frames.
#[derive(Debug, Clone)]
pub struct DepositSettings {
    pub system_deposit_name: String,
    pub encoding: DepositEncoding,
    /// Pause after each deposit frame.
    pub delay: Duration,
}

/// Sends the messages in every created or changed deposit file.
pub struct DepositRelay<S: ?Sized> {
    watch: DirectoryWatch,
    sender: Arc<S>,
    settings: DepositSettings,
}

impl<S: MessageSender + ?Sized> DepositRelay<S> {
    pub fn new(watch: DirectoryWatch, sender: Arc<S>, settings: DepositSettings) -> Self {
        Self {
            watch,
            sender,
            settings,
        }
    }

    /// Relay files until the watcher stops or `cancel` fires.
    ///
    /// A cancelled relay finishes the frame it is sending and leaves the
    /// rest of that file unsent.
    pub async fn run(mut self, cancel: CancellationToken) {
        info!(dir = %self.watch.dir().display(), "Watching for files to deposit");

        while let Some(FileEvent { path, kind }) = next_file(&mut self.watch, &cancel).await {
            info!(path = %path.display(), ?kind, "Deposit file");
            self.deposit(&path, &cancel).await;
        }

        debug!("Deposit relay stopped");
    }

    /// Send every deposit frame built from `path`, pausing after each.
    ///
    /// Returns the number of frames delivered. A failed send is logged and
    /// the remaining frames are still attempted.
    pub async fn deposit_file(&self, path: &Path) -> usize {
        self.deposit(path, &CancellationToken::new()).await
    }

    #[instrument(skip(self, path, cancel), fields(path = %path.display(), encoding = %self.settings.encoding))]
    async fn deposit(&self, path: &Path, cancel: &CancellationToken) -> usize {
        let contents = match tokio::fs::read(path).await {
            Ok(contents) => contents,
            Err(e) => {
                error!(error = %e, "Error reading deposit file");
                return 0;
            }
        };

        if contents.is_empty() {
            debug!("Skipping empty deposit file");
            return 0;
        }

        let frames = deposit_messages(
            &self.settings.system_deposit_name,
            self.settings.encoding,
            &contents,
        );

        let mut delivered = 0;
        for frame in &frames {
            debug!(message = %frame, "Sending deposit message");
            match self.sender.send(frame).await {
                Ok(()) => delivered += 1,
                Err(e) => warn!(error = %e, "Deposit message not sent"),
            }

            tokio::select! {
                () = cancel.cancelled() => {
                    warn!(delivered, total = frames.len(), "Deposit interrupted by shutdown");
                    return delivered;
                }
                () = tokio::time::sleep(self.settings.delay) => {}
            }
        }

        info!(delivered, total = frames.len(), "Deposited file");
        delivered
    }
}

/// Next watched file, or `None` once the watcher stops or `cancel` fires.
async fn next_file(watch: &mut DirectoryWatch, cancel: &CancellationToken) -> Option<FileEvent> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => None,
        event = watch.next_event() => event,
    }
}
