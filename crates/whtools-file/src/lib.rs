//! Filesystem side of the warehouse client.
//!
//! - [`FileArtifactSink`] stores decoded responses under a response
//!   directory.
//! - [`DirectoryWatch`] reports files created or changed in a directory.
//! - [`RequestRelay`] and [`DepositRelay`] turn those files into outbound
//!   frames.

mod relay;
mod sink;
mod watch;

pub use relay::{DepositRelay, DepositSettings, RequestRelay};
pub use sink::FileArtifactSink;
pub use watch::{DirectoryWatch, FileEvent, FileEventKind};
