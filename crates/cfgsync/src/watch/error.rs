use std::io;
use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Errors raised while starting or driving a [`WatchHandle`](super::WatchHandle).
#[derive(Debug, Error, Diagnostic)]
#[non_exhaustive]
pub enum WatchError {
    /// The platform file notification backend refused to start.
    #[error("file notification backend unavailable")]
    #[diagnostic(
        code(cfgsync::watch::backend),
        help("Check the inotify/kqueue limits of this host")
    )]
    Backend {
        /// The error reported by `notify`.
        #[source]
        source: notify::Error,
    },

    /// The background reload thread could not be spawned.
    #[error("failed to spawn the reload thread")]
    #[diagnostic(code(cfgsync::watch::thread))]
    Thread {
        /// The error reported by the OS.
        #[source]
        source: io::Error,
    },

    /// A path (or the directory that would hold it) cannot be watched.
    #[error("cannot watch '{path}': {reason}")]
    #[diagnostic(
        code(cfgsync::watch::unwatchable),
        help("A missing file is fine as long as its directory exists")
    )]
    Unwatchable {
        /// The path given to the builder.
        path: PathBuf,
        /// Why it was rejected.
        reason: String,
    },

    /// `start` was called without any path.
    #[error("no paths to watch")]
    #[diagnostic(
        code(cfgsync::watch::no_paths),
        help("Call `watch_path` at least once before `start`")
    )]
    NoPaths,

    /// The watcher was stopped; commands are no longer accepted.
    #[error("watcher is not running")]
    #[diagnostic(
        code(cfgsync::watch::not_running),
        help("Start a new watcher with `WatchBuilder::start`")
    )]
    NotRunning,

    /// The reload thread exited without being stopped.
    #[error("reload thread disconnected")]
    #[diagnostic(code(cfgsync::watch::disconnected))]
    Disconnected,
}

impl WatchError {
    pub(crate) fn unwatchable(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Unwatchable {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

impl From<notify::Error> for WatchError {
    fn from(source: notify::Error) -> Self {
        Self::Backend { source }
    }
}
