use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::Sender;
use parking_lot::Mutex;

use super::error::WatchError;
use super::watcher::{Spawned, WatchCommand, WatcherState};

/// Controls a running watcher.
///
/// Dropping the handle stops the watcher and joins its thread.
pub struct WatchHandle {
    state: Arc<WatcherState>,
    command_tx: Sender<WatchCommand>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl WatchHandle {
    pub(crate) fn new(spawned: Spawned) -> Self {
        Self {
            state: spawned.state,
            command_tx: spawned.command_tx,
            thread: Mutex::new(Some(spawned.thread)),
        }
    }

    /// Reload the context now, without waiting for a file event.
    ///
    /// # Errors
    ///
    /// - [`WatchError::NotRunning`] if the watcher was stopped
    /// - [`WatchError::Disconnected`] if the thread has gone away
    pub fn reload(&self) -> Result<(), WatchError> {
        if !self.state.is_running() {
            return Err(WatchError::NotRunning);
        }
        self.command_tx
            .send(WatchCommand::Reload)
            .map_err(|_| WatchError::Disconnected)
    }

    /// Stop the watcher and wait for its thread. Idempotent.
    pub fn stop(&self) {
        self.state.stop();
        let _ = self.command_tx.try_send(WatchCommand::Stop);

        let Some(thread) = self.thread.lock().take() else {
            return;
        };
        // A reload callback that drops the handle must not join itself.
        if thread.thread().id() == thread::current().id() {
            return;
        }
        if thread.join().is_err() {
            tracing::error!("watcher thread panicked");
        }
    }

    /// Returns `true` until the watcher stops.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }

    /// Number of reloads performed so far.
    #[must_use]
    pub fn reload_count(&self) -> u64 {
        self.state.reload_count()
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchHandle")
            .field("running", &self.is_running())
            .field("reloads", &self.reload_count())
            .finish_non_exhaustive()
    }
}
