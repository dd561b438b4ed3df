//! The watcher thread.
//!
//! Owns the notify watcher, debounces its events and reloads the context.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, bounded, select};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use super::builder::ReloadCallback;
use super::error::WatchError;
use crate::ConfigContext;

const THREAD_NAME: &str = "cfgsync-watcher";

/// Commands sent to the watcher thread.
#[derive(Debug, Clone)]
pub enum WatchCommand {
    /// Reload now, without waiting for a file event.
    Reload,
    /// Stop the watcher.
    Stop,
}

/// What caused a reload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeTrigger {
    /// A watched file appeared.
    FileCreated(PathBuf),
    /// A watched file was written.
    FileModified(PathBuf),
    /// A watched file was removed.
    FileDeleted(PathBuf),
    /// [`WatchHandle::reload`](super::WatchHandle::reload) was called.
    ManualReload,
}

/// State shared between the handle and the thread.
#[derive(Debug)]
pub(crate) struct WatcherState {
    running: AtomicBool,
    reloads: AtomicU64,
}

impl WatcherState {
    fn new() -> Self {
        Self {
            running: AtomicBool::new(true),
            reloads: AtomicU64::new(0),
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub(crate) fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    pub(crate) fn reload_count(&self) -> u64 {
        self.reloads.load(Ordering::Acquire)
    }
}

/// Paths an event must touch to count.
///
/// Files match by path. Directories match any direct child, which is how
/// [`DirSource`](crate::source::DirSource) lays out its payloads.
#[derive(Debug, Default)]
struct WatchedPaths {
    files: HashSet<PathBuf>,
    dirs: HashSet<PathBuf>,
}

impl WatchedPaths {
    fn insert(&mut self, path: &Path) {
        let set = if path.is_dir() {
            &mut self.dirs
        } else {
            &mut self.files
        };

        // Keep the path as given so files created later still match.
        set.insert(path.to_path_buf());
        if let Ok(canonical) = path.canonicalize()
            && canonical != path
        {
            set.insert(canonical);
        }
    }

    fn matches(&self, path: &Path) -> bool {
        let hit = |p: &Path| {
            self.files.contains(p) || p.parent().is_some_and(|parent| self.dirs.contains(parent))
        };

        hit(path) || path.canonicalize().is_ok_and(|c| hit(&c))
    }
}

/// A running watcher thread and the channel that controls it.
pub(crate) struct Spawned {
    pub(crate) state: Arc<WatcherState>,
    pub(crate) command_tx: Sender<WatchCommand>,
    pub(crate) thread: JoinHandle<()>,
}

/// Starts watching `paths` and spawns the thread.
pub(crate) fn spawn(
    context: Arc<ConfigContext>,
    paths: &[PathBuf],
    debounce: Duration,
    on_reload: Option<ReloadCallback>,
) -> Result<Spawned, WatchError> {
    if paths.is_empty() {
        return Err(WatchError::NoPaths);
    }

    let (command_tx, command_rx) = bounded::<WatchCommand>(16);
    let (notify_tx, notify_rx) = bounded::<notify::Result<Event>>(100);
    let mut watcher = create_notify_watcher(notify_tx)?;

    let mut watched = WatchedPaths::default();
    for path in paths {
        watch_path(&mut watcher, path)?;
        watched.insert(path);
    }

    let state = Arc::new(WatcherState::new());
    let worker = Worker {
        state: state.clone(),
        context,
        on_reload,
        debounce,
        watched,
    };

    let thread = thread::Builder::new()
        .name(THREAD_NAME.to_string())
        .spawn(move || worker.run(&command_rx, &notify_rx, watcher))
        .map_err(|source| WatchError::Thread { source })?;

    tracing::debug!(paths = paths.len(), ?debounce, "watcher started");

    Ok(Spawned {
        state,
        command_tx,
        thread,
    })
}

fn create_notify_watcher(tx: Sender<notify::Result<Event>>) -> Result<RecommendedWatcher, WatchError> {
    notify::recommended_watcher(move |res| {
        let _ = tx.send(res);
    })
    .map_err(WatchError::from)
}

fn watch_path(watcher: &mut RecommendedWatcher, path: &Path) -> Result<(), WatchError> {
    // A missing file is watched through its parent so its creation is seen.
    let target = if path.exists() {
        path.to_path_buf()
    } else if let Some(parent) = path.parent().filter(|p| p.exists()) {
        parent.to_path_buf()
    } else {
        return Err(WatchError::unwatchable(
            path,
            "parent directory does not exist",
        ));
    };

    watcher
        .watch(&target, RecursiveMode::NonRecursive)
        .map_err(|e| WatchError::unwatchable(path, e.to_string()))
}

struct Worker {
    state: Arc<WatcherState>,
    context: Arc<ConfigContext>,
    on_reload: Option<ReloadCallback>,
    debounce: Duration,
    watched: WatchedPaths,
}

impl Worker {
    // The notify watcher is moved in so it lives as long as the loop.
    fn run(
        self,
        command_rx: &Receiver<WatchCommand>,
        notify_rx: &Receiver<notify::Result<Event>>,
        _watcher: RecommendedWatcher,
    ) {
        let mut pending: Option<ChangeTrigger> = None;
        let mut last_event = Instant::now();

        while self.state.is_running() {
            select! {
                recv(command_rx) -> cmd => {
                    match cmd {
                        Ok(WatchCommand::Reload) => self.reload(&ChangeTrigger::ManualReload),
                        Ok(WatchCommand::Stop) | Err(_) => {
                            self.state.stop();
                            break;
                        }
                    }
                }

                recv(notify_rx) -> event => {
                    match event {
                        Ok(Ok(event)) => {
                            if let Some(trigger) = self.classify(&event) {
                                pending = Some(trigger);
                                last_event = Instant::now();
                            }
                        }
                        Ok(Err(e)) => tracing::warn!(error = %e, "file watch error"),
                        Err(_) => {
                            self.state.stop();
                            break;
                        }
                    }
                }

                default(self.debounce) => {
                    if let Some(trigger) = pending.take() {
                        if last_event.elapsed() >= self.debounce {
                            self.reload(&trigger);
                        } else {
                            pending = Some(trigger);
                        }
                    }
                }
            }
        }

        tracing::debug!(reloads = self.state.reload_count(), "watcher stopped");
    }

    fn classify(&self, event: &Event) -> Option<ChangeTrigger> {
        let path = event.paths.iter().find(|p| self.watched.matches(p))?;

        match event.kind {
            EventKind::Create(_) => Some(ChangeTrigger::FileCreated(path.clone())),
            EventKind::Modify(_) => Some(ChangeTrigger::FileModified(path.clone())),
            EventKind::Remove(_) => Some(ChangeTrigger::FileDeleted(path.clone())),
            _ => None,
        }
    }

    fn reload(&self, trigger: &ChangeTrigger) {
        let generation = self.context.reload();
        self.state.reloads.fetch_add(1, Ordering::AcqRel);
        tracing::info!(generation, ?trigger, "config context reloaded");

        if let Some(callback) = &self.on_reload {
            callback(generation);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_watched_file_matches() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("app.json");
        fs::write(&file, "{}").unwrap();

        let mut watched = WatchedPaths::default();
        watched.insert(&file);

        assert!(watched.matches(&file));
        assert!(!watched.matches(&dir.path().join("other.json")));
    }

    #[test]
    fn test_watched_dir_matches_children() {
        let dir = tempdir().unwrap();

        let mut watched = WatchedPaths::default();
        watched.insert(dir.path());

        assert!(watched.matches(&dir.path().join("search.toml")));
        assert!(!watched.matches(&dir.path().join("nested").join("search.toml")));
    }

    #[test]
    fn test_missing_file_matches_once_created() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("late.yaml");

        let mut watched = WatchedPaths::default();
        watched.insert(&file);

        fs::write(&file, "a: 1").unwrap();
        assert!(watched.matches(&file));
    }
}
