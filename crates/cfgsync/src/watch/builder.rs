//! Builder for the file watcher.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use super::error::WatchError;
use super::handle::WatchHandle;
use super::watcher;
use crate::ConfigContext;

/// Callback invoked with the new context generation after each reload.
pub type ReloadCallback = Box<dyn Fn(i64) + Send + Sync + 'static>;

/// Builder for a [`WatchHandle`].
///
/// # Example
///
/// ```rust,ignore
/// let handle = WatchBuilder::new()
///     .watch_path("conf/search.toml")
///     .watch_paths(["conf/index.toml", "conf/ranking.toml"])
///     .debounce(Duration::from_millis(200))
///     .on_reload(|generation| println!("now at generation {generation}"))
///     .start(context)?;
/// ```
pub struct WatchBuilder {
    /// Files or directories to watch.
    paths: Vec<PathBuf>,

    /// Quiet period after the last event (default: 100ms).
    debounce: Duration,

    on_reload: Option<ReloadCallback>,
}

impl WatchBuilder {
    /// Default quiet period after the last file event.
    pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(100);

    /// Create a builder that watches nothing, with a 100ms debounce.
    #[must_use]
    pub fn new() -> Self {
        Self {
            paths: Vec::new(),
            debounce: Self::DEFAULT_DEBOUNCE,
            on_reload: None,
        }
    }

    /// Watch a file or a directory.
    ///
    /// A directory matches events on its direct children. A file that does
    /// not exist yet is watched through its parent directory.
    #[must_use]
    pub fn watch_path(mut self, path: impl AsRef<Path>) -> Self {
        self.paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Watch several files or directories.
    #[must_use]
    pub fn watch_paths<P: AsRef<Path>>(mut self, paths: impl IntoIterator<Item = P>) -> Self {
        self.paths
            .extend(paths.into_iter().map(|p| p.as_ref().to_path_buf()));
        self
    }

    /// Set the debounce duration.
    ///
    /// Editors often emit several events for one save. The reload happens
    /// once no relevant event has arrived for `duration`.
    #[must_use]
    pub const fn debounce(mut self, duration: Duration) -> Self {
        self.debounce = duration;
        self
    }

    /// Register a callback run on the watcher thread after every reload.
    #[must_use]
    pub fn on_reload<F>(mut self, callback: F) -> Self
    where
        F: Fn(i64) + Send + Sync + 'static,
    {
        self.on_reload = Some(Box::new(callback));
        self
    }

    /// Start watching and reload `context` on changes.
    ///
    /// # Errors
    ///
    /// - [`WatchError::NoPaths`] if nothing was added
    /// - [`WatchError::Unwatchable`] if a path cannot be watched
    /// - [`WatchError::Backend`] or [`WatchError::Thread`] if the watcher cannot start
    pub fn start(self, context: Arc<ConfigContext>) -> Result<WatchHandle, WatchError> {
        let spawned = watcher::spawn(context, &self.paths, self.debounce, self.on_reload)?;
        Ok(WatchHandle::new(spawned))
    }
}

impl Default for WatchBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for WatchBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchBuilder")
            .field("paths", &self.paths)
            .field("debounce", &self.debounce)
            .field("on_reload", &self.on_reload.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SourceSpec;

    #[test]
    fn test_builder_defaults() {
        let builder = WatchBuilder::new();
        assert!(builder.paths.is_empty());
        assert_eq!(builder.debounce, WatchBuilder::DEFAULT_DEBOUNCE);
        assert!(builder.on_reload.is_none());
    }

    #[test]
    fn test_builder_collects_paths() {
        let builder = WatchBuilder::new()
            .watch_path("a.toml")
            .watch_paths(["b.toml", "conf"])
            .debounce(Duration::from_millis(5))
            .on_reload(|_| {});

        assert_eq!(builder.paths.len(), 3);
        assert_eq!(builder.debounce, Duration::from_millis(5));
        assert!(format!("{builder:?}").contains("on_reload: true"));
    }

    #[test]
    fn test_start_without_paths_fails() {
        let context = Arc::new(ConfigContext::new(SourceSpec::Raw("{}".into())));
        let err = WatchBuilder::new().start(context).unwrap_err();
        assert!(matches!(err, WatchError::NoPaths));
    }
}
