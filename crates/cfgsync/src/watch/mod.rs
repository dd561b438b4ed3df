//! Reloading the config context when source files change.
//!
//! A [`ConfigContext`](crate::ConfigContext) never looks at the filesystem on
//! its own: file and directory sources read their payload when the context
//! asks them to fetch. The watcher closes that loop by calling
//! [`ConfigContext::reload`](crate::ConfigContext::reload) whenever a watched
//! file is created, modified or removed.
//!
//! ```rust,ignore
//! use cfgsync::watch::WatchBuilder;
//!
//! let context = Arc::new(ConfigContext::new(SourceSpec::Dir("conf".into())));
//! let watcher = WatchBuilder::new()
//!     .watch_path("conf")
//!     .debounce(Duration::from_millis(200))
//!     .on_reload(|generation| tracing::info!(generation, "configs reloaded"))
//!     .start(context.clone())?;
//!
//! // Subscribers see the new payloads on their next wait.
//! // ...
//! watcher.stop();
//! ```
//!
//! # Architecture
//!
//! ```text
//!  notify ──► watcher thread ──(debounce)──► ConfigContext::reload()
//!                   ▲                                   │
//!   WatchHandle ────┘ reload / stop                     ▼
//!                                               on_reload(generation)
//! ```

mod builder;
mod error;
mod handle;
mod watcher;

pub use builder::{ReloadCallback, WatchBuilder};
pub use error::WatchError;
pub use handle::WatchHandle;
pub use watcher::{ChangeTrigger, WatchCommand};
