//! # cfgsync
//!
//! Generation-consistent configuration subscriptions.
//!
//! A process that depends on several configs (say, an index layout and a
//! ranking profile) must never run with half of an update applied. `cfgsync`
//! tags every config update with a **generation** and only exposes a new set
//! of values once *every* subscribed config has reached the same generation.
//!
//! ## What You Get
//!
//! - **Typed handles** - [`ConfigHandle<T>`] decodes the committed value on demand
//! - **All-or-nothing commits** - [`ConfigSubscriber`] flips every subscription at once
//! - **Snapshots** - [`ConfigSnapshot`] bundles configs at one generation and can be persisted
//! - **Two-phase bootstrap** - [`ConfigRetriever`] fetches bootstrap configs, then component configs at the same generation
//! - **Background reconfiguration** - [`SimpleConfigurer`] applies snapshots on its own thread
//! - **Pluggable sources** - raw payloads, files, directories, in-memory sets, or your own [`SourceFactory`]
//! - **Rich diagnostics** - errors carry codes and help text via [`miette`]
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use cfgsync::{ConfigContext, ConfigSubscriber, ConfigType, SourceSpec};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(ConfigType, Serialize, Deserialize)]
//! #[config(name = "search")]
//! struct SearchConfig {
//!     threads: u32,
//! }
//!
//! #[derive(ConfigType, Serialize, Deserialize)]
//! #[config(name = "ranking")]
//! struct RankingConfig {
//!     profile: String,
//! }
//!
//! fn main() -> miette::Result<()> {
//!     let context = Arc::new(ConfigContext::new(SourceSpec::Dir("conf".into())));
//!     let subscriber = ConfigSubscriber::new(context);
//!
//!     let search = subscriber.subscribe::<SearchConfig>("default")?;
//!     let ranking = subscriber.subscribe::<RankingConfig>("default")?;
//!
//!     while subscriber.next_config(Duration::from_secs(60)) {
//!         // Both values belong to subscriber.generation().
//!         let search = search.get()?;
//!         let ranking = ranking.get()?;
//!         // ...
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Generations
//!
//! | Wait | Returns `true` when |
//! |------|---------------------|
//! | [`next_config`](ConfigSubscriber::next_config) | all configs agree on a newer generation **and** at least one payload changed |
//! | [`next_generation`](ConfigSubscriber::next_generation) | all configs agree on a newer generation |
//!
//! Both return `false` on timeout or after [`close`](ConfigSubscriber::close),
//! leaving the committed state untouched.
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `toml` *(default)* | TOML payload files |
//! | `yaml` *(default)* | YAML payload files |
//! | `watch` | Reload the context when files change |
//! | `async` | `tokio` wrappers around the blocking waits |

#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

// Lets `#[derive(ConfigType)]` expand to `::cfgsync::...` inside this crate too.
extern crate self as cfgsync;

pub use cfgsync_macro::ConfigType;

/// Re-export miette for error handling.
/// Users can use `cfgsync::miette` instead of adding miette as a dependency.
pub use miette;

// ============================================================================
// Core Types
// ============================================================================

mod error;
pub use error::Error;

mod key;
pub use key::{ConfigKey, ConfigKeySet};

mod value;
pub use value::{ConfigUpdate, ConfigValue};

mod config_type;
pub use config_type::{ConfigType, codec};

mod settings;
pub use settings::{
    NEXT_CONFIG_TIMEOUT_VAR, POLL_INTERVAL_VAR, SUBSCRIBE_TIMEOUT_VAR, SubscriberSettings,
};

// ============================================================================
// Delivery
// ============================================================================

mod holder;
pub use holder::ConfigHolder;

pub mod source;
pub use source::{Source, SourceFactory, SourceSpec};

mod subscription;
pub use subscription::{ConfigSubscription, SubscriptionPhase};

mod context;
pub use context::ConfigContext;

// ============================================================================
// Consumers
// ============================================================================

mod handle;
pub use handle::{ConfigHandle, GenericHandle};

mod subscriber;
pub use subscriber::ConfigSubscriber;

pub mod snapshot;
pub use snapshot::ConfigSnapshot;

mod retriever;
pub use retriever::{ConfigRetriever, SimpleConfigRetriever};

mod configurer;
pub use configurer::{ConfigureError, SimpleConfigurable, SimpleConfigurer};

// ============================================================================
// Hot Reload
// ============================================================================

#[cfg(feature = "watch")]
pub mod watch;

#[cfg(feature = "watch")]
pub use watch::{WatchBuilder, WatchError, WatchHandle};
