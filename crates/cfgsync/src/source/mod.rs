//! Config sources.
//!
//! A [`Source`] is the upstream end of one subscription: it fetches the
//! payload for a single [`ConfigKey`] and pushes it into that subscription's
//! [`ConfigHolder`]. Sources are created per key by a [`SourceFactory`].
//!
//! # Built-in Sources
//!
//! | Spec | Source | Serves |
//! |------|--------|--------|
//! | [`SourceSpec::Raw`] | [`RawSource`] | The same payload for every key |
//! | [`SourceSpec::File`] | [`FileSource`] | One file for every key |
//! | [`SourceSpec::Dir`] | [`DirSource`] | `<dir>/<def_name>.<ext>` per key |
//! | [`SourceSpec::Set`] | [`ConfigSetSource`] | An in-memory [`ConfigSet`] |
//!
//! # Custom Sources
//!
//! Any `Fn(Arc<ConfigHolder>, &ConfigKey) -> Box<dyn Source>` is a factory,
//! and [`UpdatePublisher`] takes care of generations and change flags:
//!
//! ```rust,ignore
//! struct StaticSource {
//!     publisher: UpdatePublisher,
//!     value: ConfigValue,
//! }
//!
//! impl Source for StaticSource {
//!     fn fetch(&mut self) -> Result<(), Error> {
//!         self.publisher.publish(self.value.clone());
//!         Ok(())
//!     }
//!     fn reload(&mut self, generation: i64) {
//!         self.publisher.set_generation(generation);
//!     }
//!     fn close(&mut self) {
//!         self.publisher.close();
//!     }
//! }
//! ```

mod file;
pub(crate) mod format;
mod raw;
mod set;

pub use file::{DirSource, FileSource};
pub use format::{PayloadError, PayloadFormat};
pub use raw::RawSource;
pub use set::{ConfigSet, ConfigSetSource};

use std::fmt::{self, Debug, Formatter};
use std::path::PathBuf;
use std::sync::Arc;

use crate::{ConfigHolder, ConfigKey, ConfigUpdate, ConfigValue, Error};

/// The upstream end of one subscription.
pub trait Source: Send {
    /// Fetches the current payload and pushes it into the holder.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Source`] if the payload cannot be read or parsed.
    fn fetch(&mut self) -> Result<(), Error>;

    /// Sets the generation that subsequent pushes are tagged with.
    fn reload(&mut self, generation: i64);

    /// Stops pushing updates.
    fn close(&mut self);
}

/// Creates one [`Source`] per subscribed key.
pub trait SourceFactory: Send + Sync {
    /// Creates the source for `key`, pushing into `holder`.
    fn create_source(&self, holder: Arc<ConfigHolder>, key: &ConfigKey) -> Box<dyn Source>;
}

impl<F> SourceFactory for F
where
    F: Fn(Arc<ConfigHolder>, &ConfigKey) -> Box<dyn Source> + Send + Sync,
{
    fn create_source(&self, holder: Arc<ConfigHolder>, key: &ConfigKey) -> Box<dyn Source> {
        self(holder, key)
    }
}

/// Describes where configs come from.
#[derive(Clone)]
pub enum SourceSpec {
    /// The same raw payload for every key.
    Raw(String),

    /// One file, format detected from its extension.
    File(PathBuf),

    /// A directory holding `<def_name>.{json,toml,yaml,yml}` files.
    Dir(PathBuf),

    /// An in-memory config set.
    Set(Arc<ConfigSet>),
}

impl SourceSpec {
    /// Builds the shareable factory for this source kind.
    #[must_use]
    pub fn create_factory(self) -> Arc<dyn SourceFactory> {
        Arc::new(self)
    }
}

impl SourceFactory for SourceSpec {
    fn create_source(&self, holder: Arc<ConfigHolder>, key: &ConfigKey) -> Box<dyn Source> {
        let publisher = UpdatePublisher::new(holder);

        match self {
            SourceSpec::Raw(payload) => Box::new(RawSource::new(publisher, payload)),
            SourceSpec::File(path) => Box::new(FileSource::new(publisher, key.clone(), path)),
            SourceSpec::Dir(dir) => Box::new(DirSource::new(publisher, key.clone(), dir)),
            SourceSpec::Set(set) => {
                Box::new(ConfigSetSource::new(publisher, key.clone(), set.clone()))
            }
        }
    }
}

impl Debug for SourceSpec {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            SourceSpec::Raw(payload) => f.debug_tuple("Raw").field(&payload.len()).finish(),
            SourceSpec::File(path) => f.debug_tuple("File").field(path).finish(),
            SourceSpec::Dir(dir) => f.debug_tuple("Dir").field(dir).finish(),
            SourceSpec::Set(set) => f.debug_tuple("Set").field(&set.keys().len()).finish(),
        }
    }
}

/// Pushes values into a holder, tagging each with the current generation and
/// whether its checksum differs from the previous push.
#[derive(Debug)]
pub struct UpdatePublisher {
    holder: Arc<ConfigHolder>,
    generation: i64,
    last_checksum: Option<String>,
    closed: bool,
}

impl UpdatePublisher {
    /// Creates a publisher at generation 0.
    #[must_use]
    pub const fn new(holder: Arc<ConfigHolder>) -> Self {
        Self {
            holder,
            generation: 0,
            last_checksum: None,
            closed: false,
        }
    }

    /// Sets the generation attached to later pushes.
    pub const fn set_generation(&mut self, generation: i64) {
        self.generation = generation;
    }

    /// The generation attached to pushes.
    #[must_use]
    pub const fn generation(&self) -> i64 {
        self.generation
    }

    /// Pushes `value`. Does nothing once closed.
    pub fn publish(&mut self, value: ConfigValue) {
        if self.closed {
            return;
        }

        let changed = self.last_checksum.as_deref() != Some(value.checksum());
        self.last_checksum = Some(value.checksum().to_string());

        tracing::trace!(generation = self.generation, changed, "publishing update");
        self.holder
            .handle(ConfigUpdate::new(value, changed, self.generation));
    }

    /// Stops all further pushes.
    pub const fn close(&mut self) {
        self.closed = true;
    }

    /// Returns `true` once closed.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }
}
