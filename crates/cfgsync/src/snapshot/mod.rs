//! Immutable, generation-tagged bundles of configs.
//!
//! A [`ConfigSnapshot`] holds one value per key, all taken at the same
//! generation. Snapshots are built from a subscriber's flipped subscriptions
//! (see [`ConfigSubscriber::snapshot`](crate::ConfigSubscriber::snapshot) and
//! the [retrievers](crate::ConfigRetriever)) or read back from storage.
//!
//! # Serialization
//!
//! ```rust,ignore
//! use cfgsync::snapshot::{FileSnapshotReader, FileSnapshotWriter};
//!
//! snapshot.serialize(&mut FileSnapshotWriter::new("configs.json"))?;
//! let restored = ConfigSnapshot::deserialize(&mut FileSnapshotReader::new("configs.json"))?;
//! assert_eq!(restored, snapshot);
//! ```

mod error;
mod format;
mod io;

pub use error::SnapshotError;
pub use format::FORMAT_VERSION;
pub use io::{
    FileSnapshotReader, FileSnapshotWriter, SnapshotReader, SnapshotWriter, TextSnapshotReader,
    TextSnapshotWriter,
};

use std::collections::BTreeMap;
use std::collections::btree_map;
use std::sync::Arc;

use crate::{ConfigKey, ConfigKeySet, ConfigSubscription, ConfigType, ConfigValue, Error};

/// An immutable set of configs at one generation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConfigSnapshot {
    generation: i64,
    configs: BTreeMap<ConfigKey, ConfigValue>,
}

impl ConfigSnapshot {
    /// Creates a snapshot from its parts.
    #[must_use]
    pub const fn new(generation: i64, configs: BTreeMap<ConfigKey, ConfigValue>) -> Self {
        Self {
            generation,
            configs,
        }
    }

    /// An empty snapshot at generation 0.
    #[must_use]
    pub const fn empty() -> Self {
        Self::new(0, BTreeMap::new())
    }

    /// Collects the current values of flipped subscriptions.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConfigured`] if a subscription was never flipped
    /// - [`Error::GenerationMismatch`] if one is not at `generation`
    pub fn from_subscriptions(
        subscriptions: &[Arc<ConfigSubscription>],
        generation: i64,
    ) -> Result<Self, Error> {
        let mut configs = BTreeMap::new();

        for subscription in subscriptions {
            let key = subscription.key();
            let value = subscription
                .current_value()
                .ok_or_else(|| Error::NotConfigured { key: key.clone() })?;

            let actual = subscription.generation();
            if actual != generation {
                return Err(Error::GenerationMismatch {
                    key: key.clone(),
                    expected: generation,
                    actual,
                });
            }

            configs.insert(key.clone(), value);
        }

        Ok(Self::new(generation, configs))
    }

    /// The generation every config in the snapshot belongs to.
    #[must_use]
    pub const fn generation(&self) -> i64 {
        self.generation
    }

    /// Number of configs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.configs.len()
    }

    /// Returns `true` if the snapshot holds no configs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    /// Returns `true` if the snapshot holds config type `T` for `config_id`.
    #[must_use]
    pub fn has_config<T: ConfigType>(&self, config_id: &str) -> bool {
        self.configs.contains_key(&ConfigKey::of::<T>(config_id))
    }

    /// Decodes config type `T` for `config_id`.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] naming the key if it is absent
    /// - [`Error::Decode`] if the payload does not match `T`
    pub fn get_config<T: ConfigType>(&self, config_id: &str) -> Result<T, Error> {
        T::decode(self.require(&ConfigKey::of::<T>(config_id))?)
    }

    /// Returns `true` if the snapshot is newer than `since_generation`.
    ///
    /// This is a generation comparison only; it does not look at payloads.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the snapshot has no such config.
    pub fn is_changed<T: ConfigType>(
        &self,
        config_id: &str,
        since_generation: i64,
    ) -> Result<bool, Error> {
        self.require(&ConfigKey::of::<T>(config_id))?;
        Ok(self.generation > since_generation)
    }

    /// The raw value stored for `key`.
    #[must_use]
    pub fn value(&self, key: &ConfigKey) -> Option<&ConfigValue> {
        self.configs.get(key)
    }

    /// The keys in the snapshot.
    #[must_use]
    pub fn keys(&self) -> ConfigKeySet {
        self.configs.keys().cloned().collect()
    }

    /// Iterates entries in key order.
    pub fn iter(&self) -> btree_map::Iter<'_, ConfigKey, ConfigValue> {
        self.configs.iter()
    }

    /// The configs whose keys are in `keys`, at the same generation.
    #[must_use]
    pub fn subset(&self, keys: &ConfigKeySet) -> Self {
        let configs = self
            .configs
            .iter()
            .filter(|(key, _)| keys.contains(key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Self::new(self.generation, configs)
    }

    /// Writes the snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Snapshot`] if the writer fails.
    pub fn serialize(&self, writer: &mut dyn SnapshotWriter) -> Result<(), Error> {
        writer.write(self).map_err(Error::from)
    }

    /// Reads a snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Snapshot`] if the reader fails or the document is
    /// invalid.
    pub fn deserialize(reader: &mut dyn SnapshotReader) -> Result<Self, Error> {
        reader.read().map_err(Error::from)
    }

    fn require(&self, key: &ConfigKey) -> Result<&ConfigValue, Error> {
        self.configs
            .get(key)
            .ok_or_else(|| Error::NotFound { key: key.clone() })
    }
}

impl<'a> IntoIterator for &'a ConfigSnapshot {
    type Item = (&'a ConfigKey, &'a ConfigValue);
    type IntoIter = btree_map::Iter<'a, ConfigKey, ConfigValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.configs.iter()
    }
}
