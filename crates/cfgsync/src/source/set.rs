//! In-memory config set.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::source::{Source, UpdatePublisher};
use crate::{ConfigKey, ConfigKeySet, ConfigType, ConfigValue, Error};

/// A thread-safe map from key to payload, served by [`ConfigSetSource`].
///
/// Changing the set does not notify subscribers on its own; call
/// [`ConfigContext::reload`](crate::ConfigContext::reload) to publish a new
/// generation.
///
/// # Example
///
/// ```rust,ignore
/// let set = Arc::new(ConfigSet::new());
/// set.add("search/0", &SearchConfig { threads: 4 })?;
///
/// let context = ConfigContext::new(SourceSpec::Set(set.clone()));
/// ```
#[derive(Debug, Default)]
pub struct ConfigSet {
    values: RwLock<BTreeMap<ConfigKey, ConfigValue>>,
}

impl ConfigSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Encodes `config` and stores it under the key of `T` for `config_id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encode`] if `config` cannot be encoded.
    pub fn add<T: ConfigType>(&self, config_id: impl Into<String>, config: &T) -> Result<(), Error> {
        let value = config.encode()?;
        self.set_value(ConfigKey::of::<T>(config_id), value);
        Ok(())
    }

    /// Stores a raw value, replacing any previous one.
    pub fn set_value(&self, key: ConfigKey, value: ConfigValue) {
        self.values.write().insert(key, value);
    }

    /// Removes a value.
    pub fn remove(&self, key: &ConfigKey) -> Option<ConfigValue> {
        self.values.write().remove(key)
    }

    /// The value stored for `key`.
    #[must_use]
    pub fn get(&self, key: &ConfigKey) -> Option<ConfigValue> {
        self.values.read().get(key).cloned()
    }

    /// Every key in the set.
    #[must_use]
    pub fn keys(&self) -> ConfigKeySet {
        self.values.read().keys().cloned().collect()
    }
}

/// Serves one key out of a [`ConfigSet`].
#[derive(Debug)]
pub struct ConfigSetSource {
    publisher: UpdatePublisher,
    key: ConfigKey,
    set: Arc<ConfigSet>,
}

impl ConfigSetSource {
    /// Creates a source serving `key` from `set`.
    #[must_use]
    pub const fn new(publisher: UpdatePublisher, key: ConfigKey, set: Arc<ConfigSet>) -> Self {
        Self {
            publisher,
            key,
            set,
        }
    }
}

impl Source for ConfigSetSource {
    fn fetch(&mut self) -> Result<(), Error> {
        if self.publisher.is_closed() {
            return Ok(());
        }

        let value = self
            .set
            .get(&self.key)
            .ok_or_else(|| Error::source_failed(&self.key, "not present in config set"))?;

        self.publisher.publish(value);
        Ok(())
    }

    fn reload(&mut self, generation: i64) {
        self.publisher.set_generation(generation);
    }

    fn close(&mut self) {
        self.publisher.close();
    }
}
