//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use cfgsync::source::UpdatePublisher;
use cfgsync::{
    ConfigContext, ConfigHolder, ConfigKey, ConfigType, ConfigValue, Error, Source, SourceFactory,
    SubscriberSettings,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

// ============================================================================
// Config Types
// ============================================================================

#[derive(ConfigType, Serialize, Deserialize, Debug, Clone, PartialEq)]
#[config(name = "foo")]
pub struct Foo {
    pub value: String,
}

#[derive(ConfigType, Serialize, Deserialize, Debug, Clone, PartialEq)]
#[config(name = "bar")]
pub struct Bar {
    pub value: String,
}

pub fn foo(value: &str) -> Foo {
    Foo {
        value: value.to_string(),
    }
}

pub fn bar(value: &str) -> Bar {
    Bar {
        value: value.to_string(),
    }
}

pub fn settings() -> SubscriberSettings {
    SubscriberSettings::new()
        .with_subscribe_timeout(Duration::from_secs(5))
        .with_next_config_timeout(Duration::from_millis(200))
}

// ============================================================================
// Manual Source
// ============================================================================

/// A source whose updates are pushed by the test.
///
/// On its first fetch every source publishes the factory's initial payload
/// for its key; after that only [`ManualSourceFactory::push`] delivers
/// anything, at whatever generation the test chooses.
#[derive(Default)]
pub struct ManualSourceFactory {
    initial: Mutex<BTreeMap<ConfigKey, ConfigValue>>,
    publishers: Mutex<BTreeMap<ConfigKey, Arc<Mutex<UpdatePublisher>>>>,
}

impl ManualSourceFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Sets the payload sources for `T`/`config_id` publish on first fetch.
    pub fn initial<T: ConfigType>(&self, config_id: &str, config: &T) {
        let value = config.encode().unwrap();
        self.initial
            .lock()
            .insert(ConfigKey::of::<T>(config_id), value);
    }

    /// Pushes `config` to the subscription for `T`/`config_id`.
    pub fn push<T: ConfigType>(&self, config_id: &str, config: &T, generation: i64) {
        self.push_value(
            &ConfigKey::of::<T>(config_id),
            config.encode().unwrap(),
            generation,
        );
    }

    pub fn push_value(&self, key: &ConfigKey, value: ConfigValue, generation: i64) {
        let publisher = self
            .publishers
            .lock()
            .get(key)
            .cloned()
            .unwrap_or_else(|| panic!("no source created for {key}"));

        let mut publisher = publisher.lock();
        publisher.set_generation(generation);
        publisher.publish(value);
    }

    pub fn context(self: &Arc<Self>) -> Arc<ConfigContext> {
        Arc::new(ConfigContext::with_factory(self.clone(), settings()))
    }
}

impl SourceFactory for ManualSourceFactory {
    fn create_source(&self, holder: Arc<ConfigHolder>, key: &ConfigKey) -> Box<dyn Source> {
        let publisher = Arc::new(Mutex::new(UpdatePublisher::new(holder)));
        self.publishers
            .lock()
            .insert(key.clone(), publisher.clone());

        Box::new(ManualSource {
            key: key.clone(),
            initial: self.initial.lock().get(key).cloned(),
            fetched: false,
            publisher,
        })
    }
}

struct ManualSource {
    key: ConfigKey,
    initial: Option<ConfigValue>,
    fetched: bool,
    publisher: Arc<Mutex<UpdatePublisher>>,
}

impl Source for ManualSource {
    fn fetch(&mut self) -> Result<(), Error> {
        if self.fetched {
            return Ok(());
        }

        let value = self
            .initial
            .clone()
            .ok_or_else(|| Error::source_failed(&self.key, "no initial payload"))?;
        self.fetched = true;
        self.publisher.lock().publish(value);
        Ok(())
    }

    fn reload(&mut self, generation: i64) {
        self.publisher.lock().set_generation(generation);
    }

    fn close(&mut self) {
        self.publisher.lock().close();
    }
}
