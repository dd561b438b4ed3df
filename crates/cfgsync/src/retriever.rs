//! Whole-snapshot retrieval.
//!
//! The retrievers wrap [`ConfigSubscriber`]s and hand out complete
//! [`ConfigSnapshot`]s instead of per-key handles.
//!
//! [`ConfigRetriever`] supports the two-phase bootstrap used by components
//! whose config ids are only known at runtime:
//!
//! 1. [`get_bootstrap_configs`](ConfigRetriever::get_bootstrap_configs)
//!    fetches a fixed root key set.
//! 2. [`get_configs`](ConfigRetriever::get_configs) fetches the keys
//!    discovered in it, at the *same* generation.
//!
//! If the component configs have already moved past the bootstrap generation,
//! phase 2 returns an empty snapshot and phase 1 has to run again.
//!
//! ```rust,ignore
//! let retriever = ConfigRetriever::new(context, bootstrap_keys)?;
//! loop {
//!     let bootstrap = retriever.get_bootstrap_configs(timeout)?;
//!     if bootstrap.is_empty() {
//!         continue;
//!     }
//!     let keys = component_keys(&bootstrap)?;
//!     let components = retriever.get_configs(&keys, timeout)?;
//!     if !components.is_empty() {
//!         apply(&bootstrap, &components);
//!     }
//! }
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::settings::deadline_after;
use crate::{ConfigContext, ConfigKeySet, ConfigSnapshot, ConfigSubscriber, Error};

/// Two-phase snapshot retriever.
pub struct ConfigRetriever {
    context: Arc<ConfigContext>,
    bootstrap_keys: ConfigKeySet,
    bootstrap: ConfigSubscriber,
    component: Mutex<Option<(ConfigKeySet, Arc<ConfigSubscriber>)>>,
    bootstrap_required: AtomicBool,
    generation: AtomicI64,
    closed: AtomicBool,
}

impl ConfigRetriever {
    /// Creates a retriever and subscribes to the bootstrap keys.
    ///
    /// # Errors
    ///
    /// - [`Error::EmptyKeySet`] if `bootstrap_keys` is empty
    /// - any [`ConfigSubscriber::subscribe_key`] error
    pub fn new(context: Arc<ConfigContext>, bootstrap_keys: ConfigKeySet) -> Result<Self, Error> {
        let bootstrap = subscribe_all(&context, &bootstrap_keys)?;

        Ok(Self {
            context,
            bootstrap_keys,
            bootstrap,
            component: Mutex::new(None),
            bootstrap_required: AtomicBool::new(true),
            generation: AtomicI64::new(0),
            closed: AtomicBool::new(false),
        })
    }

    /// The bootstrap key set.
    #[must_use]
    pub const fn bootstrap_keys(&self) -> &ConfigKeySet {
        &self.bootstrap_keys
    }

    /// Waits up to `timeout` for a bootstrap snapshot at a newer generation.
    ///
    /// Every generation is delivered, including those where no bootstrap
    /// config changed, so [`get_configs`](Self::get_configs) can follow
    /// component-only updates. Returns an empty snapshot on timeout or close.
    ///
    /// # Errors
    ///
    /// Returns [`Error::GenerationMismatch`] if the committed values cannot be
    /// collected at one generation.
    pub fn get_bootstrap_configs(&self, timeout: Duration) -> Result<ConfigSnapshot, Error> {
        if self.is_closed() {
            return Ok(ConfigSnapshot::empty());
        }

        if !self.bootstrap.next_generation(timeout) {
            return Ok(ConfigSnapshot::empty());
        }

        let snapshot = or_empty_when_closed(self.bootstrap.snapshot())?;
        if !snapshot.is_empty() {
            self.generation.store(snapshot.generation(), Ordering::Release);
            self.bootstrap_required.store(false, Ordering::Release);
            tracing::debug!(generation = snapshot.generation(), "bootstrap configs retrieved");
        }

        Ok(snapshot)
    }

    /// Waits up to `timeout` for `keys` at the bootstrap generation.
    ///
    /// Returns an empty snapshot on timeout or close, and when the component
    /// configs are already newer than the bootstrap (then
    /// [`bootstrap_required`](Self::bootstrap_required) becomes `true`).
    ///
    /// # Errors
    ///
    /// - [`Error::EmptyKeySet`] if `keys` is empty
    /// - [`Error::BootstrapRequired`] before a bootstrap snapshot
    /// - any [`ConfigSubscriber::subscribe_key`] error for new keys
    pub fn get_configs(
        &self,
        keys: &ConfigKeySet,
        timeout: Duration,
    ) -> Result<ConfigSnapshot, Error> {
        if self.is_closed() {
            return Ok(ConfigSnapshot::empty());
        }
        if keys.is_empty() {
            return Err(Error::EmptyKeySet);
        }
        if self.bootstrap_required() {
            return Err(Error::BootstrapRequired);
        }

        let subscriber = match self.component_subscriber(keys) {
            Err(Error::Closed) => return Ok(ConfigSnapshot::empty()),
            other => other?,
        };

        let target = self.generation();
        let deadline = deadline_after(timeout);

        loop {
            let current = subscriber.generation();

            if current == target {
                return or_empty_when_closed(subscriber.snapshot());
            }
            if current > target {
                tracing::debug!(
                    bootstrap = target,
                    component = current,
                    "component configs are ahead of bootstrap"
                );
                self.bootstrap_required.store(true, Ordering::Release);
                return Ok(ConfigSnapshot::empty());
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if !subscriber.next_generation(remaining) {
                return Ok(ConfigSnapshot::empty());
            }
        }
    }

    fn component_subscriber(&self, keys: &ConfigKeySet) -> Result<Arc<ConfigSubscriber>, Error> {
        let mut component = self.component.lock();

        if let Some((current_keys, subscriber)) = component.as_ref()
            && current_keys == keys
        {
            return Ok(subscriber.clone());
        }

        if let Some((_, previous)) = component.take() {
            previous.close();
        }

        let subscriber = Arc::new(ConfigSubscriber::new(self.context.clone()));
        *component = Some((keys.clone(), subscriber.clone()));
        drop(component);

        if self.is_closed() {
            subscriber.close();
            return Err(Error::Closed);
        }

        // Subscribed unlocked so close() can reach the subscriber meanwhile.
        for key in keys {
            if let Err(e) = subscriber.subscribe_key(key.clone()) {
                subscriber.close();
                self.forget_component(&subscriber);
                return Err(e);
            }
        }

        tracing::debug!(keys = keys.len(), "component subscriber created");
        Ok(subscriber)
    }

    fn forget_component(&self, subscriber: &Arc<ConfigSubscriber>) {
        let mut component = self.component.lock();
        if component
            .as_ref()
            .is_some_and(|(_, current)| Arc::ptr_eq(current, subscriber))
        {
            *component = None;
        }
    }

    /// Generation of the last bootstrap snapshot; 0 before the first.
    #[must_use]
    pub fn generation(&self) -> i64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Returns `true` if [`get_configs`](Self::get_configs) needs a fresh
    /// bootstrap snapshot first.
    #[must_use]
    pub fn bootstrap_required(&self) -> bool {
        self.bootstrap_required.load(Ordering::Acquire)
    }

    /// Closes both subscribers; blocked calls return empty snapshots.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        self.bootstrap.close();
        if let Some((_, subscriber)) = self.component.lock().take() {
            subscriber.close();
        }
    }

    /// Returns `true` once closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl Drop for ConfigRetriever {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for ConfigRetriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigRetriever")
            .field("bootstrap_keys", &self.bootstrap_keys.len())
            .field("generation", &self.generation())
            .field("bootstrap_required", &self.bootstrap_required())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

/// Retriever for a single, fixed key set.
#[derive(Debug)]
pub struct SimpleConfigRetriever {
    keys: ConfigKeySet,
    subscriber: ConfigSubscriber,
}

impl SimpleConfigRetriever {
    /// Creates a retriever and subscribes to `keys`.
    ///
    /// # Errors
    ///
    /// - [`Error::EmptyKeySet`] if `keys` is empty
    /// - any [`ConfigSubscriber::subscribe_key`] error
    pub fn new(context: Arc<ConfigContext>, keys: ConfigKeySet) -> Result<Self, Error> {
        let subscriber = subscribe_all(&context, &keys)?;
        Ok(Self { keys, subscriber })
    }

    /// The subscribed keys.
    #[must_use]
    pub const fn keys(&self) -> &ConfigKeySet {
        &self.keys
    }

    /// Per-call wait used by [`SimpleConfigurer`](crate::SimpleConfigurer).
    #[must_use]
    pub fn next_config_timeout(&self) -> Duration {
        self.subscriber.context().settings().next_config_timeout()
    }

    /// Waits up to `timeout` for a snapshot with at least one changed config.
    ///
    /// Returns an empty snapshot on timeout or close.
    pub fn get_configs(&self, timeout: Duration) -> ConfigSnapshot {
        if !self.subscriber.next_config(timeout) {
            return ConfigSnapshot::empty();
        }

        self.subscriber.snapshot().unwrap_or_default()
    }

    /// [`get_configs`](Self::get_configs) on the blocking thread pool.
    ///
    /// Resolves to an empty snapshot if the blocking task fails.
    #[cfg(feature = "async")]
    pub async fn get_configs_async(self: &Arc<Self>, timeout: Duration) -> ConfigSnapshot {
        let this = Arc::clone(self);
        tokio::task::spawn_blocking(move || this.get_configs(timeout))
            .await
            .unwrap_or_default()
    }

    /// Last committed generation.
    #[must_use]
    pub fn generation(&self) -> i64 {
        self.subscriber.generation()
    }

    /// Closes the subscriber; a blocked `get_configs` returns empty.
    pub fn close(&self) {
        self.subscriber.close();
    }

    /// Returns `true` once closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.subscriber.is_closed()
    }
}

fn subscribe_all(context: &Arc<ConfigContext>, keys: &ConfigKeySet) -> Result<ConfigSubscriber, Error> {
    if keys.is_empty() {
        return Err(Error::EmptyKeySet);
    }

    let subscriber = ConfigSubscriber::new(context.clone());
    for key in keys {
        subscriber.subscribe_key(key.clone())?;
    }

    Ok(subscriber)
}

fn or_empty_when_closed(result: Result<ConfigSnapshot, Error>) -> Result<ConfigSnapshot, Error> {
    match result {
        Err(Error::Closed) => Ok(ConfigSnapshot::empty()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{ConfigSet, SourceSpec};
    use crate::{ConfigKey, ConfigValue};

    fn context() -> (Arc<ConfigSet>, Arc<ConfigContext>) {
        let set = Arc::new(ConfigSet::new());
        set.set_value(ConfigKey::new("root", "bootstrap", "config"), ConfigValue::new("b"));
        set.set_value(ConfigKey::new("c1", "component", "config"), ConfigValue::new("c"));
        let context = Arc::new(ConfigContext::new(SourceSpec::Set(set.clone())));
        (set, context)
    }

    fn keys(key: ConfigKey) -> ConfigKeySet {
        [key].into_iter().collect()
    }

    #[test]
    fn test_empty_key_set_is_fault() {
        let (_set, context) = context();
        let err = SimpleConfigRetriever::new(context, ConfigKeySet::new()).unwrap_err();
        assert!(matches!(err, Error::EmptyKeySet));
    }

    #[test]
    fn test_get_configs_requires_bootstrap() {
        let (_set, context) = context();
        let retriever =
            ConfigRetriever::new(context, keys(ConfigKey::new("root", "bootstrap", "config")))
                .unwrap();

        let err = retriever
            .get_configs(&keys(ConfigKey::new("c1", "component", "config")), Duration::ZERO)
            .unwrap_err();
        assert!(matches!(err, Error::BootstrapRequired));
    }

    #[test]
    fn test_closed_retriever_returns_empty() {
        let (_set, context) = context();
        let retriever = SimpleConfigRetriever::new(
            context,
            keys(ConfigKey::new("c1", "component", "config")),
        )
        .unwrap();

        retriever.close();
        assert!(retriever.get_configs(Duration::from_secs(5)).is_empty());
        assert!(retriever.is_closed());
    }
}
