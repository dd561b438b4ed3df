//! Shared source factory and generation counter.
//!
//! Every subscriber is created from a [`ConfigContext`]. The context owns the
//! [`SourceFactory`] that builds one source per subscribed key, the
//! [`SubscriberSettings`], and the *context generation*: the generation every
//! source tags its next push with. [`ConfigContext::reload`] bumps it and has
//! every live source publish again, which is how a new generation reaches all
//! keys at once.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;

use crate::source::{SourceFactory, SourceSpec};
use crate::{ConfigHolder, ConfigKey, ConfigSubscription, Error, SubscriberSettings};

/// Source factory, settings and generation shared by subscribers.
///
/// # Example
///
/// ```rust,ignore
/// let set = Arc::new(ConfigSet::new());
/// set.add("search/0", &SearchConfig { threads: 4 })?;
///
/// let context = Arc::new(ConfigContext::new(SourceSpec::Set(set.clone())));
/// let subscriber = ConfigSubscriber::new(context.clone());
/// let handle = subscriber.subscribe::<SearchConfig>("search/0")?;
///
/// set.add("search/0", &SearchConfig { threads: 8 })?;
/// context.reload();
/// ```
pub struct ConfigContext {
    factory: Arc<dyn SourceFactory>,
    settings: SubscriberSettings,
    generation: AtomicI64,
    subscriptions: Mutex<Vec<Weak<ConfigSubscription>>>,
}

impl ConfigContext {
    /// First context generation.
    pub const INITIAL_GENERATION: i64 = 1;

    /// Creates a context serving configs as described by `spec`.
    #[must_use]
    pub fn new(spec: SourceSpec) -> Self {
        Self::with_factory(spec.create_factory(), SubscriberSettings::default())
    }

    /// Creates a context around a custom factory.
    #[must_use]
    pub fn with_factory(factory: Arc<dyn SourceFactory>, settings: SubscriberSettings) -> Self {
        Self {
            factory,
            settings,
            generation: AtomicI64::new(Self::INITIAL_GENERATION),
            subscriptions: Mutex::new(Vec::new()),
        }
    }

    /// Replaces the settings.
    #[must_use]
    pub const fn with_settings(mut self, settings: SubscriberSettings) -> Self {
        self.settings = settings;
        self
    }

    /// The settings subscribers created from this context use.
    #[must_use]
    pub const fn settings(&self) -> &SubscriberSettings {
        &self.settings
    }

    /// The generation sources currently publish at.
    #[must_use]
    pub fn generation(&self) -> i64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Starts a new generation and has every live source publish at it.
    ///
    /// Returns the new generation. Fetch failures are logged per key and do
    /// not stop the other sources.
    pub fn reload(&self) -> i64 {
        let mut subscriptions = self.subscriptions.lock();
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;

        prune(&mut subscriptions);
        tracing::debug!(generation, sources = subscriptions.len(), "reloading sources");

        for subscription in subscriptions.iter().filter_map(Weak::upgrade) {
            subscription.reload(generation);
        }

        generation
    }

    /// Number of open subscriptions created through this context.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.subscriptions
            .lock()
            .iter()
            .filter_map(Weak::upgrade)
            .filter(|sub| !sub.is_closed())
            .count()
    }

    /// Creates the subscription for `key` and waits for its first update.
    pub(crate) fn subscribe(
        &self,
        key: ConfigKey,
        timeout: Duration,
    ) -> Result<Arc<ConfigSubscription>, Error> {
        let holder = Arc::new(ConfigHolder::new());
        let source = self.factory.create_source(holder.clone(), &key);
        let subscription = Arc::new(ConfigSubscription::new(key, holder, source));

        {
            let mut subscriptions = self.subscriptions.lock();
            prune(&mut subscriptions);
            subscriptions.push(Arc::downgrade(&subscription));

            if let Err(e) = subscription.start(self.generation()) {
                subscription.close();
                return Err(e);
            }
        }

        if !subscription.holder().wait(timeout) {
            subscription.close();
            return Err(Error::SubscribeTimeout {
                key: subscription.key().clone(),
                timeout,
            });
        }

        tracing::debug!(key = %subscription.key(), "subscribed");
        Ok(subscription)
    }
}

/// Drops entries whose subscription is gone or closed.
fn prune(subscriptions: &mut Vec<Weak<ConfigSubscription>>) {
    subscriptions.retain(|weak| weak.upgrade().is_some_and(|sub| !sub.is_closed()));
}

impl std::fmt::Debug for ConfigContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigContext")
            .field("settings", &self.settings)
            .field("generation", &self.generation())
            .finish_non_exhaustive()
    }
}
