//! Cross-key consistent subscriptions.
//!
//! A [`ConfigSubscriber`] groups subscriptions and only ever exposes them at
//! a common generation: a wait succeeds once every key has an update tagged
//! with the same generation `G`, newer than the last committed one. All keys
//! are then flipped together, so handles never mix generations.
//!
//! # Lifecycle
//!
//! ```text
//! Open ──first wait──▶ Frozen ──close──▶ Closed
//!   └──────────────────close──────────────▲
//! ```
//!
//! Keys can only be added while the subscriber is open. The first
//! `next_config`/`next_generation` call freezes the key set, whatever its
//! outcome.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};

use crate::settings::deadline_after;
use crate::{
    ConfigContext, ConfigHandle, ConfigKey, ConfigKeySet, ConfigSnapshot, ConfigSubscription,
    ConfigType, Error, GenericHandle,
};

/// Subscribes to a fixed set of configs and delivers them generation by
/// generation.
///
/// All methods take `&self`; [`close`](Self::close) may be called from any
/// thread while another thread is blocked in a wait.
///
/// # Example
///
/// ```rust,ignore
/// let subscriber = ConfigSubscriber::new(context);
/// let search = subscriber.subscribe::<SearchConfig>("search/0")?;
/// let index = subscriber.subscribe::<IndexConfig>("search/0")?;
///
/// if subscriber.next_config(Duration::from_secs(10)) {
///     // search and index are at the same generation
///     reconfigure(search.get()?, index.get()?);
/// }
/// ```
pub struct ConfigSubscriber {
    context: Arc<ConfigContext>,
    subscriptions: RwLock<Vec<Arc<ConfigSubscription>>>,
    generation: AtomicI64,
    frozen: AtomicBool,
    closed: AtomicBool,
    wait_lock: Mutex<()>,
    commit_lock: RwLock<()>,
}

impl ConfigSubscriber {
    /// Creates an open subscriber with no keys.
    #[must_use]
    pub fn new(context: Arc<ConfigContext>) -> Self {
        Self {
            context,
            subscriptions: RwLock::new(Vec::new()),
            generation: AtomicI64::new(0),
            frozen: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            wait_lock: Mutex::new(()),
            commit_lock: RwLock::new(()),
        }
    }

    /// The context this subscriber was created from.
    #[must_use]
    pub const fn context(&self) -> &Arc<ConfigContext> {
        &self.context
    }

    // ========================================================================
    // Subscribing
    // ========================================================================

    /// Subscribes to config type `T` for `config_id`.
    ///
    /// Waits up to the context's subscribe timeout for the first update.
    ///
    /// # Errors
    ///
    /// - [`Error::Closed`] / [`Error::SubscriberFrozen`] in the wrong state
    /// - [`Error::SubscribeTimeout`] if no first update arrives in time
    /// - [`Error::Source`] if the source cannot serve the key
    pub fn subscribe<T: ConfigType>(
        &self,
        config_id: impl Into<String>,
    ) -> Result<ConfigHandle<T>, Error> {
        let timeout = self.context.settings().subscribe_timeout();
        self.subscribe_with_timeout(config_id, timeout)
    }

    /// Like [`subscribe`](Self::subscribe) with an explicit timeout.
    ///
    /// # Errors
    ///
    /// Same as [`subscribe`](Self::subscribe).
    pub fn subscribe_with_timeout<T: ConfigType>(
        &self,
        config_id: impl Into<String>,
        timeout: Duration,
    ) -> Result<ConfigHandle<T>, Error> {
        let subscription = self.add(ConfigKey::of::<T>(config_id), timeout)?;
        Ok(ConfigHandle::new(subscription))
    }

    /// Subscribes to an explicit key, returning an untyped handle.
    ///
    /// # Errors
    ///
    /// Same as [`subscribe`](Self::subscribe).
    pub fn subscribe_key(&self, key: ConfigKey) -> Result<GenericHandle, Error> {
        let timeout = self.context.settings().subscribe_timeout();
        let subscription = self.add(key, timeout)?;
        Ok(GenericHandle::new(subscription))
    }

    fn add(&self, key: ConfigKey, timeout: Duration) -> Result<Arc<ConfigSubscription>, Error> {
        self.check_open(&key)?;

        if let Some(existing) = self.find(&key) {
            return Ok(existing);
        }

        let subscription = self.context.subscribe(key, timeout)?;

        // The wait for the first update ran unlocked; re-check under the lock.
        let mut subscriptions = self.subscriptions.write();
        if let Err(e) = self.check_open(subscription.key()) {
            subscription.close();
            return Err(e);
        }
        if let Some(existing) = subscriptions.iter().find(|s| s.key() == subscription.key()) {
            subscription.close();
            return Ok(existing.clone());
        }

        subscriptions.push(subscription.clone());
        Ok(subscription)
    }

    fn check_open(&self, key: &ConfigKey) -> Result<(), Error> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        if self.frozen.load(Ordering::Acquire) {
            return Err(Error::SubscriberFrozen { key: key.clone() });
        }
        Ok(())
    }

    fn find(&self, key: &ConfigKey) -> Option<Arc<ConfigSubscription>> {
        self.subscriptions
            .read()
            .iter()
            .find(|s| s.key() == key)
            .cloned()
    }

    /// Freezes the key set and returns it.
    fn freeze(&self) -> Vec<Arc<ConfigSubscription>> {
        let subscriptions = self.subscriptions.write();
        self.frozen.store(true, Ordering::Release);
        subscriptions.clone()
    }

    // ========================================================================
    // Waiting
    // ========================================================================

    /// Waits up to `timeout` for a new generation with at least one changed
    /// config.
    ///
    /// Returns `false` on timeout or close; nothing is flipped then.
    pub fn next_config(&self, timeout: Duration) -> bool {
        self.acquire(timeout, true)
    }

    /// [`next_config`](Self::next_config) without waiting.
    pub fn next_config_now(&self) -> bool {
        self.next_config(Duration::ZERO)
    }

    /// Waits up to `timeout` for a new generation, changed or not.
    pub fn next_generation(&self, timeout: Duration) -> bool {
        self.acquire(timeout, false)
    }

    /// [`next_generation`](Self::next_generation) without waiting.
    pub fn next_generation_now(&self) -> bool {
        self.next_generation(Duration::ZERO)
    }

    fn acquire(&self, timeout: Duration, require_change: bool) -> bool {
        let _wait = self.wait_lock.lock();
        let subscriptions = self.freeze();

        if self.is_closed() || subscriptions.is_empty() {
            return false;
        }

        let deadline = deadline_after(timeout);
        let poll_interval = self.context.settings().poll_interval();
        let committed = self.generation();
        let mut target = committed + 1;

        loop {
            let round_deadline = deadline_after(poll_interval).min(deadline);
            let mut all_ready = true;

            for subscription in &subscriptions {
                if !subscription.next_update(target, round_deadline) {
                    all_ready = false;
                }
                if self.is_closed() {
                    return false;
                }
            }

            let highest = subscriptions
                .iter()
                .filter_map(|s| s.pending_generation())
                .max();

            if all_ready && let Some(highest) = highest {
                let agreed = subscriptions
                    .iter()
                    .all(|s| s.pending_generation() == Some(highest));

                if !agreed {
                    target = highest;
                } else if !require_change || subscriptions.iter().any(|s| s.has_pending_change()) {
                    self.commit(&subscriptions, committed, highest);
                    return true;
                } else {
                    tracing::trace!(generation = highest, "skipping generation without changes");
                    target = highest + 1;
                }
            } else if let Some(highest) = highest
                && highest > target
            {
                target = highest;
            }

            if Instant::now() >= deadline {
                return false;
            }
        }
    }

    fn commit(&self, subscriptions: &[Arc<ConfigSubscription>], from: i64, to: i64) {
        let _commit = self.commit_lock.write();
        let mut changed = 0_usize;

        for subscription in subscriptions {
            if let Err(e) = subscription.flip() {
                tracing::error!(key = %subscription.key(), error = %e, "flip failed");
                continue;
            }
            if subscription.is_changed() {
                changed += 1;
            }
        }

        self.generation.store(to, Ordering::Release);
        tracing::debug!(from, to, changed, "committed generation");
    }

    // ========================================================================
    // State
    // ========================================================================

    /// Last committed generation; 0 before the first successful wait.
    #[must_use]
    pub fn generation(&self) -> i64 {
        self.generation.load(Ordering::Acquire)
    }

    /// The subscribed keys.
    #[must_use]
    pub fn keys(&self) -> ConfigKeySet {
        self.subscriptions
            .read()
            .iter()
            .map(|s| s.key().clone())
            .collect()
    }

    /// Returns `true` once a wait call has frozen the key set.
    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::Acquire)
    }

    /// Snapshot of the current values at the committed generation.
    ///
    /// # Errors
    ///
    /// - [`Error::Closed`] once closed
    /// - [`Error::NotConfigured`] before the first successful wait
    pub fn snapshot(&self) -> Result<ConfigSnapshot, Error> {
        if self.is_closed() {
            return Err(Error::Closed);
        }

        let _commit = self.commit_lock.read();
        let subscriptions = self.subscriptions.read().clone();
        ConfigSnapshot::from_subscriptions(&subscriptions, self.generation())
    }

    /// Closes every subscription and wakes blocked waits. Idempotent.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        let subscriptions = self.subscriptions.read().clone();
        for subscription in &subscriptions {
            subscription.close();
        }

        tracing::debug!(keys = subscriptions.len(), "subscriber closed");
    }

    /// Returns `true` once [`close`](Self::close) was called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    // ========================================================================
    // Async
    // ========================================================================

    /// [`next_config`](Self::next_config) on the blocking thread pool.
    ///
    /// Resolves to `false` if the blocking task fails.
    #[cfg(feature = "async")]
    pub async fn next_config_async(self: &Arc<Self>, timeout: Duration) -> bool {
        let this = Arc::clone(self);
        tokio::task::spawn_blocking(move || this.next_config(timeout))
            .await
            .unwrap_or(false)
    }

    /// [`next_generation`](Self::next_generation) on the blocking thread pool.
    ///
    /// Resolves to `false` if the blocking task fails.
    #[cfg(feature = "async")]
    pub async fn next_generation_async(self: &Arc<Self>, timeout: Duration) -> bool {
        let this = Arc::clone(self);
        tokio::task::spawn_blocking(move || this.next_generation(timeout))
            .await
            .unwrap_or(false)
    }
}

impl Drop for ConfigSubscriber {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for ConfigSubscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigSubscriber")
            .field("keys", &self.subscriptions.read().len())
            .field("generation", &self.generation())
            .field("frozen", &self.is_frozen())
            .field("closed", &self.is_closed())
            .finish()
    }
}
