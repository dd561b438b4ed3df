//! Read-only views of subscribed configs.

use std::fmt::{self, Debug, Formatter};
use std::marker::PhantomData;
use std::sync::Arc;

use crate::{ConfigKey, ConfigSubscription, ConfigType, ConfigValue, Error};

/// Typed, read-only view of one subscription.
///
/// A handle reads the value flipped by the last successful
/// [`next_config`](crate::ConfigSubscriber::next_config) or
/// [`next_generation`](crate::ConfigSubscriber::next_generation); it never
/// sees a pending update.
///
/// # Example
///
/// ```rust,ignore
/// let handle = subscriber.subscribe::<SearchConfig>("search/0")?;
///
/// while subscriber.next_config(Duration::from_secs(60)) {
///     if handle.is_changed() {
///         apply(handle.get()?);
///     }
/// }
/// ```
pub struct ConfigHandle<T> {
    subscription: Arc<ConfigSubscription>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: ConfigType> ConfigHandle<T> {
    pub(crate) const fn new(subscription: Arc<ConfigSubscription>) -> Self {
        Self {
            subscription,
            _marker: PhantomData,
        }
    }

    /// Decodes the current value.
    ///
    /// # Errors
    ///
    /// - [`Error::Closed`] once the subscriber is closed
    /// - [`Error::NotConfigured`] before the first successful wait
    /// - [`Error::Decode`] if the payload does not match `T`
    pub fn get(&self) -> Result<T, Error> {
        T::decode(&current(&self.subscription)?)
    }
}

impl<T> ConfigHandle<T> {
    /// Whether the last successful wait changed this config.
    ///
    /// Stable until the next successful wait.
    #[must_use]
    pub fn is_changed(&self) -> bool {
        self.subscription.is_changed()
    }

    /// Generation of the current value; 0 before the first successful wait.
    #[must_use]
    pub fn generation(&self) -> i64 {
        self.subscription.generation()
    }

    /// The subscribed key.
    #[must_use]
    pub fn key(&self) -> &ConfigKey {
        self.subscription.key()
    }
}

impl<T> Clone for ConfigHandle<T> {
    fn clone(&self) -> Self {
        Self {
            subscription: self.subscription.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> Debug for ConfigHandle<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigHandle")
            .field("key", self.key())
            .field("generation", &self.generation())
            .field("changed", &self.is_changed())
            .finish()
    }
}

/// Untyped view of one subscription, returned by
/// [`subscribe_key`](crate::ConfigSubscriber::subscribe_key).
#[derive(Clone, Debug)]
pub struct GenericHandle {
    subscription: Arc<ConfigSubscription>,
}

impl GenericHandle {
    pub(crate) const fn new(subscription: Arc<ConfigSubscription>) -> Self {
        Self { subscription }
    }

    /// The current raw value.
    ///
    /// # Errors
    ///
    /// Same as [`ConfigHandle::get`], minus decoding.
    pub fn value(&self) -> Result<ConfigValue, Error> {
        current(&self.subscription)
    }

    /// Decodes the current value as `T`.
    ///
    /// # Errors
    ///
    /// Same as [`ConfigHandle::get`].
    pub fn decode<T: ConfigType>(&self) -> Result<T, Error> {
        T::decode(&self.value()?)
    }

    /// Whether the last successful wait changed this config.
    #[must_use]
    pub fn is_changed(&self) -> bool {
        self.subscription.is_changed()
    }

    /// Generation of the current value.
    #[must_use]
    pub fn generation(&self) -> i64 {
        self.subscription.generation()
    }

    /// The subscribed key.
    #[must_use]
    pub fn key(&self) -> &ConfigKey {
        self.subscription.key()
    }
}

fn current(subscription: &ConfigSubscription) -> Result<ConfigValue, Error> {
    if subscription.is_closed() {
        return Err(Error::Closed);
    }

    subscription.current_value().ok_or_else(|| Error::NotConfigured {
        key: subscription.key().clone(),
    })
}
