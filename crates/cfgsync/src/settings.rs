//! Timeouts and poll granularity for subscriptions.
//!
//! Settings come from code via the `const fn` setters or from the process
//! environment via [`SubscriberSettings::from_env`]:
//!
//! | Variable | Setting | Default |
//! |----------|---------|---------|
//! | `CFGSYNC_SUBSCRIBE_TIMEOUT_MS` | [`subscribe_timeout`](SubscriberSettings::subscribe_timeout) | 60 s |
//! | `CFGSYNC_NEXT_CONFIG_TIMEOUT_MS` | [`next_config_timeout`](SubscriberSettings::next_config_timeout) | 60 s |
//! | `CFGSYNC_POLL_INTERVAL_MS` | [`poll_interval`](SubscriberSettings::poll_interval) | 10 ms |

use std::time::{Duration, Instant};

use crate::Error;

/// Env var overriding the subscribe timeout, in milliseconds.
pub const SUBSCRIBE_TIMEOUT_VAR: &str = "CFGSYNC_SUBSCRIBE_TIMEOUT_MS";

/// Env var overriding the next-config timeout, in milliseconds.
pub const NEXT_CONFIG_TIMEOUT_VAR: &str = "CFGSYNC_NEXT_CONFIG_TIMEOUT_MS";

/// Env var overriding the poll interval, in milliseconds.
pub const POLL_INTERVAL_VAR: &str = "CFGSYNC_POLL_INTERVAL_MS";

/// Timing knobs shared by every subscriber created from one
/// [`ConfigContext`](crate::ConfigContext).
///
/// # Example
///
/// ```rust,ignore
/// let settings = SubscriberSettings::new()
///     .with_subscribe_timeout(Duration::from_secs(5))
///     .with_poll_interval(Duration::from_millis(2));
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubscriberSettings {
    subscribe_timeout: Duration,
    next_config_timeout: Duration,
    poll_interval: Duration,
}

impl SubscriberSettings {
    /// Default time to wait for the first update of a new subscription.
    pub const DEFAULT_SUBSCRIBE_TIMEOUT: Duration = Duration::from_secs(60);

    /// Default wait used by the retrievers and the configurer loop.
    pub const DEFAULT_NEXT_CONFIG_TIMEOUT: Duration = Duration::from_secs(60);

    /// Default re-poll granularity of the consistency wait.
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

    /// Creates settings with the defaults.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            subscribe_timeout: Self::DEFAULT_SUBSCRIBE_TIMEOUT,
            next_config_timeout: Self::DEFAULT_NEXT_CONFIG_TIMEOUT,
            poll_interval: Self::DEFAULT_POLL_INTERVAL,
        }
    }

    /// Creates settings from the defaults overridden by `CFGSYNC_*` env vars.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSetting`] if a variable is set but is not a
    /// number of milliseconds, or if the poll interval is zero.
    pub fn from_env() -> Result<Self, Error> {
        let mut settings = Self::new();

        if let Some(ms) = read_millis(SUBSCRIBE_TIMEOUT_VAR)? {
            settings.subscribe_timeout = ms;
        }
        if let Some(ms) = read_millis(NEXT_CONFIG_TIMEOUT_VAR)? {
            settings.next_config_timeout = ms;
        }
        if let Some(ms) = read_millis(POLL_INTERVAL_VAR)? {
            if ms.is_zero() {
                return Err(Error::invalid_setting(
                    POLL_INTERVAL_VAR,
                    "0",
                    "poll interval must be at least 1 ms",
                ));
            }
            settings.poll_interval = ms;
        }

        Ok(settings)
    }

    /// Sets the subscribe timeout.
    #[must_use]
    pub const fn with_subscribe_timeout(mut self, timeout: Duration) -> Self {
        self.subscribe_timeout = timeout;
        self
    }

    /// Sets the next-config timeout.
    #[must_use]
    pub const fn with_next_config_timeout(mut self, timeout: Duration) -> Self {
        self.next_config_timeout = timeout;
        self
    }

    /// Sets the poll interval. A zero interval is raised to 1 ms.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = if interval.is_zero() {
            Duration::from_millis(1)
        } else {
            interval
        };
        self
    }

    /// How long `subscribe` waits for the first update.
    #[must_use]
    pub const fn subscribe_timeout(&self) -> Duration {
        self.subscribe_timeout
    }

    /// How long retrievers and the configurer wait per round.
    #[must_use]
    pub const fn next_config_timeout(&self) -> Duration {
        self.next_config_timeout
    }

    /// Re-poll granularity of `next_config` / `next_generation`.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        self.poll_interval
    }
}

impl Default for SubscriberSettings {
    fn default() -> Self {
        Self::new()
    }
}

fn read_millis(var: &'static str) -> Result<Option<Duration>, Error> {
    let Ok(raw) = std::env::var(var) else {
        return Ok(None);
    };

    raw.trim()
        .parse::<u64>()
        .map(|ms| Some(Duration::from_millis(ms)))
        .map_err(|e| Error::invalid_setting(var, raw.clone(), e.to_string()))
}

/// `now + timeout`, saturating far in the future instead of overflowing.
pub(crate) fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout)
        .unwrap_or_else(|| now + Duration::from_secs(60 * 60 * 24 * 365))
}
