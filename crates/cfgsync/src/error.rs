//! Error types for subscriptions, snapshots and sources.
//!
//! Two kinds of failure are kept apart on purpose:
//!
//! - **Faults** are returned as [`Error`]: calling an operation in the wrong
//!   state (subscribing after the first wait, reading a handle that was never
//!   flipped), asking for a key that is not there, or a payload that does not
//!   decode.
//! - **Timeouts and closure** are not errors. `next_config` returns `false`,
//!   the retrievers return an empty [`ConfigSnapshot`](crate::ConfigSnapshot).
//!
//! # Error Variants
//!
//! | Variant | When It Occurs |
//! |---------|----------------|
//! | [`Error::SubscriberFrozen`] | `subscribe` after the first wait call |
//! | [`Error::Closed`] | Operating on a closed subscriber |
//! | [`Error::NotConfigured`] | Reading a handle before any successful wait |
//! | [`Error::NotFound`] | Key missing from a snapshot |
//! | [`Error::SubscribeTimeout`] | Source produced no first update in time |
//! | [`Error::Decode`] | Payload does not match the config type |
//! | [`Error::Source`] | A source failed to fetch |
//! | [`Error::Snapshot`] | Snapshot serialization failed |
//!
//! All variants implement [`miette::Diagnostic`]:
//!
//! ```rust,ignore
//! if let Err(e) = subscriber.subscribe::<SearchConfig>("search/0") {
//!     eprintln!("{:?}", miette::Report::from(e));
//! }
//! ```

use std::error::Error as StdError;
use std::time::Duration;

use miette::Diagnostic;

use crate::ConfigKey;
use crate::snapshot::SnapshotError;

/// Errors returned by cfgsync operations.
#[derive(Debug, Diagnostic, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// `subscribe` was called after a wait call froze the subscriber.
    #[error("cannot subscribe to {key}: subscriber is frozen")]
    #[diagnostic(
        code(cfgsync::subscriber_frozen),
        help("subscribe to every key before the first next_config/next_generation call")
    )]
    SubscriberFrozen {
        /// The key that was being subscribed.
        key: ConfigKey,
    },

    /// The subscriber or retriever has been closed.
    #[error("subscriber is closed")]
    #[diagnostic(code(cfgsync::closed))]
    Closed,

    /// A handle or subscription was read before its first flip.
    #[error("config {key} has not been configured yet")]
    #[diagnostic(
        code(cfgsync::not_configured),
        help("wait for next_config or next_generation to return true before reading handles")
    )]
    NotConfigured {
        /// The key that has no current value.
        key: ConfigKey,
    },

    /// A snapshot has no entry for the requested key.
    #[error("no config found for {key}")]
    #[diagnostic(code(cfgsync::not_found))]
    NotFound {
        /// The missing key.
        key: ConfigKey,
    },

    /// The source did not publish a first update within the timeout.
    #[error("timed out after {timeout:?} waiting for first update of {key}")]
    #[diagnostic(
        code(cfgsync::subscribe_timeout),
        help("check that the source can serve this key, or raise CFGSYNC_SUBSCRIBE_TIMEOUT_MS")
    )]
    SubscribeTimeout {
        /// The key that never received an update.
        key: ConfigKey,

        /// How long the subscriber waited.
        timeout: Duration,
    },

    /// A payload could not be decoded into the requested config type.
    #[error("failed to decode {def_name} at `{path}`: {message}")]
    #[diagnostic(code(cfgsync::decode_error))]
    Decode {
        /// Definition name of the config type.
        def_name: String,

        /// Path inside the payload where decoding failed (`.` for the root).
        path: String,

        /// What went wrong.
        message: String,
    },

    /// A config value could not be encoded.
    #[error("failed to encode {def_name}: {message}")]
    #[diagnostic(code(cfgsync::encode_error))]
    Encode {
        /// Definition name of the config type.
        def_name: String,

        /// What went wrong.
        message: String,
    },

    /// A source failed to fetch or parse its payload.
    #[error("source for {key} failed: {message}")]
    #[diagnostic(code(cfgsync::source_error))]
    Source {
        /// The key the source serves.
        key: ConfigKey,

        /// What went wrong.
        message: String,
    },

    /// A retriever was asked for an empty key set.
    #[error("key set is empty")]
    #[diagnostic(
        code(cfgsync::empty_key_set),
        help("add at least one key before retrieving configs")
    )]
    EmptyKeySet,

    /// Component configs were requested before a bootstrap snapshot.
    #[error("bootstrap configs must be retrieved first")]
    #[diagnostic(
        code(cfgsync::bootstrap_required),
        help("call get_bootstrap_configs and retry get_configs with the keys it yields")
    )]
    BootstrapRequired,

    /// `flip` was called without a pending update.
    #[error("nothing to flip for {key}")]
    #[diagnostic(code(cfgsync::nothing_to_flip))]
    NothingToFlip {
        /// The subscription's key.
        key: ConfigKey,
    },

    /// A subscription is at a different generation than expected.
    #[error("{key} is at generation {actual}, expected {expected}")]
    #[diagnostic(code(cfgsync::generation_mismatch))]
    GenerationMismatch {
        /// The subscription's key.
        key: ConfigKey,

        /// The generation the caller required.
        expected: i64,

        /// The generation the subscription holds.
        actual: i64,
    },

    /// A configure callback failed during `SimpleConfigurer::start`.
    #[error("configure callback failed: {message}")]
    #[diagnostic(code(cfgsync::configure_error))]
    Configure {
        /// Display form of the callback's error.
        message: String,

        /// The callback's error.
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    /// A `CFGSYNC_*` environment variable holds an invalid value.
    #[error("invalid value {value:?} for {var}: {message}")]
    #[diagnostic(
        code(cfgsync::invalid_setting),
        help("set {var} to a whole number of milliseconds")
    )]
    InvalidSetting {
        /// The environment variable.
        var: &'static str,

        /// The raw value.
        value: String,

        /// Why it was rejected.
        message: String,
    },

    /// Snapshot serialization or deserialization failed.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Snapshot(#[from] SnapshotError),
}

// ============================================================================
// Constructor helpers
// ============================================================================

impl Error {
    /// Creates a [`Error::Source`] error.
    pub fn source_failed(key: &ConfigKey, message: impl Into<String>) -> Self {
        Error::Source {
            key: key.clone(),
            message: message.into(),
        }
    }

    /// Creates a [`Error::Decode`] error.
    pub fn decode(
        def_name: impl Into<String>,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Error::Decode {
            def_name: def_name.into(),
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a [`Error::Encode`] error.
    pub fn encode(def_name: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Encode {
            def_name: def_name.into(),
            message: message.into(),
        }
    }

    /// Creates a [`Error::Configure`] error from a callback's error.
    pub fn configure(source: Box<dyn StdError + Send + Sync>) -> Self {
        Error::Configure {
            message: source.to_string(),
            source,
        }
    }

    /// Creates a [`Error::InvalidSetting`] error.
    pub fn invalid_setting(
        var: &'static str,
        value: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Error::InvalidSetting {
            var,
            value: value.into(),
            message: message.into(),
        }
    }

    /// Returns `true` for faults caused by calling an operation in the wrong
    /// state.
    #[must_use]
    pub const fn is_invalid_usage(&self) -> bool {
        matches!(
            self,
            Error::SubscriberFrozen { .. }
                | Error::Closed
                | Error::NotConfigured { .. }
                | Error::NothingToFlip { .. }
                | Error::GenerationMismatch { .. }
                | Error::EmptyKeySet
                | Error::BootstrapRequired
        )
    }

    /// Returns `true` if this is a [`Error::NotFound`] fault.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> ConfigKey {
        ConfigKey::new("search/0", "index", "config")
    }

    #[test]
    fn test_error_not_found_names_key() {
        let err = Error::NotFound { key: key() };
        assert!(err.to_string().contains("config.index,search/0"));
        assert!(err.is_not_found());
        assert!(!err.is_invalid_usage());
    }

    #[test]
    fn test_error_invalid_usage_classification() {
        assert!(Error::SubscriberFrozen { key: key() }.is_invalid_usage());
        assert!(Error::Closed.is_invalid_usage());
        assert!(Error::NotConfigured { key: key() }.is_invalid_usage());
        assert!(Error::EmptyKeySet.is_invalid_usage());
        assert!(Error::BootstrapRequired.is_invalid_usage());
        assert!(!Error::source_failed(&key(), "boom").is_invalid_usage());
    }

    #[test]
    fn test_error_configure_keeps_source() {
        let err = Error::configure("bad threads".into());
        assert!(err.to_string().contains("bad threads"));
        assert!(StdError::source(&err).is_some());
    }

    #[test]
    fn test_error_diagnostic_codes() {
        let err = Error::invalid_setting("CFGSYNC_POLL_INTERVAL_MS", "abc", "not a number");
        let code = err.code().map(|c| c.to_string());
        assert_eq!(code.as_deref(), Some("cfgsync::invalid_setting"));
    }
}
