//! Opaque config payloads and the updates sources publish.
//!
//! A [`ConfigValue`] is a UTF-8 payload plus a checksum. The core never
//! looks inside the payload; the checksum is the equality witness used to
//! decide whether content changed between two generations.

use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

use sha2::{Digest, Sha256};

/// An opaque config payload with its checksum.
///
/// Cloning is cheap: the payload is shared.
///
/// # Example
///
/// ```rust,ignore
/// let a = ConfigValue::new(r#"{"threads":4}"#);
/// let b = ConfigValue::new(r#"{"threads":4}"#);
/// assert_eq!(a, b);
/// assert_eq!(a.checksum(), b.checksum());
/// ```
#[derive(Clone)]
pub struct ConfigValue {
    payload: Arc<str>,
    checksum: Arc<str>,
}

impl ConfigValue {
    /// Creates a value, computing the checksum of `payload`.
    pub fn new(payload: impl Into<String>) -> Self {
        let payload: String = payload.into();
        let checksum = Self::compute_checksum(&payload);

        Self {
            payload: payload.into(),
            checksum: checksum.into(),
        }
    }

    /// Creates a value from a JSON document.
    ///
    /// The payload is the compact serialization of `json`, so equal
    /// documents yield equal checksums.
    #[must_use]
    pub fn from_json(json: &serde_json::Value) -> Self {
        Self::new(json.to_string())
    }

    /// Computes the checksum stored alongside a payload (hex SHA-256).
    #[must_use]
    pub fn compute_checksum(payload: &str) -> String {
        hex::encode(Sha256::digest(payload.as_bytes()))
    }

    /// The raw payload.
    #[must_use]
    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// The payload checksum.
    #[must_use]
    pub fn checksum(&self) -> &str {
        &self.checksum
    }

    /// Returns `true` if the stored checksum matches the payload.
    #[must_use]
    pub fn verify(&self) -> bool {
        Self::compute_checksum(&self.payload) == *self.checksum
    }

    /// Rebuilds a value from a stored payload and checksum without rehashing.
    pub(crate) fn from_parts(payload: String, checksum: String) -> Self {
        Self {
            payload: payload.into(),
            checksum: checksum.into(),
        }
    }
}

impl PartialEq for ConfigValue {
    fn eq(&self, other: &Self) -> bool {
        self.checksum == other.checksum
    }
}

impl Eq for ConfigValue {}

// Payloads can be large; show a short prefix only.
impl Debug for ConfigValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let checksum: String = self.checksum.chars().take(12).collect();
        let preview: String = self.payload.chars().take(64).collect();

        f.debug_struct("ConfigValue")
            .field("checksum", &checksum)
            .field("payload", &preview)
            .finish()
    }
}

/// One push from a source into a [`ConfigHolder`](crate::ConfigHolder).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfigUpdate {
    value: ConfigValue,
    changed: bool,
    generation: i64,
}

impl ConfigUpdate {
    /// Creates an update.
    ///
    /// `changed` tells whether the payload differs from the previous update
    /// the same source published; a heartbeat carries `changed == false`.
    #[must_use]
    pub const fn new(value: ConfigValue, changed: bool, generation: i64) -> Self {
        Self {
            value,
            changed,
            generation,
        }
    }

    /// The published value.
    #[must_use]
    pub const fn value(&self) -> &ConfigValue {
        &self.value
    }

    /// Whether the source saw a payload change.
    #[must_use]
    pub const fn has_changed(&self) -> bool {
        self.changed
    }

    /// The generation this update belongs to.
    #[must_use]
    pub const fn generation(&self) -> i64 {
        self.generation
    }

    pub(crate) fn into_value(self) -> ConfigValue {
        self.value
    }
}
