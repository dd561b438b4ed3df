//! Typed config schemas.
//!
//! A [`ConfigType`] names a schema (definition namespace + name) and knows
//! how to turn a [`ConfigValue`] payload into itself and back. It is usually
//! derived:
//!
//! ```rust,ignore
//! use cfgsync::ConfigType;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(ConfigType, Serialize, Deserialize)]
//! #[config(name = "search", namespace = "vespa")]
//! struct SearchConfig {
//!     threads: u32,
//! }
//! ```

use crate::{ConfigValue, Error};

/// A config schema with its payload codec.
pub trait ConfigType: Sized {
    /// Definition name of the schema.
    const DEF_NAME: &'static str;

    /// Definition namespace of the schema.
    const DEF_NAMESPACE: &'static str;

    /// Decodes a payload.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if the payload does not match the schema.
    fn decode(value: &ConfigValue) -> Result<Self, Error>;

    /// Encodes `self` into a payload.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encode`] if the value cannot be serialized.
    fn encode(&self) -> Result<ConfigValue, Error>;
}

/// JSON payload codec used by `#[derive(ConfigType)]`.
pub mod codec {
    use serde::Serialize;
    use serde::de::DeserializeOwned;

    use crate::{ConfigValue, Error};

    /// Decodes a JSON payload, reporting the path of the first bad field.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] with the failing path (e.g. `index.threads`).
    pub fn decode_json<T: DeserializeOwned>(def_name: &str, value: &ConfigValue) -> Result<T, Error> {
        let mut de = serde_json::Deserializer::from_str(value.payload());

        serde_path_to_error::deserialize(&mut de).map_err(|e| {
            let path = e.path().to_string();
            Error::decode(def_name, path, e.into_inner().to_string())
        })
    }

    /// Encodes `value` as a compact JSON payload.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encode`] if serialization fails.
    pub fn encode_json<T: Serialize>(def_name: &str, value: &T) -> Result<ConfigValue, Error> {
        serde_json::to_string(value)
            .map(ConfigValue::new)
            .map_err(|e| Error::encode(def_name, e.to_string()))
    }
}
