//! Identity of a subscribed config.
//!
//! A [`ConfigKey`] names one config instance: the schema it follows
//! (definition namespace + name) and the config id it was requested for.
//! [`ConfigKeySet`] is an ordered set of keys, used by the retrievers to
//! describe everything one snapshot should contain.

use std::collections::BTreeSet;
use std::collections::btree_set;
use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::ConfigType;

/// Identity of one config instance.
///
/// Two keys with the same config id but different definitions are distinct
/// subscriptions. Keys are ordered by config id, then definition name, then
/// namespace.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigKey {
    config_id: String,
    def_name: String,
    def_namespace: String,
}

impl ConfigKey {
    /// Creates a key from its parts.
    pub fn new(
        config_id: impl Into<String>,
        def_name: impl Into<String>,
        def_namespace: impl Into<String>,
    ) -> Self {
        Self {
            config_id: config_id.into(),
            def_name: def_name.into(),
            def_namespace: def_namespace.into(),
        }
    }

    /// Creates the key of config type `T` for `config_id`.
    ///
    /// ```rust,ignore
    /// let key = ConfigKey::of::<SearchConfig>("search/0");
    /// assert_eq!(key.def_name(), SearchConfig::DEF_NAME);
    /// ```
    pub fn of<T: ConfigType>(config_id: impl Into<String>) -> Self {
        Self::new(config_id, T::DEF_NAME, T::DEF_NAMESPACE)
    }

    /// The config id this key was requested for.
    #[must_use]
    pub fn config_id(&self) -> &str {
        &self.config_id
    }

    /// The definition (schema) name.
    #[must_use]
    pub fn def_name(&self) -> &str {
        &self.def_name
    }

    /// The definition namespace.
    #[must_use]
    pub fn def_namespace(&self) -> &str {
        &self.def_namespace
    }

    /// Returns `true` if this key names config type `T`.
    #[must_use]
    pub fn is_type<T: ConfigType>(&self) -> bool {
        self.def_name == T::DEF_NAME && self.def_namespace == T::DEF_NAMESPACE
    }
}

impl Display for ConfigKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{},{}",
            self.def_namespace, self.def_name, self.config_id
        )
    }
}

/// An ordered set of [`ConfigKey`]s.
///
/// # Example
///
/// ```rust,ignore
/// let mut keys = ConfigKeySet::new();
/// keys.add::<SearchConfig>("search/0")
///     .add::<IndexConfig>("search/0");
/// assert_eq!(keys.len(), 2);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConfigKeySet {
    keys: BTreeSet<ConfigKey>,
}

impl ConfigKeySet {
    /// Creates an empty key set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the key of config type `T` for `config_id`.
    pub fn add<T: ConfigType>(&mut self, config_id: impl Into<String>) -> &mut Self {
        self.keys.insert(ConfigKey::of::<T>(config_id));
        self
    }

    /// Adds an explicit key.
    pub fn add_key(&mut self, key: ConfigKey) -> &mut Self {
        self.keys.insert(key);
        self
    }

    /// Adds every key of another set.
    pub fn add_set(&mut self, other: &Self) -> &mut Self {
        self.keys.extend(other.keys.iter().cloned());
        self
    }

    /// Returns `true` if the set contains `key`.
    #[must_use]
    pub fn contains(&self, key: &ConfigKey) -> bool {
        self.keys.contains(key)
    }

    /// Number of keys in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns `true` if the set has no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Iterates keys in order.
    pub fn iter(&self) -> btree_set::Iter<'_, ConfigKey> {
        self.keys.iter()
    }
}

impl FromIterator<ConfigKey> for ConfigKeySet {
    fn from_iter<I: IntoIterator<Item = ConfigKey>>(iter: I) -> Self {
        Self {
            keys: iter.into_iter().collect(),
        }
    }
}

impl Extend<ConfigKey> for ConfigKeySet {
    fn extend<I: IntoIterator<Item = ConfigKey>>(&mut self, iter: I) {
        self.keys.extend(iter);
    }
}

impl<'a> IntoIterator for &'a ConfigKeySet {
    type Item = &'a ConfigKey;
    type IntoIter = btree_set::Iter<'a, ConfigKey>;

    fn into_iter(self) -> Self::IntoIter {
        self.keys.iter()
    }
}

impl IntoIterator for ConfigKeySet {
    type Item = ConfigKey;
    type IntoIter = btree_set::IntoIter<ConfigKey>;

    fn into_iter(self) -> Self::IntoIter {
        self.keys.into_iter()
    }
}
