//! The serialized snapshot document.
//!
//! ```json
//! {
//!   "version": 1,
//!   "generation": 3,
//!   "count": 1,
//!   "configs": [
//!     {
//!       "key": { "configId": "id", "defName": "foo", "defNamespace": "config" },
//!       "value": { "checksum": "…", "payload": "{\"value\":\"bar\"}" }
//!     }
//!   ]
//! }
//! ```

use std::borrow::Cow;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{ConfigSnapshot, SnapshotError};
use crate::source::format::{line_col_to_offset, offset_to_span};
use crate::{ConfigKey, ConfigValue};

/// Snapshot format version written by this build.
pub const FORMAT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct Document<'a> {
    version: u32,
    generation: i64,
    count: usize,
    configs: Vec<Entry<'a>>,
}

#[derive(Serialize, Deserialize)]
struct Entry<'a> {
    key: Cow<'a, ConfigKey>,
    value: Value<'a>,
}

#[derive(Serialize, Deserialize)]
struct Value<'a> {
    checksum: Cow<'a, str>,
    payload: Cow<'a, str>,
}

/// Encodes `snapshot` as a pretty-printed document.
pub(crate) fn encode(snapshot: &ConfigSnapshot) -> Result<String, SnapshotError> {
    let configs: Vec<Entry<'_>> = snapshot
        .iter()
        .map(|(key, value)| Entry {
            key: Cow::Borrowed(key),
            value: Value {
                checksum: Cow::Borrowed(value.checksum()),
                payload: Cow::Borrowed(value.payload()),
            },
        })
        .collect();

    let document = Document {
        version: FORMAT_VERSION,
        generation: snapshot.generation(),
        count: configs.len(),
        configs,
    };

    serde_json::to_string_pretty(&document).map_err(|e| SnapshotError::Encode {
        message: e.to_string(),
    })
}

/// Decodes and validates a document read from `target`.
pub(crate) fn decode(target: &str, content: &str) -> Result<ConfigSnapshot, SnapshotError> {
    let document: Document<'_> = serde_json::from_str(content).map_err(|e| {
        let offset = line_col_to_offset(content, e.line(), e.column());
        SnapshotError::Parse {
            target: target.to_string(),
            src: miette::NamedSource::new(target, content.to_string()),
            span: offset_to_span(offset, content),
            message: e.to_string(),
        }
    })?;

    if document.version != FORMAT_VERSION {
        return Err(SnapshotError::UnsupportedVersion {
            version: document.version,
            supported: FORMAT_VERSION,
        });
    }

    if document.count != document.configs.len() {
        return Err(SnapshotError::CountMismatch {
            declared: document.count,
            actual: document.configs.len(),
        });
    }

    let mut configs = BTreeMap::new();
    for entry in document.configs {
        let key = entry.key.into_owned();
        let value = ConfigValue::from_parts(
            entry.value.payload.into_owned(),
            entry.value.checksum.into_owned(),
        );

        if !value.verify() {
            return Err(SnapshotError::ChecksumMismatch { key });
        }
        if configs.contains_key(&key) {
            return Err(SnapshotError::DuplicateKey { key });
        }
        configs.insert(key, value);
    }

    Ok(ConfigSnapshot::new(document.generation, configs))
}
