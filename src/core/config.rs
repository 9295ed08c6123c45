//! Configuration bundles passed from a configurator to its map fragment
//!
//! A configurator projects the settings it cares about into a small
//! key/value bundle; the fragment reads the same keys back in `apply_config`.
//! Values are JSON so that structured descriptors (a `WebMapService`, say)
//! can travel alongside plain strings and integers.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;

/// Bundle key holding the reference layer path, shared by every provider.
pub const KEY_REFERENCE_LAYER: &str = "REFERENCE_LAYER";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigBundle {
    values: BTreeMap<String, serde_json::Value>,
}

impl ConfigBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_string(&mut self, key: &str, value: impl Into<String>) {
        self.values
            .insert(key.to_string(), serde_json::Value::String(value.into()));
    }

    /// Stores `value` when present and clears the key otherwise.
    pub fn put_optional_string(&mut self, key: &str, value: Option<String>) {
        match value {
            Some(value) => self.put_string(key, value),
            None => {
                self.values.remove(key);
            }
        }
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.values
            .get(key)
            .and_then(|v| v.as_str())
            .map(str::to_string)
    }

    pub fn put_int(&mut self, key: &str, value: i64) {
        self.values.insert(key.to_string(), value.into());
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        self.values.get(key).and_then(|v| v.as_i64())
    }

    /// Stores any serializable value. Values that fail to serialize are
    /// dropped with a warning; bundles never fail to build.
    pub fn put_value<T: Serialize>(&mut self, key: &str, value: &T) {
        match serde_json::to_value(value) {
            Ok(json) => {
                self.values.insert(key.to_string(), json);
            }
            Err(e) => log::warn!("dropping unserializable config value {}: {}", key, e),
        }
    }

    pub fn get_value<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let json = self.values.get(key)?;
        serde_json::from_value(json.clone()).ok()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
