//! Persisted key/value settings consumed by configurators and the map provider

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::path::Path;
use std::rc::Rc;

use crate::{MapError, Result};

/// Active basemap source id.
pub const KEY_BASEMAP_SOURCE: &str = "basemap_source";
/// Google map type.
pub const KEY_GOOGLE_MAP_STYLE: &str = "google_map_style";
/// Mapbox style URL.
pub const KEY_MAPBOX_MAP_STYLE: &str = "mapbox_map_style";
/// USGS layer option id.
pub const KEY_USGS_MAP_STYLE: &str = "usgs_map_style";
/// Carto layer option id.
pub const KEY_CARTO_MAP_STYLE: &str = "carto_map_style";
/// Path of the `.mbtiles` archive drawn over the basemap.
pub const KEY_REFERENCE_LAYER: &str = "reference_layer";

/// Handle returned by `register_change_listener`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Called with the changed key after every write.
pub type SettingsListener = Rc<dyn Fn(&str)>;

/// The settings store the map layer reads through.
pub trait Settings {
    fn get_string(&self, key: &str) -> Option<String>;

    /// Writes `value`, or removes the key when `None`. Listeners are notified
    /// synchronously, after the write is visible.
    fn put_string(&self, key: &str, value: Option<&str>);

    fn register_change_listener(&self, listener: SettingsListener) -> ListenerId;

    fn unregister_change_listener(&self, id: ListenerId);
}

/// Settings held in memory, optionally loaded from and saved to a JSON file.
#[derive(Default)]
pub struct InMemorySettings {
    values: RefCell<BTreeMap<String, String>>,
    listeners: RefCell<Vec<(ListenerId, SettingsListener)>>,
    next_listener_id: Cell<u64>,
}

impl InMemorySettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_values<I, K, V>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let settings = Self::new();
        settings.values.replace(
            values
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        settings
    }

    /// Reads a flat JSON object of string values.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(MapError::Io)?;
        let root: serde_json::Value =
            serde_json::from_str(&text).map_err(MapError::Serialization)?;
        let object = root.as_object().ok_or_else(|| {
            MapError::Settings(format!("{} does not hold a JSON object", path.display()))
        })?;

        let mut values = BTreeMap::new();
        for (key, value) in object {
            match value {
                serde_json::Value::String(value) => {
                    values.insert(key.clone(), value.clone());
                }
                serde_json::Value::Null => {}
                other => {
                    return Err(MapError::Settings(format!(
                        "setting {} must be a string, found {}",
                        key, other
                    ))
                    .into())
                }
            }
        }
        log::debug!("loaded {} settings from {}", values.len(), path.display());
        Ok(Self::with_values(values))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(&*self.values.borrow())
            .map_err(MapError::Serialization)?;
        std::fs::write(path, text).map_err(MapError::Io)?;
        Ok(())
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }
}

impl Settings for InMemorySettings {
    fn get_string(&self, key: &str) -> Option<String> {
        self.values.borrow().get(key).cloned()
    }

    fn put_string(&self, key: &str, value: Option<&str>) {
        {
            let mut values = self.values.borrow_mut();
            match value {
                Some(value) => values.insert(key.to_string(), value.to_string()),
                None => values.remove(key),
            };
        }

        // Listeners may read or write settings, so nothing stays borrowed.
        let listeners: Vec<SettingsListener> = self
            .listeners
            .borrow()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in listeners {
            listener(key);
        }
    }

    fn register_change_listener(&self, listener: SettingsListener) -> ListenerId {
        let id = ListenerId(self.next_listener_id.get());
        self.next_listener_id.set(id.0 + 1);
        self.listeners.borrow_mut().push((id, listener));
        id
    }

    fn unregister_change_listener(&self, id: ListenerId) {
        self.listeners.borrow_mut().retain(|(lid, _)| *lid != id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_and_remove() {
        let settings = InMemorySettings::new();
        settings.put_string(KEY_BASEMAP_SOURCE, Some("osm"));
        assert_eq!(settings.get_string(KEY_BASEMAP_SOURCE).as_deref(), Some("osm"));
        settings.put_string(KEY_BASEMAP_SOURCE, None);
        assert_eq!(settings.get_string(KEY_BASEMAP_SOURCE), None);
    }

    #[test]
    fn test_listeners_see_new_value() {
        let settings = Rc::new(InMemorySettings::new());
        let seen = Rc::new(RefCell::new(Vec::new()));

        let weak = Rc::downgrade(&settings);
        let seen_clone = seen.clone();
        let id = settings.register_change_listener(Rc::new(move |key: &str| {
            let value = weak.upgrade().and_then(|s| s.get_string(key));
            seen_clone.borrow_mut().push((key.to_string(), value));
        }));

        settings.put_string(KEY_REFERENCE_LAYER, Some("/a.mbtiles"));
        settings.unregister_change_listener(id);
        settings.put_string(KEY_REFERENCE_LAYER, Some("/b.mbtiles"));

        assert_eq!(
            *seen.borrow(),
            vec![(KEY_REFERENCE_LAYER.to_string(), Some("/a.mbtiles".to_string()))]
        );
        assert_eq!(settings.listener_count(), 0);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let settings = InMemorySettings::with_values([(KEY_CARTO_MAP_STYLE, "dark_matter")]);
        settings.save(&path).unwrap();

        let loaded = InMemorySettings::load(&path).unwrap();
        assert_eq!(
            loaded.get_string(KEY_CARTO_MAP_STYLE).as_deref(),
            Some("dark_matter")
        );
    }

    #[test]
    fn test_load_rejects_non_string_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"basemap_source": 3}"#).unwrap();

        let err = InMemorySettings::load(&path).err().unwrap();
        assert!(err.to_string().contains("basemap_source"));
    }
}
