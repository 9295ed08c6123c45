//! Vendor adapters behind the `MapFragment` contract
//!
//! Each family (Google, Mapbox, OSMDroid) has a configurator that decides
//! whether the family can run, which settings it reads and how they become a
//! `ConfigBundle`, plus a fragment that owns the vendor scene model.

pub mod google;
pub mod mapbox;
pub mod osm;

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use std::rc::Rc;

use crate::context::MapContext;
use crate::core::config::ConfigBundle;
use crate::map::MapFragment;
use crate::settings::Settings;
use crate::tiles::mbtiles::MbtilesFile;

/// One choice in a list preference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreferenceEntry {
    pub label: String,
    pub value: String,
}

/// A settings widget contributed by a configurator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Preference {
    List {
        key: String,
        title: String,
        entries: Vec<PreferenceEntry>,
        default_value: String,
    },
}

impl Preference {
    pub fn list<'a>(
        key: &str,
        title: &str,
        entries: impl IntoIterator<Item = (&'a str, &'a str)>,
        default_value: &str,
    ) -> Self {
        Preference::List {
            key: key.to_string(),
            title: title.to_string(),
            entries: entries
                .into_iter()
                .map(|(label, value)| PreferenceEntry {
                    label: label.to_string(),
                    value: value.to_string(),
                })
                .collect(),
            default_value: default_value.to_string(),
        }
    }

    pub fn key(&self) -> &str {
        match self {
            Preference::List { key, .. } => key,
        }
    }
}

/// Decides whether a map family can run and how settings configure it.
///
/// Availability checks never fail loudly: they answer `false` or `None` and
/// leave the user message to `show_unavailable_message`.
pub trait MapConfigurator {
    fn is_available(&self, context: &dyn MapContext) -> bool;

    fn show_unavailable_message(&self, context: &dyn MapContext);

    /// Creates a fragment, or `None` if the family cannot run after all.
    fn create_map_fragment(&self, context: &Rc<dyn MapContext>) -> Option<Rc<dyn MapFragment>>;

    /// Style pickers for this family; empty when there is nothing to choose.
    fn create_prefs(&self, context: &dyn MapContext) -> Vec<Preference>;

    /// Settings keys whose changes require `apply_config`.
    fn pref_keys(&self) -> BTreeSet<String>;

    fn build_config(&self, settings: &dyn Settings) -> ConfigBundle;

    /// Whether `path` can be drawn as a reference layer by this family.
    fn supports_layer(&self, path: &Path) -> bool;

    /// The archive's `name` metadata, or its file name.
    fn display_name(&self, path: &Path) -> String {
        MbtilesFile::read_name(path).unwrap_or_else(|| {
            path.file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default()
        })
    }
}

/// The stored value of `key`, or `fallback` when unset or not one of `allowed`.
pub(crate) fn selected_value<'a>(
    settings: &dyn Settings,
    key: &str,
    allowed: impl IntoIterator<Item = &'a str>,
    fallback: &'a str,
) -> String {
    match settings.get_string(key) {
        Some(value) if allowed.into_iter().any(|v| v == value) => value,
        _ => fallback.to_string(),
    }
}
