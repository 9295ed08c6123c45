use std::collections::BTreeSet;
use std::path::Path;
use std::rc::Rc;

use super::fragment::{MapboxMapFragment, DEFAULT_STYLE_URL, KEY_STYLE_URL};
use crate::context::MapContext;
use crate::core::config::{self, ConfigBundle};
use crate::map::MapFragment;
use crate::providers::{selected_value, MapConfigurator, Preference};
use crate::settings::{self, Settings};
use crate::tiles::mbtiles::MbtilesFile;

/// A selectable Mapbox style.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapboxUrlOption {
    pub url: String,
    pub label: String,
}

impl MapboxUrlOption {
    pub fn new(url: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            label: label.into(),
        }
    }
}

pub struct MapboxMapConfigurator {
    pref_key: String,
    source_label: String,
    options: Vec<MapboxUrlOption>,
}

impl MapboxMapConfigurator {
    pub fn new(
        pref_key: impl Into<String>,
        source_label: impl Into<String>,
        options: Vec<MapboxUrlOption>,
    ) -> Self {
        Self {
            pref_key: pref_key.into(),
            source_label: source_label.into(),
            options,
        }
    }

    pub fn standard() -> Self {
        Self::new(
            settings::KEY_MAPBOX_MAP_STYLE,
            "Mapbox",
            vec![
                MapboxUrlOption::new(DEFAULT_STYLE_URL, "Streets"),
                MapboxUrlOption::new("mapbox://styles/mapbox/light-v10", "Light"),
                MapboxUrlOption::new("mapbox://styles/mapbox/dark-v10", "Dark"),
                MapboxUrlOption::new("mapbox://styles/mapbox/satellite-v9", "Satellite"),
                MapboxUrlOption::new(
                    "mapbox://styles/mapbox/satellite-streets-v11",
                    "Satellite Streets",
                ),
                MapboxUrlOption::new("mapbox://styles/mapbox/outdoors-v11", "Outdoors"),
            ],
        )
    }

    pub fn options(&self) -> &[MapboxUrlOption] {
        &self.options
    }

    fn default_url(&self) -> &str {
        self.options
            .first()
            .map(|option| option.url.as_str())
            .unwrap_or(DEFAULT_STYLE_URL)
    }
}

impl MapConfigurator for MapboxMapConfigurator {
    fn is_available(&self, context: &dyn MapContext) -> bool {
        context.mapbox_access_token().is_some()
    }

    fn show_unavailable_message(&self, context: &dyn MapContext) {
        context.show_message(&format!(
            "{} maps need an access token. Add one to the device profile to use them.",
            self.source_label
        ));
    }

    fn create_map_fragment(&self, context: &Rc<dyn MapContext>) -> Option<Rc<dyn MapFragment>> {
        if !self.is_available(context.as_ref()) {
            return None;
        }
        Some(Rc::new(MapboxMapFragment::new(context.clone())))
    }

    fn create_prefs(&self, _context: &dyn MapContext) -> Vec<Preference> {
        if self.options.len() < 2 {
            return Vec::new();
        }
        vec![Preference::list(
            &self.pref_key,
            &format!("{} map style", self.source_label),
            self.options
                .iter()
                .map(|option| (option.label.as_str(), option.url.as_str())),
            self.default_url(),
        )]
    }

    fn pref_keys(&self) -> BTreeSet<String> {
        [self.pref_key.clone(), settings::KEY_REFERENCE_LAYER.to_string()]
            .into_iter()
            .collect()
    }

    fn build_config(&self, settings: &dyn Settings) -> ConfigBundle {
        let url = selected_value(
            settings,
            &self.pref_key,
            self.options.iter().map(|option| option.url.as_str()),
            self.default_url(),
        );

        let mut bundle = ConfigBundle::new();
        bundle.put_string(KEY_STYLE_URL, url);
        bundle.put_optional_string(
            config::KEY_REFERENCE_LAYER,
            settings.get_string(settings::KEY_REFERENCE_LAYER),
        );
        bundle
    }

    /// Raster and vector archives can both be drawn.
    fn supports_layer(&self, path: &Path) -> bool {
        MbtilesFile::read_layer_type(path).is_some()
    }
}
