use std::collections::BTreeSet;
use std::path::Path;
use std::rc::Rc;

use super::fragment::{GoogleMapFragment, KEY_MAP_TYPE};
use super::scene::{MAP_TYPE_HYBRID, MAP_TYPE_NORMAL, MAP_TYPE_SATELLITE, MAP_TYPE_TERRAIN};
use crate::context::MapContext;
use crate::core::config::{self, ConfigBundle};
use crate::map::MapFragment;
use crate::providers::{selected_value, MapConfigurator, Preference};
use crate::settings::{self, Settings};
use crate::tiles::mbtiles::{LayerType, MbtilesFile};

/// A selectable Google map type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleMapTypeOption {
    pub map_type: i64,
    pub label: String,
}

impl GoogleMapTypeOption {
    pub fn new(map_type: i64, label: impl Into<String>) -> Self {
        Self {
            map_type,
            label: label.into(),
        }
    }
}

pub struct GoogleMapConfigurator {
    pref_key: String,
    source_label: String,
    options: Vec<GoogleMapTypeOption>,
}

impl GoogleMapConfigurator {
    pub fn new(
        pref_key: impl Into<String>,
        source_label: impl Into<String>,
        options: Vec<GoogleMapTypeOption>,
    ) -> Self {
        Self {
            pref_key: pref_key.into(),
            source_label: source_label.into(),
            options,
        }
    }

    /// Streets, terrain, hybrid and satellite under the standard style key.
    pub fn standard() -> Self {
        Self::new(
            settings::KEY_GOOGLE_MAP_STYLE,
            "Google",
            vec![
                GoogleMapTypeOption::new(MAP_TYPE_NORMAL, "Streets"),
                GoogleMapTypeOption::new(MAP_TYPE_TERRAIN, "Terrain"),
                GoogleMapTypeOption::new(MAP_TYPE_HYBRID, "Hybrid"),
                GoogleMapTypeOption::new(MAP_TYPE_SATELLITE, "Satellite"),
            ],
        )
    }

    pub fn options(&self) -> &[GoogleMapTypeOption] {
        &self.options
    }

    fn default_map_type(&self) -> i64 {
        self.options
            .first()
            .map(|option| option.map_type)
            .unwrap_or(MAP_TYPE_NORMAL)
    }
}

impl MapConfigurator for GoogleMapConfigurator {
    fn is_available(&self, context: &dyn MapContext) -> bool {
        let (major, _) = context.gles_version();
        context.play_services_available() && major >= 2
    }

    fn show_unavailable_message(&self, context: &dyn MapContext) {
        let message = if !context.play_services_available() {
            format!(
                "{} maps require Google Play Services, which are not available on this device.",
                self.source_label
            )
        } else {
            format!(
                "{} maps require OpenGL ES 2.0, which this device does not support.",
                self.source_label
            )
        };
        context.show_message(&message);
    }

    fn create_map_fragment(&self, context: &Rc<dyn MapContext>) -> Option<Rc<dyn MapFragment>> {
        if !self.is_available(context.as_ref()) {
            return None;
        }
        Some(Rc::new(GoogleMapFragment::new(context.clone())))
    }

    fn create_prefs(&self, _context: &dyn MapContext) -> Vec<Preference> {
        if self.options.len() < 2 {
            return Vec::new();
        }
        let values: Vec<String> = self
            .options
            .iter()
            .map(|option| option.map_type.to_string())
            .collect();
        vec![Preference::list(
            &self.pref_key,
            &format!("{} map style", self.source_label),
            self.options
                .iter()
                .zip(&values)
                .map(|(option, value)| (option.label.as_str(), value.as_str())),
            &self.default_map_type().to_string(),
        )]
    }

    fn pref_keys(&self) -> BTreeSet<String> {
        [self.pref_key.clone(), settings::KEY_REFERENCE_LAYER.to_string()]
            .into_iter()
            .collect()
    }

    fn build_config(&self, settings: &dyn Settings) -> ConfigBundle {
        let values: Vec<String> = self
            .options
            .iter()
            .map(|option| option.map_type.to_string())
            .collect();
        let fallback = self.default_map_type().to_string();
        let map_type = selected_value(
            settings,
            &self.pref_key,
            values.iter().map(String::as_str),
            &fallback,
        )
        .parse()
        .unwrap_or(MAP_TYPE_NORMAL);

        let mut bundle = ConfigBundle::new();
        bundle.put_int(KEY_MAP_TYPE, map_type);
        bundle.put_optional_string(
            config::KEY_REFERENCE_LAYER,
            settings.get_string(settings::KEY_REFERENCE_LAYER),
        );
        bundle
    }

    fn supports_layer(&self, path: &Path) -> bool {
        MbtilesFile::read_layer_type(path) == Some(LayerType::Raster)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::DeviceProfile;
    use crate::settings::InMemorySettings;

    #[test]
    fn test_availability_needs_play_services_and_gles2() {
        let configurator = GoogleMapConfigurator::standard();
        let mut device = DeviceProfile {
            play_services: true,
            gles_version: (2, 0),
            ..DeviceProfile::default()
        };
        assert!(configurator.is_available(&device));

        device.gles_version = (1, 1);
        assert!(!configurator.is_available(&device));

        device.gles_version = (3, 2);
        device.play_services = false;
        assert!(!configurator.is_available(&device));
    }

    #[test]
    fn test_build_config_reads_map_type() {
        let configurator = GoogleMapConfigurator::standard();
        let settings = InMemorySettings::with_values([
            (settings::KEY_GOOGLE_MAP_STYLE, "4"),
            (settings::KEY_REFERENCE_LAYER, "/maps/roads.mbtiles"),
        ]);

        let bundle = configurator.build_config(&settings);
        assert_eq!(bundle.get_int(KEY_MAP_TYPE), Some(MAP_TYPE_HYBRID));
        assert_eq!(
            bundle.get_string(config::KEY_REFERENCE_LAYER).as_deref(),
            Some("/maps/roads.mbtiles")
        );
    }

    #[test]
    fn test_unknown_map_type_uses_first_option() {
        let configurator = GoogleMapConfigurator::standard();
        let settings = InMemorySettings::with_values([(settings::KEY_GOOGLE_MAP_STYLE, "99")]);
        let bundle = configurator.build_config(&settings);
        assert_eq!(bundle.get_int(KEY_MAP_TYPE), Some(MAP_TYPE_NORMAL));
        assert!(!bundle.contains_key(config::KEY_REFERENCE_LAYER));
    }

    #[test]
    fn test_prefs_and_keys() {
        let configurator = GoogleMapConfigurator::standard();
        let prefs = configurator.create_prefs(&DeviceProfile::default());
        assert_eq!(prefs.len(), 1);
        assert_eq!(prefs[0].key(), settings::KEY_GOOGLE_MAP_STYLE);

        let keys = configurator.pref_keys();
        assert!(keys.contains(settings::KEY_REFERENCE_LAYER));
        assert!(keys.contains(settings::KEY_GOOGLE_MAP_STYLE));
    }

    #[test]
    fn test_display_name_falls_back_to_file_name() {
        let configurator = GoogleMapConfigurator::standard();
        assert_eq!(
            configurator.display_name(Path::new("/nowhere/parcels.mbtiles")),
            "parcels.mbtiles"
        );
    }
}
