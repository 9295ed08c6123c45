use std::collections::BTreeSet;
use std::path::Path;
use std::rc::Rc;

use super::fragment::{OsmMapFragment, KEY_WEB_MAP_SERVICE};
use crate::context::MapContext;
use crate::core::config::{self, ConfigBundle};
use crate::map::MapFragment;
use crate::providers::{selected_value, MapConfigurator, Preference};
use crate::settings::{self, Settings};
use crate::tiles::mbtiles::{LayerType, MbtilesFile};
use crate::tiles::web_map_service::WebMapService;

/// One named web map service a user can pick.
#[derive(Debug, Clone, PartialEq)]
pub struct WmsOption {
    pub id: String,
    pub label: String,
    pub service: WebMapService,
}

impl WmsOption {
    pub fn new(id: impl Into<String>, label: impl Into<String>, service: WebMapService) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            service,
        }
    }
}

const OSM_ATTRIBUTION: &str = "© OpenStreetMap contributors";
const USGS_ATTRIBUTION: &str =
    "Map services and data available from U.S. Geological Survey, National Geospatial Program.";
const STAMEN_ATTRIBUTION: &str =
    "Map tiles by Stamen Design, under CC BY 3.0. Data by OpenStreetMap, under ODbL.";
const CARTO_ATTRIBUTION: &str = "© CARTO © OpenStreetMap contributors";

fn mirrors(template: &str, subdomains: &[&str]) -> Vec<String> {
    subdomains
        .iter()
        .map(|sub| template.replace("{s}", sub))
        .collect()
}

fn usgs_service(name: &str, layer: &str) -> WebMapService {
    WebMapService::new(
        name,
        0,
        18,
        256,
        USGS_ATTRIBUTION,
        [format!(
            "https://basemap.nationalmap.gov/arcgis/rest/services/{}/MapServer/tile/{{z}}/{{y}}/{{x}}",
            layer
        )],
    )
}

fn carto_service(name: &str, style: &str) -> WebMapService {
    WebMapService::new(
        name,
        0,
        18,
        256,
        CARTO_ATTRIBUTION,
        mirrors(
            &format!("https://{{s}}.basemaps.cartocdn.com/{}/{{z}}/{{x}}/{{y}}.png", style),
            &["a", "b", "c", "d"],
        ),
    )
}

/// Configures OSMDroid maps drawing one of a fixed set of web map services.
pub struct OsmDroidMapConfigurator {
    /// Absent when there is only one service to choose
    pref_key: Option<String>,
    source_label: String,
    options: Vec<WmsOption>,
}

impl OsmDroidMapConfigurator {
    /// A configurator with no style choice.
    pub fn single(source_label: impl Into<String>, service: WebMapService) -> Self {
        let source_label = source_label.into();
        Self {
            pref_key: None,
            options: vec![WmsOption::new("default", source_label.clone(), service)],
            source_label,
        }
    }

    pub fn with_options(
        pref_key: impl Into<String>,
        source_label: impl Into<String>,
        options: Vec<WmsOption>,
    ) -> Self {
        Self {
            pref_key: Some(pref_key.into()),
            source_label: source_label.into(),
            options,
        }
    }

    pub fn openstreetmap() -> Self {
        Self::single(
            "OpenStreetMap",
            WebMapService::new(
                "Mapnik",
                0,
                19,
                256,
                OSM_ATTRIBUTION,
                mirrors(
                    "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png",
                    &["a", "b", "c"],
                ),
            ),
        )
    }

    pub fn usgs() -> Self {
        Self::with_options(
            settings::KEY_USGS_MAP_STYLE,
            "USGS",
            vec![
                WmsOption::new(
                    "topographic",
                    "Topographic",
                    usgs_service("USGS Topographic", "USGSTopo"),
                ),
                WmsOption::new(
                    "hybrid",
                    "Hybrid",
                    usgs_service("USGS Hybrid", "USGSImageryTopo"),
                ),
                WmsOption::new(
                    "satellite",
                    "Satellite",
                    usgs_service("USGS Satellite", "USGSImageryOnly"),
                ),
            ],
        )
    }

    pub fn stamen() -> Self {
        Self::single(
            "Stamen",
            WebMapService::new(
                "Stamen Terrain",
                0,
                18,
                256,
                STAMEN_ATTRIBUTION,
                mirrors(
                    "https://stamen-tiles-{s}.a.ssl.fastly.net/terrain/{z}/{x}/{y}.jpg",
                    &["a", "b", "c", "d"],
                ),
            ),
        )
    }

    pub fn carto() -> Self {
        Self::with_options(
            settings::KEY_CARTO_MAP_STYLE,
            "Carto",
            vec![
                WmsOption::new(
                    "positron",
                    "Positron",
                    carto_service("Carto Positron", "light_all"),
                ),
                WmsOption::new(
                    "dark_matter",
                    "Dark Matter",
                    carto_service("Carto Dark Matter", "dark_all"),
                ),
            ],
        )
    }

    pub fn options(&self) -> &[WmsOption] {
        &self.options
    }

    /// The option the settings select, falling back to the first.
    pub fn selected_option(&self, settings: &dyn Settings) -> Option<&WmsOption> {
        let first = self.options.first()?;
        let Some(key) = &self.pref_key else {
            return Some(first);
        };
        let id = selected_value(
            settings,
            key,
            self.options.iter().map(|option| option.id.as_str()),
            &first.id,
        );
        self.options.iter().find(|option| option.id == id)
    }
}

impl MapConfigurator for OsmDroidMapConfigurator {
    fn is_available(&self, _context: &dyn MapContext) -> bool {
        true
    }

    fn show_unavailable_message(&self, context: &dyn MapContext) {
        context.show_message(&format!("{} maps could not be started.", self.source_label));
    }

    fn create_map_fragment(&self, context: &Rc<dyn MapContext>) -> Option<Rc<dyn MapFragment>> {
        Some(Rc::new(OsmMapFragment::new(context.clone())))
    }

    fn create_prefs(&self, _context: &dyn MapContext) -> Vec<Preference> {
        let Some(key) = &self.pref_key else {
            return Vec::new();
        };
        if self.options.len() < 2 {
            return Vec::new();
        }
        vec![Preference::list(
            key,
            &format!("{} map style", self.source_label),
            self.options
                .iter()
                .map(|option| (option.label.as_str(), option.id.as_str())),
            &self.options[0].id,
        )]
    }

    fn pref_keys(&self) -> BTreeSet<String> {
        self.pref_key
            .iter()
            .cloned()
            .chain([settings::KEY_REFERENCE_LAYER.to_string()])
            .collect()
    }

    fn build_config(&self, settings: &dyn Settings) -> ConfigBundle {
        let mut bundle = ConfigBundle::new();
        if let Some(option) = self.selected_option(settings) {
            bundle.put_value(KEY_WEB_MAP_SERVICE, &option.service);
        }
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
