use once_cell::sync::OnceCell;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::core::geo::TileCoord;
use crate::tiles::source::TileUrlSource;

/// Immutable description of a remote XYZ tile server.
///
/// Templates contain `{x}`, `{y}` and `{z}` placeholders. Several templates
/// usually point at mirror subdomains of the same service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebMapService {
    pub name: String,
    pub min_zoom: u8,
    pub max_zoom: u8,
    pub tile_size: u32,
    pub attribution: String,
    pub url_templates: Vec<String>,
    #[serde(skip)]
    tile_source: OnceCell<Arc<OnlineTileSource>>,
}

impl WebMapService {
    pub fn new<I, S>(
        name: impl Into<String>,
        min_zoom: u8,
        max_zoom: u8,
        tile_size: u32,
        attribution: impl Into<String>,
        url_templates: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            min_zoom,
            max_zoom,
            tile_size,
            attribution: attribution.into(),
            url_templates: url_templates.into_iter().map(Into::into).collect(),
            tile_source: OnceCell::new(),
        }
    }

    /// The tile source for this service, built on first use and shared after.
    pub fn as_online_tile_source(&self) -> Arc<OnlineTileSource> {
        self.tile_source
            .get_or_init(|| {
                Arc::new(OnlineTileSource {
                    name: self.name.clone(),
                    min_zoom: self.min_zoom,
                    max_zoom: self.max_zoom,
                    tile_size: self.tile_size,
                    attribution: self.attribution.clone(),
                    url_templates: self.url_templates.clone(),
                })
            })
            .clone()
    }
}

impl PartialEq for WebMapService {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.min_zoom == other.min_zoom
            && self.max_zoom == other.max_zoom
            && self.tile_size == other.tile_size
            && self.attribution == other.attribution
            && self.url_templates == other.url_templates
    }
}

/// Tile source that resolves coordinates against one of a service's
/// templates, chosen at random per request to spread load across mirrors.
#[derive(Debug, Clone, PartialEq)]
pub struct OnlineTileSource {
    pub name: String,
    pub min_zoom: u8,
    pub max_zoom: u8,
    pub tile_size: u32,
    pub attribution: String,
    url_templates: Vec<String>,
}

impl OnlineTileSource {
    pub fn url_templates(&self) -> &[String] {
        &self.url_templates
    }

    pub fn covers_zoom(&self, zoom: u8) -> bool {
        zoom >= self.min_zoom && zoom <= self.max_zoom
    }
}

impl TileUrlSource for OnlineTileSource {
    fn url(&self, coord: TileCoord) -> String {
        if self.url_templates.is_empty() {
            return String::new();
        }

        let idx = rand::rng().random_range(0..self.url_templates.len());
        expand_template(&self.url_templates[idx], coord)
    }
}

/// Substitutes `{x}`, `{y}` and `{z}` in a URL template.
pub fn expand_template(template: &str, coord: TileCoord) -> String {
    template
        .replace("{x}", &coord.x.to_string())
        .replace("{y}", &coord.y.to_string())
        .replace("{z}", &coord.z.to_string())
}
