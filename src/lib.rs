//! # fieldmap
//!
//! A provider-neutral map layer for data-collection apps.
//!
//! Form widgets talk to a single [`MapFragment`] contract (markers, draggable
//! polylines, camera control, GPS tracking) and never to a vendor SDK. Three
//! adapters implement that contract over Google, Mapbox and OpenStreetMap
//! style scene models. [`MapProvider`] picks the adapter from the user's
//! basemap setting, and the `tiles` module reads offline MBTiles archives,
//! describes online XYZ services and re-serves local tiles over HTTP.

pub mod context;
pub mod core;
pub mod map;
pub mod map_provider;
pub mod prelude;
pub mod providers;
pub mod reference_layers;
pub mod settings;
pub mod tiles;
pub use crate::core::constants;

// Re-export public API
pub use core::{
    bounds::LatLngBounds,
    config::ConfigBundle,
    geo::{LatLng, TileCoord},
    point::MapPoint,
};

pub use context::{DeviceProfile, Location, LocationClient, MapContext};

pub use map::{FeatureId, IconAnchor, MainLooper, MapFragment, MapHost, MarkerIcon};

pub use map_provider::{MapProvider, SourceOption};

pub use providers::{
    google::{GoogleMapConfigurator, GoogleMapFragment},
    mapbox::{MapboxMapConfigurator, MapboxMapFragment},
    osm::{OsmDroidMapConfigurator, OsmMapFragment, WmsOption},
    MapConfigurator, Preference,
};

pub use reference_layers::{ReferenceLayer, ReferenceLayerRepository};

pub use settings::{InMemorySettings, Settings};

pub use tiles::{MbtilesError, MbtilesFile, TileHttpServer, WebMapService};

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Common error types
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Tile archive error: {0}")]
    Mbtiles(#[from] MbtilesError),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("Server error: {0}")]
    Server(String),
}
