//! Prelude module for common fieldmap types and traits
//!
//! `use fieldmap::prelude::*;` brings in what a map screen needs to create a
//! fragment, drive it and listen to it.

pub use crate::core::{
    bounds::LatLngBounds,
    config::ConfigBundle,
    constants::{INITIAL_CENTER, INITIAL_ZOOM, POINT_ZOOM},
    geo::{LatLng, TileCoord},
    point::MapPoint,
};

pub use crate::context::{DeviceProfile, Location, LocationClient, LocationSink, MapContext};

pub use crate::map::{
    ErrorListener, FeatureId, FeatureListener, IconAnchor, MainLooper, MapFragment, MapHost,
    MarkerIcon, PointListener, ReadyListener,
};

pub use crate::map_provider::{MapProvider, SourceOption};

pub use crate::providers::{MapConfigurator, Preference, PreferenceEntry};

pub use crate::reference_layers::{ReferenceLayer, ReferenceLayerRepository};

pub use crate::settings::{InMemorySettings, Settings};

pub use crate::tiles::{LayerType, MbtilesFile, TileHttpServer, TileSource, WebMapService};

pub use crate::{MapError, Result};
