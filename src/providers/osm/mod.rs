pub mod configurator;
pub mod fragment;
pub mod scene;

pub use configurator::{OsmDroidMapConfigurator, WmsOption};
pub use fragment::{OsmMapFragment, KEY_WEB_MAP_SERVICE};
pub use scene::{GeoPoint, MapView, OsmMapEvent, Overlay, OverlayId};
