pub mod configurator;
pub mod fragment;
pub mod scene;

pub use configurator::{GoogleMapConfigurator, GoogleMapTypeOption};
pub use fragment::{GoogleMapFragment, KEY_MAP_TYPE};
pub use scene::{GoogleMap, GoogleMapEvent, MarkerId, PolylineId};
