//! The provider-neutral map contract
//!
//! Everything a form widget does with a map goes through [`MapFragment`]. An
//! adapter owns one vendor scene, keeps its own feature ids, and reports user
//! interaction back through the listeners set here. All of it runs on the
//! main thread: adapters are `Rc` handles and asynchronous steps are posted
//! to the host's [`MainLooper`].

pub mod camera;
pub mod features;
pub mod gps;
pub mod host;

pub use camera::{bounding_box_target, BoundingBoxTarget};
pub use features::FeatureTable;
pub use gps::GpsTracker;
pub use host::{MainLooper, MapHost};

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::core::config::ConfigBundle;
use crate::core::constants::POINT_ZOOM;
use crate::core::point::MapPoint;

/// Identifies a feature within one fragment. Ids start at 1 and are never
/// reused until `clear_features` resets the counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FeatureId(u32);

impl FeatureId {
    pub(crate) const fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Which point of a marker image sits on the marker's coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum IconAnchor {
    #[default]
    Center,
    Bottom,
}

impl IconAnchor {
    /// Anchor position as fractions of the icon's width and height.
    pub fn fractions(self) -> (f32, f32) {
        match self {
            IconAnchor::Center => (0.5, 0.5),
            IconAnchor::Bottom => (0.5, 1.0),
        }
    }
}

/// Marker image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MarkerIcon {
    #[default]
    Default,
    Highlighted,
    /// Host-supplied drawable resource
    Resource(u32),
    /// The current-location indicator
    Crosshairs,
}

/// Called once when a fragment's map becomes ready.
pub type ReadyListener = Box<dyn FnOnce(Rc<dyn MapFragment>)>;
/// Called when a fragment cannot bring up its map.
pub type ErrorListener = Box<dyn FnOnce()>;
pub type PointListener = Rc<dyn Fn(MapPoint)>;
pub type FeatureListener = Rc<dyn Fn(FeatureId)>;

/// Lifecycle of an adapter's map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentState {
    Unattached,
    /// Added to a container, waiting for the vendor map
    Attaching,
    Ready,
    Detached,
}

/// User-interaction listeners, all optional.
#[derive(Clone, Default)]
pub struct ListenerSlots {
    pub click: Option<PointListener>,
    pub long_press: Option<PointListener>,
    pub feature_click: Option<FeatureListener>,
    pub drag_end: Option<FeatureListener>,
    pub gps_location: Option<PointListener>,
}

static NEXT_INSTANCE_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_instance_id() -> u64 {
    NEXT_INSTANCE_ID.fetch_add(1, Ordering::Relaxed)
}

/// A map that form widgets can draw on, regardless of vendor.
///
/// Before the ready listener passed to [`MapFragment::add_to`] fires, reads
/// return the initial camera and writes are ignored.
pub trait MapFragment {
    /// Process-unique id of this adapter instance.
    fn instance_id(&self) -> u64;

    /// Attaches the map to `container_id` in `host`. Exactly one of `ready`
    /// or `error` is invoked later, from the host's looper.
    fn add_to(
        &self,
        host: &MapHost,
        container_id: &str,
        ready: ReadyListener,
        error: Option<ErrorListener>,
    );

    /// Applies provider settings produced by a configurator.
    fn apply_config(&self, config: &ConfigBundle);

    fn on_resume(&self);

    fn on_pause(&self);

    fn on_destroy(&self);

    fn center(&self) -> MapPoint;

    fn zoom(&self) -> f64;

    fn set_center(&self, center: MapPoint, animate: bool);

    /// Centers on `center` at the standard point zoom.
    fn zoom_to_point(&self, center: MapPoint, animate: bool) {
        self.zoom_to_point_at(center, POINT_ZOOM, animate);
    }

    fn zoom_to_point_at(&self, center: MapPoint, zoom: f64, animate: bool);

    /// Fits the camera around `points`, leaving a margin that grows as
    /// `scale_factor` shrinks (0.8 leaves 25% around the box).
    fn zoom_to_bounding_box(&self, points: &[MapPoint], scale_factor: f64, animate: bool);

    /// Adds a marker and returns its id, or `None` if the map isn't ready.
    fn add_marker(&self, point: MapPoint, draggable: bool, anchor: IconAnchor) -> Option<FeatureId>;

    fn set_marker_icon(&self, feature: FeatureId, icon: MarkerIcon);

    fn marker_point(&self, feature: FeatureId) -> Option<MapPoint>;

    /// Adds a polyline (or polygon when `closed`) with draggable vertices.
    fn add_draggable_poly(&self, points: &[MapPoint], closed: bool) -> Option<FeatureId>;

    fn append_point_to_poly(&self, feature: FeatureId, point: MapPoint);

    fn remove_poly_last_point(&self, feature: FeatureId);

    /// Vertices of a poly feature; empty for unknown ids and markers.
    fn poly_points(&self, feature: FeatureId) -> Vec<MapPoint>;

    fn remove_feature(&self, feature: FeatureId);

    /// Removes every feature and restarts ids at 1.
    fn clear_features(&self);

    fn set_click_listener(&self, listener: Option<PointListener>);

    fn set_long_press_listener(&self, listener: Option<PointListener>);

    fn set_feature_click_listener(&self, listener: Option<FeatureListener>);

    fn set_drag_end_listener(&self, listener: Option<FeatureListener>);

    fn set_gps_location_listener(&self, listener: Option<PointListener>);

    fn set_gps_location_enabled(&self, enabled: bool);

    /// Runs `listener` as soon as a location fix exists; immediately if one
    /// already does.
    fn run_on_gps_location_ready(&self, listener: ReadyListener);

    fn gps_location(&self) -> Option<MapPoint>;

    fn location_provider(&self) -> Option<String>;

    fn as_any(&self) -> &dyn Any;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anchor_fractions() {
        assert_eq!(IconAnchor::Center.fractions(), (0.5, 0.5));
        assert_eq!(IconAnchor::Bottom.fractions(), (0.5, 1.0));
    }

    #[test]
    fn test_instance_ids_are_unique() {
        let a = next_instance_id();
        let b = next_instance_id();
        assert_ne!(a, b);
    }
}
