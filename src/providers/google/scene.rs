//! Google-style scene model: markers with snippets, polylines and a single
//! tile overlay on a camera that fits bounds in a pixel viewport.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::core::bounds::LatLngBounds;
use crate::core::constants::{INITIAL_CENTER, INITIAL_ZOOM, MAX_ZOOM};
use crate::core::geo::LatLng;
use crate::map::MarkerIcon;
use crate::tiles::source::TileSource;

pub const MAP_TYPE_NONE: i64 = 0;
pub const MAP_TYPE_NORMAL: i64 = 1;
pub const MAP_TYPE_SATELLITE: i64 = 2;
pub const MAP_TYPE_TERRAIN: i64 = 3;
pub const MAP_TYPE_HYBRID: i64 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MarkerId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PolylineId(u64);

#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub position: LatLng,
    /// Free text shown under the title; the adapter keeps `"alt;sd"` here.
    pub snippet: Option<String>,
    pub draggable: bool,
    /// Anchor as fractions of the icon size
    pub anchor: (f32, f32),
    pub icon: MarkerIcon,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Polyline {
    pub points: Vec<LatLng>,
    pub clickable: bool,
    pub color: u32,
    pub width: f32,
}

pub struct TileOverlay {
    pub provider: Arc<dyn TileSource>,
    pub z_index: f32,
}

impl fmt::Debug for TileOverlay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TileOverlay")
            .field("content_type", &self.provider.content_type())
            .field("z_index", &self.z_index)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraPosition {
    pub target: LatLng,
    pub zoom: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CameraUpdate {
    NewLatLng(LatLng),
    NewLatLngZoom(LatLng, f64),
    NewLatLngBounds(LatLngBounds),
}

/// Vendor-level interaction events, in the shape a view toolkit reports them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GoogleMapEvent {
    MapClick(LatLng),
    MapLongClick(LatLng),
    MarkerClick(MarkerId),
    PolylineClick(PolylineId),
    MarkerDragStart(MarkerId, LatLng),
    MarkerDrag(MarkerId, LatLng),
    MarkerDragEnd(MarkerId, LatLng),
}

#[derive(Debug)]
pub struct GoogleMap {
    map_type: i64,
    camera: CameraPosition,
    last_move_animated: bool,
    viewport: (f64, f64),
    markers: BTreeMap<MarkerId, Marker>,
    polylines: BTreeMap<PolylineId, Polyline>,
    tile_overlay: Option<TileOverlay>,
    next_object_id: u64,
}

impl GoogleMap {
    pub fn new(viewport: (f64, f64)) -> Self {
        Self {
            map_type: MAP_TYPE_NORMAL,
            camera: CameraPosition {
                target: LatLng::from(INITIAL_CENTER),
                zoom: INITIAL_ZOOM,
            },
            last_move_animated: false,
            viewport,
            markers: BTreeMap::new(),
            polylines: BTreeMap::new(),
            tile_overlay: None,
            next_object_id: 1,
        }
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_object_id;
        self.next_object_id += 1;
        id
    }

    pub fn map_type(&self) -> i64 {
        self.map_type
    }

    pub fn set_map_type(&mut self, map_type: i64) {
        self.map_type = map_type;
    }

    pub fn camera_position(&self) -> CameraPosition {
        self.camera
    }

    pub fn last_move_animated(&self) -> bool {
        self.last_move_animated
    }

    pub fn move_camera(&mut self, update: CameraUpdate, animate: bool) {
        self.camera = match update {
            CameraUpdate::NewLatLng(target) => CameraPosition {
                target,
                zoom: self.camera.zoom,
            },
            CameraUpdate::NewLatLngZoom(target, zoom) => CameraPosition {
                target,
                zoom: zoom.clamp(0.0, MAX_ZOOM),
            },
            CameraUpdate::NewLatLngBounds(bounds) => CameraPosition {
                target: bounds.center(),
                zoom: bounds.zoom_to_fit(self.viewport),
            },
        };
        self.last_move_animated = animate;
        log::debug!(
            "camera at {:?} zoom {:.2}",
            self.camera.target,
            self.camera.zoom
        );
    }

    pub fn add_marker(&mut self, marker: Marker) -> MarkerId {
        let id = MarkerId(self.next_id());
        self.markers.insert(id, marker);
        id
    }

    pub fn marker(&self, id: MarkerId) -> Option<&Marker> {
        self.markers.get(&id)
    }

    pub fn marker_mut(&mut self, id: MarkerId) -> Option<&mut Marker> {
        self.markers.get_mut(&id)
    }

    pub fn remove_marker(&mut self, id: MarkerId) -> Option<Marker> {
        self.markers.remove(&id)
    }

    pub fn markers(&self) -> impl Iterator<Item = (MarkerId, &Marker)> {
        self.markers.iter().map(|(id, marker)| (*id, marker))
    }

    pub fn add_polyline(&mut self, polyline: Polyline) -> PolylineId {
        let id = PolylineId(self.next_id());
        self.polylines.insert(id, polyline);
        id
    }

    pub fn polyline(&self, id: PolylineId) -> Option<&Polyline> {
        self.polylines.get(&id)
    }

    pub fn set_polyline_points(&mut self, id: PolylineId, points: Vec<LatLng>) {
        if let Some(polyline) = self.polylines.get_mut(&id) {
            polyline.points = points;
        }
    }

    pub fn remove_polyline(&mut self, id: PolylineId) -> Option<Polyline> {
        self.polylines.remove(&id)
    }

    pub fn polylines(&self) -> impl Iterator<Item = (PolylineId, &Polyline)> {
        self.polylines.iter().map(|(id, polyline)| (*id, polyline))
    }

    pub fn set_tile_overlay(&mut self, overlay: Option<TileOverlay>) {
        self.tile_overlay = overlay;
    }

    pub fn tile_overlay(&self) -> Option<&TileOverlay> {
        self.tile_overlay.as_ref()
    }
}
