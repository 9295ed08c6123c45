//! OSMDroid-style scene model: a map view drawing an online tile source
//! under an ordered list of overlays. Overlays later in the list draw on top.

use std::fmt;
use std::sync::Arc;

use crate::core::bounds::LatLngBounds;
use crate::core::constants::{INITIAL_CENTER, INITIAL_ZOOM, MAX_ZOOM};
use crate::core::point::MapPoint;
use crate::map::MarkerIcon;
use crate::tiles::source::TileSource;
use crate::tiles::web_map_service::OnlineTileSource;

/// Geographic point with altitude in meters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
    pub alt: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64, alt: f64) -> Self {
        Self { lat, lon, alt }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OverlayId(u64);

#[derive(Debug, Clone, PartialEq)]
pub struct OsmMarker {
    pub position: GeoPoint,
    pub sub_description: Option<String>,
    pub draggable: bool,
    pub anchor: (f32, f32),
    pub icon: MarkerIcon,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OsmPolyline {
    pub points: Vec<GeoPoint>,
    pub color: u32,
    pub width: f32,
}

pub struct TilesOverlay {
    pub provider: Arc<dyn TileSource>,
}

impl fmt::Debug for TilesOverlay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TilesOverlay")
            .field("content_type", &self.provider.content_type())
            .finish()
    }
}

#[derive(Debug)]
pub enum Overlay {
    Marker(OsmMarker),
    Polyline(OsmPolyline),
    Tiles(TilesOverlay),
    /// Current-location indicator
    MyLocation(GeoPoint),
}

/// Vendor-level interaction events.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OsmMapEvent {
    SingleTap(GeoPoint),
    LongPress(GeoPoint),
    MarkerClick(OverlayId),
    PolylineClick(OverlayId),
    MarkerDragStart(OverlayId, GeoPoint),
    MarkerDrag(OverlayId, GeoPoint),
    MarkerDragEnd(OverlayId, GeoPoint),
}

#[derive(Debug)]
pub struct MapView {
    tile_source: Option<Arc<OnlineTileSource>>,
    center: GeoPoint,
    zoom: f64,
    viewport: (f64, f64),
    overlays: Vec<(OverlayId, Overlay)>,
    next_overlay_id: u64,
}

impl MapView {
    pub fn new(viewport: (f64, f64)) -> Self {
        Self {
            tile_source: None,
            center: GeoPoint::new(INITIAL_CENTER.lat, INITIAL_CENTER.lon, 0.0),
            zoom: INITIAL_ZOOM,
            viewport,
            overlays: Vec::new(),
            next_overlay_id: 1,
        }
    }

    pub fn tile_source(&self) -> Option<&Arc<OnlineTileSource>> {
        self.tile_source.as_ref()
    }

    pub fn set_tile_source(&mut self, source: Option<Arc<OnlineTileSource>>) {
        if let Some(source) = &source {
            log::debug!("tile source {}", source.name);
        }
        self.tile_source = source;
    }

    pub fn map_center(&self) -> GeoPoint {
        self.center
    }

    pub fn zoom_level(&self) -> f64 {
        self.zoom
    }

    pub fn set_center(&mut self, center: GeoPoint) {
        self.center = center;
    }

    /// Zoom is limited to the tile source's range when one is set.
    pub fn set_zoom(&mut self, zoom: f64) {
        let (min, max) = match &self.tile_source {
            Some(source) => (f64::from(source.min_zoom), f64::from(source.max_zoom)),
            None => (0.0, MAX_ZOOM),
        };
        self.zoom = zoom.clamp(min, max);
    }

    pub fn animate_to(&mut self, center: GeoPoint, zoom: Option<f64>) {
        self.center = center;
        if let Some(zoom) = zoom {
            self.set_zoom(zoom);
        }
    }

    pub fn zoom_to_bounding_box(&mut self, bounds: LatLngBounds) {
        let center = bounds.center();
        self.center = GeoPoint::new(center.lat, center.lng, 0.0);
        self.set_zoom(bounds.zoom_to_fit(self.viewport));
    }

    fn next_id(&mut self) -> OverlayId {
        let id = OverlayId(self.next_overlay_id);
        self.next_overlay_id += 1;
        id
    }

    pub fn add_overlay(&mut self, overlay: Overlay) -> OverlayId {
        let id = self.next_id();
        self.overlays.push((id, overlay));
        id
    }

    /// Inserts at `index` in drawing order, or at the end when out of range.
    pub fn insert_overlay(&mut self, index: usize, overlay: Overlay) -> OverlayId {
        let id = self.next_id();
        let index = index.min(self.overlays.len());
        self.overlays.insert(index, (id, overlay));
        id
    }

    pub fn remove_overlay(&mut self, id: OverlayId) -> Option<Overlay> {
        let index = self.overlays.iter().position(|(oid, _)| *oid == id)?;
        Some(self.overlays.remove(index).1)
    }

    pub fn overlay(&self, id: OverlayId) -> Option<&Overlay> {
        self.overlays
            .iter()
            .find(|(oid, _)| *oid == id)
            .map(|(_, overlay)| overlay)
    }

    pub fn overlay_mut(&mut self, id: OverlayId) -> Option<&mut Overlay> {
        self.overlays
            .iter_mut()
            .find(|(oid, _)| *oid == id)
            .map(|(_, overlay)| overlay)
    }

    pub fn marker(&self, id: OverlayId) -> Option<&OsmMarker> {
        match self.overlay(id)? {
            Overlay::Marker(marker) => Some(marker),
            _ => None,
        }
    }

    pub fn marker_mut(&mut self, id: OverlayId) -> Option<&mut OsmMarker> {
        match self.overlay_mut(id)? {
            Overlay::Marker(marker) => Some(marker),
            _ => None,
        }
    }

    pub fn set_polyline_points(&mut self, id: OverlayId, points: Vec<GeoPoint>) {
        if let Some(Overlay::Polyline(polyline)) = self.overlay_mut(id) {
            polyline.points = points;
        }
    }

    pub fn overlays(&self) -> impl Iterator<Item = (OverlayId, &Overlay)> {
        self.overlays.iter().map(|(id, overlay)| (*id, overlay))
    }
}

impl From<MapPoint> for GeoPoint {
    fn from(point: MapPoint) -> Self {
        GeoPoint::new(point.lat, point.lon, point.alt)
    }
}
