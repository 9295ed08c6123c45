use std::any::Any;
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use super::scene::{
    CameraUpdate, GoogleMap, GoogleMapEvent, Marker, MarkerId, Polyline, PolylineId, TileOverlay,
    MAP_TYPE_NORMAL,
};
use crate::context::{Location, LocationClient, LocationSink, MapContext};
use crate::core::config::{ConfigBundle, KEY_REFERENCE_LAYER};
use crate::core::constants::{INITIAL_CENTER, INITIAL_ZOOM};
use crate::core::geo::LatLng;
use crate::core::point::MapPoint;
use crate::map::{
    bounding_box_target, next_instance_id, BoundingBoxTarget, ErrorListener, FeatureId,
    FeatureListener, FeatureTable, FragmentState, GpsTracker, IconAnchor, ListenerSlots,
    MapFragment, MapHost, MarkerIcon, PointListener, ReadyListener,
};
use crate::tiles::mbtiles::{LayerType, MbtilesFile};

/// Bundle key for the map type, one of the `MAP_TYPE_*` values.
pub const KEY_MAP_TYPE: &str = "MAP_TYPE";

const POLYLINE_COLOR: u32 = 0xffff_0000;
const POLYLINE_WIDTH: f32 = 5.0;

struct MarkerFeature {
    marker: MarkerId,
}

/// Vertices are draggable markers; the polyline is redrawn from them.
struct PolyFeature {
    vertices: Vec<MarkerId>,
    polyline: Option<PolylineId>,
    closed: bool,
}

impl PolyFeature {
    fn update(&mut self, map: &mut GoogleMap) {
        let mut points: Vec<LatLng> = self
            .vertices
            .iter()
            .filter_map(|id| map.marker(*id))
            .map(|marker| marker.position)
            .collect();
        if self.closed && points.len() > 1 {
            points.push(points[0]);
        }

        if points.is_empty() {
            if let Some(id) = self.polyline.take() {
                map.remove_polyline(id);
            }
            return;
        }
        match self.polyline {
            Some(id) => map.set_polyline_points(id, points),
            None => {
                self.polyline = Some(map.add_polyline(Polyline {
                    points,
                    clickable: true,
                    color: POLYLINE_COLOR,
                    width: POLYLINE_WIDTH,
                }))
            }
        }
    }
}

enum Feature {
    Marker(MarkerFeature),
    Poly(PolyFeature),
}

impl Feature {
    fn owns_marker(&self, id: MarkerId) -> bool {
        match self {
            Feature::Marker(feature) => feature.marker == id,
            Feature::Poly(feature) => feature.vertices.contains(&id),
        }
    }

    fn owns_polyline(&self, id: PolylineId) -> bool {
        matches!(self, Feature::Poly(feature) if feature.polyline == Some(id))
    }

    fn update(&mut self, map: &mut GoogleMap) {
        if let Feature::Poly(feature) = self {
            feature.update(map);
        }
    }

    fn dispose(self, map: &mut GoogleMap) {
        match self {
            Feature::Marker(feature) => {
                map.remove_marker(feature.marker);
            }
            Feature::Poly(feature) => {
                for vertex in feature.vertices {
                    map.remove_marker(vertex);
                }
                if let Some(polyline) = feature.polyline {
                    map.remove_polyline(polyline);
                }
            }
        }
    }
}

fn to_snippet(point: &MapPoint) -> String {
    format!("{};{}", point.alt, point.sd)
}

fn parse_snippet(snippet: &str) -> Option<(f64, f64)> {
    let (alt, sd) = snippet.split_once(';')?;
    Some((alt.trim().parse().ok()?, sd.trim().parse().ok()?))
}

fn from_marker(marker: &Marker) -> MapPoint {
    let (alt, sd) = marker
        .snippet
        .as_deref()
        .and_then(parse_snippet)
        .unwrap_or((0.0, 0.0));
    MapPoint::with_altitude(marker.position.lat, marker.position.lng, alt, sd)
}

fn create_marker(map: &mut GoogleMap, point: &MapPoint, draggable: bool, anchor: IconAnchor) -> MarkerId {
    map.add_marker(Marker {
        position: LatLng::from(*point),
        snippet: Some(to_snippet(point)),
        draggable,
        anchor: anchor.fractions(),
        icon: MarkerIcon::Default,
    })
}

struct Inner {
    instance_id: u64,
    context: Rc<dyn MapContext>,
    state: FragmentState,
    map: Option<GoogleMap>,
    features: FeatureTable<Feature>,
    listeners: ListenerSlots,
    gps: GpsTracker,
    gps_enabled: bool,
    resumed: bool,
    /// Taken out while the client is being started
    location_client: Option<Box<dyn LocationClient>>,
    crosshairs: Option<MarkerId>,
    map_type: i64,
    reference_layer: Option<PathBuf>,
}

impl Inner {
    fn apply_map_type(&mut self) {
        if let Some(map) = self.map.as_mut() {
            map.set_map_type(self.map_type);
        }
    }

    fn load_reference_overlay(&mut self) {
        let Some(map) = self.map.as_mut() else {
            return;
        };
        map.set_tile_overlay(None);
        let Some(path) = &self.reference_layer else {
            return;
        };

        match MbtilesFile::open(path) {
            Ok(file) if file.layer_type() == LayerType::Raster => {
                log::info!("reference layer {}", path.display());
                map.set_tile_overlay(Some(TileOverlay {
                    provider: Arc::new(file),
                    z_index: -1.0,
                }));
            }
            Ok(file) => log::warn!(
                "{} holds {} tiles, which cannot be drawn over a Google map",
                path.display(),
                file.layer_type()
            ),
            Err(e) => log::warn!("reference layer {} unusable: {}", path.display(), e),
        }
    }

    fn update_crosshairs(&mut self, fix: MapPoint) {
        let Some(map) = self.map.as_mut() else {
            return;
        };
        let position = LatLng::from(fix);
        if let Some(id) = self.crosshairs {
            if let Some(marker) = map.marker_mut(id) {
                marker.position = position;
                return;
            }
        }
        self.crosshairs = Some(map.add_marker(Marker {
            position,
            snippet: None,
            draggable: false,
            anchor: IconAnchor::Center.fractions(),
            icon: MarkerIcon::Crosshairs,
        }));
    }

    fn remove_crosshairs(&mut self) {
        if let Some(id) = self.crosshairs.take() {
            if let Some(map) = self.map.as_mut() {
                map.remove_marker(id);
            }
        }
    }

    fn stop_location_updates(&mut self) {
        if let Some(client) = self.location_client.as_mut() {
            if client.is_started() {
                client.stop();
            }
        }
    }
}

/// `MapFragment` over a Google-style scene.
///
/// Altitude and accuracy of each marker travel in its snippet as `"alt;sd"`.
#[derive(Clone)]
pub struct GoogleMapFragment {
    inner: Rc<RefCell<Inner>>,
}

impl GoogleMapFragment {
    pub fn new(context: Rc<dyn MapContext>) -> Self {
        let location_client = context.new_location_client();
        Self {
            inner: Rc::new(RefCell::new(Inner {
                instance_id: next_instance_id(),
                context,
                state: FragmentState::Unattached,
                map: None,
                features: FeatureTable::new(),
                listeners: ListenerSlots::default(),
                gps: GpsTracker::new(),
                gps_enabled: false,
                resumed: false,
                location_client: Some(location_client),
                crosshairs: None,
                map_type: MAP_TYPE_NORMAL,
                reference_layer: None,
            })),
        }
    }

    fn downgrade(&self) -> Weak<RefCell<Inner>> {
        Rc::downgrade(&self.inner)
    }

    fn handle(&self) -> Rc<dyn MapFragment> {
        Rc::new(self.clone())
    }

    pub fn state(&self) -> FragmentState {
        self.inner.borrow().state
    }

    /// Runs `f` with the scene, or `None` before the map is ready. `f` must
    /// not call back into the fragment.
    pub fn with_map<R>(&self, f: impl FnOnce(Option<&GoogleMap>) -> R) -> R {
        f(self.inner.borrow().map.as_ref())
    }

    /// Scene markers that make up `feature`, vertices in order for polys.
    pub fn feature_markers(&self, feature: FeatureId) -> Vec<MarkerId> {
        match self.inner.borrow().features.get(feature) {
            Some(Feature::Marker(f)) => vec![f.marker],
            Some(Feature::Poly(f)) => f.vertices.clone(),
            None => Vec::new(),
        }
    }

    /// The polyline drawn for `feature`, if any.
    pub fn feature_polyline(&self, feature: FeatureId) -> Option<PolylineId> {
        match self.inner.borrow().features.get(feature) {
            Some(Feature::Poly(f)) => f.polyline,
            _ => None,
        }
    }

    /// Feeds a user interaction from the view into the fragment.
    pub fn dispatch(&self, event: GoogleMapEvent) {
        match event {
            GoogleMapEvent::MapClick(position) => {
                if let Some(listener) = self.ready_listener(|l| l.click.clone()) {
                    listener(MapPoint::from(position));
                }
            }
            GoogleMapEvent::MapLongClick(position) => {
                if let Some(listener) = self.ready_listener(|l| l.long_press.clone()) {
                    listener(MapPoint::from(position));
                }
            }
            GoogleMapEvent::MarkerClick(marker) => {
                if let Some((id, listener)) = self.clicked_feature(|f| f.owns_marker(marker)) {
                    listener(id);
                }
            }
            GoogleMapEvent::PolylineClick(polyline) => {
                if let Some((id, listener)) = self.clicked_feature(|f| f.owns_polyline(polyline)) {
                    listener(id);
                }
            }
            GoogleMapEvent::MarkerDragStart(marker, position)
            | GoogleMapEvent::MarkerDrag(marker, position) => {
                self.on_marker_moved(marker, position);
            }
            GoogleMapEvent::MarkerDragEnd(marker, position) => {
                if let Some(id) = self.on_marker_moved(marker, position) {
                    let listener = self.inner.borrow().listeners.drag_end.clone();
                    if let Some(listener) = listener {
                        listener(id);
                    }
                }
            }
        }
    }

    fn ready_listener<T>(&self, pick: impl FnOnce(&ListenerSlots) -> Option<T>) -> Option<T> {
        let inner = self.inner.borrow();
        if inner.map.is_none() {
            return None;
        }
        pick(&inner.listeners)
    }

    fn clicked_feature(
        &self,
        hit: impl FnMut(&Feature) -> bool,
    ) -> Option<(FeatureId, FeatureListener)> {
        let inner = self.inner.borrow();
        if inner.map.is_none() {
            return None;
        }
        let id = inner.features.find(hit)?;
        let listener = inner.listeners.feature_click.clone()?;
        Some((id, listener))
    }

    /// Moves a dragged marker and redraws its feature. Dragging clears the
    /// snippet, so the point no longer claims a GPS altitude or accuracy.
    fn on_marker_moved(&self, marker: MarkerId, position: LatLng) -> Option<FeatureId> {
        let mut guard = self.inner.borrow_mut();
        let inner = &mut *guard;
        let map = inner.map.as_mut()?;
        let id = inner.features.find(|f| f.owns_marker(marker))?;

        if let Some(dragged) = map.marker_mut(marker) {
            dragged.position = position;
            dragged.snippet = None;
        }
        if let Some(feature) = inner.features.get_mut(id) {
            feature.update(map);
        }
        Some(id)
    }

    fn on_map_ready(&self, ready: ReadyListener, error: Option<ErrorListener>) {
        let available = {
            let inner = self.inner.borrow();
            if inner.state != FragmentState::Attaching {
                log::debug!(
                    "fragment {} detached before its map was ready",
                    inner.instance_id
                );
                return;
            }
            inner.context.play_services_available()
        };

        if !available {
            log::warn!("Google map cannot start without Play Services");
            self.inner.borrow_mut().state = FragmentState::Unattached;
            if let Some(error) = error {
                error();
            }
            return;
        }

        {
            let mut inner = self.inner.borrow_mut();
            let mut map = GoogleMap::new(inner.context.viewport_size());
            map.move_camera(
                CameraUpdate::NewLatLngZoom(LatLng::from(INITIAL_CENTER), INITIAL_ZOOM),
                false,
            );
            inner.map = Some(map);
            inner.state = FragmentState::Ready;
            inner.apply_map_type();
            inner.load_reference_overlay();
            if inner.gps_enabled {
                if let Some(fix) = inner.gps.last_fix() {
                    inner.update_crosshairs(fix);
                }
            }
            log::info!("Google map {} ready", inner.instance_id);
        }
        ready(self.handle());
    }

    fn start_location_updates(&self) {
        let mut client = {
            let mut inner = self.inner.borrow_mut();
            match inner.location_client.take() {
                Some(client) if client.is_started() => {
                    inner.location_client = Some(client);
                    return;
                }
                Some(client) => client,
                None => return,
            }
        };

        let weak = self.downgrade();
        let sink: LocationSink = Rc::new(move |location| {
            if let Some(inner) = weak.upgrade() {
                GoogleMapFragment { inner }.on_location_changed(location);
            }
        });
        client.start(sink);

        let mut inner = self.inner.borrow_mut();
        if !(inner.gps_enabled && inner.resumed) {
            client.stop();
        }
        inner.location_client = Some(client);
    }

    fn on_location_changed(&self, location: Location) {
        let fix = location.to_map_point();
        let (waiting, listener) = {
            let mut inner = self.inner.borrow_mut();
            if !inner.gps_enabled {
                return;
            }
            let waiting = inner.gps.on_fix(fix, location.provider.clone());
            inner.update_crosshairs(fix);
            (waiting, inner.listeners.gps_location.clone())
        };

        for ready in waiting {
            ready(self.handle());
        }
        if let Some(listener) = listener {
            listener(fix);
        }
    }
}

impl MapFragment for GoogleMapFragment {
    fn instance_id(&self) -> u64 {
        self.inner.borrow().instance_id
    }

    fn add_to(
        &self,
        host: &MapHost,
        container_id: &str,
        ready: ReadyListener,
        error: Option<ErrorListener>,
    ) {
        {
            let mut inner = self.inner.borrow_mut();
            if inner.state != FragmentState::Unattached {
                log::warn!("fragment {} is already attached", inner.instance_id);
                return;
            }
            inner.state = FragmentState::Attaching;
            host.attach(container_id, inner.instance_id);
        }

        let weak = self.downgrade();
        host.looper().post(move || {
            if let Some(inner) = weak.upgrade() {
                GoogleMapFragment { inner }.on_map_ready(ready, error);
            }
        });
    }

    fn apply_config(&self, config: &ConfigBundle) {
        let mut inner = self.inner.borrow_mut();
        inner.map_type = config.get_int(KEY_MAP_TYPE).unwrap_or(MAP_TYPE_NORMAL);
        inner.reference_layer = config.get_string(KEY_REFERENCE_LAYER).map(PathBuf::from);
        if inner.map.is_some() {
            inner.apply_map_type();
            inner.load_reference_overlay();
        }
    }

    fn on_resume(&self) {
        let start = {
            let mut inner = self.inner.borrow_mut();
            inner.resumed = true;
            inner.gps_enabled
        };
        if start {
            self.start_location_updates();
        }
    }

    fn on_pause(&self) {
        let mut inner = self.inner.borrow_mut();
        inner.resumed = false;
        inner.stop_location_updates();
    }

    fn on_destroy(&self) {
        let mut inner = self.inner.borrow_mut();
        inner.stop_location_updates();
        inner.state = FragmentState::Detached;
        inner.map = None;
        inner.crosshairs = None;
        inner.features.clear();
    }

    fn center(&self) -> MapPoint {
        self.inner
            .borrow()
            .map
            .as_ref()
            .map(|map| MapPoint::from(map.camera_position().target))
            .unwrap_or(INITIAL_CENTER)
    }

    fn zoom(&self) -> f64 {
        self.inner
            .borrow()
            .map
            .as_ref()
            .map(|map| map.camera_position().zoom)
            .unwrap_or(INITIAL_ZOOM)
    }

    fn set_center(&self, center: MapPoint, animate: bool) {
        if let Some(map) = self.inner.borrow_mut().map.as_mut() {
            map.move_camera(CameraUpdate::NewLatLng(center.into()), animate);
        }
    }

    fn zoom_to_point_at(&self, center: MapPoint, zoom: f64, animate: bool) {
        if let Some(map) = self.inner.borrow_mut().map.as_mut() {
            map.move_camera(CameraUpdate::NewLatLngZoom(center.into(), zoom), animate);
        }
    }

    fn zoom_to_bounding_box(&self, points: &[MapPoint], scale_factor: f64, animate: bool) {
        match bounding_box_target(points, scale_factor) {
            BoundingBoxTarget::Unchanged => {}
            BoundingBoxTarget::Point(point) => self.zoom_to_point(point, animate),
            BoundingBoxTarget::Bounds(bounds) => {
                if let Some(map) = self.inner.borrow_mut().map.as_mut() {
                    map.move_camera(CameraUpdate::NewLatLngBounds(bounds), animate);
                }
            }
        }
    }

    fn add_marker(&self, point: MapPoint, draggable: bool, anchor: IconAnchor) -> Option<FeatureId> {
        let mut guard = self.inner.borrow_mut();
        let inner = &mut *guard;
        let map = inner.map.as_mut()?;
        let marker = create_marker(map, &point, draggable, anchor);
        Some(inner.features.insert(Feature::Marker(MarkerFeature { marker })))
    }

    fn set_marker_icon(&self, feature: FeatureId, icon: MarkerIcon) {
        let mut guard = self.inner.borrow_mut();
        let inner = &mut *guard;
        let (Some(map), Some(Feature::Marker(f))) = (inner.map.as_mut(), inner.features.get(feature))
        else {
            return;
        };
        if let Some(marker) = map.marker_mut(f.marker) {
            marker.icon = icon;
        }
    }

    fn marker_point(&self, feature: FeatureId) -> Option<MapPoint> {
        let inner = self.inner.borrow();
        let map = inner.map.as_ref()?;
        match inner.features.get(feature)? {
            Feature::Marker(f) => map.marker(f.marker).map(from_marker),
            Feature::Poly(_) => None,
        }
    }

    fn add_draggable_poly(&self, points: &[MapPoint], closed: bool) -> Option<FeatureId> {
        let mut guard = self.inner.borrow_mut();
        let inner = &mut *guard;
        let map = inner.map.as_mut()?;
        let mut poly = PolyFeature {
            vertices: points
                .iter()
                .map(|point| create_marker(map, point, true, IconAnchor::Center))
                .collect(),
            polyline: None,
            closed,
        };
        poly.update(map);
        Some(inner.features.insert(Feature::Poly(poly)))
    }

    fn append_point_to_poly(&self, feature: FeatureId, point: MapPoint) {
        let mut guard = self.inner.borrow_mut();
        let inner = &mut *guard;
        if let (Some(map), Some(Feature::Poly(poly))) =
            (inner.map.as_mut(), inner.features.get_mut(feature))
        {
            poly.vertices
                .push(create_marker(map, &point, true, IconAnchor::Center));
            poly.update(map);
        }
    }

    fn remove_poly_last_point(&self, feature: FeatureId) {
        let mut guard = self.inner.borrow_mut();
        let inner = &mut *guard;
        if let (Some(map), Some(Feature::Poly(poly))) =
            (inner.map.as_mut(), inner.features.get_mut(feature))
        {
            if let Some(last) = poly.vertices.pop() {
                map.remove_marker(last);
                poly.update(map);
            }
        }
    }

    fn poly_points(&self, feature: FeatureId) -> Vec<MapPoint> {
        let inner = self.inner.borrow();
        match (inner.map.as_ref(), inner.features.get(feature)) {
            (Some(map), Some(Feature::Poly(poly))) => poly
                .vertices
                .iter()
                .filter_map(|id| map.marker(*id))
                .map(from_marker)
                .collect(),
            _ => Vec::new(),
        }
    }

    fn remove_feature(&self, feature: FeatureId) {
        let mut guard = self.inner.borrow_mut();
        let inner = &mut *guard;
        if let Some(map) = inner.map.as_mut() {
            if let Some(removed) = inner.features.remove(feature) {
                removed.dispose(map);
            }
        }
    }

    fn clear_features(&self) {
        let mut guard = self.inner.borrow_mut();
        let inner = &mut *guard;
        let removed = inner.features.clear();
        if let Some(map) = inner.map.as_mut() {
            for feature in removed {
                feature.dispose(map);
            }
        }
    }

    fn set_click_listener(&self, listener: Option<PointListener>) {
        self.inner.borrow_mut().listeners.click = listener;
    }

    fn set_long_press_listener(&self, listener: Option<PointListener>) {
        self.inner.borrow_mut().listeners.long_press = listener;
    }

    fn set_feature_click_listener(&self, listener: Option<FeatureListener>) {
        self.inner.borrow_mut().listeners.feature_click = listener;
    }

    fn set_drag_end_listener(&self, listener: Option<FeatureListener>) {
        self.inner.borrow_mut().listeners.drag_end = listener;
    }

    fn set_gps_location_listener(&self, listener: Option<PointListener>) {
        self.inner.borrow_mut().listeners.gps_location = listener;
    }

    fn set_gps_location_enabled(&self, enabled: bool) {
        let start = {
            let mut inner = self.inner.borrow_mut();
            if inner.gps_enabled == enabled {
                return;
            }
            inner.gps_enabled = enabled;
            if !enabled {
                inner.stop_location_updates();
                inner.remove_crosshairs();
            }
            enabled && inner.resumed
        };
        if start {
            self.start_location_updates();
        }
    }

    fn run_on_gps_location_ready(&self, listener: ReadyListener) {
        let now = self.inner.borrow_mut().gps.run_when_located(listener);
        if let Some(listener) = now {
            listener(self.handle());
        }
    }

    fn gps_location(&self) -> Option<MapPoint> {
        self.inner.borrow().gps.last_fix()
    }

    fn location_provider(&self) -> Option<String> {
        self.inner.borrow().gps.provider().map(str::to_string)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
