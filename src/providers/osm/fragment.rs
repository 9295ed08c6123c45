use std::any::Any;
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use super::scene::{
    GeoPoint, MapView, OsmMapEvent, OsmMarker, OsmPolyline, Overlay, OverlayId, TilesOverlay,
};
use crate::context::{Location, LocationClient, LocationSink, MapContext};
use crate::core::config::{ConfigBundle, KEY_REFERENCE_LAYER};
use crate::core::constants::{INITIAL_CENTER, INITIAL_ZOOM};
use crate::core::point::MapPoint;
use crate::map::{
    bounding_box_target, next_instance_id, BoundingBoxTarget, ErrorListener, FeatureId,
    FeatureListener, FeatureTable, FragmentState, GpsTracker, IconAnchor, ListenerSlots,
    MapFragment, MapHost, MarkerIcon, PointListener, ReadyListener,
};
use crate::tiles::mbtiles::{LayerType, MbtilesFile};
use crate::tiles::web_map_service::WebMapService;

/// Bundle key for the serialized `WebMapService`.
pub const KEY_WEB_MAP_SERVICE: &str = "WEB_MAP_SERVICE";

const POLYLINE_COLOR: u32 = 0xffff_0000;
const POLYLINE_WIDTH: f32 = 5.0;

enum Feature {
    Marker(OverlayId),
    Poly {
        vertices: Vec<OverlayId>,
        polyline: Option<OverlayId>,
        closed: bool,
    },
}

impl Feature {
    fn owns_marker(&self, id: OverlayId) -> bool {
        match self {
            Feature::Marker(marker) => *marker == id,
            Feature::Poly { vertices, .. } => vertices.contains(&id),
        }
    }

    fn owns_polyline(&self, id: OverlayId) -> bool {
        matches!(self, Feature::Poly { polyline, .. } if *polyline == Some(id))
    }

    fn vertices_mut(&mut self) -> Option<&mut Vec<OverlayId>> {
        match self {
            Feature::Poly { vertices, .. } => Some(vertices),
            Feature::Marker(_) => None,
        }
    }

    /// Redraws a poly's line from its vertex markers.
    fn update(&mut self, view: &mut MapView) {
        let Feature::Poly {
            vertices,
            polyline,
            closed,
        } = self
        else {
            return;
        };

        let mut points: Vec<GeoPoint> = vertices
            .iter()
            .filter_map(|id| view.marker(*id))
            .map(|marker| marker.position)
            .collect();
        if *closed && points.len() > 1 {
            points.push(points[0]);
        }

        if points.is_empty() {
            if let Some(id) = polyline.take() {
                view.remove_overlay(id);
            }
        } else if let Some(id) = polyline {
            view.set_polyline_points(*id, points);
        } else {
            *polyline = Some(view.add_overlay(Overlay::Polyline(OsmPolyline {
                points,
                color: POLYLINE_COLOR,
                width: POLYLINE_WIDTH,
            })));
        }
    }

    fn dispose(self, view: &mut MapView) {
        match self {
            Feature::Marker(marker) => {
                view.remove_overlay(marker);
            }
            Feature::Poly {
                vertices, polyline, ..
            } => {
                for vertex in vertices.into_iter().chain(polyline) {
                    view.remove_overlay(vertex);
                }
            }
        }
    }
}

fn from_marker(marker: &OsmMarker) -> MapPoint {
    let sd = marker
        .sub_description
        .as_deref()
        .and_then(|sd| sd.trim().parse().ok())
        .unwrap_or(0.0);
    MapPoint::with_altitude(marker.position.lat, marker.position.lon, marker.position.alt, sd)
}

fn create_marker(view: &mut MapView, point: &MapPoint, draggable: bool, anchor: IconAnchor) -> OverlayId {
    view.add_overlay(Overlay::Marker(OsmMarker {
        position: GeoPoint::from(*point),
        sub_description: Some(point.sd.to_string()),
        draggable,
        anchor: anchor.fractions(),
        icon: MarkerIcon::Default,
    }))
}

struct Inner {
    instance_id: u64,
    context: Rc<dyn MapContext>,
    state: FragmentState,
    view: Option<MapView>,
    features: FeatureTable<Feature>,
    listeners: ListenerSlots,
    gps: GpsTracker,
    gps_enabled: bool,
    resumed: bool,
    location_client: Option<Box<dyn LocationClient>>,
    my_location: Option<OverlayId>,
    web_map_service: Option<WebMapService>,
    reference_layer: Option<PathBuf>,
    reference_overlay: Option<OverlayId>,
}

impl Inner {
    fn apply_tile_source(&mut self) {
        if let Some(view) = self.view.as_mut() {
            view.set_tile_source(
                self.web_map_service
                    .as_ref()
                    .map(WebMapService::as_online_tile_source),
            );
        }
    }

    /// Draws the reference archive beneath every other overlay.
    fn load_reference_overlay(&mut self) {
        let Some(view) = self.view.as_mut() else {
            return;
        };
        if let Some(old) = self.reference_overlay.take() {
            view.remove_overlay(old);
        }
        let Some(path) = &self.reference_layer else {
            return;
        };

        match MbtilesFile::open(path) {
            Ok(file) if file.layer_type() == LayerType::Raster => {
                log::info!("reference layer {}", path.display());
                self.reference_overlay = Some(view.insert_overlay(
                    0,
                    Overlay::Tiles(TilesOverlay {
                        provider: Arc::new(file),
                    }),
                ));
            }
            Ok(file) => log::warn!(
                "{} holds {} tiles, which cannot be drawn over an OpenStreetMap map",
                path.display(),
                file.layer_type()
            ),
            Err(e) => log::warn!("reference layer {} unusable: {}", path.display(), e),
        }
    }

    fn show_my_location(&mut self, fix: MapPoint) {
        let Some(view) = self.view.as_mut() else {
            return;
        };
        let position = GeoPoint::from(fix);
        if let Some(id) = self.my_location {
            if let Some(Overlay::MyLocation(current)) = view.overlay_mut(id) {
                *current = position;
                return;
            }
        }
        self.my_location = Some(view.add_overlay(Overlay::MyLocation(position)));
    }

    fn hide_my_location(&mut self) {
        if let (Some(view), Some(id)) = (self.view.as_mut(), self.my_location.take()) {
            view.remove_overlay(id);
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

/// `MapFragment` over an OSMDroid-style map view.
///
/// Points keep their altitude in the geo point itself; the accuracy is
/// stored as the marker's sub-description.
#[derive(Clone)]
pub struct OsmMapFragment {
    inner: Rc<RefCell<Inner>>,
}

impl OsmMapFragment {
    pub fn new(context: Rc<dyn MapContext>) -> Self {
        let location_client = context.new_location_client();
        Self {
            inner: Rc::new(RefCell::new(Inner {
                instance_id: next_instance_id(),
                context,
                state: FragmentState::Unattached,
                view: None,
                features: FeatureTable::new(),
                listeners: ListenerSlots::default(),
                gps: GpsTracker::new(),
                gps_enabled: false,
                resumed: false,
                location_client: Some(location_client),
                my_location: None,
                web_map_service: None,
                reference_layer: None,
                reference_overlay: None,
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

    /// Runs `f` with the map view, or `None` before it is ready. `f` must not
    /// call back into the fragment.
    pub fn with_map<R>(&self, f: impl FnOnce(Option<&MapView>) -> R) -> R {
        f(self.inner.borrow().view.as_ref())
    }

    /// Marker overlays that make up `feature`, vertices in order for polys.
    pub fn feature_markers(&self, feature: FeatureId) -> Vec<OverlayId> {
        match self.inner.borrow().features.get(feature) {
            Some(Feature::Marker(marker)) => vec![*marker],
            Some(Feature::Poly { vertices, .. }) => vertices.clone(),
            None => Vec::new(),
        }
    }

    pub fn feature_polyline(&self, feature: FeatureId) -> Option<OverlayId> {
        match self.inner.borrow().features.get(feature) {
            Some(Feature::Poly { polyline, .. }) => *polyline,
            _ => None,
        }
    }

    /// Feeds a user interaction from the view into the fragment.
    pub fn dispatch(&self, event: OsmMapEvent) {
        match event {
            OsmMapEvent::SingleTap(point) => {
                let listener = {
                    let inner = self.inner.borrow();
                    inner.view.as_ref().and(inner.listeners.click.clone())
                };
                if let Some(listener) = listener {
                    listener(MapPoint::new(point.lat, point.lon));
                }
            }
            OsmMapEvent::LongPress(point) => {
                let listener = {
                    let inner = self.inner.borrow();
                    inner.view.as_ref().and(inner.listeners.long_press.clone())
                };
                if let Some(listener) = listener {
                    listener(MapPoint::new(point.lat, point.lon));
                }
            }
            OsmMapEvent::MarkerClick(overlay) => {
                self.notify_feature_click(|f| f.owns_marker(overlay));
            }
            OsmMapEvent::PolylineClick(overlay) => {
                self.notify_feature_click(|f| f.owns_polyline(overlay));
            }
            OsmMapEvent::MarkerDragStart(overlay, position)
            | OsmMapEvent::MarkerDrag(overlay, position) => {
                self.on_marker_moved(overlay, position);
            }
            OsmMapEvent::MarkerDragEnd(overlay, position) => {
                if let Some(id) = self.on_marker_moved(overlay, position) {
                    let listener = self.inner.borrow().listeners.drag_end.clone();
                    if let Some(listener) = listener {
                        listener(id);
                    }
                }
            }
        }
    }

    fn notify_feature_click(&self, hit: impl FnMut(&Feature) -> bool) {
        let target = {
            let inner = self.inner.borrow();
            match (&inner.view, &inner.listeners.feature_click) {
                (Some(_), Some(listener)) => inner.features.find(hit).map(|id| (id, listener.clone())),
                _ => None,
            }
        };
        if let Some((id, listener)) = target {
            listener(id);
        }
    }

    /// Moves a dragged marker to `position` with altitude and accuracy
    /// cleared, then redraws its feature.
    fn on_marker_moved(&self, overlay: OverlayId, position: GeoPoint) -> Option<FeatureId> {
        let mut guard = self.inner.borrow_mut();
        let inner = &mut *guard;
        let view = inner.view.as_mut()?;
        let id = inner.features.find(|f| f.owns_marker(overlay))?;

        if let Some(marker) = view.marker_mut(overlay) {
            marker.position = GeoPoint::new(position.lat, position.lon, 0.0);
            marker.sub_description = None;
        }
        if let Some(feature) = inner.features.get_mut(id) {
            feature.update(view);
        }
        Some(id)
    }

    fn on_map_ready(&self, ready: ReadyListener) {
        {
            let mut inner = self.inner.borrow_mut();
            if inner.state != FragmentState::Attaching {
                log::debug!(
                    "fragment {} detached before its map was ready",
                    inner.instance_id
                );
                return;
            }

            let mut view = MapView::new(inner.context.viewport_size());
            view.set_center(GeoPoint::from(INITIAL_CENTER));
            view.set_zoom(INITIAL_ZOOM);
            inner.view = Some(view);
            inner.state = FragmentState::Ready;
            inner.apply_tile_source();
            inner.load_reference_overlay();
            if let (true, Some(fix)) = (inner.gps_enabled, inner.gps.last_fix()) {
                inner.show_my_location(fix);
            }
            log::info!("OpenStreetMap map {} ready", inner.instance_id);
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
                OsmMapFragment { inner }.on_location_changed(location);
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
            inner.show_my_location(fix);
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

impl MapFragment for OsmMapFragment {
    fn instance_id(&self) -> u64 {
        self.inner.borrow().instance_id
    }

    /// The map view needs no vendor services, so `error` is never called.
    fn add_to(
        &self,
        host: &MapHost,
        container_id: &str,
        ready: ReadyListener,
        _error: Option<ErrorListener>,
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
                OsmMapFragment { inner }.on_map_ready(ready);
            }
        });
    }

    fn apply_config(&self, config: &ConfigBundle) {
        let mut inner = self.inner.borrow_mut();
        inner.web_map_service = config.get_value(KEY_WEB_MAP_SERVICE);
        inner.reference_layer = config.get_string(KEY_REFERENCE_LAYER).map(PathBuf::from);
        if inner.view.is_some() {
            inner.apply_tile_source();
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
        inner.view = None;
        inner.my_location = None;
        inner.reference_overlay = None;
        inner.features.clear();
    }

    fn center(&self) -> MapPoint {
        match self.inner.borrow().view.as_ref() {
            Some(view) => {
                let center = view.map_center();
                MapPoint::new(center.lat, center.lon)
            }
            None => INITIAL_CENTER,
        }
    }

    fn zoom(&self) -> f64 {
        self.inner
            .borrow()
            .view
            .as_ref()
            .map_or(INITIAL_ZOOM, MapView::zoom_level)
    }

    fn set_center(&self, center: MapPoint, animate: bool) {
        if let Some(view) = self.inner.borrow_mut().view.as_mut() {
            let target = GeoPoint::new(center.lat, center.lon, 0.0);
            if animate {
                view.animate_to(target, None);
            } else {
                view.set_center(target);
            }
        }
    }

    fn zoom_to_point_at(&self, center: MapPoint, zoom: f64, animate: bool) {
        if let Some(view) = self.inner.borrow_mut().view.as_mut() {
            let target = GeoPoint::new(center.lat, center.lon, 0.0);
            if animate {
                view.animate_to(target, Some(zoom));
            } else {
                view.set_zoom(zoom);
                view.set_center(target);
            }
        }
    }

    fn zoom_to_bounding_box(&self, points: &[MapPoint], scale_factor: f64, animate: bool) {
        match bounding_box_target(points, scale_factor) {
            BoundingBoxTarget::Unchanged => {}
            BoundingBoxTarget::Point(point) => self.zoom_to_point(point, animate),
            BoundingBoxTarget::Bounds(bounds) => {
                if let Some(view) = self.inner.borrow_mut().view.as_mut() {
                    view.zoom_to_bounding_box(bounds);
                }
            }
        }
    }

    fn add_marker(&self, point: MapPoint, draggable: bool, anchor: IconAnchor) -> Option<FeatureId> {
        let mut guard = self.inner.borrow_mut();
        let inner = &mut *guard;
        let view = inner.view.as_mut()?;
        let marker = create_marker(view, &point, draggable, anchor);
        Some(inner.features.insert(Feature::Marker(marker)))
    }

    fn set_marker_icon(&self, feature: FeatureId, icon: MarkerIcon) {
        let mut guard = self.inner.borrow_mut();
        let inner = &mut *guard;
        if let (Some(view), Some(Feature::Marker(id))) =
            (inner.view.as_mut(), inner.features.get(feature))
        {
            if let Some(marker) = view.marker_mut(*id) {
                marker.icon = icon;
            }
        }
    }

    fn marker_point(&self, feature: FeatureId) -> Option<MapPoint> {
        let inner = self.inner.borrow();
        let view = inner.view.as_ref()?;
        match inner.features.get(feature)? {
            Feature::Marker(id) => view.marker(*id).map(from_marker),
            Feature::Poly { .. } => None,
        }
    }

    fn add_draggable_poly(&self, points: &[MapPoint], closed: bool) -> Option<FeatureId> {
        let mut guard = self.inner.borrow_mut();
        let inner = &mut *guard;
        let view = inner.view.as_mut()?;
        let vertices = points
            .iter()
            .map(|point| create_marker(view, point, true, IconAnchor::Center))
            .collect();
        let mut feature = Feature::Poly {
            vertices,
            polyline: None,
            closed,
        };
        feature.update(view);
        Some(inner.features.insert(feature))
    }

    fn append_point_to_poly(&self, feature: FeatureId, point: MapPoint) {
        let mut guard = self.inner.borrow_mut();
        let inner = &mut *guard;
        let Some(view) = inner.view.as_mut() else {
            return;
        };
        if let Some(poly) = inner.features.get_mut(feature) {
            if let Some(vertices) = poly.vertices_mut() {
                vertices.push(create_marker(view, &point, true, IconAnchor::Center));
                poly.update(view);
            }
        }
    }

    fn remove_poly_last_point(&self, feature: FeatureId) {
        let mut guard = self.inner.borrow_mut();
        let inner = &mut *guard;
        let Some(view) = inner.view.as_mut() else {
            return;
        };
        if let Some(poly) = inner.features.get_mut(feature) {
            if let Some(last) = poly.vertices_mut().and_then(Vec::pop) {
                view.remove_overlay(last);
                poly.update(view);
            }
        }
    }

    fn poly_points(&self, feature: FeatureId) -> Vec<MapPoint> {
        let inner = self.inner.borrow();
        match (inner.view.as_ref(), inner.features.get(feature)) {
            (Some(view), Some(Feature::Poly { vertices, .. })) => vertices
                .iter()
                .filter_map(|id| view.marker(*id))
                .map(from_marker)
                .collect(),
            _ => Vec::new(),
        }
    }

    fn remove_feature(&self, feature: FeatureId) {
        let mut guard = self.inner.borrow_mut();
        let inner = &mut *guard;
        if let Some(view) = inner.view.as_mut() {
            if let Some(removed) = inner.features.remove(feature) {
                removed.dispose(view);
            }
        }
    }

    fn clear_features(&self) {
        let mut guard = self.inner.borrow_mut();
        let inner = &mut *guard;
        let removed = inner.features.clear();
        if let Some(view) = inner.view.as_mut() {
            for feature in removed {
                feature.dispose(view);
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
                inner.hide_my_location();
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
