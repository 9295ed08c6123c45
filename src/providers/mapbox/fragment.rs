use serde_json::json;
use std::any::Any;
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use super::scene::{
    from_position, to_position, LayerKind, Line, LineId, MapboxMap, MapboxMapEvent, Position,
    SourceKind, StyleLayer, StyleSource, Symbol, SymbolId,
};
use crate::context::{Location, LocationClient, LocationSink, MapContext};
use crate::core::config::{ConfigBundle, KEY_REFERENCE_LAYER};
use crate::core::constants::{INITIAL_CENTER, INITIAL_ZOOM, TILE_SIZE};
use crate::core::geo::LatLng;
use crate::core::point::MapPoint;
use crate::map::{
    bounding_box_target, next_instance_id, BoundingBoxTarget, ErrorListener, FeatureId,
    FeatureListener, FeatureTable, FragmentState, GpsTracker, IconAnchor, ListenerSlots,
    MainLooper, MapFragment, MapHost, MarkerIcon, PointListener, ReadyListener,
};
use crate::tiles::mbtiles::{LayerType, MbtilesFile};
use crate::tiles::server::TileHttpServer;

/// Bundle key for the style URL.
pub const KEY_STYLE_URL: &str = "STYLE_URL";

pub const DEFAULT_STYLE_URL: &str = "mapbox://styles/mapbox/streets-v11";

const LINE_COLOR: &str = "#ff0000";
const LINE_WIDTH: f32 = 5.0;

struct MarkerFeature {
    symbol: SymbolId,
}

struct PolyFeature {
    vertices: Vec<SymbolId>,
    line: Option<LineId>,
    closed: bool,
}

impl PolyFeature {
    fn update(&mut self, map: &mut MapboxMap) {
        let mut geometry: Vec<Position> = self
            .vertices
            .iter()
            .filter_map(|id| map.symbol(*id))
            .map(|symbol| symbol.geometry)
            .collect();
        if self.closed && geometry.len() > 1 {
            geometry.push(geometry[0]);
        }

        match (self.line, geometry.is_empty()) {
            (Some(line), true) => {
                map.delete_line(line);
                self.line = None;
            }
            (Some(line), false) => map.set_line_geometry(line, geometry),
            (None, false) => {
                self.line = Some(map.create_line(Line {
                    geometry,
                    color: LINE_COLOR,
                    width: LINE_WIDTH,
                }))
            }
            (None, true) => {}
        }
    }
}

enum Feature {
    Marker(MarkerFeature),
    Poly(PolyFeature),
}

impl Feature {
    fn owns_symbol(&self, id: SymbolId) -> bool {
        match self {
            Feature::Marker(feature) => feature.symbol == id,
            Feature::Poly(feature) => feature.vertices.contains(&id),
        }
    }

    fn owns_line(&self, id: LineId) -> bool {
        matches!(self, Feature::Poly(feature) if feature.line == Some(id))
    }

    fn dispose(self, map: &mut MapboxMap) {
        match self {
            Feature::Marker(feature) => {
                map.delete_symbol(feature.symbol);
            }
            Feature::Poly(feature) => {
                for vertex in feature.vertices {
                    map.delete_symbol(vertex);
                }
                if let Some(line) = feature.line {
                    map.delete_line(line);
                }
            }
        }
    }
}

fn anchor_name(anchor: IconAnchor) -> &'static str {
    match anchor {
        IconAnchor::Center => "center",
        IconAnchor::Bottom => "bottom",
    }
}

fn from_symbol(symbol: &Symbol) -> MapPoint {
    let lat_lng = from_position(symbol.geometry);
    let field = |name: &str| symbol.data.get(name).and_then(|v| v.as_f64()).unwrap_or(0.0);
    MapPoint::with_altitude(lat_lng.lat, lat_lng.lng, field("alt"), field("sd"))
}

fn create_symbol(map: &mut MapboxMap, point: &MapPoint, draggable: bool, anchor: IconAnchor) -> SymbolId {
    map.create_symbol(Symbol {
        geometry: to_position(LatLng::from(*point)),
        data: json!({ "alt": point.alt, "sd": point.sd }),
        draggable,
        icon_anchor: anchor_name(anchor),
        icon_image: MarkerIcon::Default,
    })
}

struct Inner {
    instance_id: u64,
    context: Rc<dyn MapContext>,
    state: FragmentState,
    looper: Option<MainLooper>,
    map: Option<MapboxMap>,
    /// Held until the first style finishes loading
    pending_ready: Option<ReadyListener>,
    features: FeatureTable<Feature>,
    listeners: ListenerSlots,
    gps: GpsTracker,
    gps_enabled: bool,
    resumed: bool,
    location_client: Option<Box<dyn LocationClient>>,
    style_url: String,
    reference_layer: Option<PathBuf>,
    /// Set while the reference archive is registered with the tile server
    served_reference: bool,
}

impl Inner {
    fn reference_source_id(&self) -> String {
        format!("reference-{}", self.instance_id)
    }

    /// The map once its first style has loaded.
    fn styled_map(&self) -> Option<&MapboxMap> {
        self.map.as_ref().filter(|map| map.style().is_some())
    }

    fn styled_map_mut(&mut self) -> Option<&mut MapboxMap> {
        self.map.as_mut().filter(|map| map.style().is_some())
    }

    fn unserve_reference(&mut self) {
        if !self.served_reference {
            return;
        }
        self.served_reference = false;
        if let Ok(server) = TileHttpServer::shared() {
            server.remove_source(&self.reference_source_id());
        }
    }

    /// Serves the reference archive over HTTP and adds it to the style: a
    /// raster layer, or one line layer per vector layer.
    fn load_reference_overlay(&mut self) {
        let source_id = self.reference_source_id();
        let reference = self.reference_layer.clone();
        let Some(style) = self.map.as_mut().and_then(MapboxMap::style_mut) else {
            return;
        };
        style.remove_source(&source_id);

        let Some(path) = reference else {
            self.unserve_reference();
            return;
        };
        let file = match MbtilesFile::open(&path) {
            Ok(file) => file,
            Err(e) => {
                log::warn!("reference layer {} unusable: {}", path.display(), e);
                self.unserve_reference();
                return;
            }
        };
        let server = match TileHttpServer::shared() {
            Ok(server) => server,
            Err(e) => {
                log::warn!("cannot serve reference layer {}: {}", path.display(), e);
                return;
            }
        };

        let layer_type = file.layer_type();
        let vector_layers = file.vector_layers();
        let url = server.add_source(&source_id, Arc::new(file));

        let kind = match layer_type {
            LayerType::Raster => SourceKind::Raster,
            LayerType::Vector => SourceKind::Vector,
        };
        style.add_source(StyleSource {
            id: source_id.clone(),
            kind,
            tiles: vec![url],
            tile_size: TILE_SIZE,
        });
        match layer_type {
            LayerType::Raster => style.add_layer(StyleLayer {
                id: format!("{}-raster", source_id),
                source: source_id.clone(),
                kind: LayerKind::Raster,
            }),
            LayerType::Vector => {
                for layer in vector_layers {
                    style.add_layer(StyleLayer {
                        id: format!("{}-{}", source_id, layer.name),
                        source: source_id.clone(),
                        kind: LayerKind::Line {
                            source_layer: layer.name,
                        },
                    });
                }
            }
        }
        self.served_reference = true;
        log::info!("reference layer {} ({})", path.display(), layer_type);
    }

    fn stop_location_updates(&mut self) {
        if let Some(client) = self.location_client.as_mut() {
            if client.is_started() {
                client.stop();
            }
        }
    }
}

/// `MapFragment` over a Mapbox-style scene.
///
/// The map becomes ready only after its style has loaded. Altitude and
/// accuracy of each symbol travel in its JSON data as `{"alt", "sd"}`.
/// Reference layers are served through the process-wide tile server because
/// styles can only load tiles by URL.
#[derive(Clone)]
pub struct MapboxMapFragment {
    inner: Rc<RefCell<Inner>>,
}

impl MapboxMapFragment {
    pub fn new(context: Rc<dyn MapContext>) -> Self {
        let location_client = context.new_location_client();
        Self {
            inner: Rc::new(RefCell::new(Inner {
                instance_id: next_instance_id(),
                context,
                state: FragmentState::Unattached,
                looper: None,
                map: None,
                pending_ready: None,
                features: FeatureTable::new(),
                listeners: ListenerSlots::default(),
                gps: GpsTracker::new(),
                gps_enabled: false,
                resumed: false,
                location_client: Some(location_client),
                style_url: DEFAULT_STYLE_URL.to_string(),
                reference_layer: None,
                served_reference: false,
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

    /// Runs `f` with the scene, or `None` before the first style has loaded.
    /// `f` must not call back into the fragment.
    pub fn with_map<R>(&self, f: impl FnOnce(Option<&MapboxMap>) -> R) -> R {
        f(self.inner.borrow().styled_map())
    }

    /// Symbols that make up `feature`, vertices in order for polys.
    pub fn feature_symbols(&self, feature: FeatureId) -> Vec<SymbolId> {
        match self.inner.borrow().features.get(feature) {
            Some(Feature::Marker(f)) => vec![f.symbol],
            Some(Feature::Poly(f)) => f.vertices.clone(),
            None => Vec::new(),
        }
    }

    pub fn feature_line(&self, feature: FeatureId) -> Option<LineId> {
        match self.inner.borrow().features.get(feature) {
            Some(Feature::Poly(f)) => f.line,
            _ => None,
        }
    }

    /// Feeds a user interaction from the view into the fragment.
    pub fn dispatch(&self, event: MapboxMapEvent) {
        match event {
            MapboxMapEvent::Click(position) => {
                let listener = self.listener_if_ready(|l| l.click.clone());
                if let Some(listener) = listener {
                    listener(MapPoint::from(position));
                }
            }
            MapboxMapEvent::LongClick(position) => {
                let listener = self.listener_if_ready(|l| l.long_press.clone());
                if let Some(listener) = listener {
                    listener(MapPoint::from(position));
                }
            }
            MapboxMapEvent::SymbolClick(symbol) => {
                self.notify_feature_click(|f| f.owns_symbol(symbol));
            }
            MapboxMapEvent::LineClick(line) => {
                self.notify_feature_click(|f| f.owns_line(line));
            }
            MapboxMapEvent::SymbolDragStarted(symbol, position)
            | MapboxMapEvent::SymbolDrag(symbol, position) => {
                self.on_symbol_moved(symbol, position);
            }
            MapboxMapEvent::SymbolDragFinished(symbol, position) => {
                let Some(id) = self.on_symbol_moved(symbol, position) else {
                    return;
                };
                let listener = self.inner.borrow().listeners.drag_end.clone();
                if let Some(listener) = listener {
                    listener(id);
                }
            }
        }
    }

    fn listener_if_ready<T>(&self, pick: impl FnOnce(&ListenerSlots) -> Option<T>) -> Option<T> {
        let inner = self.inner.borrow();
        inner.styled_map()?;
        pick(&inner.listeners)
    }

    fn notify_feature_click(&self, hit: impl FnMut(&Feature) -> bool) {
        let target = {
            let inner = self.inner.borrow();
            inner.styled_map().and_then(|_| {
                let id = inner.features.find(hit)?;
                Some((id, inner.listeners.feature_click.clone()?))
            })
        };
        if let Some((id, listener)) = target {
            listener(id);
        }
    }

    fn on_symbol_moved(&self, symbol: SymbolId, position: LatLng) -> Option<FeatureId> {
        let mut guard = self.inner.borrow_mut();
        let inner = &mut *guard;
        let map = inner.map.as_mut().filter(|map| map.style().is_some())?;
        let id = inner.features.find(|f| f.owns_symbol(symbol))?;

        if let Some(dragged) = map.symbol_mut(symbol) {
            dragged.geometry = to_position(position);
            dragged.data = serde_json::Value::Null;
        }
        if let Some(Feature::Poly(poly)) = inner.features.get_mut(id) {
            poly.update(map);
        }
        Some(id)
    }

    fn on_map_ready(&self, ready: ReadyListener, error: Option<ErrorListener>) {
        let has_token = {
            let inner = self.inner.borrow();
            if inner.state != FragmentState::Attaching {
                log::debug!(
                    "fragment {} detached before its map was ready",
                    inner.instance_id
                );
                return;
            }
            inner.context.mapbox_access_token().is_some()
        };

        if !has_token {
            log::warn!("Mapbox map cannot start without an access token");
            self.inner.borrow_mut().state = FragmentState::Unattached;
            if let Some(error) = error {
                error();
            }
            return;
        }

        let style_url = {
            let mut inner = self.inner.borrow_mut();
            let mut map = MapboxMap::new(inner.context.viewport_size());
            map.move_camera(LatLng::from(INITIAL_CENTER), Some(INITIAL_ZOOM), false);
            inner.map = Some(map);
            inner.pending_ready = Some(ready);
            inner.style_url.clone()
        };
        self.request_style(style_url);
    }

    /// Starts loading `url`; the load completes on a later looper turn.
    fn request_style(&self, url: String) {
        let looper = {
            let mut inner = self.inner.borrow_mut();
            let Some(map) = inner.map.as_mut() else {
                return;
            };
            map.set_style_url(&url);
            inner.looper.clone()
        };
        let Some(looper) = looper else {
            return;
        };

        let weak = self.downgrade();
        looper.post(move || {
            if let Some(inner) = weak.upgrade() {
                MapboxMapFragment { inner }.on_style_loaded(&url);
            }
        });
    }

    fn on_style_loaded(&self, url: &str) {
        let ready = {
            let mut inner = self.inner.borrow_mut();
            if inner.state == FragmentState::Detached {
                return;
            }
            let Some(map) = inner.map.as_mut() else {
                return;
            };
            if !map.finish_style_load(url) {
                log::debug!("style {} superseded before it loaded", url);
                return;
            }
            inner.load_reference_overlay();
            if let (true, Some(fix)) = (inner.gps_enabled, inner.gps.last_fix()) {
                if let Some(map) = inner.map.as_mut() {
                    map.set_location_indicator(Some(LatLng::from(fix)));
                }
            }

            if inner.state == FragmentState::Attaching {
                inner.state = FragmentState::Ready;
                log::info!("Mapbox map {} ready with {}", inner.instance_id, url);
                inner.pending_ready.take()
            } else {
                None
            }
        };
        if let Some(ready) = ready {
            ready(self.handle());
        }
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
                MapboxMapFragment { inner }.on_location_changed(location);
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
            if let Some(map) = inner.styled_map_mut() {
                map.set_location_indicator(Some(LatLng::from(fix)));
            }
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

impl MapFragment for MapboxMapFragment {
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
            inner.looper = Some(host.looper().clone());
            host.attach(container_id, inner.instance_id);
        }

        let weak = self.downgrade();
        host.looper().post(move || {
            if let Some(inner) = weak.upgrade() {
                MapboxMapFragment { inner }.on_map_ready(ready, error);
            }
        });
    }

    fn apply_config(&self, config: &ConfigBundle) {
        let restyle = {
            let mut inner = self.inner.borrow_mut();
            inner.style_url = config
                .get_string(KEY_STYLE_URL)
                .unwrap_or_else(|| DEFAULT_STYLE_URL.to_string());
            inner.reference_layer = config.get_string(KEY_REFERENCE_LAYER).map(PathBuf::from);

            let Some(map) = inner.map.as_ref() else {
                return;
            };
            let current = map
                .loading_style()
                .or_else(|| map.style().map(|style| style.url()));
            if current != Some(inner.style_url.as_str()) {
                Some(inner.style_url.clone())
            } else {
                // Same style. A load in flight picks up the overlay itself.
                if map.loading_style().is_none() {
                    inner.load_reference_overlay();
                }
                None
            }
        };
        if let Some(url) = restyle {
            self.request_style(url);
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
        inner.unserve_reference();
        inner.state = FragmentState::Detached;
        inner.map = None;
        inner.pending_ready = None;
        inner.features.clear();
    }

    fn center(&self) -> MapPoint {
        self.inner
            .borrow()
            .styled_map()
            .map(|map| MapPoint::from(map.camera_target()))
            .unwrap_or(INITIAL_CENTER)
    }

    fn zoom(&self) -> f64 {
        self.inner
            .borrow()
            .styled_map()
            .map(MapboxMap::camera_zoom)
            .unwrap_or(INITIAL_ZOOM)
    }

    fn set_center(&self, center: MapPoint, animate: bool) {
        if let Some(map) = self.inner.borrow_mut().styled_map_mut() {
            map.move_camera(center.into(), None, animate);
        }
    }

    fn zoom_to_point_at(&self, center: MapPoint, zoom: f64, animate: bool) {
        if let Some(map) = self.inner.borrow_mut().styled_map_mut() {
            map.move_camera(center.into(), Some(zoom), animate);
        }
    }

    fn zoom_to_bounding_box(&self, points: &[MapPoint], scale_factor: f64, animate: bool) {
        match bounding_box_target(points, scale_factor) {
            BoundingBoxTarget::Unchanged => {}
            BoundingBoxTarget::Point(point) => self.zoom_to_point(point, animate),
            BoundingBoxTarget::Bounds(bounds) => {
                if let Some(map) = self.inner.borrow_mut().styled_map_mut() {
                    map.fit_bounds(bounds, animate);
                }
            }
        }
    }

    fn add_marker(&self, point: MapPoint, draggable: bool, anchor: IconAnchor) -> Option<FeatureId> {
        let mut guard = self.inner.borrow_mut();
        let inner = &mut *guard;
        let map = inner.map.as_mut().filter(|map| map.style().is_some())?;
        let symbol = create_symbol(map, &point, draggable, anchor);
        Some(inner.features.insert(Feature::Marker(MarkerFeature { symbol })))
    }

    fn set_marker_icon(&self, feature: FeatureId, icon: MarkerIcon) {
        let mut guard = self.inner.borrow_mut();
        let inner = &mut *guard;
        let Some(Feature::Marker(marker)) = inner.features.get(feature) else {
            return;
        };
        if let Some(symbol) = inner
            .map
            .as_mut()
            .and_then(|map| map.symbol_mut(marker.symbol))
        {
            symbol.icon_image = icon;
        }
    }

    fn marker_point(&self, feature: FeatureId) -> Option<MapPoint> {
        let inner = self.inner.borrow();
        let map = inner.styled_map()?;
        match inner.features.get(feature)? {
            Feature::Marker(marker) => map.symbol(marker.symbol).map(from_symbol),
            Feature::Poly(_) => None,
        }
    }

    fn add_draggable_poly(&self, points: &[MapPoint], closed: bool) -> Option<FeatureId> {
        let mut guard = self.inner.borrow_mut();
        let inner = &mut *guard;
        let map = inner.map.as_mut().filter(|map| map.style().is_some())?;
        let mut poly = PolyFeature {
            vertices: Vec::with_capacity(points.len()),
            line: None,
            closed,
        };
        for point in points {
            poly.vertices
                .push(create_symbol(map, point, true, IconAnchor::Center));
        }
        poly.update(map);
        Some(inner.features.insert(Feature::Poly(poly)))
    }

    fn append_point_to_poly(&self, feature: FeatureId, point: MapPoint) {
        let mut guard = self.inner.borrow_mut();
        let inner = &mut *guard;
        let Some(map) = inner.map.as_mut().filter(|map| map.style().is_some()) else {
            return;
        };
        if let Some(Feature::Poly(poly)) = inner.features.get_mut(feature) {
            poly.vertices
                .push(create_symbol(map, &point, true, IconAnchor::Center));
            poly.update(map);
        }
    }

    fn remove_poly_last_point(&self, feature: FeatureId) {
        let mut guard = self.inner.borrow_mut();
        let inner = &mut *guard;
        let Some(map) = inner.map.as_mut().filter(|map| map.style().is_some()) else {
            return;
        };
        if let Some(Feature::Poly(poly)) = inner.features.get_mut(feature) {
            if let Some(last) = poly.vertices.pop() {
                map.delete_symbol(last);
                poly.update(map);
            }
        }
    }

    fn poly_points(&self, feature: FeatureId) -> Vec<MapPoint> {
        let inner = self.inner.borrow();
        let (Some(map), Some(Feature::Poly(poly))) = (inner.styled_map(), inner.features.get(feature))
        else {
            return Vec::new();
        };
        poly.vertices
            .iter()
            .filter_map(|id| map.symbol(*id))
            .map(from_symbol)
            .collect()
    }

    fn remove_feature(&self, feature: FeatureId) {
        let mut guard = self.inner.borrow_mut();
        let inner = &mut *guard;
        let Some(map) = inner.map.as_mut().filter(|map| map.style().is_some()) else {
            return;
        };
        if let Some(removed) = inner.features.remove(feature) {
            removed.dispose(map);
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
                if let Some(map) = inner.map.as_mut() {
                    map.set_location_indicator(None);
                }
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
