//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use fieldmap::context::LocationSink;
use fieldmap::map::{ErrorListener, FeatureListener, PointListener, ReadyListener};
use fieldmap::{
    ConfigBundle, FeatureId, IconAnchor, Location, LocationClient, MapContext, MapFragment,
    MapHost, MapPoint, MarkerIcon,
};
use rusqlite::{params, Connection};

/// Hands location fixes to whichever client the fragment has started.
#[derive(Clone, Default)]
pub struct LocationFeed {
    sink: Rc<RefCell<Option<LocationSink>>>,
    starts: Rc<Cell<usize>>,
}

impl LocationFeed {
    pub fn is_started(&self) -> bool {
        self.sink.borrow().is_some()
    }

    pub fn starts(&self) -> usize {
        self.starts.get()
    }

    /// Delivers `location` if a client is listening; returns whether it was.
    pub fn deliver(&self, location: Location) -> bool {
        let sink = self.sink.borrow().clone();
        match sink {
            Some(sink) => {
                sink(location);
                true
            }
            None => false,
        }
    }
}

pub struct ScriptedLocationClient {
    feed: LocationFeed,
}

impl LocationClient for ScriptedLocationClient {
    fn start(&mut self, sink: LocationSink) {
        self.feed.starts.set(self.feed.starts.get() + 1);
        *self.feed.sink.borrow_mut() = Some(sink);
    }

    fn stop(&mut self) {
        *self.feed.sink.borrow_mut() = None;
    }

    fn is_started(&self) -> bool {
        self.feed.is_started()
    }
}

/// A device whose capabilities the test picks, recording user messages.
pub struct FakeContext {
    pub play_services: bool,
    pub mapbox_token: Option<String>,
    pub messages: RefCell<Vec<String>>,
    pub feed: LocationFeed,
}

impl FakeContext {
    pub fn new() -> Self {
        Self {
            play_services: true,
            mapbox_token: Some("pk.test".to_string()),
            messages: RefCell::new(Vec::new()),
            feed: LocationFeed::default(),
        }
    }

    pub fn without_play_services() -> Self {
        Self {
            play_services: false,
            ..Self::new()
        }
    }

    pub fn without_mapbox_token() -> Self {
        Self {
            mapbox_token: None,
            ..Self::new()
        }
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.borrow().clone()
    }
}

impl MapContext for FakeContext {
    fn gles_version(&self) -> (u32, u32) {
        (3, 0)
    }

    fn play_services_available(&self) -> bool {
        self.play_services
    }

    fn mapbox_access_token(&self) -> Option<String> {
        self.mapbox_token.clone()
    }

    fn viewport_size(&self) -> (f64, f64) {
        (1024.0, 1024.0)
    }

    fn show_message(&self, message: &str) {
        self.messages.borrow_mut().push(message.to_string());
    }

    fn new_location_client(&self) -> Box<dyn LocationClient> {
        Box::new(ScriptedLocationClient {
            feed: self.feed.clone(),
        })
    }
}

/// A fragment that only records the configs applied to it.
pub struct RecordingFragment {
    id: u64,
    configs: RefCell<Vec<ConfigBundle>>,
}

impl RecordingFragment {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            configs: RefCell::new(Vec::new()),
        }
    }

    pub fn configs(&self) -> Vec<ConfigBundle> {
        self.configs.borrow().clone()
    }

    pub fn apply_count(&self) -> usize {
        self.configs.borrow().len()
    }
}

impl MapFragment for RecordingFragment {
    fn instance_id(&self) -> u64 {
        self.id
    }

    fn add_to(&self, _: &MapHost, _: &str, _: ReadyListener, _: Option<ErrorListener>) {}

    fn apply_config(&self, config: &ConfigBundle) {
        self.configs.borrow_mut().push(config.clone());
    }

    fn on_resume(&self) {}

    fn on_pause(&self) {}

    fn on_destroy(&self) {}

    fn center(&self) -> MapPoint {
        fieldmap::constants::INITIAL_CENTER
    }

    fn zoom(&self) -> f64 {
        fieldmap::constants::INITIAL_ZOOM
    }

    fn set_center(&self, _: MapPoint, _: bool) {}

    fn zoom_to_point_at(&self, _: MapPoint, _: f64, _: bool) {}

    fn zoom_to_bounding_box(&self, _: &[MapPoint], _: f64, _: bool) {}

    fn add_marker(&self, _: MapPoint, _: bool, _: IconAnchor) -> Option<FeatureId> {
        None
    }

    fn set_marker_icon(&self, _: FeatureId, _: MarkerIcon) {}

    fn marker_point(&self, _: FeatureId) -> Option<MapPoint> {
        None
    }

    fn add_draggable_poly(&self, _: &[MapPoint], _: bool) -> Option<FeatureId> {
        None
    }

    fn append_point_to_poly(&self, _: FeatureId, _: MapPoint) {}

    fn remove_poly_last_point(&self, _: FeatureId) {}

    fn poly_points(&self, _: FeatureId) -> Vec<MapPoint> {
        Vec::new()
    }

    fn remove_feature(&self, _: FeatureId) {}

    fn clear_features(&self) {}

    fn set_click_listener(&self, _: Option<PointListener>) {}

    fn set_long_press_listener(&self, _: Option<PointListener>) {}

    fn set_feature_click_listener(&self, _: Option<FeatureListener>) {}

    fn set_drag_end_listener(&self, _: Option<FeatureListener>) {}

    fn set_gps_location_listener(&self, _: Option<PointListener>) {}

    fn set_gps_location_enabled(&self, _: bool) {}

    fn run_on_gps_location_ready(&self, _: ReadyListener) {}

    fn gps_location(&self) -> Option<MapPoint> {
        None
    }

    fn location_provider(&self) -> Option<String> {
        None
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Writes an mbtiles archive with the given metadata and XYZ tiles.
pub fn write_mbtiles(path: &Path, metadata: &[(&str, &str)], tiles: &[(u8, u32, u32, &[u8])]) {
    let conn = Connection::open(path).unwrap();
    conn.execute_batch(
        "CREATE TABLE metadata (name TEXT, value TEXT);
         CREATE TABLE tiles (zoom_level INTEGER, tile_column INTEGER, tile_row INTEGER, tile_data BLOB);",
    )
    .unwrap();
    for (name, value) in metadata {
        conn.execute(
            "INSERT INTO metadata (name, value) VALUES (?1, ?2)",
            params![name, value],
        )
        .unwrap();
    }
    for (z, x, y, data) in tiles {
        let tms_row = (1u32 << z) - 1 - y;
        conn.execute(
            "INSERT INTO tiles (zoom_level, tile_column, tile_row, tile_data) VALUES (?1, ?2, ?3, ?4)",
            params![z, x, tms_row, data],
        )
        .unwrap();
    }
}

pub fn raster_archive(dir: &Path, file_name: &str, name: &str) -> PathBuf {
    let path = dir.join(file_name);
    write_mbtiles(
        &path,
        &[("name", name), ("format", "png"), ("minzoom", "0"), ("maxzoom", "4")],
        &[(2, 1, 0, &b"png-2-1-0"[..])],
    );
    path
}

pub fn vector_archive(dir: &Path, file_name: &str, name: &str) -> PathBuf {
    let path = dir.join(file_name);
    write_mbtiles(
        &path,
        &[
            ("name", name),
            ("format", "pbf"),
            (
                "json",
                r#"{"vector_layers":[{"id":"roads","fields":{}},{"id":"water","fields":{}}]}"#,
            ),
        ],
        &[(0, 0, 0, &b"pbf-0-0-0"[..])],
    );
    path
}
