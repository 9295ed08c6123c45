//! The platform services the map layer depends on
//!
//! A `MapContext` answers the capability questions configurators ask
//! (graphics support, Play Services, access tokens), shows user-facing
//! messages, and hands out location clients for GPS tracking.

use serde::{Deserialize, Serialize};
use std::rc::Rc;

use crate::core::constants::DEFAULT_VIEWPORT;
use crate::core::point::MapPoint;

/// A single location fix as reported by a location client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lon: f64,
    pub altitude: f64,
    /// Horizontal accuracy radius in meters
    pub accuracy: f64,
    pub provider: Option<String>,
}

impl Location {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self {
            lat,
            lon,
            altitude: 0.0,
            accuracy: 0.0,
            provider: None,
        }
    }

    pub fn with_fix(mut self, altitude: f64, accuracy: f64) -> Self {
        self.altitude = altitude;
        self.accuracy = accuracy;
        self
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// The map point for this fix; accuracy becomes the standard deviation.
    pub fn to_map_point(&self) -> MapPoint {
        MapPoint::with_altitude(self.lat, self.lon, self.altitude, self.accuracy)
    }
}

/// Receives location fixes on the main thread.
pub type LocationSink = Rc<dyn Fn(Location)>;

/// Source of location updates for one map fragment.
pub trait LocationClient {
    /// Begins delivering fixes to `sink` until `stop` is called.
    fn start(&mut self, sink: LocationSink);

    fn stop(&mut self);

    fn is_started(&self) -> bool;
}

/// A client that never produces a fix, for hosts without positioning.
#[derive(Debug, Default)]
pub struct NoLocationClient {
    started: bool,
}

impl LocationClient for NoLocationClient {
    fn start(&mut self, _sink: LocationSink) {
        self.started = true;
    }

    fn stop(&mut self) {
        self.started = false;
    }

    fn is_started(&self) -> bool {
        self.started
    }
}

/// Platform capabilities and services.
pub trait MapContext {
    /// OpenGL ES version as `(major, minor)`
    fn gles_version(&self) -> (u32, u32);

    fn play_services_available(&self) -> bool;

    fn mapbox_access_token(&self) -> Option<String>;

    /// Map viewport size in pixels
    fn viewport_size(&self) -> (f64, f64) {
        DEFAULT_VIEWPORT
    }

    /// Shows a short message to the user.
    fn show_message(&self, message: &str);

    fn new_location_client(&self) -> Box<dyn LocationClient>;
}

/// A static description of a device, readable from a settings file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceProfile {
    pub gles_version: (u32, u32),
    pub play_services: bool,
    pub mapbox_access_token: Option<String>,
    pub viewport: (f64, f64),
}

impl Default for DeviceProfile {
    fn default() -> Self {
        Self {
            gles_version: (3, 0),
            play_services: false,
            mapbox_access_token: None,
            viewport: DEFAULT_VIEWPORT,
        }
    }
}

impl MapContext for DeviceProfile {
    fn gles_version(&self) -> (u32, u32) {
        self.gles_version
    }

    fn play_services_available(&self) -> bool {
        self.play_services
    }

    fn mapbox_access_token(&self) -> Option<String> {
        self.mapbox_access_token
            .clone()
            .filter(|token| !token.trim().is_empty())
    }

    fn viewport_size(&self) -> (f64, f64) {
        self.viewport
    }

    fn show_message(&self, message: &str) {
        log::warn!("{}", message);
    }

    fn new_location_client(&self) -> Box<dyn LocationClient> {
        Box::new(NoLocationClient::default())
    }
}
