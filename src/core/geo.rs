use serde::{Deserialize, Serialize};

use crate::core::point::MapPoint;

/// Highest latitude Web Mercator can represent
const MAX_LATITUDE: f64 = 85.0511287798;

/// A vendor-side coordinate: latitude and longitude only.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Wraps longitude to [-180, 180] range
    pub fn wrap_lng(lng: f64) -> f64 {
        let wrapped = lng % 360.0;
        if wrapped > 180.0 {
            wrapped - 360.0
        } else if wrapped < -180.0 {
            wrapped + 360.0
        } else {
            wrapped
        }
    }

    /// Clamps latitude to the range Web Mercator can represent
    pub fn clamp_lat(lat: f64) -> f64 {
        lat.clamp(-MAX_LATITUDE, MAX_LATITUDE)
    }
}

impl Default for LatLng {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

/// Altitude and accuracy are dropped; vendor scenes carry them elsewhere.
impl From<MapPoint> for LatLng {
    fn from(point: MapPoint) -> Self {
        Self::new(point.lat, point.lon)
    }
}

impl From<LatLng> for MapPoint {
    fn from(lat_lng: LatLng) -> Self {
        MapPoint::new(lat_lng.lat, lat_lng.lng)
    }
}

/// Represents a tile coordinate in the slippy map (XYZ) tile system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileCoord {
    pub x: u32,
    pub y: u32,
    pub z: u8,
}

impl TileCoord {
    pub fn new(x: u32, y: u32, z: u8) -> Self {
        Self { x, y, z }
    }

    /// Number of tile rows (and columns) at this zoom level, or `None` when
    /// the zoom is too deep to count in a `u64`.
    pub fn row_count(&self) -> Option<u64> {
        1u64.checked_shl(u32::from(self.z))
    }

    /// Row number in the TMS convention used by mbtiles, where row 0 is the
    /// southernmost row. `None` if the tile is outside the zoom level's grid.
    pub fn tms_row(&self) -> Option<u32> {
        if !self.is_valid() {
            return None;
        }
        let rows = self.row_count()?;
        u32::try_from(rows - 1 - u64::from(self.y)).ok()
    }

    /// Checks if the tile is valid for the given zoom level
    pub fn is_valid(&self) -> bool {
        match self.row_count() {
            Some(max_coord) => u64::from(self.x) < max_coord && u64::from(self.y) < max_coord,
            None => false,
        }
    }
}
