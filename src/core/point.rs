use serde::{Deserialize, Serialize};
use std::fmt;

/// Provider-neutral map coordinate.
///
/// `alt` (meters) and `sd` (standard deviation of the fix, meters) only carry
/// meaning for points that came from a GPS reading; points placed or dragged
/// by hand have both set to zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapPoint {
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub alt: f64,
    #[serde(default)]
    pub sd: f64,
}

impl MapPoint {
    /// Creates a point with zero altitude and standard deviation.
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self {
            lat,
            lon,
            alt: 0.0,
            sd: 0.0,
        }
    }

    /// Creates a point carrying GPS altitude and accuracy.
    pub const fn with_altitude(lat: f64, lon: f64, alt: f64, sd: f64) -> Self {
        Self { lat, lon, alt, sd }
    }

    /// Same position with altitude and standard deviation cleared, as happens
    /// when a point is moved by hand.
    pub fn without_fix(&self) -> Self {
        Self::new(self.lat, self.lon)
    }
}

impl Default for MapPoint {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

impl fmt::Display for MapPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MapPoint({:.6}, {:.6}, alt {:.1}, sd {:.1})",
            self.lat, self.lon, self.alt, self.sd
        )
    }
}
