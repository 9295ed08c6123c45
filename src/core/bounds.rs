use crate::core::constants::{MAX_LON_RADIUS, MAX_ZOOM, TILE_SIZE};
use crate::core::geo::LatLng;
use crate::core::point::MapPoint;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Represents a bounding box of geographical coordinates.
///
/// Longitudes are kept in [-180, 180]. A box whose `north_east.lng` is less
/// than its `south_west.lng` crosses the antimeridian.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLngBounds {
    pub south_west: LatLng,
    pub north_east: LatLng,
}

impl LatLngBounds {
    pub fn new(south_west: LatLng, north_east: LatLng) -> Self {
        Self {
            south_west,
            north_east,
        }
    }

    /// Creates bounds from individual coordinates
    pub fn from_coords(south: f64, west: f64, north: f64, east: f64) -> Self {
        Self::new(LatLng::new(south, west), LatLng::new(north, east))
    }

    /// Smallest box enclosing every point. When the points straddle the
    /// antimeridian the narrower of the two possible longitude spans wins.
    pub fn enclosing<'a, I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a MapPoint>,
    {
        let mut south = f64::INFINITY;
        let mut north = f64::NEG_INFINITY;
        let mut lngs = Vec::new();

        for point in points {
            south = south.min(point.lat);
            north = north.max(point.lat);
            lngs.push(LatLng::wrap_lng(point.lon));
        }
        if lngs.is_empty() {
            return None;
        }

        lngs.sort_by(|a, b| a.total_cmp(b));
        lngs.dedup();

        // The box is the complement of the widest gap between neighbouring
        // longitudes, counting the gap that wraps around from last to first.
        let last = lngs.len() - 1;
        let mut widest_gap = lngs[0] + 360.0 - lngs[last];
        let mut west = lngs[0];
        let mut east = lngs[last];
        for i in 0..last {
            let gap = lngs[i + 1] - lngs[i];
            if gap > widest_gap {
                widest_gap = gap;
                west = lngs[i + 1];
                east = lngs[i];
            }
        }

        Some(Self::from_coords(south, west, north, east))
    }

    pub fn south(&self) -> f64 {
        self.south_west.lat
    }

    pub fn north(&self) -> f64 {
        self.north_east.lat
    }

    pub fn west(&self) -> f64 {
        self.south_west.lng
    }

    pub fn east(&self) -> f64 {
        self.north_east.lng
    }

    /// Whether the box wraps across longitude ±180
    pub fn crosses_antimeridian(&self) -> bool {
        self.east() < self.west()
    }

    /// Longitude span in degrees, measured eastward from `west`
    pub fn lng_span(&self) -> f64 {
        let span = self.east() - self.west();
        if span < 0.0 {
            span + 360.0
        } else {
            span
        }
    }

    /// Checks if the bounds contain a point
    pub fn contains(&self, point: &LatLng) -> bool {
        if point.lat < self.south() || point.lat > self.north() {
            return false;
        }
        let lng = LatLng::wrap_lng(point.lng);
        if self.crosses_antimeridian() {
            lng >= self.west() || lng <= self.east()
        } else {
            lng >= self.west() && lng <= self.east()
        }
    }

    /// Gets the center point of the bounds
    pub fn center(&self) -> LatLng {
        let lat = (self.south() + self.north()) / 2.0;
        let lng = LatLng::wrap_lng(self.west() + self.lng_span() / 2.0);
        LatLng::new(lat, lng)
    }

    /// Grows (or shrinks) the box around its midpoint by `factor`.
    ///
    /// Latitude is clamped to [-90, 90]. Longitude is unwrapped across the
    /// antimeridian first, then expanded symmetrically, with the half-span
    /// capped just under 180° so the box never covers the globe twice.
    pub fn expanded(&self, factor: f64) -> Self {
        let lat_center = (self.north() + self.south()) / 2.0;
        let lat_radius = ((self.north() - self.south()) / 2.0) * factor;
        let north = (lat_center + lat_radius).min(90.0);
        let south = (lat_center - lat_radius).max(-90.0);

        let west = self.west();
        let mut east = self.east();
        while east < west {
            east += 360.0;
        }
        let lng_center = (east + west) / 2.0;
        let lng_radius = (((east - west) / 2.0) * factor).min(MAX_LON_RADIUS);

        Self::from_coords(
            south,
            LatLng::wrap_lng(lng_center - lng_radius),
            north,
            LatLng::wrap_lng(lng_center + lng_radius),
        )
    }

    /// Largest (fractional) zoom level at which the whole box fits in a
    /// viewport of the given pixel size.
    pub fn zoom_to_fit(&self, viewport: (f64, f64)) -> f64 {
        let (width, height) = viewport;
        let tile = TILE_SIZE as f64;

        let x_fraction = self.lng_span() / 360.0;
        let y_fraction = (mercator_y(self.north()) - mercator_y(self.south())).abs();

        let fit = |pixels: f64, fraction: f64| {
            if fraction <= 0.0 {
                MAX_ZOOM
            } else {
                (pixels / tile / fraction).log2()
            }
        };

        fit(width, x_fraction)
            .min(fit(height, y_fraction))
            .clamp(0.0, MAX_ZOOM)
    }
}

/// Normalised Web Mercator y (the world spans one unit)
fn mercator_y(lat: f64) -> f64 {
    let lat_rad = LatLng::clamp_lat(lat).to_radians();
    (PI / 4.0 + lat_rad / 2.0).tan().ln() / (2.0 * PI)
}
