//! Core constants shared by every map adapter.
//! Keeping them in a single place makes it easier to tweak engine-wide magic numbers.

use crate::core::point::MapPoint;

/// Camera center used before the map is ready and on first display.
pub const INITIAL_CENTER: MapPoint = MapPoint::new(0.0, -30.0);

/// Zoom level used before the map is ready and on first display.
pub const INITIAL_ZOOM: f64 = 2.0;

/// Zoom level used by `zoom_to_point` when no zoom is given.
pub const POINT_ZOOM: f64 = 16.0;

/// Default square tile size in pixels.
pub const TILE_SIZE: u32 = 256;

/// Viewport assumed by scenes that have not been told their size.
pub const DEFAULT_VIEWPORT: (f64, f64) = (1080.0, 1920.0);

/// Highest zoom any scene will settle on when fitting bounds.
pub const MAX_ZOOM: f64 = 22.0;

/// Longitude half-span limit used when expanding bounds, just under 180°.
pub const MAX_LON_RADIUS: f64 = 180.0 - 1e-6;
