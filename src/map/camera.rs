use crate::core::bounds::LatLngBounds;
use crate::core::point::MapPoint;

/// What a bounding-box zoom should do with the camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BoundingBoxTarget {
    /// No points: leave the camera alone.
    Unchanged,
    /// One point: zoom to it like `zoom_to_point`.
    Point(MapPoint),
    /// Fit this (already expanded) box.
    Bounds(LatLngBounds),
}

/// Resolves the camera target for `zoom_to_bounding_box`.
///
/// The enclosing box is grown by `1 / scale_factor`; a non-positive factor is
/// treated as 1.
pub fn bounding_box_target(points: &[MapPoint], scale_factor: f64) -> BoundingBoxTarget {
    match points {
        [] => BoundingBoxTarget::Unchanged,
        [point] => BoundingBoxTarget::Point(*point),
        _ => {
            let factor = if scale_factor > 0.0 {
                1.0 / scale_factor
            } else {
                log::warn!("ignoring bounding box scale factor {}", scale_factor);
                1.0
            };
            match LatLngBounds::enclosing(points) {
                Some(bounds) => BoundingBoxTarget::Bounds(bounds.expanded(factor)),
                None => BoundingBoxTarget::Unchanged,
            }
        }
    }
}
