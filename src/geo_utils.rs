//! Geographic distance utilities.

use geo::{GeodesicDistance, Point};

use crate::GeoPoint;

/// Geodesic distance between two points in kilometers.
///
/// Uses Karney's algorithm on the WGS84 ellipsoid, which is accurate at
/// global voyage scales where haversine drift becomes visible.
pub fn geodesic_distance_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let from = Point::new(a.lon, a.lat);
    let to = Point::new(b.lon, b.lat);
    from.geodesic_distance(&to) / 1000.0
}
