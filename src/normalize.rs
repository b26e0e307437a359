//! Export-only coordinate smoothing.
//!
//! Historic log digitisation leaves two artefacts in rendered routes:
//! spurious near-zero longitudes at antimeridian crossings, and single
//! wildly-off points. Both passes operate on the flattened export list
//! and are never fed back into the trajectory used for matching.

use crate::route::ExportPoint;

/// Fix spurious near-zero longitudes produced at antimeridian crossings.
///
/// A point with longitude in (-1, 1) whose neighbors both come within
/// 5° of ±180 is assumed to be a digitisation artefact of a crossing;
/// its longitude is replaced with `180 - |lon|`, signed to match the
/// neighbor nearest the antimeridian. Points near the prime meridian
/// with ordinary neighbors are left alone.
pub fn fix_antimeridian_jumps(points: &mut [ExportPoint]) {
    if points.len() < 3 {
        return;
    }

    for i in 1..points.len() - 1 {
        let lon = points[i].lon;
        if lon <= -1.0 || lon >= 1.0 {
            continue;
        }

        let prev = points[i - 1].lon;
        let next = points[i + 1].lon;
        let prev_gap = 180.0 - prev.abs();
        let next_gap = 180.0 - next.abs();

        if prev_gap < 5.0 && next_gap < 5.0 {
            let near = if prev_gap <= next_gap { prev } else { next };
            let fixed = 180.0 - lon.abs();
            points[i].lon = if near < 0.0 { -fixed } else { fixed };
        }
    }
}

/// Smooth single-point outliers in latitude and longitude.
///
/// Where a coordinate's forward difference to the next point exceeds
/// 10° and its two neighbors are not numerically identical, the point is
/// replaced with the mean of its neighbors.
pub fn smooth_outliers(points: &mut [ExportPoint]) {
    smooth_axis(points, |p| p.lat, |p, v| p.lat = v);
    smooth_axis(points, |p| p.lon, |p, v| p.lon = v);
}

fn smooth_axis(
    points: &mut [ExportPoint],
    get: impl Fn(&ExportPoint) -> f64,
    set: impl Fn(&mut ExportPoint, f64),
) {
    if points.len() < 3 {
        return;
    }

    // Mark outliers up front so a replacement cannot create new ones
    let outliers: Vec<usize> = (1..points.len() - 1)
        .filter(|&i| get(&points[i]) - get(&points[i + 1]) > 10.0)
        .collect();

    for i in outliers {
        let prev = get(&points[i - 1]);
        let next = get(&points[i + 1]);
        if prev != next {
            set(&mut points[i], (prev + next) / 2.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(lon: f64, lat: f64) -> ExportPoint {
        ExportPoint {
            lon,
            lat,
            timestamp: 0,
        }
    }

    #[test]
    fn test_antimeridian_jump_fixed() {
        // The next point sits closer to the line, so its sign wins
        let mut points = vec![point(179.2, 0.0), point(0.3, 0.0), point(-179.8, 0.0)];
        fix_antimeridian_jumps(&mut points);
        assert!((points[1].lon - -179.7).abs() < 1e-9);
    }

    #[test]
    fn test_antimeridian_fix_signed_by_negative_neighbor() {
        let mut points = vec![point(-179.2, 0.0), point(0.3, 0.0), point(178.0, 0.0)];
        fix_antimeridian_jumps(&mut points);
        assert!((points[1].lon - -179.7).abs() < 1e-9);
    }

    #[test]
    fn test_near_meridian_points_untouched() {
        // Genuine route through the prime meridian
        let mut points = vec![point(2.0, 45.0), point(0.5, 45.0), point(-1.5, 45.0)];
        fix_antimeridian_jumps(&mut points);
        assert_eq!(points[1].lon, 0.5);
    }

    #[test]
    fn test_outlier_replaced_with_neighbor_mean() {
        let mut points = vec![point(10.0, 5.0), point(40.0, 5.0), point(11.0, 5.0)];
        smooth_outliers(&mut points);
        assert!((points[1].lon - 10.5).abs() < 1e-9);
    }

    #[test]
    fn test_outlier_kept_when_neighbors_identical() {
        let mut points = vec![point(10.0, 5.0), point(40.0, 5.0), point(10.0, 5.0)];
        smooth_outliers(&mut points);
        assert_eq!(points[1].lon, 40.0);
    }

    #[test]
    fn test_small_steps_untouched() {
        let mut points = vec![point(10.0, 5.0), point(12.0, 5.5), point(14.0, 6.0)];
        let before = points.clone();
        smooth_outliers(&mut points);
        assert_eq!(points, before);
    }

    #[test]
    fn test_endpoints_never_replaced() {
        let mut points = vec![point(50.0, 5.0), point(10.0, 5.0), point(11.0, 5.0)];
        smooth_outliers(&mut points);
        assert_eq!(points[0].lon, 50.0);
    }

    #[test]
    fn test_latitude_outlier() {
        let mut points = vec![point(10.0, 20.0), point(10.5, 55.0), point(11.0, 21.0)];
        smooth_outliers(&mut points);
        assert!((points[1].lat - 20.5).abs() < 1e-9);
    }
}
