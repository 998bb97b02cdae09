use crate::core::{distance, interpolate, Coordinate};
use crate::error::{EngineError, EngineResult};
use crate::route::Route;

/// Spacing used when the caller does not pick one
pub const DEFAULT_MAX_SEGMENT_METERS: f64 = 5.0;

/// Largest route densification may produce
pub const MAX_ROUTE_POINTS: usize = 1_000_000;

/// Insert interpolated points so no segment is longer than `max_segment_meters`
///
/// A segment of length `d > max` is split into `ceil(d / max)` equal pieces.
/// The original points, including both endpoints, are kept in order.
pub fn densify(points: &[Coordinate], max_segment_meters: f64) -> EngineResult<Route> {
    if points.len() < 2 {
        return Err(EngineError::InvalidRoute(format!(
            "a route needs at least 2 points, got {}",
            points.len()
        )));
    }
    if !(max_segment_meters.is_finite() && max_segment_meters > 0.0) {
        return Err(EngineError::InvalidRoute(format!(
            "max segment spacing must be positive, got {}",
            max_segment_meters
        )));
    }

    // pieces per segment, counted in f64 so a tiny spacing cannot overflow
    let pieces: Vec<f64> = points
        .windows(2)
        .map(|pair| {
            let d = distance(pair[0], pair[1]);
            if d > max_segment_meters {
                (d / max_segment_meters).ceil()
            } else {
                1.0
            }
        })
        .collect();
    let total = 1.0 + pieces.iter().sum::<f64>();
    if !(total <= MAX_ROUTE_POINTS as f64) {
        return Err(EngineError::InvalidRoute(format!(
            "spacing of {} m would produce {:.0} points (limit {})",
            max_segment_meters, total, MAX_ROUTE_POINTS
        )));
    }

    let mut out = Vec::with_capacity(total as usize);
    out.push(points[0]);

    for (pair, &pieces) in points.windows(2).zip(&pieces) {
        let (start, end) = (pair[0], pair[1]);

        if pieces > 1.0 {
            let pieces = pieces as usize;
            for j in 1..pieces {
                out.push(interpolate(start, end, j as f64 / pieces as f64));
            }
        }
        out.push(end);
    }

    Route::new(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn max_gap(route: &Route) -> f64 {
        route
            .points()
            .windows(2)
            .map(|w| distance(w[0], w[1]))
            .fold(0.0, f64::max)
    }

    #[test]
    fn test_densify_bounds_spacing() {
        let points = vec![
            Coordinate::new(31.0, 121.0),
            Coordinate::new(31.001, 121.002),
            Coordinate::new(31.001, 121.0021),
            Coordinate::new(30.99, 121.01),
        ];

        for max in [1.0, 5.0, 37.5, 1000.0] {
            let route = densify(&points, max).unwrap();
            assert_eq!(route.first(), points[0]);
            assert_eq!(route.last(), points[3]);
            assert!(max_gap(&route) <= max + 1e-6, "max {} gap {}", max, max_gap(&route));
        }
    }

    #[test]
    fn test_densify_keeps_original_points_in_order() {
        let points = vec![
            Coordinate::new(0.0, 0.0),
            Coordinate::new(0.0, 0.001),
            Coordinate::new(0.001, 0.001),
        ];
        let route = densify(&points, 10.0).unwrap();

        let positions: Vec<usize> = points
            .iter()
            .map(|p| route.points().iter().position(|q| q == p).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_densify_short_segments_untouched() {
        let points = vec![Coordinate::new(0.0, 0.0), Coordinate::new(0.0, 0.00001)];
        let route = densify(&points, 5.0).unwrap();
        assert_eq!(route.points(), points.as_slice());
    }

    #[test]
    fn test_densify_point_count() {
        // ~1112 m at 5 m spacing -> 223 pieces
        let points = vec![Coordinate::new(0.0, 0.0), Coordinate::new(0.0, 0.01)];
        let route = densify(&points, 5.0).unwrap();
        assert_eq!(route.len(), 224);
    }

    #[test]
    fn test_densify_rejects_invalid_input() {
        assert!(matches!(
            densify(&[Coordinate::new(0.0, 0.0)], 5.0),
            Err(EngineError::InvalidRoute(_))
        ));
        let pair = [Coordinate::new(0.0, 0.0), Coordinate::new(0.0, 1.0)];
        assert!(densify(&pair, 0.0).is_err());
        assert!(densify(&pair, f64::NAN).is_err());
    }

    #[test]
    fn test_densify_rejects_oversized_output() {
        // ~111 km at 1 µm would be ~1.1e11 points
        let pair = [Coordinate::new(0.0, 0.0), Coordinate::new(0.0, 1.0)];
        let err = densify(&pair, 0.000001).unwrap_err();
        assert!(matches!(err, EngineError::InvalidRoute(ref msg) if msg.contains("limit")), "{}", err);

        // just under the limit still works
        let route = densify(&pair, 0.2).unwrap();
        assert!(route.len() <= MAX_ROUTE_POINTS);
    }
}
