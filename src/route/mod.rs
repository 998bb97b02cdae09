//! Route value type and preparation
//!
//! A [`Route`] is what the playback engine walks: at least two points, in
//! traversal order, with no segment longer than the spacing it was
//! densified to.

pub mod densify;

pub use densify::{densify, DEFAULT_MAX_SEGMENT_METERS, MAX_ROUTE_POINTS};

use crate::core::{distance, path_length, Coordinate};
use crate::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};

/// Segments shorter than this carry no usable direction; a whole route this
/// short is a single point
pub const DEGENERATE_SEGMENT_METERS: f64 = 0.1;

/// An ordered, non-degenerate polyline
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    points: Vec<Coordinate>,
}

impl Route {
    /// Wrap a point list, rejecting anything shorter than one segment
    pub fn new(points: Vec<Coordinate>) -> EngineResult<Self> {
        if points.len() < 2 {
            return Err(EngineError::InvalidRoute(format!(
                "a route needs at least 2 points, got {}",
                points.len()
            )));
        }
        if let Some(idx) = points.iter().position(|p| !p.is_finite()) {
            return Err(EngineError::InvalidRoute(format!("point {} is not a finite coordinate", idx)));
        }
        let length = path_length(&points);
        if length < DEGENERATE_SEGMENT_METERS {
            return Err(EngineError::InvalidRoute(format!(
                "route is {:.3} m long, all points coincide",
                length
            )));
        }
        Ok(Self { points })
    }

    pub fn points(&self) -> &[Coordinate] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// A valid route is never empty
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Number of segments
    pub fn segment_count(&self) -> usize {
        self.points.len() - 1
    }

    pub fn first(&self) -> Coordinate {
        self.points[0]
    }

    pub fn last(&self) -> Coordinate {
        self.points[self.points.len() - 1]
    }

    /// Endpoints of segment `index`, if it exists
    pub fn segment(&self, index: usize) -> Option<(Coordinate, Coordinate)> {
        match (self.points.get(index), self.points.get(index + 1)) {
            (Some(&a), Some(&b)) => Some((a, b)),
            _ => None,
        }
    }

    /// Length of segment `index` in meters, 0 past the end
    pub fn segment_length(&self, index: usize) -> f64 {
        self.segment(index).map(|(a, b)| distance(a, b)).unwrap_or(0.0)
    }

    /// Total length in meters
    pub fn length_meters(&self) -> f64 {
        path_length(&self.points)
    }

    pub fn stats(&self) -> RouteStats {
        RouteStats::of(&self.points)
    }
}

/// Length and size summary of a polyline
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteStats {
    pub distance_meters: f64,
    pub points: usize,
}

impl RouteStats {
    /// Stats for any point list; fewer than two points count as empty
    pub fn of(points: &[Coordinate]) -> Self {
        if points.len() < 2 {
            return Self { distance_meters: 0.0, points: 0 };
        }
        Self {
            distance_meters: path_length(points),
            points: points.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_rejects_short_input() {
        assert!(matches!(Route::new(vec![]), Err(EngineError::InvalidRoute(_))));
        assert!(matches!(
            Route::new(vec![Coordinate::new(1.0, 1.0)]),
            Err(EngineError::InvalidRoute(_))
        ));
    }

    #[test]
    fn test_route_rejects_nan() {
        let points = vec![Coordinate::new(0.0, 0.0), Coordinate::new(f64::NAN, 0.0)];
        assert!(matches!(Route::new(points), Err(EngineError::InvalidRoute(_))));
    }

    #[test]
    fn test_route_rejects_coincident_points() {
        let p = Coordinate::new(31.23, 121.47);
        assert!(matches!(Route::new(vec![p, p]), Err(EngineError::InvalidRoute(_))));
        assert!(matches!(Route::new(vec![p, p, p]), Err(EngineError::InvalidRoute(_))));

        // duplicates are fine as long as the route goes somewhere
        let q = Coordinate::new(31.23, 121.4701);
        assert!(Route::new(vec![p, p, q]).is_ok());
    }

    #[test]
    fn test_segments() {
        let route = Route::new(vec![
            Coordinate::new(0.0, 0.0),
            Coordinate::new(0.0, 0.001),
            Coordinate::new(0.0, 0.002),
        ])
        .unwrap();

        assert_eq!(route.segment_count(), 2);
        assert!(route.segment(1).is_some());
        assert!(route.segment(2).is_none());
        assert_eq!(route.segment_length(5), 0.0);
        assert!((route.length_meters() - 2.0 * route.segment_length(0)).abs() < 1e-6);
    }

    #[test]
    fn test_stats_of_short_list() {
        let stats = RouteStats::of(&[Coordinate::new(0.0, 0.0)]);
        assert_eq!(stats.points, 0);
        assert_eq!(stats.distance_meters, 0.0);
    }
}
