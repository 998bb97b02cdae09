//! Spherical distance and interpolation helpers
//!
//! All distances are in meters on a sphere of radius [`EARTH_RADIUS_M`].

use crate::core::Coordinate;

/// Mean Earth radius used by the haversine formula
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance between two points in meters (haversine)
pub fn distance(a: Coordinate, b: Coordinate) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let delta_lat = (b.latitude - a.latitude).to_radians();
    let delta_lon = (b.longitude - a.longitude).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).max(0.0).sqrt());

    EARTH_RADIUS_M * c
}

/// Linear interpolation of latitude and longitude
///
/// `t` is clamped to `[0, 1]`. Not geodesic, which is fine for the short
/// segments a densified route is made of.
pub fn interpolate(a: Coordinate, b: Coordinate, t: f64) -> Coordinate {
    let t = t.clamp(0.0, 1.0);
    Coordinate {
        latitude: a.latitude + (b.latitude - a.latitude) * t,
        longitude: a.longitude + (b.longitude - a.longitude) * t,
    }
}

/// Sum of segment lengths along a polyline
pub fn path_length(points: &[Coordinate]) -> f64 {
    points.windows(2).map(|w| distance(w[0], w[1])).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_zero_and_symmetric() {
        let a = Coordinate::new(39.9042, 116.4074);
        let b = Coordinate::new(31.2304, 121.4737);

        assert_eq!(distance(a, a), 0.0);
        assert_eq!(distance(a, b), distance(b, a));
    }

    #[test]
    fn test_distance_known_values() {
        // 0.01 degree of longitude on the equator
        let d = distance(Coordinate::new(0.0, 0.0), Coordinate::new(0.0, 0.01));
        assert!((d - 1111.95).abs() < 0.1, "got {}", d);

        // Beijing to Shanghai is roughly 1067 km
        let d = distance(Coordinate::new(39.9042, 116.4074), Coordinate::new(31.2304, 121.4737));
        assert!((d / 1000.0 - 1067.0).abs() < 5.0, "got {}", d);
    }

    #[test]
    fn test_triangle_inequality() {
        let a = Coordinate::new(10.0, 10.0);
        let b = Coordinate::new(10.5, 11.0);
        let c = Coordinate::new(9.7, 10.2);

        assert!(distance(a, c) <= distance(a, b) + distance(b, c) + 1e-6);
        assert!(distance(a, b) <= distance(a, c) + distance(c, b) + 1e-6);
    }

    #[test]
    fn test_interpolate_endpoints_and_midpoint() {
        let a = Coordinate::new(0.0, 0.0);
        let b = Coordinate::new(2.0, -4.0);

        assert_eq!(interpolate(a, b, 0.0), a);
        assert_eq!(interpolate(a, b, 1.0), b);
        assert_eq!(interpolate(a, b, 0.5), Coordinate::new(1.0, -2.0));
        // out-of-range t is clamped
        assert_eq!(interpolate(a, b, 3.0), b);
    }

    #[test]
    fn test_path_length() {
        let points = [
            Coordinate::new(0.0, 0.0),
            Coordinate::new(0.0, 0.005),
            Coordinate::new(0.0, 0.01),
        ];
        let direct = distance(points[0], points[2]);
        assert!((path_length(&points) - direct).abs() < 1e-6);
        assert_eq!(path_length(&points[..1]), 0.0);
    }
}
