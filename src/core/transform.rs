//! Conversions between WGS-84, GCJ-02 and BD-09
//!
//! GCJ-02 is produced from WGS-84 by a fixed empirical polynomial that only
//! applies inside a mainland-China bounding box; outside it the two datums
//! are identical. BD-09 is a further rotation/offset of GCJ-02. Every
//! conversion goes through GCJ-02.

use crate::core::{CoordSystem, Coordinate};
use std::f64::consts::PI;

const X_PI: f64 = PI * 3000.0 / 180.0;
/// Krasovsky 1940 semi-major axis
const SEMI_MAJOR: f64 = 6_378_245.0;
/// Krasovsky 1940 first eccentricity squared
const ECCENTRICITY_SQ: f64 = 0.006_693_421_622_965_943_23;

/// Convert a coordinate between datums
///
/// Identity when `from == to`. WGS-84 <-> GCJ-02 leaves points outside the
/// correction domain untouched.
pub fn transform(coord: Coordinate, from: CoordSystem, to: CoordSystem) -> Coordinate {
    if from == to {
        return coord;
    }

    let gcj = match from {
        CoordSystem::Wgs84 => wgs84_to_gcj02(coord),
        CoordSystem::Gcj02 => coord,
        CoordSystem::Bd09 => bd09_to_gcj02(coord),
    };

    match to {
        CoordSystem::Wgs84 => gcj02_to_wgs84(gcj),
        CoordSystem::Gcj02 => gcj,
        CoordSystem::Bd09 => gcj02_to_bd09(gcj),
    }
}

/// Convert a whole polyline
pub fn transform_all(points: &[Coordinate], from: CoordSystem, to: CoordSystem) -> Vec<Coordinate> {
    points.iter().map(|&p| transform(p, from, to)).collect()
}

/// Whether the point lies outside the region where GCJ-02 differs from WGS-84
pub fn out_of_china(coord: Coordinate) -> bool {
    let Coordinate { latitude: lat, longitude: lon } = coord;
    !(72.004..=137.8347).contains(&lon) || !(0.8293..=55.8271).contains(&lat)
}

fn wgs84_to_gcj02(coord: Coordinate) -> Coordinate {
    if out_of_china(coord) {
        return coord;
    }
    let (d_lat, d_lon) = gcj_delta(coord);
    Coordinate::new(coord.latitude + d_lat, coord.longitude + d_lon)
}

/// The forward shift has no closed-form inverse; start from the shift at the
/// GCJ point and refine by fixed-point iteration.
fn gcj02_to_wgs84(coord: Coordinate) -> Coordinate {
    if out_of_china(coord) {
        return coord;
    }
    let (d_lat, d_lon) = gcj_delta(coord);
    let mut wgs = Coordinate::new(coord.latitude - d_lat, coord.longitude - d_lon);
    for _ in 0..INVERSE_ITERATIONS {
        let forward = wgs84_to_gcj02(wgs);
        wgs.latitude -= forward.latitude - coord.latitude;
        wgs.longitude -= forward.longitude - coord.longitude;
    }
    wgs
}

const INVERSE_ITERATIONS: usize = 4;

fn bd09_to_gcj02(coord: Coordinate) -> Coordinate {
    let x = coord.longitude - 0.0065;
    let y = coord.latitude - 0.006;
    let z = (x * x + y * y).sqrt() - 0.00002 * (y * X_PI).sin();
    let theta = y.atan2(x) - 0.000003 * (x * X_PI).cos();
    Coordinate::new(z * theta.sin(), z * theta.cos())
}

fn gcj02_to_bd09(coord: Coordinate) -> Coordinate {
    let x = coord.longitude;
    let y = coord.latitude;
    let z = (x * x + y * y).sqrt() + 0.00002 * (y * X_PI).sin();
    let theta = y.atan2(x) + 0.000003 * (x * X_PI).cos();
    Coordinate::new(z * theta.sin() + 0.006, z * theta.cos() + 0.0065)
}

/// Degree offsets GCJ-02 applies at this point
fn gcj_delta(coord: Coordinate) -> (f64, f64) {
    let x = coord.longitude - 105.0;
    let y = coord.latitude - 35.0;

    let rad_lat = coord.latitude / 180.0 * PI;
    let magic = 1.0 - ECCENTRICITY_SQ * rad_lat.sin().powi(2);
    let sqrt_magic = magic.sqrt();

    let d_lat = (delta_lat(x, y) * 180.0)
        / ((SEMI_MAJOR * (1.0 - ECCENTRICITY_SQ)) / (magic * sqrt_magic) * PI);
    let d_lon = (delta_lon(x, y) * 180.0) / (SEMI_MAJOR / sqrt_magic * rad_lat.cos() * PI);
    (d_lat, d_lon)
}

fn delta_lat(x: f64, y: f64) -> f64 {
    let mut ret = -100.0 + 2.0 * x + 3.0 * y + 0.2 * y * y + 0.1 * x * y + 0.2 * x.abs().sqrt();
    ret += (20.0 * (6.0 * x * PI).sin() + 20.0 * (2.0 * x * PI).sin()) * 2.0 / 3.0;
    ret += (20.0 * (y * PI).sin() + 40.0 * (y / 3.0 * PI).sin()) * 2.0 / 3.0;
    ret += (160.0 * (y / 12.0 * PI).sin() + 320.0 * (y * PI / 30.0).sin()) * 2.0 / 3.0;
    ret
}

fn delta_lon(x: f64, y: f64) -> f64 {
    let mut ret = 300.0 + x + 2.0 * y + 0.1 * x * x + 0.1 * x * y + 0.1 * x.abs().sqrt();
    ret += (20.0 * (6.0 * x * PI).sin() + 20.0 * (2.0 * x * PI).sin()) * 2.0 / 3.0;
    ret += (20.0 * (x * PI).sin() + 40.0 * (x / 3.0 * PI).sin()) * 2.0 / 3.0;
    ret += (150.0 * (x / 12.0 * PI).sin() + 300.0 * (x / 30.0 * PI).sin()) * 2.0 / 3.0;
    ret
}
