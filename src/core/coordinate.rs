use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A geographic position in decimal degrees
///
/// Values are WGS-84 unless a [`CoordSystem`] says otherwise at the point
/// where they enter the crate (see [`crate::input`]).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Coordinate {
    /// Latitude in degrees, positive north
    #[serde(alias = "lat")]
    pub latitude: f64,

    /// Longitude in degrees, positive east
    #[serde(alias = "lon", alias = "lng")]
    pub longitude: f64,
}

impl Coordinate {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Both components are finite numbers
    pub fn is_finite(&self) -> bool {
        self.latitude.is_finite() && self.longitude.is_finite()
    }

    /// Shift by a metric offset, using the local degree scale at this latitude
    pub fn offset_meters(&self, north_m: f64, east_m: f64) -> Self {
        let lon_scale = METERS_PER_DEGREE * self.latitude.to_radians().cos().max(1e-6);
        Self {
            latitude: self.latitude + north_m / METERS_PER_DEGREE,
            longitude: self.longitude + east_m / lon_scale,
        }
    }
}

/// Approximate length of one degree of latitude
pub const METERS_PER_DEGREE: f64 = 111_000.0;

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6}, {:.6})", self.latitude, self.longitude)
    }
}

/// Datum a coordinate is expressed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CoordSystem {
    /// GPS datum, what the device expects
    #[default]
    Wgs84,
    /// Obfuscated datum used by mainland-China map providers (AMap, Tencent)
    Gcj02,
    /// Baidu's datum, an extra rotation on top of GCJ-02
    Bd09,
}

impl fmt::Display for CoordSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CoordSystem::Wgs84 => "WGS84",
            CoordSystem::Gcj02 => "GCJ02",
            CoordSystem::Bd09 => "BD09",
        };
        f.write_str(name)
    }
}

impl FromStr for CoordSystem {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "wgs84" | "wgs-84" | "gps" => Ok(CoordSystem::Wgs84),
            "gcj02" | "gcj-02" | "amap" | "gaode" => Ok(CoordSystem::Gcj02),
            "bd09" | "bd-09" | "baidu" => Ok(CoordSystem::Bd09),
            other => Err(format!("Unknown coordinate system: {}", other)),
        }
    }
}
