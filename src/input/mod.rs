pub mod csv;
pub mod json;

pub use self::csv::load_csv;
pub use self::json::load_json;

use crate::core::{transform_all, CoordSystem, Coordinate};
use anyhow::{Context, Result};
use std::path::Path;
use tracing::{debug, info};

/// Route file format detection result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteFormat {
    Csv,
    Json,
    Unknown,
}

/// Detect the format of a route file from its leading content
pub fn detect_format(data: &[u8]) -> RouteFormat {
    let start = data
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(data.len());
    let data = &data[start..];

    if matches!(data.first(), Some(b'[') | Some(b'{')) {
        return RouteFormat::Json;
    }

    if is_csv(data) {
        return RouteFormat::Csv;
    }

    RouteFormat::Unknown
}

fn is_csv(data: &[u8]) -> bool {
    // a header plus at least one row with a comma in the first 500 bytes
    let sample = match std::str::from_utf8(&data[..data.len().min(500)]) {
        Ok(text) => text,
        Err(e) => match std::str::from_utf8(&data[..e.valid_up_to()]) {
            Ok(text) => text,
            Err(_) => return false,
        },
    };
    sample.lines().take(2).filter(|line| line.contains(',')).count() == 2
}

/// Points of a route file before datum conversion
#[derive(Debug, Clone, PartialEq)]
pub struct RawRoute {
    pub points: Vec<Coordinate>,
    /// Datum declared by the file itself, if any
    pub coord_system: Option<CoordSystem>,
}

/// Load a route file, auto-detecting the format, and return WGS-84 points
///
/// `assumed` is the datum of the file's points unless the file declares its
/// own.
pub fn load_route_file(path: impl AsRef<Path>, assumed: CoordSystem) -> Result<Vec<Coordinate>> {
    let path = path.as_ref();
    let data = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;

    let raw = match detect_format(&data) {
        RouteFormat::Csv => load_csv(data.as_slice()),
        RouteFormat::Json => load_json(&data),
        RouteFormat::Unknown => anyhow::bail!("Unknown route format: {}", path.display()),
    }
    .with_context(|| format!("Failed to parse {}", path.display()))?;

    let source = raw.coord_system.unwrap_or(assumed);
    if raw.coord_system.is_some() {
        debug!(%source, "Route file declares its coordinate system");
    }
    info!(
        file = %path.display(),
        points = raw.points.len(),
        %source,
        "Route file loaded"
    );

    Ok(transform_all(&raw.points, source, CoordSystem::Wgs84))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_detect_format() {
        assert_eq!(detect_format(b"  [{\"lat\": 1, \"lon\": 2}]"), RouteFormat::Json);
        assert_eq!(detect_format(b"{\"points\": []}"), RouteFormat::Json);
        assert_eq!(detect_format(b"lat,lon\n31.2,121.4\n"), RouteFormat::Csv);
        assert_eq!(detect_format(b"hello"), RouteFormat::Unknown);
        assert_eq!(detect_format(b""), RouteFormat::Unknown);
    }

    #[test]
    fn test_load_wgs84_file_unchanged() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "latitude,longitude").unwrap();
        writeln!(file, "31.2304,121.4737").unwrap();
        writeln!(file, "31.2310,121.4745").unwrap();

        let points = load_route_file(file.path(), CoordSystem::Wgs84).unwrap();
        assert_eq!(
            points,
            vec![Coordinate::new(31.2304, 121.4737), Coordinate::new(31.2310, 121.4745)]
        );
    }

    #[test]
    fn test_load_converts_declared_datum() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"coordSystem": "gcj02", "points": [{{"lat": 31.2304, "lon": 121.4737}}, {{"lat": 31.2310, "lon": 121.4745}}]}}"#
        )
        .unwrap();

        // the file's own tag wins over the assumed datum
        let points = load_route_file(file.path(), CoordSystem::Wgs84).unwrap();
        let expected = crate::core::transform(
            Coordinate::new(31.2304, 121.4737),
            CoordSystem::Gcj02,
            CoordSystem::Wgs84,
        );
        assert_eq!(points[0], expected);
        assert!(crate::core::distance(points[0], Coordinate::new(31.2304, 121.4737)) > 100.0);
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_route_file("/nonexistent/route.csv", CoordSystem::Wgs84).unwrap_err();
        assert!(err.to_string().contains("Failed to read"));
    }
}
