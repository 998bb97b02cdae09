use super::RawRoute;
use crate::core::{CoordSystem, Coordinate};
use anyhow::{Context, Result};
use serde::Deserialize;

/// Accepted JSON layouts
///
/// A bare array of points, or an object with a `points` array. The object
/// form covers saved route files; unknown fields are ignored.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RouteDocument {
    Points(Vec<Coordinate>),
    #[serde(rename_all = "camelCase")]
    Document {
        points: Vec<Coordinate>,
        #[serde(default, alias = "coordType", alias = "datum")]
        coord_system: Option<String>,
    },
}

/// Load route points from JSON
pub fn load_json(data: &[u8]) -> Result<RawRoute> {
    let document: RouteDocument =
        serde_json::from_slice(data).context("Expected an array of points or an object with \"points\"")?;

    let (points, coord_system) = match document {
        RouteDocument::Points(points) => (points, None),
        RouteDocument::Document { points, coord_system } => {
            let coord_system = coord_system
                .map(|tag| tag.parse::<CoordSystem>().map_err(anyhow::Error::msg))
                .transpose()?;
            (points, coord_system)
        }
    };

    if let Some(idx) = points.iter().position(|p| !p.is_finite()) {
        anyhow::bail!("Point {} is not a finite coordinate", idx);
    }

    Ok(RawRoute { points, coord_system })
}
