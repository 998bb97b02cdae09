use super::RawRoute;
use crate::core::Coordinate;
use anyhow::{Context, Result};
use std::io::Read;

/// Load route points from CSV
///
/// Latitude and longitude columns are found by header name:
/// - lat, latitude, y
/// - lon, lng, long, longitude, x
///
/// Other columns are ignored. Rows are 1-based in error messages, counting
/// the header.
pub fn load_csv<R: Read>(reader: R) -> Result<RawRoute> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers = rdr.headers().context("Failed to read CSV header")?;
    let (lat_idx, lon_idx) = detect_columns(headers)?;

    let mut points = Vec::new();
    for (row, result) in rdr.records().enumerate() {
        let record = result.context("Failed to read CSV row")?;
        let line = row + 2;

        let latitude = parse_field(&record, lat_idx)
            .with_context(|| format!("Invalid latitude on line {}", line))?;
        let longitude = parse_field(&record, lon_idx)
            .with_context(|| format!("Invalid longitude on line {}", line))?;

        points.push(Coordinate::new(latitude, longitude));
    }

    Ok(RawRoute {
        points,
        coord_system: None,
    })
}

fn parse_field(record: &csv::StringRecord, idx: usize) -> Result<f64> {
    let text = record.get(idx).context("Missing column")?;
    let value: f64 = text.parse().with_context(|| format!("not a number: {:?}", text))?;
    if !value.is_finite() {
        anyhow::bail!("not a finite number: {:?}", text);
    }
    Ok(value)
}

/// Detect column indices from CSV headers
fn detect_columns(headers: &csv::StringRecord) -> Result<(usize, usize)> {
    let lat_idx = find_column(headers, &["lat", "latitude", "y"])?;
    let lon_idx = find_column(headers, &["lon", "lng", "long", "longitude", "x"])?;

    Ok((lat_idx, lon_idx))
}

/// Find a column by checking possible names
fn find_column(headers: &csv::StringRecord, names: &[&str]) -> Result<usize> {
    for (idx, header) in headers.iter().enumerate() {
        let header_lower = header.to_lowercase();
        if names.iter().any(|&name| header_lower == name) {
            return Ok(idx);
        }
    }

    anyhow::bail!("Could not find column with names: {:?}", names)
}
