//! Point and ring transformation between supported CRS codes.

use agri_common::CrsCode;

use crate::transverse_mercator::TransverseMercator;

#[derive(Debug, thiserror::Error)]
pub enum ProjectionError {
    #[error("Invalid geographic coordinate: lon={lon}, lat={lat}")]
    InvalidCoordinate { lon: f64, lat: f64 },

    #[error("Non-finite coordinate: ({0}, {1})")]
    NonFinite(f64, f64),
}

/// Transform a single point from one CRS to another.
///
/// Geographic coordinates are `(lon, lat)` in degrees; projected
/// coordinates are `(easting, northing)` in meters.
pub fn transform_point(
    from: CrsCode,
    to: CrsCode,
    x: f64,
    y: f64,
) -> Result<(f64, f64), ProjectionError> {
    if !x.is_finite() || !y.is_finite() {
        return Err(ProjectionError::NonFinite(x, y));
    }

    // No-op if same CRS
    if from == to {
        return Ok((x, y));
    }

    let (lon, lat) = match from {
        CrsCode::Epsg4326 => (x, y),
        CrsCode::Utm { zone, north } => TransverseMercator::utm(zone, north).inverse(x, y),
    };

    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        return Err(ProjectionError::InvalidCoordinate { lon, lat });
    }

    Ok(match to {
        CrsCode::Epsg4326 => (lon, lat),
        CrsCode::Utm { zone, north } => TransverseMercator::utm(zone, north).forward(lon, lat),
    })
}

/// Transform every vertex of a ring.
pub fn transform_ring(
    from: CrsCode,
    to: CrsCode,
    ring: &[(f64, f64)],
) -> Result<Vec<(f64, f64)>, ProjectionError> {
    ring.iter()
        .map(|&(x, y)| transform_point(from, to, x, y))
        .collect()
}
