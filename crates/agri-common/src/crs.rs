//! Coordinate Reference System types and utilities.

use serde::{Deserialize, Serialize};
use std::fmt;

/// CRS codes the pipeline can read and reproject into.
///
/// Sentinel-2 L2A tiles are delivered in WGS84 / UTM, one zone per tile,
/// and the area of interest is configured in geographic coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CrsCode {
    /// WGS84 Geographic (lon/lat in degrees)
    Epsg4326,
    /// WGS84 / UTM (EPSG:326zz north, EPSG:327zz south)
    Utm { zone: u8, north: bool },
}

impl CrsCode {
    /// Resolve a numeric EPSG code.
    pub fn from_epsg(code: u32) -> Result<Self, CrsParseError> {
        match code {
            4326 => Ok(CrsCode::Epsg4326),
            32601..=32660 => Ok(CrsCode::Utm {
                zone: (code - 32600) as u8,
                north: true,
            }),
            32701..=32760 => Ok(CrsCode::Utm {
                zone: (code - 32700) as u8,
                north: false,
            }),
            _ => Err(CrsParseError::UnsupportedCrs(format!("EPSG:{}", code))),
        }
    }

    /// Numeric EPSG code.
    pub fn epsg(&self) -> u32 {
        match self {
            CrsCode::Epsg4326 => 4326,
            CrsCode::Utm { zone, north: true } => 32600 + *zone as u32,
            CrsCode::Utm { zone, north: false } => 32700 + *zone as u32,
        }
    }
}

impl fmt::Display for CrsCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.epsg())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CrsParseError {
    #[error("Unsupported CRS: {0}")]
    UnsupportedCrs(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_epsg() {
        assert_eq!(CrsCode::from_epsg(4326).unwrap(), CrsCode::Epsg4326);
        assert_eq!(
            CrsCode::from_epsg(32640).unwrap(),
            CrsCode::Utm {
                zone: 40,
                north: true
            }
        );
        assert!(CrsCode::from_epsg(3857).is_err());
        assert!(CrsCode::from_epsg(32661).is_err());
    }

    #[test]
    fn test_epsg_roundtrip_for_southern_zone() {
        let crs = CrsCode::from_epsg(32733).unwrap();
        assert_eq!(
            crs,
            CrsCode::Utm {
                zone: 33,
                north: false
            }
        );
        assert_eq!(crs.epsg(), 32733);
        assert_eq!(crs.to_string(), "EPSG:32733");
    }
}
