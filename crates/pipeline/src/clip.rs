//! Geometric clipping of band files to the area of interest.

use geo::{Contains, Coord, LineString, Point, Polygon};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

use agri_common::{AgriError, AgriResult, Band, BoundingBox, CrsCode};
use projection::transform_ring;

use crate::acquire::AcquiredBands;
use crate::config::AreaOfInterest;
use crate::raster::{read_raster_info, read_window, BandRaster};

/// Clipped bands keyed by band, all on the same pixel grid.
pub type ClippedBands = BTreeMap<Band, BandRaster>;

/// Clips band files to the area of interest.
#[derive(Debug, Clone)]
pub struct Clipper {
    aoi: AreaOfInterest,
}

impl Clipper {
    pub fn new(aoi: AreaOfInterest) -> Self {
        Self { aoi }
    }

    /// Clip one band file.
    ///
    /// Reads only the window covering the reprojected AOI's bounding box and
    /// sets every pixel whose center falls outside the polygon to NaN.
    pub fn clip_band(&self, band: Band, path: &Path) -> AgriResult<BandRaster> {
        let info = read_raster_info(path, band)?;

        let ring = transform_ring(CrsCode::Epsg4326, info.crs, self.aoi.ring()).map_err(|e| {
            AgriError::ClipOutOfBounds {
                band: band.to_string(),
                message: format!("cannot reproject AOI to {}: {}", info.crs, e),
            }
        })?;

        let bbox = BoundingBox::from_points(ring.iter().copied()).ok_or_else(|| {
            AgriError::ClipOutOfBounds {
                band: band.to_string(),
                message: "empty area of interest".to_string(),
            }
        })?;

        let window = info.window_for(&bbox).ok_or_else(|| {
            let extent = info.extent();
            AgriError::ClipOutOfBounds {
                band: band.to_string(),
                message: format!(
                    "AOI bounds [{:.1}, {:.1}, {:.1}, {:.1}] miss raster extent \
                     [{:.1}, {:.1}, {:.1}, {:.1}] in {}",
                    bbox.min_x,
                    bbox.min_y,
                    bbox.max_x,
                    bbox.max_y,
                    extent.min_x,
                    extent.min_y,
                    extent.max_x,
                    extent.max_y,
                    info.crs
                ),
            }
        })?;
        debug!(band = %band, ?window, "Clip window");

        let mut raster = read_window(path, band, window)?;

        let polygon = Polygon::new(
            LineString::from(
                ring.iter()
                    .map(|&(x, y)| Coord { x, y })
                    .collect::<Vec<_>>(),
            ),
            vec![],
        );
        let mut masked = 0usize;
        for row in 0..raster.height {
            for col in 0..raster.width {
                let (x, y) = raster.transform.pixel_center(col, row);
                if !polygon.contains(&Point::new(x, y)) {
                    raster.data[row * raster.width + col] = f32::NAN;
                    masked += 1;
                }
            }
        }

        let source_pixels = info.pixel_count();
        let clipped_pixels = window.pixel_count();
        let reduction = (1.0 - clipped_pixels as f64 / source_pixels as f64) * 100.0;
        info!(
            band = %band,
            source_pixels,
            clipped_pixels,
            masked_pixels = masked,
            reduction_pct = %format!("{:.1}", reduction),
            "Band clipped"
        );

        Ok(raster)
    }

    /// Clip every acquired band, sequentially.
    pub fn clip_all(&self, acquired: &AcquiredBands) -> AgriResult<ClippedBands> {
        let mut clipped = ClippedBands::new();
        for (band, file) in &acquired.bands {
            clipped.insert(*band, self.clip_band(*band, &file.path)?);
        }
        Ok(clipped)
    }
}
