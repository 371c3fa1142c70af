//! Per-pixel spectral index computation.
//!
//! Reflectance outside (0, 1] is treated as no value before any formula
//! runs, and a non-positive denominator yields no value. A NaN in any
//! contributing band therefore propagates to every dependent index pixel.

use std::collections::BTreeMap;

use agri_common::{AgriError, AgriResult, Band, SpectralIndex};

use crate::clip::ClippedBands;

/// One index value per pixel. "No value" pixels are NaN.
#[derive(Debug, Clone)]
pub struct IndexRaster {
    pub index: SpectralIndex,
    pub width: usize,
    pub height: usize,
    pub data: Vec<f32>,
}

impl IndexRaster {
    /// Values of the pixels that are not masked.
    pub fn valid_values(&self) -> impl Iterator<Item = f32> + '_ {
        self.data.iter().copied().filter(|v| !v.is_nan())
    }
}

pub type IndexRasters = BTreeMap<SpectralIndex, IndexRaster>;

/// Convert raw digital numbers to reflectance, masking values outside (0, 1].
pub fn scale_reflectance(raw: &[f32], scale: f64) -> Vec<f32> {
    let factor = scale as f32;
    raw.iter()
        .map(|&v| {
            let r = v / factor;
            if r > 0.0 && r <= 1.0 {
                r
            } else {
                f32::NAN
            }
        })
        .collect()
}

/// Normalized Difference Vegetation Index.
pub fn ndvi(nir: f32, red: f32) -> f32 {
    normalized_difference(nir, red)
}

/// Normalized Difference Water Index (McFeeters).
pub fn ndwi(green: f32, nir: f32) -> f32 {
    normalized_difference(green, nir)
}

/// Enhanced Vegetation Index: 2.5 (N - R) / (N + 6R - 7.5B + 1).
pub fn evi(nir: f32, red: f32, blue: f32) -> f32 {
    if nir.is_nan() || red.is_nan() || blue.is_nan() {
        return f32::NAN;
    }
    let denominator = nir + 6.0 * red - 7.5 * blue + 1.0;
    if denominator > 0.0 {
        2.5 * (nir - red) / denominator
    } else {
        f32::NAN
    }
}

fn normalized_difference(a: f32, b: f32) -> f32 {
    if a.is_nan() || b.is_nan() {
        return f32::NAN;
    }
    let sum = a + b;
    if sum > 0.0 {
        (a - b) / sum
    } else {
        f32::NAN
    }
}

/// Computes NDVI, EVI and NDWI from clipped bands.
#[derive(Debug, Clone)]
pub struct IndexEngine {
    reflectance_scale: f64,
}

impl IndexEngine {
    pub fn new(reflectance_scale: f64) -> Self {
        Self { reflectance_scale }
    }

    pub fn compute(&self, bands: &ClippedBands) -> AgriResult<IndexRasters> {
        let band = |b: Band| {
            bands
                .get(&b)
                .ok_or_else(|| AgriError::IndexComputation(format!("band '{}' is missing", b)))
        };
        let (red, green, blue, nir) = (
            band(Band::Red)?,
            band(Band::Green)?,
            band(Band::Blue)?,
            band(Band::Nir)?,
        );

        let (width, height) = red.dimensions();
        for other in [green, blue, nir] {
            if other.dimensions() != (width, height) {
                return Err(AgriError::IndexComputation(format!(
                    "band '{}' is {}x{} but red is {}x{}",
                    other.band, other.width, other.height, width, height
                )));
            }
        }

        let red = scale_reflectance(&red.data, self.reflectance_scale);
        let green = scale_reflectance(&green.data, self.reflectance_scale);
        let blue = scale_reflectance(&blue.data, self.reflectance_scale);
        let nir = scale_reflectance(&nir.data, self.reflectance_scale);

        let raster = |index: SpectralIndex, data: Vec<f32>| IndexRaster {
            index,
            width,
            height,
            data,
        };

        let mut out = IndexRasters::new();
        out.insert(
            SpectralIndex::Ndvi,
            raster(
                SpectralIndex::Ndvi,
                nir.iter().zip(&red).map(|(&n, &r)| ndvi(n, r)).collect(),
            ),
        );
        out.insert(
            SpectralIndex::Evi,
            raster(
                SpectralIndex::Evi,
                nir.iter()
                    .zip(&red)
                    .zip(&blue)
                    .map(|((&n, &r), &b)| evi(n, r, b))
                    .collect(),
            ),
        );
        out.insert(
            SpectralIndex::Ndwi,
            raster(
                SpectralIndex::Ndwi,
                green.iter().zip(&nir).map(|(&g, &n)| ndwi(g, n)).collect(),
            ),
        );
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::{BandRaster, GeoTransform};
    use agri_common::CrsCode;

    fn band(band: Band, width: usize, height: usize, data: Vec<f32>) -> BandRaster {
        BandRaster {
            band,
            width,
            height,
            data,
            transform: GeoTransform::new(0.0, 0.0, 10.0, -10.0),
            crs: CrsCode::Epsg4326,
        }
    }

    fn bands(red: Vec<f32>, green: Vec<f32>, blue: Vec<f32>, nir: Vec<f32>) -> ClippedBands {
        let n = red.len();
        let mut out = ClippedBands::new();
        out.insert(Band::Red, band(Band::Red, n, 1, red));
        out.insert(Band::Green, band(Band::Green, n, 1, green));
        out.insert(Band::Blue, band(Band::Blue, n, 1, blue));
        out.insert(Band::Nir, band(Band::Nir, n, 1, nir));
        out
    }

    #[test]
    fn test_scale_masks_out_of_range() {
        let scaled = scale_reflectance(&[0.0, 1000.0, 10000.0, 10001.0, -5.0, f32::NAN], 10000.0);
        assert!(scaled[0].is_nan());
        assert!((scaled[1] - 0.1).abs() < 1e-6);
        assert_eq!(scaled[2], 1.0);
        assert!(scaled[3].is_nan());
        assert!(scaled[4].is_nan());
        assert!(scaled[5].is_nan());
    }

    #[test]
    fn test_ndvi_values() {
        assert!((ndvi(0.5, 0.1) - 0.6667).abs() < 1e-3);
        assert!((ndvi(0.8, 0.4) - 0.3333).abs() < 1e-3);
        assert!(ndvi(f32::NAN, 0.1).is_nan());
    }

    #[test]
    fn test_ndvi_bounded_for_valid_reflectance() {
        let steps: Vec<f32> = (1..=20).map(|i| i as f32 / 20.0).collect();
        for &n in &steps {
            for &r in &steps {
                let v = ndvi(n, r);
                assert!((-1.0..=1.0).contains(&v), "ndvi({}, {}) = {}", n, r, v);
            }
        }
    }

    #[test]
    fn test_evi_non_positive_denominator_masked() {
        // 0.1 + 0.6 - 7.5 * 0.3 + 1 = -0.55
        assert!(evi(0.1, 0.1, 0.3).is_nan());
        let v = evi(0.5, 0.1, 0.05);
        assert!((v - 2.5 * 0.4 / (0.5 + 0.6 - 0.375 + 1.0)).abs() < 1e-6);
    }

    #[test]
    fn test_masked_band_pixel_masks_dependent_indices() {
        let computed = IndexEngine::new(10000.0)
            .compute(&bands(
                vec![1000.0, 1000.0, 1000.0],
                vec![2000.0, 0.0, 2000.0],
                vec![500.0, 500.0, 0.0],
                vec![5000.0, 5000.0, 5000.0],
            ))
            .unwrap();

        let ndvi = &computed[&SpectralIndex::Ndvi].data;
        let evi = &computed[&SpectralIndex::Evi].data;
        let ndwi = &computed[&SpectralIndex::Ndwi].data;

        // Pixel 1: green is no-data, so only NDWI is masked
        assert!(!ndvi[1].is_nan());
        assert!(!evi[1].is_nan());
        assert!(ndwi[1].is_nan());

        // Pixel 2: blue is no-data, so only EVI is masked
        assert!(!ndvi[2].is_nan());
        assert!(evi[2].is_nan());
        assert!(!ndwi[2].is_nan());

        // Pixel 0 is clean everywhere
        assert!(computed.values().all(|r| !r.data[0].is_nan()));
    }

    #[test]
    fn test_mismatched_dimensions_rejected() {
        let mut input = bands(
            vec![1000.0; 4],
            vec![1000.0; 4],
            vec![1000.0; 4],
            vec![1000.0; 4],
        );
        input.insert(Band::Nir, band(Band::Nir, 2, 2, vec![5000.0; 4]));

        let err = IndexEngine::new(10000.0).compute(&input).unwrap_err();
        assert!(matches!(err, AgriError::IndexComputation(_)));
        assert!(err.to_string().contains("nir"));
    }

    #[test]
    fn test_index_dimensions_match_bands() {
        let computed = IndexEngine::new(10000.0)
            .compute(&bands(
                vec![1000.0; 6],
                vec![1000.0; 6],
                vec![1000.0; 6],
                vec![3000.0; 6],
            ))
            .unwrap();
        for raster in computed.values() {
            assert_eq!((raster.width, raster.height), (6, 1));
            assert_eq!(raster.data.len(), 6);
        }
    }
}
