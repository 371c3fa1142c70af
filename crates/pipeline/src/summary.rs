//! Statistics and health classification for computed indices.

use chrono::Utc;
use std::collections::BTreeMap;

use agri_common::{
    HealthLabel, IndexStatistics, ProcessingSummary, ResultRecord, SceneDescriptor,
    SpectralIndex,
};

use crate::indices::IndexRasters;

/// Statistics over the non-NaN values of `data`.
///
/// Uses the population standard deviation. Returns `None` when every value
/// is masked. When `vegetation_threshold` is given, values strictly above it
/// are counted as vegetated.
pub fn compute_statistics(
    data: &[f32],
    vegetation_threshold: Option<f64>,
) -> Option<IndexStatistics> {
    let mut count = 0usize;
    let mut sum = 0.0f64;
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    let mut vegetated = 0usize;

    // Compared at raster precision so a value equal to the threshold is not vegetated
    let threshold = vegetation_threshold.map(|t| t as f32);

    for &raw in data.iter().filter(|v| !v.is_nan()) {
        if matches!(threshold, Some(t) if raw > t) {
            vegetated += 1;
        }
        let v = raw as f64;
        count += 1;
        sum += v;
        min = min.min(v);
        max = max.max(v);
    }

    if count == 0 {
        return None;
    }

    let mean = sum / count as f64;
    let variance = data
        .iter()
        .filter(|v| !v.is_nan())
        .map(|&v| {
            let d = v as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / count as f64;

    Some(IndexStatistics {
        mean,
        std: variance.sqrt(),
        min,
        max,
        count,
        vegetation_pixels: vegetation_threshold.map(|_| vegetated),
    })
}

/// Health label and vegetated coverage percentage from NDVI statistics.
pub fn classify(ndvi: Option<&IndexStatistics>, threshold: f64) -> (HealthLabel, f64) {
    match ndvi {
        None => (HealthLabel::InsufficientData, 0.0),
        Some(stats) => {
            let label = if stats.mean >= threshold {
                HealthLabel::Good
            } else {
                HealthLabel::Poor
            };
            let coverage = match (stats.vegetation_pixels, stats.count) {
                (Some(vegetated), count) if count > 0 => vegetated as f64 / count as f64 * 100.0,
                _ => 0.0,
            };
            (label, coverage)
        }
    }
}

/// Builds result records from index rasters.
#[derive(Debug, Clone)]
pub struct Summarizer {
    vegetation_threshold: f64,
    data_size_label: String,
}

impl Summarizer {
    pub fn new(vegetation_threshold: f64, data_size_label: impl Into<String>) -> Self {
        Self {
            vegetation_threshold,
            data_size_label: data_size_label.into(),
        }
    }

    pub fn summarize(&self, scene: &SceneDescriptor, indices: &IndexRasters) -> ResultRecord {
        let mut statistics = BTreeMap::new();
        for (index, raster) in indices {
            let threshold = (*index == SpectralIndex::Ndvi).then_some(self.vegetation_threshold);
            if let Some(stats) = compute_statistics(&raster.data, threshold) {
                statistics.insert(*index, stats);
            }
        }

        let (vegetation_health, vegetation_coverage) = classify(
            statistics.get(&SpectralIndex::Ndvi),
            self.vegetation_threshold,
        );

        ResultRecord {
            scene_id: scene.id.clone(),
            scene_date: scene.date,
            cloud_cover: scene.cloud_cover,
            statistics,
            summary: ProcessingSummary {
                vegetation_health,
                vegetation_coverage,
                processing_timestamp: Utc::now(),
                data_size: self.data_size_label.clone(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indices::{ndvi, scale_reflectance};

    #[test]
    fn test_population_statistics() {
        let stats = compute_statistics(&[1.0, 2.0, 3.0, 4.0, f32::NAN], None).unwrap();
        assert_eq!(stats.count, 4);
        assert!((stats.mean - 2.5).abs() < 1e-12);
        assert!((stats.std - 1.25f64.sqrt()).abs() < 1e-12);
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 4.0);
        assert_eq!(stats.vegetation_pixels, None);
    }

    #[test]
    fn test_all_masked_has_no_statistics() {
        assert!(compute_statistics(&[f32::NAN, f32::NAN], Some(0.3)).is_none());
        assert!(compute_statistics(&[], None).is_none());
    }

    #[test]
    fn test_vegetated_pixels_strictly_above_threshold() {
        let stats = compute_statistics(&[0.1, 0.5, 0.7, f32::NAN], Some(0.3)).unwrap();
        assert_eq!(stats.vegetation_pixels, Some(2));
    }

    #[test]
    fn test_pixel_at_threshold_is_not_vegetated() {
        let nir = scale_reflectance(&[65.0], 10_000.0);
        let red = scale_reflectance(&[35.0], 10_000.0);
        let value = ndvi(nir[0], red[0]);
        assert_eq!(value, 0.3f32);

        let stats = compute_statistics(&[value, 0.31], Some(0.3)).unwrap();
        assert_eq!(stats.vegetation_pixels, Some(1));
        assert_eq!(classify(Some(&stats), 0.3).1, 50.0);
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify(None, 0.3), (HealthLabel::InsufficientData, 0.0));

        let stats = IndexStatistics {
            mean: 0.25,
            std: 0.1,
            min: 0.0,
            max: 0.5,
            count: 8,
            vegetation_pixels: Some(2),
        };
        assert_eq!(classify(Some(&stats), 0.3), (HealthLabel::Poor, 25.0));

        let good = IndexStatistics {
            mean: 0.3,
            ..stats
        };
        assert_eq!(classify(Some(&good), 0.3).0, HealthLabel::Good);
    }
}
