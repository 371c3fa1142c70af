//! Result records produced for each processed scene.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Spectral indices computed per scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SpectralIndex {
    /// Normalized Difference Vegetation Index
    Ndvi,
    /// Enhanced Vegetation Index
    Evi,
    /// Normalized Difference Water Index
    Ndwi,
}

impl SpectralIndex {
    pub const ALL: [SpectralIndex; 3] = [
        SpectralIndex::Ndvi,
        SpectralIndex::Evi,
        SpectralIndex::Ndwi,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SpectralIndex::Ndvi => "NDVI",
            SpectralIndex::Evi => "EVI",
            SpectralIndex::Ndwi => "NDWI",
        }
    }
}

impl fmt::Display for SpectralIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Statistics over the valid (unmasked) pixels of one index raster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexStatistics {
    pub mean: f64,
    /// Population standard deviation
    pub std: f64,
    pub min: f64,
    pub max: f64,
    /// Number of valid pixels
    pub count: usize,
    /// Pixels above the vegetation threshold (NDVI only)
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub vegetation_pixels: Option<usize>,
}

/// Coarse vegetation health classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthLabel {
    Good,
    Poor,
    /// No valid NDVI pixels in the area of interest
    InsufficientData,
}

impl fmt::Display for HealthLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            HealthLabel::Good => "Good",
            HealthLabel::Poor => "Poor",
            HealthLabel::InsufficientData => "Insufficient data",
        };
        f.write_str(label)
    }
}

/// Derived classification of a result record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingSummary {
    pub vegetation_health: HealthLabel,
    /// Vegetated pixels as a percentage of valid NDVI pixels
    pub vegetation_coverage: f64,
    pub processing_timestamp: DateTime<Utc>,
    pub data_size: String,
}

/// One record per processed scene. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub scene_id: String,
    pub scene_date: NaiveDate,
    pub cloud_cover: f64,
    /// Indices with no valid pixels are absent
    pub statistics: BTreeMap<SpectralIndex, IndexStatistics>,
    pub summary: ProcessingSummary,
}

impl ResultRecord {
    /// Mean NDVI, when the scene had any valid NDVI pixels.
    pub fn ndvi_mean(&self) -> Option<f64> {
        self.statistics.get(&SpectralIndex::Ndvi).map(|s| s.mean)
    }

    /// Names of the indices that produced statistics.
    pub fn index_names(&self) -> Vec<String> {
        self.statistics.keys().map(|i| i.name().to_string()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> ResultRecord {
        let mut statistics = BTreeMap::new();
        statistics.insert(
            SpectralIndex::Ndvi,
            IndexStatistics {
                mean: 0.475,
                std: 0.12,
                min: 0.333,
                max: 0.667,
                count: 4,
                vegetation_pixels: Some(4),
            },
        );
        ResultRecord {
            scene_id: "S2B_40RCN_20240714_0_L2A".into(),
            scene_date: NaiveDate::from_ymd_opt(2024, 7, 14).unwrap(),
            cloud_cover: 1.5,
            statistics,
            summary: ProcessingSummary {
                vegetation_health: HealthLabel::Good,
                vegetation_coverage: 100.0,
                processing_timestamp: Utc::now(),
                data_size: "Small AOI (1km²)".into(),
            },
        }
    }

    #[test]
    fn test_record_json_uses_index_names_as_keys() {
        let json = serde_json::to_value(sample_record()).unwrap();
        assert_eq!(json["statistics"]["NDVI"]["count"], 4);
        assert_eq!(json["statistics"]["NDVI"]["vegetation_pixels"], 4);
        assert_eq!(json["summary"]["vegetation_health"], "Good");
        assert_eq!(json["scene_date"], "2024-07-14");
    }

    #[test]
    fn test_record_json_roundtrip() {
        let record = sample_record();
        let text = serde_json::to_string_pretty(&record).unwrap();
        let back: ResultRecord = serde_json::from_str(&text).unwrap();
        assert_eq!(back.scene_id, record.scene_id);
        assert_eq!(back.summary.vegetation_health, HealthLabel::Good);
        assert!((back.ndvi_mean().unwrap() - 0.475).abs() < 1e-12);
        assert_eq!(back.index_names(), vec!["NDVI".to_string()]);
    }
}
