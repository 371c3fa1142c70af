//! Pipeline configuration.
//!
//! Every component receives the pieces of this configuration it needs at
//! construction time; nothing reads global state.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use agri_common::{AgriError, AgriResult, Band, BoundingBox};

/// Earth Search STAC API (Element 84).
pub const DEFAULT_CATALOG_URL: &str = "https://earth-search.aws.element84.com/v1";

/// Sentinel-2 Level-2A surface reflectance.
pub const DEFAULT_COLLECTION: &str = "sentinel-2-l2a";

/// Top-level pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// STAC API root URL
    pub catalog_url: String,
    /// STAC collection to search
    pub collection: String,
    /// Scenes must have cloud cover strictly below this percentage
    pub max_cloud_cover: f64,
    /// Upper bound on items collected across result pages
    pub max_items: usize,
    /// Per-request catalog timeout (seconds)
    pub catalog_timeout_secs: u64,
    /// Per-band download timeout (seconds)
    pub band_timeout_secs: u64,
    /// Bands to acquire, in acquisition order
    pub bands: Vec<Band>,
    /// Raw digital number divided by this yields reflectance
    pub reflectance_scale: f64,
    /// NDVI above this counts as vegetated
    pub vegetation_threshold: f64,
    /// Entries kept in the time-series log
    pub log_capacity: usize,
    /// Area of interest ring in EPSG:4326 `[lon, lat]` pairs
    pub aoi: Vec<[f64; 2]>,
    /// Optional GeoJSON file overriding `aoi`
    pub aoi_geojson: Option<PathBuf>,
    /// Human-readable size label recorded with each result
    pub data_size_label: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            catalog_url: DEFAULT_CATALOG_URL.to_string(),
            collection: DEFAULT_COLLECTION.to_string(),
            max_cloud_cover: 20.0,
            max_items: 100,
            catalog_timeout_secs: 30,
            band_timeout_secs: 300,
            bands: Band::ALL.to_vec(),
            reflectance_scale: 10_000.0,
            vegetation_threshold: 0.3,
            log_capacity: storage::DEFAULT_LOG_CAPACITY,
            // Al Ain farms, roughly 500 m x 550 m
            aoi: vec![
                [55.742, 24.205],
                [55.747, 24.205],
                [55.747, 24.21],
                [55.742, 24.21],
            ],
            aoi_geojson: None,
            data_size_label: "Small AOI (1km²)".to_string(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> AgriResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AgriError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_yaml_str(&contents)
    }

    /// Parse configuration from YAML text. Missing keys take defaults.
    pub fn from_yaml_str(contents: &str) -> AgriResult<Self> {
        let config: Self = serde_yaml::from_str(contents)
            .map_err(|e| AgriError::Config(format!("Invalid YAML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check internal consistency.
    pub fn validate(&self) -> AgriResult<()> {
        if self.reflectance_scale <= 0.0 {
            return Err(AgriError::Config(
                "reflectance_scale must be positive".to_string(),
            ));
        }
        if self.log_capacity == 0 {
            return Err(AgriError::Config("log_capacity must be at least 1".to_string()));
        }
        if self.aoi.len() < 3 {
            return Err(AgriError::Config(format!(
                "aoi needs at least 3 vertices, got {}",
                self.aoi.len()
            )));
        }
        for band in [Band::Red, Band::Green, Band::Blue, Band::Nir] {
            if !self.bands.contains(&band) {
                return Err(AgriError::Config(format!(
                    "band '{}' is required for index computation",
                    band
                )));
            }
        }
        Ok(())
    }

    pub fn catalog_timeout(&self) -> Duration {
        Duration::from_secs(self.catalog_timeout_secs)
    }

    pub fn band_timeout(&self) -> Duration {
        Duration::from_secs(self.band_timeout_secs)
    }

    /// Resolve the area of interest.
    ///
    /// A configured GeoJSON file wins; if it cannot be loaded the inline
    /// polygon is used and a warning is logged.
    pub fn area_of_interest(&self) -> AreaOfInterest {
        if let Some(path) = &self.aoi_geojson {
            match AreaOfInterest::from_geojson_file(path) {
                Ok(aoi) => {
                    info!(path = %path.display(), "Loaded AOI from GeoJSON");
                    return aoi;
                }
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "Could not load AOI file, using default"
                    );
                }
            }
        }
        AreaOfInterest::from_ring(self.aoi.iter().map(|p| (p[0], p[1])).collect())
    }
}

/// Area of interest polygon in EPSG:4326.
#[derive(Debug, Clone, PartialEq)]
pub struct AreaOfInterest {
    /// Closed exterior ring of `(lon, lat)` vertices
    ring: Vec<(f64, f64)>,
}

impl AreaOfInterest {
    /// Build from a ring, closing it if needed.
    pub fn from_ring(mut ring: Vec<(f64, f64)>) -> Self {
        if let (Some(first), Some(last)) = (ring.first().copied(), ring.last().copied()) {
            if first != last {
                ring.push(first);
            }
        }
        Self { ring }
    }

    /// Load the first Polygon (or first part of a MultiPolygon) in a GeoJSON file.
    pub fn from_geojson_file<P: AsRef<Path>>(path: P) -> AgriResult<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_geojson_str(&contents)
    }

    pub fn from_geojson_str(contents: &str) -> AgriResult<Self> {
        let geojson: geojson::GeoJson = contents
            .parse()
            .map_err(|e| AgriError::Config(format!("Invalid GeoJSON: {}", e)))?;

        let geometries: Vec<geojson::Geometry> = match geojson {
            geojson::GeoJson::Geometry(g) => vec![g],
            geojson::GeoJson::Feature(f) => f.geometry.into_iter().collect(),
            geojson::GeoJson::FeatureCollection(fc) => fc
                .features
                .into_iter()
                .filter_map(|f| f.geometry)
                .collect(),
        };

        for geometry in geometries {
            let geometry: geo::Geometry<f64> = match geometry.try_into() {
                Ok(g) => g,
                Err(_) => continue,
            };
            let polygon = match geometry {
                geo::Geometry::Polygon(p) => p,
                geo::Geometry::MultiPolygon(mp) => match mp.0.into_iter().next() {
                    Some(p) => p,
                    None => continue,
                },
                _ => continue,
            };
            let ring = polygon.exterior().coords().map(|c| (c.x, c.y)).collect();
            return Ok(Self::from_ring(ring));
        }

        Err(AgriError::Config("GeoJSON contains no polygon".to_string()))
    }

    /// Closed exterior ring of `(lon, lat)` vertices.
    pub fn ring(&self) -> &[(f64, f64)] {
        &self.ring
    }

    pub fn bbox(&self) -> Option<BoundingBox> {
        BoundingBox::from_points(self.ring.iter().copied())
    }

    /// GeoJSON geometry for a STAC `intersects` filter.
    pub fn to_geojson_geometry(&self) -> serde_json::Value {
        let coords: Vec<[f64; 2]> = self.ring.iter().map(|&(x, y)| [x, y]).collect();
        serde_json::json!({
            "type": "Polygon",
            "coordinates": [coords],
        })
    }
}
