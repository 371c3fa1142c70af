//! Sentinel-2 scene processing library.
//!
//! Turns a date range into a durable result record:
//!
//! - STAC catalog search and best-scene selection
//! - Streamed band acquisition into a per-invocation scratch directory
//! - Windowed GeoTIFF reads clipped to the area of interest
//! - NDVI, EVI and NDWI computation with no-value masking
//! - Summary statistics and vegetation health classification
//!
//! Persistence goes through [`storage::HistoryStore`].

pub mod acquire;
pub mod catalog;
pub mod clip;
pub mod config;
pub mod indices;
mod pipeline;
pub mod raster;
pub mod scratch;
pub mod summary;

// Re-exports
pub use acquire::{AcquiredBand, AcquiredBands, BandAcquirer, BandFetcher, HttpBandFetcher};
pub use catalog::{find_best_scene, select_best, SceneCatalog, StacCatalogClient};
pub use clip::{ClippedBands, Clipper};
pub use config::{AreaOfInterest, PipelineConfig};
pub use indices::{IndexEngine, IndexRaster, IndexRasters};
pub use pipeline::{AnalyzedScene, SceneOutcome, ScenePipeline};
pub use raster::{BandRaster, GeoTransform, PixelWindow, RasterInfo};
pub use scratch::ScratchSpace;
pub use summary::{classify, compute_statistics, Summarizer};
