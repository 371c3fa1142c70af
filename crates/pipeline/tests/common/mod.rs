//! In-process collaborators for pipeline tests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use agri_common::{AgriError, AgriResult, Band, DateRange, SceneDescriptor};
use pipeline::{AreaOfInterest, BandFetcher, SceneCatalog};
use test_utils::GeoTiffFixture;

/// Catalog returning a fixed list of scenes.
#[derive(Default)]
pub struct FakeCatalog {
    scenes: Vec<SceneDescriptor>,
    pub calls: AtomicUsize,
}

impl FakeCatalog {
    pub fn new(scenes: Vec<SceneDescriptor>) -> Arc<Self> {
        Arc::new(Self {
            scenes,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl SceneCatalog for FakeCatalog {
    async fn search(
        &self,
        _aoi: &AreaOfInterest,
        _range: &DateRange,
    ) -> AgriResult<Vec<SceneDescriptor>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.scenes.clone())
    }
}

/// Fetcher that copies local files, treating the locator as a path.
#[derive(Default)]
pub struct LocalBandFetcher {
    pub calls: AtomicUsize,
}

impl LocalBandFetcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BandFetcher for LocalBandFetcher {
    async fn fetch(&self, band: Band, locator: &str, dest: &Path) -> AgriResult<u64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::fs::copy(locator, dest)
            .await
            .map_err(|e| AgriError::Acquisition {
                band: band.to_string(),
                message: e.to_string(),
            })
    }
}

/// Write `{dir}/{band}.tif` for each band, all on the same grid.
pub fn write_band_set(
    dir: &Path,
    width: u32,
    height: u32,
    origin: (f64, f64),
    pixel_size: f64,
    epsg: u16,
    bands: [(Band, Vec<u16>); 4],
) {
    for (band, data) in bands {
        GeoTiffFixture::new(width, height, origin, pixel_size, epsg, data)
            .write(&dir.join(format!("{}.tif", band)))
            .unwrap();
    }
}
