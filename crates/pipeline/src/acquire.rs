//! Band acquisition: stream each band's remote file into scratch space.
//!
//! Bands are fetched one at a time so peak memory stays at one network
//! chunk, and every transfer is bounded by a per-band timeout.

use async_trait::async_trait;
use futures::StreamExt;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{info, instrument};

use agri_common::{AgriError, AgriResult, Band, SceneDescriptor};

use crate::scratch::ScratchSpace;

/// Fetches one remote band file to a local path.
#[async_trait]
pub trait BandFetcher: Send + Sync {
    /// Write the object at `locator` to `dest`, returning the byte count.
    async fn fetch(&self, band: Band, locator: &str, dest: &Path) -> AgriResult<u64>;
}

/// Streams bands over HTTP(S).
pub struct HttpBandFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpBandFetcher {
    pub fn new(timeout: Duration) -> AgriResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .tcp_nodelay(true)
            .build()
            .map_err(|e| AgriError::Acquisition {
                band: "*".to_string(),
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self { client, timeout })
    }

    /// Stream response body to file.
    async fn stream_to_file(&self, band: Band, locator: &str, dest: &Path) -> AgriResult<u64> {
        let acquisition_error = |message: String| AgriError::Acquisition {
            band: band.to_string(),
            message,
        };

        let response = self
            .client
            .get(locator)
            .send()
            .await
            .map_err(|e| acquisition_error(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(acquisition_error(format!("HTTP error: {}", status)));
        }

        let mut file = File::create(dest).await.map_err(|e| {
            acquisition_error(format!("Cannot create {}: {}", dest.display(), e))
        })?;
        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| acquisition_error(format!("Stream error: {}", e)))?;
            file.write_all(&chunk)
                .await
                .map_err(|e| acquisition_error(format!("Write failed: {}", e)))?;
            written += chunk.len() as u64;
        }

        file.flush()
            .await
            .map_err(|e| acquisition_error(format!("Write failed: {}", e)))?;
        Ok(written)
    }
}

#[async_trait]
impl BandFetcher for HttpBandFetcher {
    #[instrument(skip(self, dest), fields(band = %band))]
    async fn fetch(&self, band: Band, locator: &str, dest: &Path) -> AgriResult<u64> {
        match tokio::time::timeout(self.timeout, self.stream_to_file(band, locator, dest)).await {
            Ok(result) => result,
            Err(_) => Err(AgriError::AcquisitionTimeout {
                band: band.to_string(),
                timeout_secs: self.timeout.as_secs(),
            }),
        }
    }
}

/// A band file sitting in scratch space.
#[derive(Debug, Clone, PartialEq)]
pub struct AcquiredBand {
    pub path: PathBuf,
    pub bytes: u64,
}

/// All bands acquired for one scene.
#[derive(Debug, Clone, Default)]
pub struct AcquiredBands {
    pub bands: BTreeMap<Band, AcquiredBand>,
}

impl AcquiredBands {
    pub fn get(&self, band: Band) -> Option<&AcquiredBand> {
        self.bands.get(&band)
    }

    pub fn total_bytes(&self) -> u64 {
        self.bands.values().map(|b| b.bytes).sum()
    }
}

/// Acquires the configured band set for a scene.
pub struct BandAcquirer {
    fetcher: Arc<dyn BandFetcher>,
    bands: Vec<Band>,
}

impl BandAcquirer {
    pub fn new(fetcher: Arc<dyn BandFetcher>, bands: Vec<Band>) -> Self {
        Self { fetcher, bands }
    }

    /// Download every band, in order, into `scratch`.
    ///
    /// Fails before any transfer if the scene lacks one of the bands; any
    /// single band failure aborts the whole acquisition.
    #[instrument(skip(self, scene, scratch), fields(scene_id = %scene.id))]
    pub async fn acquire(
        &self,
        scene: &SceneDescriptor,
        scratch: &ScratchSpace,
    ) -> AgriResult<AcquiredBands> {
        let mut locators = Vec::with_capacity(self.bands.len());
        for band in &self.bands {
            let locator = scene.locator(*band).ok_or_else(|| AgriError::Acquisition {
                band: band.to_string(),
                message: format!("scene {} has no '{}' asset", scene.id, band.asset_key()),
            })?;
            locators.push((*band, locator));
        }

        let mut acquired = AcquiredBands::default();
        for (band, locator) in locators {
            let dest = scratch.band_path(band);
            info!(band = %band, locator = %locator, "Downloading band");

            let bytes = self.fetcher.fetch(band, locator, &dest).await?;
            info!(
                band = %band,
                bytes,
                megabytes = %format!("{:.1}", bytes as f64 / 1024.0 / 1024.0),
                "Band downloaded"
            );
            acquired.bands.insert(band, AcquiredBand { path: dest, bytes });
        }

        info!(
            total_bytes = acquired.total_bytes(),
            scratch_bytes = scratch.usage_bytes(),
            "Acquisition complete"
        );
        Ok(acquired)
    }
}
