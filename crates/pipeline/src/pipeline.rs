//! End-to-end scene processing.

use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, instrument};

use agri_common::{AgriError, AgriResult, DateRange, ResultRecord, SceneDescriptor, SpectralIndex};
use storage::{HistoryStore, ObjectStorage};

use crate::acquire::{BandAcquirer, BandFetcher, HttpBandFetcher};
use crate::catalog::{find_best_scene, SceneCatalog, StacCatalogClient};
use crate::clip::Clipper;
use crate::config::{AreaOfInterest, PipelineConfig};
use crate::indices::IndexEngine;
use crate::scratch::ScratchSpace;
use crate::summary::Summarizer;

/// A summarized scene that has not been written to storage yet.
#[derive(Debug, Clone)]
pub struct AnalyzedScene {
    pub record: ResultRecord,
    /// Indices computed for the scene
    pub processed_indices: Vec<SpectralIndex>,
    /// Raw bytes downloaded into scratch space
    pub bytes_acquired: u64,
}

/// Result of one successful run.
#[derive(Debug, Clone)]
pub struct SceneOutcome {
    pub record: ResultRecord,
    /// Indices computed for the scene
    pub processed_indices: Vec<SpectralIndex>,
    /// Locations of everything written to storage
    pub outputs: Vec<String>,
    /// Non-fatal problems, e.g. a failed log update
    pub warnings: Vec<String>,
    /// Raw bytes downloaded into scratch space
    pub bytes_acquired: u64,
}

/// Runs search, acquisition, clipping, index computation, summarization
/// and persistence, strictly in that order.
pub struct ScenePipeline {
    catalog: Arc<dyn SceneCatalog>,
    acquirer: BandAcquirer,
    clipper: Clipper,
    engine: IndexEngine,
    summarizer: Summarizer,
    history: HistoryStore,
    aoi: AreaOfInterest,
    scratch_root: Option<PathBuf>,
}

impl ScenePipeline {
    /// Assemble a pipeline from explicit collaborators.
    pub fn new(
        config: &PipelineConfig,
        catalog: Arc<dyn SceneCatalog>,
        fetcher: Arc<dyn BandFetcher>,
        history: HistoryStore,
    ) -> Self {
        let aoi = config.area_of_interest();
        Self {
            catalog,
            acquirer: BandAcquirer::new(fetcher, config.bands.clone()),
            clipper: Clipper::new(aoi.clone()),
            engine: IndexEngine::new(config.reflectance_scale),
            summarizer: Summarizer::new(
                config.vegetation_threshold,
                config.data_size_label.clone(),
            ),
            history,
            aoi,
            scratch_root: None,
        }
    }

    /// Pipeline talking to the configured STAC API over HTTP.
    pub fn from_config(config: &PipelineConfig, storage: ObjectStorage) -> AgriResult<Self> {
        let catalog = Arc::new(StacCatalogClient::new(config)?);
        let fetcher = Arc::new(HttpBandFetcher::new(config.band_timeout())?);
        let history = HistoryStore::with_capacity(storage, config.log_capacity);
        Ok(Self::new(config, catalog, fetcher, history))
    }

    /// Create scratch directories under `root` instead of the system temp dir.
    pub fn with_scratch_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.scratch_root = Some(root.into());
        self
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    fn scratch(&self) -> AgriResult<ScratchSpace> {
        match &self.scratch_root {
            Some(root) => ScratchSpace::new_in(root),
            None => ScratchSpace::new(),
        }
    }

    /// Find the best scene in `range`, process it and persist the result.
    pub async fn run(&self, range: &DateRange) -> AgriResult<SceneOutcome> {
        let analyzed = self.analyze(range).await?;
        self.persist(analyzed).await
    }

    /// Process an already selected scene and persist the result.
    pub async fn process_scene(&self, scene: SceneDescriptor) -> AgriResult<SceneOutcome> {
        let analyzed = self.analyze_scene(scene).await?;
        self.persist(analyzed).await
    }

    /// Search through summarization for `range`. Writes nothing to storage.
    #[instrument(skip(self), fields(range = %range.to_stac_interval()))]
    pub async fn analyze(&self, range: &DateRange) -> AgriResult<AnalyzedScene> {
        info!("Searching for scenes");
        let scene = find_best_scene(self.catalog.as_ref(), &self.aoi, range).await?;
        self.analyze_scene(scene).await
    }

    /// Acquisition through summarization for one scene.
    #[instrument(skip(self, scene), fields(scene_id = %scene.id))]
    pub async fn analyze_scene(&self, scene: SceneDescriptor) -> AgriResult<AnalyzedScene> {
        let scratch = self.scratch()?;

        let acquired = self.acquirer.acquire(&scene, &scratch).await?;
        let bytes_acquired = acquired.total_bytes();

        let clipper = self.clipper.clone();
        let engine = self.engine.clone();
        let indices = tokio::task::spawn_blocking(move || {
            let clipped = clipper.clip_all(&acquired)?;
            engine.compute(&clipped)
        })
        .await
        .map_err(|e| AgriError::IndexComputation(format!("raster worker failed: {}", e)))??;

        // Raw and clipped bands are no longer needed
        drop(scratch);

        let record = self.summarizer.summarize(&scene, &indices);
        info!(
            health = %record.summary.vegetation_health,
            coverage = record.summary.vegetation_coverage,
            ndvi_mean = ?record.ndvi_mean(),
            "Scene summarized"
        );

        Ok(AnalyzedScene {
            processed_indices: indices.keys().copied().collect(),
            record,
            bytes_acquired,
        })
    }

    /// Write the record, then fold it into the rolling log.
    #[instrument(skip(self, analyzed), fields(scene_id = %analyzed.record.scene_id))]
    pub async fn persist(&self, analyzed: AnalyzedScene) -> AgriResult<SceneOutcome> {
        let persisted = self.history.persist(&analyzed.record).await?;
        let mut outputs = vec![persisted.record_location];
        outputs.extend(persisted.log_location);

        Ok(SceneOutcome {
            record: analyzed.record,
            processed_indices: analyzed.processed_indices,
            outputs,
            warnings: persisted.warning.into_iter().collect(),
            bytes_acquired: analyzed.bytes_acquired,
        })
    }
}
