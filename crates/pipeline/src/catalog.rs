//! STAC catalog search for candidate scenes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use agri_common::{AgriError, AgriResult, DateRange, SceneDescriptor};

use crate::config::{AreaOfInterest, PipelineConfig};

/// Source of candidate scenes.
#[async_trait]
pub trait SceneCatalog: Send + Sync {
    /// Scenes intersecting `aoi`, acquired within `range`, with cloud cover
    /// strictly below the configured ceiling. May be empty.
    async fn search(
        &self,
        aoi: &AreaOfInterest,
        range: &DateRange,
    ) -> AgriResult<Vec<SceneDescriptor>>;
}

/// Pick the scene with the lowest cloud cover. The first encountered wins ties.
pub fn select_best(scenes: &[SceneDescriptor]) -> Option<&SceneDescriptor> {
    scenes.iter().fold(None, |best: Option<&SceneDescriptor>, scene| match best {
        Some(b) if b.cloud_cover <= scene.cloud_cover => Some(b),
        _ => Some(scene),
    })
}

/// Search the catalog and pick the best scene, failing when there is none.
pub async fn find_best_scene(
    catalog: &dyn SceneCatalog,
    aoi: &AreaOfInterest,
    range: &DateRange,
) -> AgriResult<SceneDescriptor> {
    let scenes = catalog.search(aoi, range).await?;
    info!(candidates = scenes.len(), "Catalog search complete");

    let best = select_best(&scenes).cloned().ok_or_else(|| AgriError::NoScenesFound {
        start: range.start.to_string(),
        end: range.end.to_string(),
    })?;

    info!(
        scene_id = %best.id,
        cloud_cover = best.cloud_cover,
        "Selected scene"
    );
    Ok(best)
}

// ---------------------------------------------------------------------------
// STAC wire types
// ---------------------------------------------------------------------------

/// Body of a STAC `POST /search` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StacSearchRequest {
    pub intersects: serde_json::Value,
    pub datetime: String,
    pub collections: Vec<String>,
    pub query: serde_json::Value,
    pub limit: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StacItemCollection {
    #[serde(default)]
    pub features: Vec<StacItem>,
    #[serde(default)]
    pub links: Vec<StacLink>,
}

impl StacItemCollection {
    pub fn next_link(&self) -> Option<&StacLink> {
        self.links.iter().find(|l| l.rel == "next")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StacItem {
    pub id: String,
    #[serde(default)]
    pub properties: StacItemProperties,
    #[serde(default)]
    pub assets: BTreeMap<String, StacAsset>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StacItemProperties {
    pub datetime: Option<String>,
    #[serde(rename = "eo:cloud_cover")]
    pub cloud_cover: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StacAsset {
    pub href: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StacLink {
    pub rel: String,
    pub href: String,
    pub method: Option<String>,
    pub body: Option<serde_json::Value>,
    pub merge: Option<bool>,
}

impl StacItem {
    /// Convert to a scene descriptor.
    ///
    /// Items without a parseable `datetime` are skipped by the caller. A
    /// missing cloud cover ranks last.
    pub fn to_descriptor(&self) -> Option<SceneDescriptor> {
        let datetime = self.properties.datetime.as_deref()?;
        let date = agri_common::time::acquisition_date(datetime).ok()?;
        Some(SceneDescriptor {
            id: self.id.clone(),
            date,
            cloud_cover: self.properties.cloud_cover.unwrap_or(100.0),
            assets: self
                .assets
                .iter()
                .map(|(k, a)| (k.clone(), a.href.clone()))
                .collect(),
        })
    }
}

// ---------------------------------------------------------------------------
// HTTP client
// ---------------------------------------------------------------------------

/// STAC API client for Item Search.
pub struct StacCatalogClient {
    client: reqwest::Client,
    search_url: String,
    collection: String,
    max_cloud_cover: f64,
    max_items: usize,
}

impl StacCatalogClient {
    pub fn new(config: &PipelineConfig) -> AgriResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.catalog_timeout())
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AgriError::Catalog(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            search_url: search_url(&config.catalog_url),
            collection: config.collection.clone(),
            max_cloud_cover: config.max_cloud_cover,
            max_items: config.max_items,
        })
    }

    pub fn search_url(&self) -> &str {
        &self.search_url
    }

    /// Request body for the first page.
    pub fn build_request(&self, aoi: &AreaOfInterest, range: &DateRange) -> StacSearchRequest {
        StacSearchRequest {
            intersects: aoi.to_geojson_geometry(),
            datetime: range.to_stac_interval(),
            collections: vec![self.collection.clone()],
            query: serde_json::json!({
                "eo:cloud_cover": { "lt": self.max_cloud_cover }
            }),
            limit: self.max_items.min(100),
        }
    }

    async fn post_search(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> AgriResult<StacItemCollection> {
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| AgriError::Catalog(format!("STAC search request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AgriError::Catalog(format!(
                "STAC search returned HTTP {}: {}",
                status,
                text.chars().take(500).collect::<String>()
            )));
        }

        response
            .json::<StacItemCollection>()
            .await
            .map_err(|e| AgriError::Catalog(format!("Failed to parse STAC response: {}", e)))
    }

    async fn get_page(&self, url: &str) -> AgriResult<StacItemCollection> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AgriError::Catalog(format!("STAC pagination failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AgriError::Catalog(format!(
                "STAC pagination returned HTTP {}",
                response.status()
            )));
        }

        response
            .json::<StacItemCollection>()
            .await
            .map_err(|e| AgriError::Catalog(format!("Failed to parse STAC response: {}", e)))
    }

    /// Follow a `next` link, POST with an optionally merged body or plain GET.
    async fn follow_next(
        &self,
        link: &StacLink,
        previous_body: &serde_json::Value,
    ) -> AgriResult<(StacItemCollection, serde_json::Value)> {
        let method = link.method.as_deref().unwrap_or("GET").to_uppercase();
        if method != "POST" {
            return Ok((self.get_page(&link.href).await?, previous_body.clone()));
        }

        let body = match (&link.body, link.merge.unwrap_or(false)) {
            (Some(link_body), true) => {
                let mut merged = previous_body.clone();
                if let (Some(base), Some(overlay)) = (merged.as_object_mut(), link_body.as_object())
                {
                    for (k, v) in overlay {
                        base.insert(k.clone(), v.clone());
                    }
                }
                merged
            }
            (Some(link_body), false) => link_body.clone(),
            (None, _) => previous_body.clone(),
        };

        let page = self.post_search(&link.href, &body).await?;
        Ok((page, body))
    }
}

#[async_trait]
impl SceneCatalog for StacCatalogClient {
    #[instrument(skip(self, aoi), fields(range = %range.to_stac_interval()))]
    async fn search(
        &self,
        aoi: &AreaOfInterest,
        range: &DateRange,
    ) -> AgriResult<Vec<SceneDescriptor>> {
        let request = self.build_request(aoi, range);
        let mut body = encode_body(&request)?;

        let mut items: Vec<StacItem> = Vec::new();
        let mut page = self.post_search(&self.search_url, &body).await?;

        loop {
            let next = page.next_link().cloned();
            let fetched = page.features.len();
            items.extend(page.features.drain(..));
            debug!(fetched, total = items.len(), "Fetched STAC page");

            if items.len() >= self.max_items || fetched == 0 {
                break;
            }
            match next {
                Some(link) => {
                    let (next_page, next_body) = self.follow_next(&link, &body).await?;
                    page = next_page;
                    body = next_body;
                }
                None => break,
            }
        }
        items.truncate(self.max_items);

        let mut scenes = Vec::with_capacity(items.len());
        for item in &items {
            match item.to_descriptor() {
                Some(scene) if scene.cloud_cover < self.max_cloud_cover => scenes.push(scene),
                Some(scene) => {
                    debug!(
                        scene_id = %scene.id,
                        cloud_cover = scene.cloud_cover,
                        "Skipping cloudy scene"
                    )
                }
                None => warn!(item_id = %item.id, "Skipping item without a valid datetime"),
            }
        }

        Ok(scenes)
    }
}

/// Full `POST /search` URL for a STAC API root.
fn search_url(base: &str) -> String {
    let base = base.trim_end_matches('/');
    if base.ends_with("/search") {
        base.to_string()
    } else {
        format!("{}/search", base)
    }
}

/// JSON body for a search request; encoding failures belong to the search stage.
fn encode_body<T: Serialize>(request: &T) -> AgriResult<serde_json::Value> {
    serde_json::to_value(request)
        .map_err(|e| AgriError::Catalog(format!("Cannot encode STAC search body: {}", e)))
}
