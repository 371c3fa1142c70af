//! Object storage interface for result records (S3 compatible).

use bytes::Bytes;
use chrono::NaiveDate;
use object_store::{aws::AmazonS3Builder, memory::InMemory, path::Path, ObjectStore};
use serde::{Deserialize, Serialize};
use std::env;
use std::sync::Arc;
use tracing::{debug, instrument};

use agri_common::{AgriError, AgriResult};

/// Default bucket for results and the time-series log.
pub const DEFAULT_BUCKET: &str = "uae-agri-monitoring";

/// Configuration for object storage connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectStorageConfig {
    /// S3-compatible endpoint URL; `None` talks to AWS S3 directly
    pub endpoint: Option<String>,
    /// Bucket name
    pub bucket: String,
    /// Access key ID; `None` defers to the ambient AWS credential chain
    pub access_key_id: Option<String>,
    /// Secret access key
    pub secret_access_key: Option<String>,
    /// AWS region
    pub region: String,
    /// Allow HTTP (for local MinIO)
    pub allow_http: bool,
}

impl Default for ObjectStorageConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            bucket: DEFAULT_BUCKET.to_string(),
            access_key_id: None,
            secret_access_key: None,
            region: "us-east-1".to_string(),
            allow_http: false,
        }
    }
}

impl ObjectStorageConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            endpoint: env::var("S3_ENDPOINT").ok().filter(|v| !v.is_empty()),
            bucket: env::var("S3_BUCKET").unwrap_or(defaults.bucket),
            access_key_id: env::var("S3_ACCESS_KEY").ok(),
            secret_access_key: env::var("S3_SECRET_KEY").ok(),
            region: env::var("S3_REGION")
                .or_else(|_| env::var("AWS_REGION"))
                .unwrap_or(defaults.region),
            allow_http: env::var("S3_ALLOW_HTTP")
                .map(|v| v == "true")
                .unwrap_or(false),
        }
    }
}

/// Object storage client for pipeline outputs.
#[derive(Clone)]
pub struct ObjectStorage {
    store: Arc<dyn ObjectStore>,
    bucket: String,
}

impl ObjectStorage {
    /// Create a new object storage client from config.
    pub fn new(config: &ObjectStorageConfig) -> AgriResult<Self> {
        let mut builder = AmazonS3Builder::from_env()
            .with_bucket_name(&config.bucket)
            .with_region(&config.region);

        if let Some(endpoint) = &config.endpoint {
            builder = builder.with_endpoint(endpoint);
        }
        if let (Some(key), Some(secret)) = (&config.access_key_id, &config.secret_access_key) {
            builder = builder
                .with_access_key_id(key)
                .with_secret_access_key(secret);
        }
        if config.allow_http {
            builder = builder.with_allow_http(true);
        }

        let store = builder
            .build()
            .map_err(|e| AgriError::Persistence(format!("Failed to create S3 client: {}", e)))?;

        Ok(Self {
            store: Arc::new(store),
            bucket: config.bucket.clone(),
        })
    }

    /// Wrap an existing store.
    pub fn from_store(store: Arc<dyn ObjectStore>, bucket: impl Into<String>) -> Self {
        Self {
            store,
            bucket: bucket.into(),
        }
    }

    /// Process-local store, used by tests and dry runs.
    pub fn in_memory() -> Self {
        Self::from_store(Arc::new(InMemory::new()), DEFAULT_BUCKET)
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// `s3://bucket/path` form of a key, as reported to callers.
    pub fn uri(&self, path: &str) -> String {
        format!("s3://{}/{}", self.bucket, path)
    }

    /// Write bytes to a path in the bucket.
    #[instrument(skip(self, data), fields(bucket = %self.bucket, path = %path))]
    pub async fn put(&self, path: &str, data: Bytes) -> AgriResult<()> {
        let location = Path::from(path);
        debug!(size = data.len(), "Writing object");

        self.store
            .put(&location, data.into())
            .await
            .map_err(|e| AgriError::Persistence(format!("Failed to write {}: {}", path, e)))?;

        Ok(())
    }

    /// Read bytes from a path.
    #[instrument(skip(self), fields(bucket = %self.bucket, path = %path))]
    pub async fn get(&self, path: &str) -> AgriResult<Bytes> {
        self.get_optional(path)
            .await?
            .ok_or_else(|| AgriError::Persistence(format!("Object not found: {}", path)))
    }

    /// Read bytes from a path, mapping a missing object to `None`.
    pub async fn get_optional(&self, path: &str) -> AgriResult<Option<Bytes>> {
        let location = Path::from(path);

        let result = match self.store.get(&location).await {
            Ok(result) => result,
            Err(object_store::Error::NotFound { .. }) => return Ok(None),
            Err(e) => {
                return Err(AgriError::Persistence(format!(
                    "Failed to read {}: {}",
                    path, e
                )))
            }
        };

        let bytes = result
            .bytes()
            .await
            .map_err(|e| AgriError::Persistence(format!("Failed to read bytes: {}", e)))?;

        debug!(size = bytes.len(), "Read object");
        Ok(Some(bytes))
    }

    /// Check if an object exists.
    pub async fn exists(&self, path: &str) -> AgriResult<bool> {
        let location = Path::from(path);

        match self.store.head(&location).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(AgriError::Persistence(format!(
                "Failed to check {}: {}",
                path, e
            ))),
        }
    }

    /// List objects with a given prefix.
    pub async fn list(&self, prefix: &str) -> AgriResult<Vec<String>> {
        use futures::TryStreamExt;

        let prefix_path = Path::from(prefix);
        let mut paths = Vec::new();

        let mut stream = self.store.list(Some(&prefix_path));
        while let Some(meta) = stream
            .try_next()
            .await
            .map_err(|e| AgriError::Persistence(format!("List failed: {}", e)))?
        {
            paths.push(meta.location.to_string());
        }

        Ok(paths)
    }

    /// Delete an object.
    #[instrument(skip(self), fields(bucket = %self.bucket, path = %path))]
    pub async fn delete(&self, path: &str) -> AgriResult<()> {
        let location = Path::from(path);

        self.store
            .delete(&location)
            .await
            .map_err(|e| AgriError::Persistence(format!("Failed to delete {}: {}", path, e)))?;

        Ok(())
    }
}

/// Path builder for consistent storage layout.
pub struct StoragePath;

impl StoragePath {
    /// Build path for a scene's result record.
    /// Format: results/{date}/{scene_id}.json
    pub fn result_record(date: NaiveDate, scene_id: &str) -> String {
        format!("results/{}/{}.json", date, scene_id)
    }

    /// Build path for the rolling time-series log.
    pub fn time_series_log() -> String {
        "time_series/vegetation_log.json".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_paths() {
        let date = NaiveDate::from_ymd_opt(2024, 7, 14).unwrap();
        assert_eq!(
            StoragePath::result_record(date, "S2B_40RCN_20240714_0_L2A"),
            "results/2024-07-14/S2B_40RCN_20240714_0_L2A.json"
        );
        assert_eq!(
            StoragePath::time_series_log(),
            "time_series/vegetation_log.json"
        );
    }

    #[tokio::test]
    async fn test_in_memory_put_get() {
        let storage = ObjectStorage::in_memory();
        let path = "results/2024-07-14/a.json";

        assert!(!storage.exists(path).await.unwrap());
        assert!(storage.get_optional(path).await.unwrap().is_none());
        assert!(matches!(
            storage.get(path).await,
            Err(AgriError::Persistence(_))
        ));

        storage.put(path, Bytes::from_static(b"{}")).await.unwrap();
        assert!(storage.exists(path).await.unwrap());
        assert_eq!(storage.get(path).await.unwrap().as_ref(), b"{}");

        let listed = storage.list("results/2024-07-14").await.unwrap();
        assert_eq!(listed, vec![path.to_string()]);

        storage.delete(path).await.unwrap();
        assert!(!storage.exists(path).await.unwrap());
    }

    #[test]
    fn test_uri() {
        let storage = ObjectStorage::in_memory();
        assert_eq!(
            storage.uri("time_series/vegetation_log.json"),
            "s3://uae-agri-monitoring/time_series/vegetation_log.json"
        );
    }
}
