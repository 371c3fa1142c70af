//! Durable scene history: immutable result records plus a bounded log.
//!
//! The log is rewritten wholesale on every update with a plain
//! read-modify-write. There is no version token, so two invocations that
//! both read the log before either writes will lose one entry.

use bytes::Bytes;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use agri_common::{AgriError, AgriResult, HealthLabel, ResultRecord};

use crate::object_store::{ObjectStorage, StoragePath};

/// Number of scenes retained in the rolling log.
pub const DEFAULT_LOG_CAPACITY: usize = 20;

/// Compact per-scene entry in the time-series log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub scene_id: String,
    pub date: NaiveDate,
    /// `None` when the scene had no valid NDVI pixels
    pub ndvi_mean: Option<f64>,
    pub vegetation_health: HealthLabel,
}

impl From<&ResultRecord> for LogEntry {
    fn from(record: &ResultRecord) -> Self {
        Self {
            scene_id: record.scene_id.clone(),
            date: record.scene_date,
            ndvi_mean: record.ndvi_mean(),
            vegetation_health: record.summary.vegetation_health,
        }
    }
}

/// Rolling window of the most recent scenes, in append order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesLog {
    pub scenes: Vec<LogEntry>,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

impl TimeSeriesLog {
    /// Append an entry and drop the oldest entries beyond `capacity`.
    pub fn append(&mut self, entry: LogEntry, capacity: usize) {
        self.scenes.push(entry);
        if self.scenes.len() > capacity {
            let excess = self.scenes.len() - capacity;
            self.scenes.drain(..excess);
        }
        self.last_updated = Some(Utc::now());
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    pub fn latest(&self) -> Option<&LogEntry> {
        self.scenes.last()
    }
}

/// Outcome of persisting one record.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistOutcome {
    /// URI of the written result record
    pub record_location: String,
    /// URI of the log, when its update succeeded
    pub log_location: Option<String>,
    /// Non-fatal problem encountered while updating the log
    pub warning: Option<String>,
}

/// Writes result records and maintains the time-series log.
#[derive(Clone)]
pub struct HistoryStore {
    storage: ObjectStorage,
    capacity: usize,
}

impl HistoryStore {
    pub fn new(storage: ObjectStorage) -> Self {
        Self::with_capacity(storage, DEFAULT_LOG_CAPACITY)
    }

    pub fn with_capacity(storage: ObjectStorage, capacity: usize) -> Self {
        Self { storage, capacity }
    }

    pub fn storage(&self) -> &ObjectStorage {
        &self.storage
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Write the full record, overwriting any record with the same key.
    #[instrument(skip(self, record), fields(scene_id = %record.scene_id))]
    pub async fn write_record(&self, record: &ResultRecord) -> AgriResult<String> {
        let path = StoragePath::result_record(record.scene_date, &record.scene_id);
        let body = serde_json::to_vec_pretty(record)?;
        self.storage.put(&path, Bytes::from(body)).await?;
        Ok(self.storage.uri(&path))
    }

    /// Read the log; an absent log is an empty log.
    pub async fn read_log(&self) -> AgriResult<TimeSeriesLog> {
        let path = StoragePath::time_series_log();
        match self.storage.get_optional(&path).await? {
            Some(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                AgriError::Persistence(format!("Malformed time-series log: {}", e))
            }),
            None => Ok(TimeSeriesLog::default()),
        }
    }

    /// Overwrite the log.
    pub async fn write_log(&self, log: &TimeSeriesLog) -> AgriResult<String> {
        let path = StoragePath::time_series_log();
        let body = serde_json::to_vec_pretty(log)?;
        self.storage.put(&path, Bytes::from(body)).await?;
        Ok(self.storage.uri(&path))
    }

    /// Append one record's entry to the log and write it back.
    pub async fn update_log(&self, record: &ResultRecord) -> AgriResult<String> {
        let mut log = self.read_log().await?;
        log.append(LogEntry::from(record), self.capacity);
        self.write_log(&log).await
    }

    /// Persist a record, then fold it into the log.
    ///
    /// A failed record write is fatal. A failed log update is logged and
    /// returned as a warning; the record itself is already durable.
    #[instrument(skip(self, record), fields(scene_id = %record.scene_id))]
    pub async fn persist(&self, record: &ResultRecord) -> AgriResult<PersistOutcome> {
        let record_location = self.write_record(record).await?;
        info!(location = %record_location, "Result record written");

        match self.update_log(record).await {
            Ok(log_location) => Ok(PersistOutcome {
                record_location,
                log_location: Some(log_location),
                warning: None,
            }),
            Err(e) => {
                warn!(error = %e, "Time-series log update failed");
                Ok(PersistOutcome {
                    record_location,
                    log_location: None,
                    warning: Some(format!("time-series log not updated: {}", e)),
                })
            }
        }
    }
}
