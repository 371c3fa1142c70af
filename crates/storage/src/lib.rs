//! Storage abstractions for the agri-monitor pipeline.
//!
//! Provides:
//! - Object storage (S3 compatible, or in-memory for tests) for result records
//! - The bounded time-series log shared by every invocation

pub mod history;
pub mod object_store;

pub use self::object_store::{ObjectStorage, ObjectStorageConfig, StoragePath};
pub use history::{HistoryStore, LogEntry, PersistOutcome, TimeSeriesLog, DEFAULT_LOG_CAPACITY};
