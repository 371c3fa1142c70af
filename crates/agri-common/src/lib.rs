//! Common types and utilities shared across the agri-monitor crates.

pub mod bbox;
pub mod crs;
pub mod error;
pub mod record;
pub mod scene;
pub mod time;

pub use bbox::BoundingBox;
pub use crs::CrsCode;
pub use error::{AgriError, AgriResult};
pub use record::{
    HealthLabel, IndexStatistics, ProcessingSummary, ResultRecord, SpectralIndex,
};
pub use scene::{Band, SceneDescriptor};
pub use time::DateRange;
