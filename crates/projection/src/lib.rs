//! Coordinate reference system transformations.
//!
//! Implements the map projections the pipeline needs from scratch without
//! external dependencies: WGS84 geographic and WGS84 / UTM.

pub mod transform;
pub mod transverse_mercator;

pub use transform::{transform_point, transform_ring, ProjectionError};
pub use transverse_mercator::TransverseMercator;
