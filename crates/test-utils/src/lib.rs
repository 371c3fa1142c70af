//! Shared test utilities for the agri-monitor workspace.
//!
//! This crate provides common testing infrastructure including:
//! - Synthetic band generators
//! - A minimal GeoTIFF writer for band fixtures
//! - Scene descriptor and AOI fixtures
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```

pub mod fixtures;
pub mod generators;
pub mod geotiff;

// Re-export commonly used items at the crate root
pub use fixtures::*;
pub use generators::*;
pub use geotiff::*;

/// Macro for approximate floating-point equality assertions.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_approx_eq;
///
/// assert_approx_eq!(0.6667_f64, 2.0 / 3.0, 0.001); // passes
/// assert_approx_eq!(0.5_f32, 0.4_f32, 0.001);      // fails
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: f64 = $left as f64;
        let right: f64 = $right as f64;
        let epsilon: f64 = $epsilon as f64;
        let diff = (left - right).abs();
        if diff > epsilon {
            panic!(
                "assertion failed: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`,\n  diff: `{:?}` > epsilon `{:?}`",
                left, right, diff, epsilon
            );
        }
    }};
}
