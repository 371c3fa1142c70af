//! Error types for the scene processing pipeline.

use thiserror::Error;

/// Result type alias using AgriError.
pub type AgriResult<T> = Result<T, AgriError>;

/// Primary error type for pipeline operations.
///
/// Every variant belongs to exactly one pipeline stage, reported by
/// [`AgriError::stage`] so failures can be diagnosed without re-running.
#[derive(Debug, Error)]
pub enum AgriError {
    // === Search Errors ===
    #[error("No suitable scenes found between {start} and {end}")]
    NoScenesFound { start: String, end: String },

    #[error("Catalog query failed: {0}")]
    Catalog(String),

    // === Acquisition Errors ===
    #[error("Failed to acquire band '{band}': {message}")]
    Acquisition { band: String, message: String },

    #[error("Timed out acquiring band '{band}' after {timeout_secs}s")]
    AcquisitionTimeout { band: String, timeout_secs: u64 },

    // === Raster Errors ===
    #[error("Failed to read raster for band '{band}': {message}")]
    RasterRead { band: String, message: String },

    #[error("Area of interest does not intersect band '{band}': {message}")]
    ClipOutOfBounds { band: String, message: String },

    #[error("Index computation failed: {0}")]
    IndexComputation(String),

    // === Persistence Errors ===
    #[error("Persistence error: {0}")]
    Persistence(String),

    // === Invocation Errors ===
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invocation exceeded its {0}s ceiling")]
    InvocationTimeout(u64),

    #[error("I/O error: {0}")]
    Io(String),
}

impl AgriError {
    /// Pipeline stage in which this error was raised.
    pub fn stage(&self) -> &'static str {
        match self {
            AgriError::NoScenesFound { .. } | AgriError::Catalog(_) => "search",
            AgriError::Acquisition { .. } | AgriError::AcquisitionTimeout { .. } => "acquire",
            AgriError::RasterRead { .. } | AgriError::ClipOutOfBounds { .. } => "clip",
            AgriError::IndexComputation(_) => "index",
            AgriError::Persistence(_) => "persist",
            AgriError::Unsupported(_)
            | AgriError::Config(_)
            | AgriError::InvocationTimeout(_)
            | AgriError::Io(_) => "invocation",
        }
    }

    /// HTTP status code for the invocation contract: any raised failure is 500.
    pub fn http_status_code(&self) -> u16 {
        500
    }
}

// Conversion from common error types
impl From<std::io::Error> for AgriError {
    fn from(err: std::io::Error) -> Self {
        AgriError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for AgriError {
    fn from(err: serde_json::Error) -> Self {
        AgriError::Persistence(format!("JSON error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_names() {
        let err = AgriError::NoScenesFound {
            start: "2024-07-01".into(),
            end: "2024-07-31".into(),
        };
        assert_eq!(err.stage(), "search");
        assert_eq!(
            err.to_string(),
            "No suitable scenes found between 2024-07-01 and 2024-07-31"
        );

        let err = AgriError::AcquisitionTimeout {
            band: "nir".into(),
            timeout_secs: 300,
        };
        assert_eq!(err.stage(), "acquire");
        assert!(err.to_string().contains("nir"));

        assert_eq!(
            AgriError::ClipOutOfBounds {
                band: "red".into(),
                message: "outside".into()
            }
            .stage(),
            "clip"
        );
        assert_eq!(AgriError::IndexComputation("x".into()).stage(), "index");
        assert_eq!(AgriError::Unsupported("x".into()).stage(), "invocation");
    }

    #[test]
    fn test_every_error_maps_to_500() {
        assert_eq!(AgriError::Persistence("down".into()).http_status_code(), 500);
        assert_eq!(AgriError::Unsupported("scene_id".into()).http_status_code(), 500);
    }
}
