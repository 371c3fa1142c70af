//! Processor configuration.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use pipeline::PipelineConfig;
use storage::ObjectStorageConfig;

/// Default wall-clock ceiling for one invocation (15 minutes).
pub const DEFAULT_INVOCATION_TIMEOUT_SECS: u64 = 900;

/// Top-level processor configuration.
///
/// The pipeline section comes from YAML; storage settings always come from
/// the environment so credentials never live in config files.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    /// Search, acquisition and analysis settings
    pub pipeline: PipelineConfig,

    /// Wall-clock ceiling per invocation (seconds)
    pub invocation_timeout_secs: u64,

    /// Parent directory for per-invocation scratch space
    pub scratch_dir: Option<PathBuf>,

    #[serde(skip)]
    pub storage: ObjectStorageConfig,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            pipeline: PipelineConfig::default(),
            invocation_timeout_secs: DEFAULT_INVOCATION_TIMEOUT_SECS,
            scratch_dir: None,
            storage: ObjectStorageConfig::default(),
        }
    }
}

impl ProcessorConfig {
    /// Load from a YAML file if it exists, otherwise use defaults. Storage
    /// settings are read from the environment either way.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            Self::from_yaml_str(&text)
                .with_context(|| format!("Failed to parse config file {}", path.display()))?
        } else {
            tracing::info!(path = %path.display(), "Config file not found, using defaults");
            Self::default()
        };

        config.storage = ObjectStorageConfig::from_env();
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(text)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.pipeline
            .validate()
            .context("Invalid pipeline configuration")?;
        if self.invocation_timeout_secs == 0 {
            anyhow::bail!("invocation_timeout_secs must be positive");
        }
        Ok(())
    }

    pub fn invocation_timeout(&self) -> Duration {
        Duration::from_secs(self.invocation_timeout_secs)
    }
}
