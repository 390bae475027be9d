//! Configuration system for sommelier
//!
//! `SommelierConfig` groups the artifact layout, cache limits and
//! inference settings. Every field has a default, so an empty document
//! is a valid configuration.

mod artifacts;
mod cache;
mod inference;

pub use artifacts::ArtifactConfig;
pub use cache::CacheConfig;
pub use inference::{InferenceConfig, ScalerPolicy};

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Environment variable overriding `artifacts.root`
pub const ENV_ARTIFACT_ROOT: &str = "SOMMELIER_ARTIFACT_ROOT";
/// Environment variable overriding `cache.capacity`
pub const ENV_CACHE_CAPACITY: &str = "SOMMELIER_CACHE_CAPACITY";
/// Environment variable overriding `cache.load_timeout_secs`
pub const ENV_LOAD_TIMEOUT_SECS: &str = "SOMMELIER_LOAD_TIMEOUT_SECS";

/// Sommelier configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SommelierConfig {
    /// Artifact directory layout
    #[serde(default)]
    pub artifacts: ArtifactConfig,

    /// Cache limits
    #[serde(default)]
    pub cache: CacheConfig,

    /// Prediction settings
    #[serde(default)]
    pub inference: InferenceConfig,
}

impl SommelierConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Self = serde_yaml::from_str(&content)
            .with_context(|| format!("Invalid YAML config {}", path.display()))?;
        Ok(config)
    }

    /// Load configuration from a JSON file
    pub fn from_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Invalid JSON config {}", path.display()))?;
        Ok(config)
    }

    /// Apply `SOMMELIER_*` environment overrides
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(root) = lookup(ENV_ARTIFACT_ROOT) {
            self.artifacts.root = PathBuf::from(root);
        }
        if let Some(capacity) = lookup(ENV_CACHE_CAPACITY) {
            let capacity = capacity
                .trim()
                .parse()
                .with_context(|| format!("{ENV_CACHE_CAPACITY} must be an integer"))?;
            self.cache.capacity = Some(capacity);
        }
        if let Some(timeout) = lookup(ENV_LOAD_TIMEOUT_SECS) {
            let timeout = timeout
                .trim()
                .parse()
                .with_context(|| format!("{ENV_LOAD_TIMEOUT_SECS} must be an integer"))?;
            self.cache.load_timeout_secs = Some(timeout);
        }
        Ok(self)
    }
}
