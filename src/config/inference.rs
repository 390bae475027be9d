//! Inference configuration settings

use serde::{Deserialize, Serialize};

/// Whether a fitted scaler is applied before the model
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalerPolicy {
    /// Feed raw features straight to the model
    #[default]
    Never,
    /// Apply the scaler when one exists for the model key. A missing scaler
    /// is looked up again on every request.
    IfPresent,
    /// Fail the request when the scaler is missing
    Required,
}

/// Inference-specific configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InferenceConfig {
    /// Scaler handling
    #[serde(default)]
    pub scaler: ScalerPolicy,

    /// Map class ids back to labels through the label encoder, when one exists
    #[serde(default)]
    pub decode_labels: bool,

    /// Number of predictions allowed to run at once on the worker pool
    #[serde(default = "default_workers")]
    pub workers: usize,
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            scaler: ScalerPolicy::default(),
            decode_labels: false,
            workers: default_workers(),
        }
    }
}
