//! On-disk artifact layout settings

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::loader::ArtifactKind;

/// Where artifacts live and how their files are named
///
/// Files are resolved as `{root}/{dir}/{model_type}_{model_version}[.{suffix}].{ext}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactConfig {
    /// Directory the three kind directories are relative to (empty = cwd)
    #[serde(default)]
    pub root: PathBuf,

    /// Directory holding model files
    #[serde(default = "default_models_dir")]
    pub models_dir: String,

    /// Directory holding fitted scalers
    #[serde(default = "default_scalers_dir")]
    pub scalers_dir: String,

    /// Directory holding label encoders
    #[serde(default = "default_encoders_dir")]
    pub encoders_dir: String,

    /// Optional infix for model files (`xgboost_2.{suffix}.json`)
    #[serde(default)]
    pub model_suffix: Option<String>,

    /// Optional infix for scaler files
    #[serde(default)]
    pub scaler_suffix: Option<String>,

    /// Optional infix for encoder files
    #[serde(default)]
    pub encoder_suffix: Option<String>,
}

fn default_models_dir() -> String {
    ArtifactKind::Model.default_dir().to_string()
}

fn default_scalers_dir() -> String {
    ArtifactKind::Scaler.default_dir().to_string()
}

fn default_encoders_dir() -> String {
    ArtifactKind::Encoder.default_dir().to_string()
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::new(),
            models_dir: default_models_dir(),
            scalers_dir: default_scalers_dir(),
            encoders_dir: default_encoders_dir(),
            model_suffix: None,
            scaler_suffix: None,
            encoder_suffix: None,
        }
    }
}

impl ArtifactConfig {
    /// Default layout rooted at `root`
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Default::default()
        }
    }

    /// Directory name for an artifact kind
    pub fn dir_for(&self, kind: ArtifactKind) -> &str {
        match kind {
            ArtifactKind::Model => &self.models_dir,
            ArtifactKind::Scaler => &self.scalers_dir,
            ArtifactKind::Encoder => &self.encoders_dir,
        }
    }

    /// File name infix for an artifact kind, if any
    pub fn suffix_for(&self, kind: ArtifactKind) -> Option<&str> {
        let suffix = match kind {
            ArtifactKind::Model => &self.model_suffix,
            ArtifactKind::Scaler => &self.scaler_suffix,
            ArtifactKind::Encoder => &self.encoder_suffix,
        };
        suffix.as_deref().filter(|s| !s.is_empty())
    }
}
