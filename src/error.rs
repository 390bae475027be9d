//! Error types for artifact resolution, loading and inference

use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::loader::{ArtifactKey, ArtifactKind};

/// Result alias used across the core
pub type Result<T> = std::result::Result<T, Error>;

/// Failure surfaced by the artifact core.
///
/// The type is `Clone` so a single load failure can be handed to every
/// requester that was waiting on the same key.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum Error {
    /// Artifact file is absent (client-correctable: unknown model version)
    #[error("{kind} artifact not found: {}", path.display())]
    NotFound { kind: ArtifactKind, path: PathBuf },

    /// Artifact file exists but could not be read or deserialized
    #[error("failed to load {kind} artifact from {}: {reason}", path.display())]
    Load {
        kind: ArtifactKind,
        path: PathBuf,
        reason: String,
    },

    /// Feature vector width does not match the scaler or model input.
    /// `stage` is the artifact whose input width was violated.
    #[error("{stage} expects {expected} features, got {actual}")]
    ShapeMismatch {
        stage: ArtifactKind,
        expected: usize,
        actual: usize,
    },

    /// Model type or version cannot name a file inside the artifact directory
    #[error("invalid artifact key {key}: {reason}")]
    InvalidKey { key: String, reason: String },

    /// Loading a key exceeded the configured load timeout
    #[error("loading {key} timed out after {after:?}")]
    Timeout { key: ArtifactKey, after: Duration },

    /// Model output could not be turned into a response
    #[error("inference error: {0}")]
    Inference(String),

    /// Worker pool failure (closed pool, panicked task)
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a not-found error for the given artifact path
    pub fn not_found(kind: ArtifactKind, path: impl AsRef<Path>) -> Self {
        Self::NotFound {
            kind,
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Create a load error for the given artifact path
    pub fn load(kind: ArtifactKind, path: impl AsRef<Path>, reason: impl Display) -> Self {
        Self::Load {
            kind,
            path: path.as_ref().to_path_buf(),
            reason: reason.to_string(),
        }
    }

    /// Create an invalid-key error
    pub fn invalid_key(key: impl Display, reason: impl Into<String>) -> Self {
        Self::InvalidKey {
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    /// Create an inference error with the given message
    pub fn inference(msg: impl Into<String>) -> Self {
        Self::Inference(msg.into())
    }

    /// Create an internal error with the given message
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// True when the artifact file was absent
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// True when the caller can fix the request (unknown version, bad shape)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. } | Self::ShapeMismatch { .. } | Self::InvalidKey { .. }
        )
    }

    /// HTTP-equivalent status code for the serving layer
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::ShapeMismatch { .. } | Self::InvalidKey { .. } => 400,
            Self::Timeout { .. } => 504,
            Self::Load { .. } | Self::Inference(_) | Self::Internal(_) => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_is_client_error() {
        let err = Error::not_found(ArtifactKind::Model, "models/xgboost_9.json");
        assert!(err.is_not_found());
        assert!(err.is_client_error());
        assert_eq!(err.status_code(), 404);
        assert_eq!(
            err.to_string(),
            "model artifact not found: models/xgboost_9.json"
        );
    }

    #[test]
    fn test_load_error_is_internal() {
        let err = Error::load(ArtifactKind::Scaler, "scalers/xgboost_2.bin", "truncated");
        assert!(!err.is_not_found());
        assert!(!err.is_client_error());
        assert_eq!(err.status_code(), 500);
        assert!(err.to_string().contains("scalers/xgboost_2.bin"));
        assert!(err.to_string().contains("truncated"));
    }

    #[test]
    fn test_shape_mismatch_maps_to_bad_request() {
        let err = Error::ShapeMismatch {
            stage: ArtifactKind::Model,
            expected: 11,
            actual: 3,
        };
        assert!(err.is_client_error());
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.to_string(), "model expects 11 features, got 3");
    }

    #[test]
    fn test_invalid_key_is_bad_request() {
        let err = Error::invalid_key("model:../x_1", "path separator in model type");
        assert!(err.is_client_error());
        assert_eq!(err.status_code(), 400);
        assert!(err.to_string().contains("model:../x_1"));
    }

    #[test]
    fn test_timeout_status() {
        let err = Error::Timeout {
            key: ArtifactKey::model("xgboost", "2"),
            after: Duration::from_secs(5),
        };
        assert_eq!(err.status_code(), 504);
        assert!(err.to_string().contains("model:xgboost_2"));
    }

    #[test]
    fn test_clone_preserves_variant() {
        let err = Error::internal("worker pool closed");
        let copy = err.clone();
        assert_eq!(err.to_string(), copy.to_string());
        assert_eq!(copy.status_code(), 500);
    }
}
