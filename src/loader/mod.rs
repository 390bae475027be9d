//! Artifact loading
//!
//! This module turns artifact files into immutable in-memory handles:
//! - Models: XGBoost JSON tree ensembles (`models/*.json`)
//! - Scalers: fitted feature scalers (`scalers/*.bin`)
//! - Encoders: label encoders (`encoders/*.bin`)
//!
//! Path construction lives in `locate`; the `ArtifactLoader` trait is the
//! seam the cache loads through, so tests can swap in counting or failing loaders.

mod booster;
mod encoder;
mod locate;
mod scaler;

pub use booster::{Booster, Objective};
pub use encoder::LabelEncoder;
pub use locate::{resolve, ArtifactKey, ArtifactKind, Locator};
pub use scaler::Scaler;

#[cfg(test)]
pub(crate) use booster::fixtures;

use std::path::Path;
use std::sync::Arc;

use crate::error::{Error, Result};

/// Loaded artifact, shared read-only between requests
#[derive(Debug, Clone)]
pub enum ArtifactHandle {
    Model(Arc<Booster>),
    Scaler(Arc<Scaler>),
    Encoder(Arc<LabelEncoder>),
}

impl ArtifactHandle {
    pub fn kind(&self) -> ArtifactKind {
        match self {
            Self::Model(_) => ArtifactKind::Model,
            Self::Scaler(_) => ArtifactKind::Scaler,
            Self::Encoder(_) => ArtifactKind::Encoder,
        }
    }

    pub fn into_model(self) -> Option<Arc<Booster>> {
        match self {
            Self::Model(m) => Some(m),
            _ => None,
        }
    }

    pub fn into_scaler(self) -> Option<Arc<Scaler>> {
        match self {
            Self::Scaler(s) => Some(s),
            _ => None,
        }
    }

    pub fn into_encoder(self) -> Option<Arc<LabelEncoder>> {
        match self {
            Self::Encoder(e) => Some(e),
            _ => None,
        }
    }

    /// True when both handles point at the same loaded object
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Model(a), Self::Model(b)) => Arc::ptr_eq(a, b),
            (Self::Scaler(a), Self::Scaler(b)) => Arc::ptr_eq(a, b),
            (Self::Encoder(a), Self::Encoder(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Reads one artifact from a resolved path
///
/// Implementations must return `Error::NotFound` for a missing file and
/// `Error::Load` for everything else. Loads run on the blocking pool.
pub trait ArtifactLoader: Send + Sync {
    fn load(&self, path: &Path, kind: ArtifactKind) -> Result<ArtifactHandle>;
}

/// Loader reading artifacts from the local filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct FsLoader;

impl ArtifactLoader for FsLoader {
    fn load(&self, path: &Path, kind: ArtifactKind) -> Result<ArtifactHandle> {
        load_artifact(path, kind)
    }
}

/// Load an artifact of the given kind from disk
pub fn load_artifact<P: AsRef<Path>>(path: P, kind: ArtifactKind) -> Result<ArtifactHandle> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(Error::not_found(kind, path));
    }

    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        // Removed between the existence check and the read
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::not_found(kind, path))
        }
        Err(e) => return Err(Error::load(kind, path, e)),
    };

    decode(kind, &bytes).map_err(|e| Error::load(kind, path, format!("{e:#}")))
}

/// Decode artifact bytes of the given kind
pub fn decode(kind: ArtifactKind, bytes: &[u8]) -> anyhow::Result<ArtifactHandle> {
    Ok(match kind {
        ArtifactKind::Model => ArtifactHandle::Model(Arc::new(Booster::from_slice(bytes)?)),
        ArtifactKind::Scaler => ArtifactHandle::Scaler(Arc::new(Scaler::from_slice(bytes)?)),
        ArtifactKind::Encoder => {
            ArtifactHandle::Encoder(Arc::new(LabelEncoder::from_slice(bytes)?))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_artifact(dir.path().join("xgboost_2.json"), ArtifactKind::Model)
            .unwrap_err();
        assert!(err.is_not_found(), "{err}");
    }

    #[test]
    fn test_corrupt_file_is_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("xgboost_2.json");
        std::fs::write(&path, "{ truncated").unwrap();

        let err = load_artifact(&path, ArtifactKind::Model).unwrap_err();
        assert!(matches!(err, Error::Load { kind: ArtifactKind::Model, .. }), "{err}");
        assert!(err.to_string().contains("xgboost_2.json"));
    }

    #[test]
    fn test_directory_is_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_artifact(dir.path(), ArtifactKind::Scaler).unwrap_err();
        assert!(matches!(err, Error::Load { .. }), "{err}");
    }

    #[test]
    fn test_loads_each_kind() {
        let dir = tempfile::tempdir().unwrap();
        let model_path = dir.path().join("m.json");
        std::fs::write(&model_path, fixtures::REGRESSION).unwrap();
        let scaler_path = dir.path().join("s.bin");
        let scaler = Scaler::Standard {
            mean: vec![0.0, 0.0],
            scale: vec![1.0, 1.0],
        };
        std::fs::write(&scaler_path, scaler.to_bytes().unwrap()).unwrap();
        let encoder_path = dir.path().join("e.bin");
        let encoder = LabelEncoder::new(vec!["red".into(), "white".into()]);
        std::fs::write(&encoder_path, encoder.to_bytes().unwrap()).unwrap();

        let model = FsLoader.load(&model_path, ArtifactKind::Model).unwrap();
        assert_eq!(model.kind(), ArtifactKind::Model);
        assert_eq!(model.into_model().unwrap().num_feature(), 2);

        let loaded = FsLoader.load(&scaler_path, ArtifactKind::Scaler).unwrap();
        assert_eq!(*loaded.into_scaler().unwrap(), scaler);

        let loaded = FsLoader.load(&encoder_path, ArtifactKind::Encoder).unwrap();
        assert_eq!(loaded.into_encoder().unwrap().classes(), encoder.classes());
    }

    #[test]
    fn test_wrong_kind_is_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.json");
        std::fs::write(&path, fixtures::REGRESSION).unwrap();
        let err = FsLoader.load(&path, ArtifactKind::Encoder).unwrap_err();
        assert!(matches!(err, Error::Load { kind: ArtifactKind::Encoder, .. }));
    }

    #[test]
    fn test_handle_identity() {
        let booster = Arc::new(Booster::from_json_str(fixtures::REGRESSION).unwrap());
        let a = ArtifactHandle::Model(Arc::clone(&booster));
        let b = a.clone();
        let c = ArtifactHandle::Model(Arc::new(Booster::from_json_str(fixtures::REGRESSION).unwrap()));
        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&c));
    }
}
