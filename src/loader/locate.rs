//! Artifact keys and path resolution
//!
//! Maps a (kind, model type, model version) triple to its file:
//! `{root}/{kind dir}/{model_type}_{model_version}[.{suffix}].{ext}`.
//! Nothing here touches the filesystem except `exists` and `list_available`.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::ArtifactConfig;
use crate::error::{Error, Result};

/// Kind of serialized artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    /// Tree-ensemble model (XGBoost JSON)
    Model,
    /// Fitted feature scaler
    Scaler,
    /// Label encoder for class ids
    Encoder,
}

impl ArtifactKind {
    /// Every kind, in resolution order
    pub const ALL: [ArtifactKind; 3] = [Self::Model, Self::Scaler, Self::Encoder];

    /// Default base directory
    pub fn default_dir(self) -> &'static str {
        match self {
            Self::Model => "models",
            Self::Scaler => "scalers",
            Self::Encoder => "encoders",
        }
    }

    /// File extension
    pub fn extension(self) -> &'static str {
        match self {
            Self::Model => "json",
            Self::Scaler | Self::Encoder => "bin",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Model => "model",
            Self::Scaler => "scaler",
            Self::Encoder => "encoder",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cache key identifying one artifact
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactKey {
    pub kind: ArtifactKind,
    pub model_type: String,
    pub model_version: String,
}

impl ArtifactKey {
    pub fn new(
        kind: ArtifactKind,
        model_type: impl Into<String>,
        model_version: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            model_type: model_type.into(),
            model_version: model_version.into(),
        }
    }

    pub fn model(model_type: impl Into<String>, model_version: impl Into<String>) -> Self {
        Self::new(ArtifactKind::Model, model_type, model_version)
    }

    pub fn scaler(model_type: impl Into<String>, model_version: impl Into<String>) -> Self {
        Self::new(ArtifactKind::Scaler, model_type, model_version)
    }

    pub fn encoder(model_type: impl Into<String>, model_version: impl Into<String>) -> Self {
        Self::new(ArtifactKind::Encoder, model_type, model_version)
    }

    /// Key for the same model type/version but a different kind
    pub fn sibling(&self, kind: ArtifactKind) -> Self {
        Self::new(kind, self.model_type.clone(), self.model_version.clone())
    }

    /// Reject type or version strings that would resolve outside the kind's
    /// directory
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("model type", &self.model_type),
            ("model version", &self.model_version),
        ] {
            if value.contains(['/', '\\', '\0']) || value.contains("..") {
                return Err(Error::invalid_key(
                    self,
                    format!("{field} '{value}' contains a path component"),
                ));
            }
        }
        Ok(())
    }

    /// `{model_type}_{model_version}`
    pub fn file_stem(&self) -> String {
        format!("{}_{}", self.model_type, self.model_version)
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}_{}", self.kind, self.model_type, self.model_version)
    }
}

/// Resolve an artifact path with the default layout, relative to the cwd
///
/// `resolve(ArtifactKind::Model, "xgboost", "2")` is `models/xgboost_2.json`.
pub fn resolve(kind: ArtifactKind, model_type: &str, model_version: &str) -> PathBuf {
    Locator::default().path_for(&ArtifactKey::new(kind, model_type, model_version))
}

/// Resolves artifact keys against a configured directory layout
#[derive(Debug, Clone, Default)]
pub struct Locator {
    layout: ArtifactConfig,
}

impl Locator {
    pub fn new(layout: ArtifactConfig) -> Self {
        Self { layout }
    }

    /// Default layout under `root`
    pub fn rooted(root: impl Into<PathBuf>) -> Self {
        Self::new(ArtifactConfig::with_root(root))
    }

    pub fn layout(&self) -> &ArtifactConfig {
        &self.layout
    }

    /// Directory holding artifacts of `kind`
    pub fn dir_for(&self, kind: ArtifactKind) -> PathBuf {
        self.layout.root.join(self.layout.dir_for(kind))
    }

    /// File name for a key, without directory
    pub fn file_name(&self, key: &ArtifactKey) -> String {
        match self.layout.suffix_for(key.kind) {
            Some(suffix) => format!("{}.{}.{}", key.file_stem(), suffix, key.kind.extension()),
            None => format!("{}.{}", key.file_stem(), key.kind.extension()),
        }
    }

    /// Full path for a key
    pub fn path_for(&self, key: &ArtifactKey) -> PathBuf {
        self.dir_for(key.kind).join(self.file_name(key))
    }

    /// Check whether the artifact file for a key exists
    pub fn exists(&self, key: &ArtifactKey) -> bool {
        self.path_for(key).is_file()
    }

    /// List keys of `kind` that have a file on disk, sorted
    pub fn list_available(&self, kind: ArtifactKind) -> Result<Vec<ArtifactKey>> {
        let dir = self.dir_for(kind);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let tail = match self.layout.suffix_for(kind) {
            Some(suffix) => format!(".{}.{}", suffix, kind.extension()),
            None => format!(".{}", kind.extension()),
        };
        let pattern = format!(
            "{}/*{}",
            glob::Pattern::escape(&dir.to_string_lossy()),
            glob::Pattern::escape(&tail)
        );

        let paths = glob::glob(&pattern)
            .map_err(|e| Error::internal(format!("invalid artifact pattern {pattern}: {e}")))?;

        let mut keys: Vec<ArtifactKey> = paths
            .filter_map(|r| r.ok())
            .filter(|p| p.is_file())
            .filter_map(|p| parse_file_name(&p, kind, &tail))
            .collect();
        keys.sort_by(|a, b| {
            (&a.model_type, &a.model_version).cmp(&(&b.model_type, &b.model_version))
        });
        Ok(keys)
    }
}

/// Recover a key from `{type}_{version}{tail}`, splitting at the last `_`
fn parse_file_name(path: &Path, kind: ArtifactKind, tail: &str) -> Option<ArtifactKey> {
    let name = path.file_name()?.to_str()?;
    let stem = name.strip_suffix(tail)?;
    let (model_type, model_version) = stem.rsplit_once('_')?;
    if model_type.is_empty() || model_version.is_empty() {
        return None;
    }
    Some(ArtifactKey::new(kind, model_type, model_version))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_naming_scheme() {
        let cases = [
            (
                ArtifactKind::Model,
                "Logistic Regression",
                "1",
                "models/Logistic Regression_1.json",
            ),
            (ArtifactKind::Model, "xgboost", "2", "models/xgboost_2.json"),
            (ArtifactKind::Scaler, "xgboost", "2", "scalers/xgboost_2.bin"),
            (
                ArtifactKind::Encoder,
                "random_forest",
                "1.3",
                "encoders/random_forest_1.3.bin",
            ),
        ];
        for (kind, model_type, version, expected) in cases {
            assert_eq!(
                resolve(kind, model_type, version),
                PathBuf::from(expected),
                "{kind} {model_type} {version}"
            );
        }
    }

    #[test]
    fn test_validate_rejects_path_components() {
        assert!(ArtifactKey::model("Logistic Regression", "1.3").validate().is_ok());
        let bad = [
            ("../x", "1"),
            ("xgboost", "../../etc/passwd"),
            ("a/b", "1"),
            ("a\\b", "1"),
        ];
        for (model_type, version) in bad {
            let err = ArtifactKey::model(model_type, version).validate().unwrap_err();
            assert!(matches!(err, Error::InvalidKey { .. }), "{model_type} {version}");
        }
    }

    #[test]
    fn test_rooted_layout_with_suffix() {
        let layout = ArtifactConfig {
            scaler_suffix: Some("std".to_string()),
            ..ArtifactConfig::with_root("/srv/wine")
        };
        let locator = Locator::new(layout);
        assert_eq!(
            locator.path_for(&ArtifactKey::scaler("xgboost", "2")),
            PathBuf::from("/srv/wine/scalers/xgboost_2.std.bin")
        );
        assert_eq!(
            locator.path_for(&ArtifactKey::model("xgboost", "2")),
            PathBuf::from("/srv/wine/models/xgboost_2.json")
        );
    }

    #[test]
    fn test_empty_suffix_is_ignored() {
        let layout = ArtifactConfig {
            model_suffix: Some(String::new()),
            ..Default::default()
        };
        let locator = Locator::new(layout);
        assert_eq!(
            locator.file_name(&ArtifactKey::model("xgboost", "2")),
            "xgboost_2.json"
        );
    }

    #[test]
    fn test_key_display_and_sibling() {
        let key = ArtifactKey::model("xgboost", "2");
        assert_eq!(key.to_string(), "model:xgboost_2");
        let scaler = key.sibling(ArtifactKind::Scaler);
        assert_eq!(scaler, ArtifactKey::scaler("xgboost", "2"));
        assert_ne!(scaler, key);
    }

    #[test]
    fn test_exists_and_list_available() {
        let dir = tempfile::tempdir().unwrap();
        let locator = Locator::rooted(dir.path());
        let models = locator.dir_for(ArtifactKind::Model);
        std::fs::create_dir_all(&models).unwrap();
        std::fs::write(models.join("xgboost_2.json"), "{}").unwrap();
        std::fs::write(models.join("random_forest_1.json"), "{}").unwrap();
        std::fs::write(models.join("notes.txt"), "ignored").unwrap();
        std::fs::write(models.join("noversion.json"), "{}").unwrap();

        assert!(locator.exists(&ArtifactKey::model("xgboost", "2")));
        assert!(!locator.exists(&ArtifactKey::model("xgboost", "3")));

        let keys = locator.list_available(ArtifactKind::Model).unwrap();
        assert_eq!(
            keys,
            vec![
                ArtifactKey::model("random_forest", "1"),
                ArtifactKey::model("xgboost", "2"),
            ]
        );

        // Missing directory is an empty listing, not an error
        assert!(locator
            .list_available(ArtifactKind::Encoder)
            .unwrap()
            .is_empty());
    }
}
