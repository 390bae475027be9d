//! Label encoder mapping class ids to labels

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};

/// Ordered class labels; class id `i` is `classes[i]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    pub fn new(classes: Vec<String>) -> Self {
        Self { classes }
    }

    /// Decode and validate a serialized encoder
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let encoder: Self =
            bincode::deserialize(bytes).context("not a serialized label encoder")?;
        ensure!(!encoder.classes.is_empty(), "label encoder has no classes");
        Ok(encoder)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).context("failed to serialize label encoder")
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// Label for a predicted class id; `None` unless the id is a whole,
    /// in-range number
    pub fn decode(&self, class_id: f64) -> Option<&str> {
        if !class_id.is_finite() || class_id < 0.0 || class_id.fract() != 0.0 {
            return None;
        }
        self.classes.get(class_id as usize).map(String::as_str)
    }

    /// Class id for a label
    pub fn encode(&self, label: &str) -> Option<usize> {
        self.classes.iter().position(|c| c == label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quality() -> LabelEncoder {
        LabelEncoder::new(vec!["low".into(), "medium".into(), "high".into()])
    }

    #[test]
    fn test_decode_class_ids() {
        let encoder = quality();
        assert_eq!(encoder.decode(0.0), Some("low"));
        assert_eq!(encoder.decode(2.0), Some("high"));
        assert_eq!(encoder.decode(3.0), None);
        assert_eq!(encoder.decode(1.5), None);
        assert_eq!(encoder.decode(-1.0), None);
        assert_eq!(encoder.decode(f64::NAN), None);
    }

    #[test]
    fn test_encode_label() {
        assert_eq!(quality().encode("medium"), Some(1));
        assert_eq!(quality().encode("vintage"), None);
    }

    #[test]
    fn test_serialized_form() {
        let encoder = quality();
        let decoded = LabelEncoder::from_slice(&encoder.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded.classes(), encoder.classes());

        let empty = LabelEncoder::new(Vec::new()).to_bytes().unwrap();
        assert!(LabelEncoder::from_slice(&empty).is_err());
    }
}
