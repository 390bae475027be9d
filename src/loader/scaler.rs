//! Fitted feature scalers
//!
//! Stored as `bincode`-encoded serde values.

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};

/// Column-wise feature transform applied before the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Scaler {
    /// `(x - mean) / scale`; a zero scale leaves the centred value untouched
    Standard { mean: Vec<f64>, scale: Vec<f64> },
    /// `x * scale + min`
    MinMax { min: Vec<f64>, scale: Vec<f64> },
}

impl Scaler {
    /// Decode and validate a serialized scaler
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let scaler: Self = bincode::deserialize(bytes).context("not a serialized scaler")?;
        scaler.validate()?;
        Ok(scaler)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).context("failed to serialize scaler")
    }

    fn validate(&self) -> Result<()> {
        let (a, b) = match self {
            Self::Standard { mean, scale } => (mean, scale),
            Self::MinMax { min, scale } => (min, scale),
        };
        ensure!(!a.is_empty(), "scaler has no columns");
        ensure!(
            a.len() == b.len(),
            "scaler column counts differ ({} vs {})",
            a.len(),
            b.len()
        );
        Ok(())
    }

    /// Number of columns the scaler was fitted on
    pub fn width(&self) -> usize {
        match self {
            Self::Standard { mean, .. } => mean.len(),
            Self::MinMax { min, .. } => min.len(),
        }
    }

    /// Transform one feature vector. Callers check `width()` first.
    pub fn transform(&self, features: &[f64]) -> Vec<f64> {
        match self {
            Self::Standard { mean, scale } => features
                .iter()
                .zip(mean.iter().zip(scale))
                .map(|(x, (m, s))| if *s == 0.0 { x - m } else { (x - m) / s })
                .collect(),
            Self::MinMax { min, scale } => features
                .iter()
                .zip(min.iter().zip(scale))
                .map(|(x, (lo, s))| x * s + lo)
                .collect(),
        }
    }
}
