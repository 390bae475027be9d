//! Prediction over loaded artifacts

use crate::error::{Error, Result};
use crate::loader::{ArtifactKind, Booster, LabelEncoder, Scaler};

/// Predict one scalar from a raw feature vector
///
/// When a scaler is given it is applied first. The scaled width must match
/// the scaler, and the model input width must match `Booster::num_feature`
/// (when the model records it), otherwise the call fails with
/// `Error::ShapeMismatch`.
pub fn predict(model: &Booster, features: &[f64], scaler: Option<&Scaler>) -> Result<f64> {
    let scaled;
    let input = match scaler {
        Some(scaler) => {
            check_width(ArtifactKind::Scaler, scaler.width(), features.len())?;
            scaled = scaler.transform(features);
            scaled.as_slice()
        }
        None => features,
    };

    if model.num_feature() > 0 {
        check_width(ArtifactKind::Model, model.num_feature(), input.len())?;
    }

    Ok(model.predict(input))
}

/// Map a predicted class id to its label
pub fn decode_label(encoder: &LabelEncoder, prediction: f64) -> Result<String> {
    encoder
        .decode(prediction)
        .map(str::to_string)
        .ok_or_else(|| {
            Error::inference(format!(
                "prediction {} is not a class id of a {}-class encoder",
                prediction,
                encoder.classes().len()
            ))
        })
}

fn check_width(stage: ArtifactKind, expected: usize, actual: usize) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(Error::ShapeMismatch {
            stage,
            expected,
            actual,
        })
    }
}
