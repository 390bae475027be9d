//! Request-level prediction entry point
//!
//! The serving layer hands a `PredictRequest` in and gets a
//! `PredictResponse` (or an `Error` with a status code) back.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::cache::ArtifactCache;
use super::invoke;
use super::pool::WorkerPool;
use crate::config::{InferenceConfig, ScalerPolicy, SommelierConfig};
use crate::error::Result;
use crate::loader::Scaler;

/// Inbound prediction call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictRequest {
    pub features: Vec<f64>,
    pub model_version: String,
    pub model_type: String,
}

/// Prediction result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictResponse {
    pub prediction: f64,
    /// Decoded class label, when label decoding is enabled and an encoder exists
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Resolves artifacts through the cache and runs predictions on the pool
#[derive(Clone)]
pub struct Predictor {
    cache: ArtifactCache,
    pool: WorkerPool,
    config: InferenceConfig,
}

impl Predictor {
    pub fn new(cache: ArtifactCache, pool: WorkerPool, config: InferenceConfig) -> Self {
        Self {
            cache,
            pool,
            config,
        }
    }

    /// Filesystem-backed predictor using the given pool
    pub fn from_config(config: &SommelierConfig, pool: WorkerPool) -> Self {
        Self::new(
            ArtifactCache::from_config(config),
            pool,
            config.inference.clone(),
        )
    }

    pub fn cache(&self) -> &ArtifactCache {
        &self.cache
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Predict a single scalar for one feature vector
    pub async fn predict(&self, request: &PredictRequest) -> Result<PredictResponse> {
        let model = self
            .cache
            .get_model(&request.model_type, &request.model_version)
            .await?;
        let scaler = self.scaler_for(request).await?;

        let features = request.features.clone();
        let prediction = self
            .pool
            .run(move || invoke::predict(&model, &features, scaler.as_deref()))
            .await?;

        let label = if self.config.decode_labels {
            let encoder = optional(
                self.cache
                    .get_encoder(&request.model_type, &request.model_version)
                    .await,
            )?;
            encoder
                .map(|encoder| invoke::decode_label(&encoder, prediction))
                .transpose()?
        } else {
            None
        };

        tracing::debug!(
            model_type = %request.model_type,
            model_version = %request.model_version,
            prediction,
            "Prediction served"
        );

        Ok(PredictResponse { prediction, label })
    }

    async fn scaler_for(&self, request: &PredictRequest) -> Result<Option<Arc<Scaler>>> {
        let lookup = || {
            self.cache
                .get_scaler(&request.model_type, &request.model_version)
        };
        match self.config.scaler {
            ScalerPolicy::Never => Ok(None),
            ScalerPolicy::IfPresent => optional(lookup().await),
            ScalerPolicy::Required => lookup().await.map(Some),
        }
    }
}

/// Treat a missing artifact as absent rather than as a failure
fn optional<T>(result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}
