//! Sommelier - lazy model artifact cache for inference endpoints
//!
//! Sommelier maps a `(model_type, model_version)` pair to artifacts on disk,
//! loads each one exactly once, and serves predictions from memory.
//!
//! # Architecture
//!
//! - **loader**: key-to-path resolution and artifact decoding
//! - **engine**: per-key artifact cache, prediction, worker pool
//! - **config**: directory layout, cache limits, inference policy
//!
//! The HTTP or CLI layer lives outside this crate and calls
//! [`Predictor::predict`].
//!
//! # Layout
//!
//! ```text
//! models/{model_type}_{model_version}.json     XGBoost JSON model
//! scalers/{model_type}_{model_version}.bin     fitted scaler
//! encoders/{model_type}_{model_version}.bin    label encoder
//! ```
//!
//! # Example
//!
//! ```no_run
//! use sommelier::{PredictRequest, Predictor, SommelierConfig, WorkerPool};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = SommelierConfig::from_yaml("sommelier.yaml")?.with_env_overrides()?;
//! let predictor = Predictor::from_config(&config, WorkerPool::new(config.inference.workers));
//!
//! let response = predictor
//!     .predict(&PredictRequest {
//!         features: vec![7.4, 0.7, 0.0, 1.9, 0.076, 11.0, 34.0, 0.9978, 3.51, 0.56, 9.4],
//!         model_version: "2".into(),
//!         model_type: "xgboost".into(),
//!     })
//!     .await?;
//! println!("{}", response.prediction);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod loader;
pub mod telemetry;

// Re-export key types
pub use config::SommelierConfig;
pub use engine::{ArtifactCache, PredictRequest, PredictResponse, Predictor, WorkerPool};
pub use error::{Error, Result};
pub use loader::{resolve, ArtifactHandle, ArtifactKey, ArtifactKind, Locator};
