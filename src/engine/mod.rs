//! Core inference engine
//!
//! This module provides the prediction pipeline:
//! - ArtifactCache: Loads artifacts once per key and serves them from memory
//! - invoke: Applies the scaler and model to one feature vector
//! - WorkerPool: Injected pool for CPU-bound prediction work
//! - Predictor: Request-level entry point tying the three together

mod cache;
pub mod invoke;
mod pool;
mod predictor;

pub use cache::{
    ArtifactCache, CacheBuilder, CacheEntry, CacheStats, EvictionListener, LoadedArtifactInfo,
};
pub use pool::WorkerPool;
pub use predictor::{PredictRequest, PredictResponse, Predictor};
