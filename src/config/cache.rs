//! Artifact cache settings

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Artifact cache configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of loaded artifacts (None = unbounded).
    /// Least-recently-used entries are evicted past this point.
    #[serde(default)]
    pub capacity: Option<usize>,

    /// Give up on a load after this many seconds (None = wait forever)
    #[serde(default)]
    pub load_timeout_secs: Option<u64>,
}

impl CacheConfig {
    /// Load timeout as a `Duration`
    pub fn load_timeout(&self) -> Option<Duration> {
        self.load_timeout_secs.map(Duration::from_secs)
    }
}
