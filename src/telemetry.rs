//! Tracing setup for the host process

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "sommelier=info";

/// Install a global fmt subscriber filtered by `RUST_LOG` (or `default_filter`)
///
/// Call once from the process entry point. A second call returns an error.
pub fn init_tracing(default_filter: &str) -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;
    Ok(())
}
