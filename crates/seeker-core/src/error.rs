//! Error types shared across crates.

use crate::config::ConfigError;

/// Failures surfaced by engine construction and catalog loading.
///
/// Flight-time problems are never errors: a projectile that cannot steer
/// simply produces no mutation for that tick.
#[derive(Debug, thiserror::Error)]
pub enum FlightError {
    #[error("Failed to parse ammunition catalog: {0}")]
    Catalog(#[from] serde_json::Error),

    #[error("Unknown ammunition: {0}")]
    UnknownAmmo(String),

    #[error("Failed to start worker pool: {0}")]
    WorkerPool(#[from] std::io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
