//! Tracing subscriber bootstrap.
//!
//! Installs a `fmt` subscriber with an `EnvFilter` seeded from `default_level`,
//! overridable via `RUST_LOG`. Called once at startup before config is loaded
//! (with a conservative default), then re-applied once the configured
//! `log_level` is known.

use tracing_subscriber::EnvFilter;

use crate::error::AppError;

pub fn init(default_level: &str) -> Result<(), AppError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.to_string()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| AppError::Logger(e.to_string()))
}
