//! Log output for hosts
//!
//! The container only emits `tracing` events: component load/unload lines under the
//! `armature::services` target, discovery warnings and hook/injection errors.
//! Hosts without a subscriber of their own can install one with [init_logging].

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use crate::config::LoggingOptions;
use crate::error::ConfigError;

/// Target of the per-component lifecycle lines
pub const SERVICES_TARGET: &str = "armature::services";

/// Environment variable overriding the configured filter
pub const LOG_ENV: &str = "ARMATURE_LOG";

/// Build the filter: `ARMATURE_LOG` if set, the configured level otherwise
pub fn env_filter(options: &LoggingOptions) -> Result<EnvFilter, ConfigError> {
    match EnvFilter::try_from_env(LOG_ENV) {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&options.level).map_err(|e| ConfigError::LogFilter {
            filter: options.level.clone(),
            message: e.to_string(),
        }),
    }
}

/// Install a global fmt subscriber
pub fn init_logging(options: &LoggingOptions) -> Result<(), ConfigError> {
    let filter = env_filter(options)?;
    let stdout = fmt::layer().with_target(true).with_ansi(options.ansi);
    Registry::default()
        .with(filter)
        .with(stdout)
        .try_init()
        .map_err(|_| ConfigError::SubscriberAlreadySet)?;

    tracing::info!(level = %options.level, "logging initialized");
    Ok(())
}
