//! Layered scheduler configuration: defaults, then an optional file, then
//! environment variables.

#[cfg(feature = "config-loader")]
use cron_kernel::error::CronError;
use cron_kernel::job::RateLimitConfig;
use serde::{Deserialize, Serialize};

/// Construction-time options for a [`crate::dispatcher::Scheduler`].
///
/// Deserializable with `serde` so it can be loaded from TOML/YAML/env via
/// the `config-loader` feature, or built directly with `SchedulerConfig::default()`
/// plus field assignment in code that doesn't need external configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub max_concurrent_runs: Option<usize>,
    pub global_rate_limit: Option<RateLimitConfig>,
    pub misfire_tolerance_ms: u64,
    pub event_bus_capacity: usize,
    pub shutdown_grace_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_runs: None,
            global_rate_limit: None,
            misfire_tolerance_ms: 1000,
            event_bus_capacity: 1024,
            shutdown_grace_ms: 30_000,
        }
    }
}

#[cfg(feature = "config-loader")]
impl SchedulerConfig {
    /// Load configuration layered as: built-in defaults, then an optional
    /// file at `path` (format inferred from extension), then environment
    /// variables prefixed `CRON_` (`CRON_MISFIRE_TOLERANCE_MS`, ...).
    pub fn load(path: Option<&str>) -> Result<Self, CronError> {
        let mut builder = ::config::Config::builder()
            .add_source(::config::Config::try_from(&Self::default()).map_err(config_err)?);

        if let Some(path) = path {
            builder = builder.add_source(::config::File::with_name(path));
        }

        builder = builder.add_source(::config::Environment::with_prefix("CRON").separator("__"));

        builder
            .build()
            .map_err(config_err)?
            .try_deserialize()
            .map_err(config_err)
    }
}

#[cfg(feature = "config-loader")]
fn config_err(e: ::config::ConfigError) -> CronError {
    CronError::configuration(format!("failed to load scheduler config: {e}")).with_cause(e)
}
