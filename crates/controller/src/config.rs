//! Controller configuration

use anyhow::{Context, Result};
use controller_lib::config_set::ConfigSet;
use controller_lib::driver::DriverConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming an optional config file
pub const CONFIG_PATH_ENV: &str = "CONTROLLER_CONFIG";

/// Upper bound for any configured period (one year)
pub const MAX_PERIOD_SECS: u64 = 365 * 24 * 60 * 60;

/// Controller configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ControllerConfig {
    /// API server port for health/metrics
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Baseline re-invocation period in seconds
    #[serde(default = "default_resync_period")]
    pub resync_period_secs: u64,

    /// Requeue delay after a recommender failure in seconds
    #[serde(default = "default_error_fallback")]
    pub error_fallback_secs: u64,

    /// How often the driver looks for due recommendations, in milliseconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval_millis: u64,

    #[serde(default = "default_max_concurrent_reconciles")]
    pub max_concurrent_reconciles: usize,

    /// JSON file with recommendations and usage history to load at startup
    #[serde(default)]
    pub seed_path: Option<PathBuf>,

    /// Ambient recommender configuration
    #[serde(default)]
    pub config_set: ConfigSet,
}

fn default_api_port() -> u16 {
    8080
}

fn default_resync_period() -> u64 {
    60
}

fn default_error_fallback() -> u64 {
    5
}

fn default_poll_interval() -> u64 {
    1000
}

fn default_max_concurrent_reconciles() -> usize {
    4
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            api_port: default_api_port(),
            resync_period_secs: default_resync_period(),
            error_fallback_secs: default_error_fallback(),
            poll_interval_millis: default_poll_interval(),
            max_concurrent_reconciles: default_max_concurrent_reconciles(),
            seed_path: None,
            config_set: ConfigSet::default(),
        }
    }
}

impl ControllerConfig {
    /// Load configuration from the file named by `CONTROLLER_CONFIG` (if any)
    /// and `CONTROLLER_*` environment variables
    pub fn load() -> Result<Self> {
        let path = std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from);
        Self::load_from(path.as_deref())
    }

    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let config = builder
            .add_source(
                config::Environment::with_prefix("CONTROLLER")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to read controller configuration")?;

        config
            .try_deserialize()
            .context("Invalid controller configuration")
    }

    pub fn driver_config(&self) -> DriverConfig {
        DriverConfig {
            resync_period: Duration::from_secs(self.resync_period_secs.min(MAX_PERIOD_SECS)),
            poll_interval: Duration::from_millis(
                self.poll_interval_millis.clamp(1, MAX_PERIOD_SECS * 1000),
            ),
            error_fallback_period: self.error_fallback(),
            max_concurrent: self.max_concurrent_reconciles.max(1),
        }
    }

    pub fn error_fallback(&self) -> Duration {
        Duration::from_secs(self.error_fallback_secs.min(MAX_PERIOD_SECS))
    }
}
