//! Configuration Loader
//!
//! Environment-aware loading on top of the `config` crate. Later sources
//! override earlier ones: defaults, base file, environment file, env vars.

use super::error::ConfigResult;
use super::TrackingConfig;
use ::config::{Config, Environment, File};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Base name of the configuration files inside the config directory
const CONFIG_BASENAME: &str = "tasker-tracking";

/// Prefix for environment variable overrides, e.g.
/// `TASKER_TRACKING__MESSAGING__RESULTS_QUEUE=results`
const ENV_PREFIX: &str = "TASKER_TRACKING";

/// Loaded, validated configuration plus the environment it was loaded for
#[derive(Debug)]
pub struct ConfigManager {
    config: TrackingConfig,
    environment: String,
    config_directory: PathBuf,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    /// Load configuration from a specific directory
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load configuration from a specific directory with explicit environment.
    /// Useful in tests that should not touch process-wide variables.
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let config_directory = config_dir.unwrap_or_else(|| PathBuf::from("config"));

        debug!(
            environment = environment,
            directory = %config_directory.display(),
            "Loading tracking configuration"
        );

        let config = Self::build(&config_directory, environment)?;
        config.validate()?;

        info!(
            environment = environment,
            transport = ?config.messaging.transport,
            results_queue = %config.messaging.results_queue,
            cache_backend = ?config.cache.backend,
            "Configuration loaded successfully"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        }))
    }

    fn build(config_directory: &Path, environment: &str) -> ConfigResult<TrackingConfig> {
        let base = config_directory.join(CONFIG_BASENAME);
        let env_specific = config_directory.join(format!("{CONFIG_BASENAME}.{environment}"));

        let settings = Config::builder()
            .add_source(Config::try_from(&TrackingConfig::default())?)
            .add_source(File::from(base).required(false))
            .add_source(File::from(env_specific).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("messaging.task_queues")
                    .with_list_parse_key("messaging.worker_queues")
                    .with_list_parse_key("circuit_breaker.expected_errors")
                    .try_parsing(true),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &TrackingConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    /// Current environment from `TASKER_ENV`, then `APP_ENV`, default `development`
    pub fn detect_environment() -> String {
        env::var("TASKER_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
    }
}
