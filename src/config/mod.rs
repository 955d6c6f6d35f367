//! Configuration management for the document mirror.
//!
//! Provides hierarchical configuration loading and validation with:
//! - Default values as code base
//! - Configuration file support
//! - Environment variable overrides
//! - Component-wise validation
mod cache;
mod monitoring;
pub use cache::*;
pub use monitoring::*;


use std::env;
use std::path::PathBuf;

use config::Config;
use config::ConfigError;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Prefix for environment overrides, e.g. `DOC_MIRROR__CACHE__MODE=live`
pub(crate) const ENV_PREFIX: &str = "DOC_MIRROR";

/// Main configuration container
///
/// Merged from, in increasing priority:
/// 1. Default values from code implementation
/// 2. Configuration file specified by `CONFIG_PATH`
/// 3. Environment variables
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Settings {
    /// Synchronization strategy and timing
    #[serde(default)]
    pub cache: CacheConfig,

    /// Metrics exporter settings
    #[serde(default)]
    pub monitoring: MonitoringConfig,

    /// Directory the binary writes its log file into
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            monitoring: MonitoringConfig::default(),
            log_dir: default_log_dir(),
        }
    }
}

impl Settings {
    /// Loads configuration from hierarchical sources without validation.
    ///
    /// Callers MUST call `validate()` once all overrides are applied.
    ///
    /// # Examples
    /// ```ignore
    /// std::env::set_var("DOC_MIRROR__CACHE__MODE", "live");
    /// let settings = Settings::new()?.validate()?;
    /// ```
    pub fn new() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Ok(config_path) = env::var("CONFIG_PATH") {
            builder = builder.add_source(File::with_name(&config_path).required(true));
        }

        builder = builder.add_source(env_source());

        let settings: Self = builder.build()?.try_deserialize()?;
        Ok(settings)
    }

    /// Applies additional overrides from file, then re-applies the
    /// environment so it keeps the highest priority.
    pub fn with_override_config(
        &self,
        path: &str,
    ) -> Result<Self> {
        let settings: Self = Config::builder()
            .add_source(Config::try_from(self)?)
            .add_source(File::with_name(path))
            .add_source(env_source())
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }

    /// Consumes self and validates every section.
    pub fn validate(self) -> Result<Self> {
        self.cache.validate()?;
        self.monitoring.validate()?;
        if self.log_dir.as_os_str().is_empty() {
            return Err(Error::Config(ConfigError::Message(
                "log_dir path cannot be empty".into(),
            )));
        }
        Ok(self)
    }
}

fn env_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .ignore_empty(true)
        .try_parsing(true)
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("./logs")
}
