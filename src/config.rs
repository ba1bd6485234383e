//! Engine settings.
//!
//! Loaded from YAML files and environment variables. Settings tune engine
//! behavior; per-method caching behavior is declared in code through
//! [`CacheConfig`](crate::behavior::CacheConfig).

use serde::Deserialize;
use tracing::warn;

use crate::error::Result;

/// Default settings file name, looked up in the current directory.
pub const DEFAULT_CONFIG_FILE: &str = "veneer.yaml";
/// Environment variable naming a settings file.
pub const CONFIG_ENV_VAR: &str = "VENEER_CONFIG";
/// Prefix for settings environment variables.
pub const CONFIG_ENV_PREFIX: &str = "VENEER";
/// Environment variable for the log filter.
pub const LOG_ENV_VAR: &str = "VENEER_LOG";

/// Top-level settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub caching: CachingSettings,
    pub tracing: TracingSettings,
}

/// Caching engine settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CachingSettings {
    /// Apply `expire` durations to cached values. When off, durations are
    /// accepted but values never expire.
    pub honor_expiration: bool,
    /// Warn when a build supplies a configuration different from the one
    /// already embedded for its contract.
    pub warn_on_config_mismatch: bool,
}

impl Default for CachingSettings {
    fn default() -> Self {
        Self {
            honor_expiration: true,
            warn_on_config_mismatch: true,
        }
    }
}

/// Tracing engine settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TracingSettings {
    /// Emit a `trace`-level span around every traced call, in addition to
    /// the caller's hooks.
    pub log_calls: bool,
}

impl Settings {
    /// Load settings from file and environment.
    ///
    /// Sources, later overriding earlier:
    /// 1. `veneer.yaml` in the current directory (if it exists)
    /// 2. File given by `path` (if provided)
    /// 3. File named by `VENEER_CONFIG` (if set)
    /// 4. `VENEER_`-prefixed environment variables, `__` between levels
    ///    (`VENEER_CACHING__HONOR_EXPIRATION=false`)
    pub fn load(path: Option<&str>) -> Result<Self> {
        use ::config::{Config as ConfigLib, Environment, File, FileFormat};

        let mut builder = ConfigLib::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Some(settings_path) = path {
            builder = builder.add_source(File::new(settings_path, FileFormat::Yaml).required(true));
        }

        if let Ok(settings_path) = std::env::var(CONFIG_ENV_VAR) {
            builder =
                builder.add_source(File::new(&settings_path, FileFormat::Yaml).required(true));
        }

        let settings = builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Load settings, falling back to defaults on any error.
    pub fn load_or_default() -> Self {
        Self::load(None).unwrap_or_else(|e| {
            warn!(error = %e, "Failed to load veneer settings, using defaults");
            Self::default()
        })
    }
}
