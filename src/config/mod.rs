//! Application configuration.
//!
//! Aggregates configuration from all modules into a single Config struct
//! that can be loaded from YAML files or environment variables.

mod directory;
mod lifecycle;
mod limits;
mod server;

pub use directory::{DirectoryConfig, DirectoryType, RedisConfig, DEFAULT_RECORD_TTL_SECS};
pub use lifecycle::LifecycleConfig;
pub use limits::{
    ConnectionLimits, PublishLimits, DEFAULT_CONNECTION_BUFFER, DEFAULT_MAX_LIFETIME_SECS,
    DEFAULT_PUBLISH_CONCURRENCY, DEFAULT_RECENT_EVENTS, DEFAULT_WRITE_TIMEOUT_MS,
};
pub use server::ServerConfig;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";
/// Environment variable for configuration file path.
pub const CONFIG_ENV_VAR: &str = "SSE_FANOUT_CONFIG";
/// Prefix for configuration environment variables.
pub const CONFIG_ENV_PREFIX: &str = "SSE_FANOUT";
/// Environment variable for logging configuration.
pub const LOG_ENV_VAR: &str = "SSE_FANOUT_LOG";

use serde::Deserialize;

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server identity.
    pub server: ServerConfig,
    /// Subscription directory backend.
    pub directory: DirectoryConfig,
    /// Connection registry limits.
    pub connections: ConnectionLimits,
    /// Refresh and expiry sweep timing.
    pub lifecycle: LifecycleConfig,
    /// Publishing limits.
    pub publishing: PublishLimits,
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// Configuration sources (in order of priority, later overrides earlier):
    /// 1. `config.yaml` in current directory (if exists)
    /// 2. File specified by `path` argument (if provided)
    /// 3. File specified by `CONFIG_ENV_VAR` environment variable (if set)
    /// 4. Environment variables with `CONFIG_ENV_PREFIX` prefix,
    ///    e.g. `SSE_FANOUT__DIRECTORY__TYPE=redis`
    pub fn load(path: Option<&str>) -> Result<Self, ::config::ConfigError> {
        use ::config::{Config as ConfigLib, Environment, File, FileFormat};

        let mut builder = ConfigLib::builder()
            .add_source(File::new("config", FileFormat::Yaml).required(false))
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Some(config_path) = path {
            builder = builder.add_source(File::new(config_path, FileFormat::Yaml).required(true));
        }

        if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&config_path, FileFormat::Yaml).required(true));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Create config for testing.
    pub fn for_test() -> Self {
        Self::default()
    }
}
