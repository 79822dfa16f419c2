//! Subscription directory configuration types.

use std::time::Duration;

use serde::Deserialize;

/// Default record TTL in the shared store: connection lifetime plus a 5 minute margin.
pub const DEFAULT_RECORD_TTL_SECS: u64 = 35 * 60;

/// Directory backend discriminator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DirectoryType {
    /// In-process map (single instance).
    #[default]
    Local,
    /// Redis shared between instances.
    Redis,
}

/// Directory configuration (discriminated union).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
    /// Backend discriminator.
    #[serde(rename = "type")]
    pub directory_type: DirectoryType,
    /// Redis-specific configuration.
    pub redis: RedisConfig,
}

/// Redis-specific configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    /// Redis connection URL.
    pub url: String,
    /// TTL applied to records and per-user/per-server index sets on every write.
    pub record_ttl_secs: u64,
    /// Upper bound on a single command round trip.
    pub response_timeout_ms: u64,
    /// Upper bound on establishing a connection.
    pub connection_timeout_ms: u64,
}

impl RedisConfig {
    pub fn record_ttl(&self) -> Duration {
        Duration::from_secs(self.record_ttl_secs)
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout_ms)
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            record_ttl_secs: DEFAULT_RECORD_TTL_SECS,
            response_timeout_ms: 2_000,
            connection_timeout_ms: 2_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_config_default() {
        let config = DirectoryConfig::default();
        assert_eq!(config.directory_type, DirectoryType::Local);
        assert_eq!(config.redis.url, "redis://localhost:6379");
        assert_eq!(config.redis.record_ttl(), Duration::from_secs(2100));
    }

    #[test]
    fn test_directory_config_from_yaml() {
        let yaml = r#"
type: redis
redis:
  url: redis://cache:6379
"#;
        let config: DirectoryConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.directory_type, DirectoryType::Redis);
        assert_eq!(config.redis.url, "redis://cache:6379");
        assert_eq!(config.redis.record_ttl_secs, DEFAULT_RECORD_TTL_SECS);
    }
}
