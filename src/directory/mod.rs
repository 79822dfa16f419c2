//! Subscription directory implementations.
//!
//! Exactly one backend is active per process, selected by configuration:
//! - `local`: in-process map
//! - `redis`: shared store with the multi-process key layout (feature `redis`)

use std::sync::Arc;

use tracing::info;

use crate::config::{DirectoryConfig, DirectoryType};
use crate::interfaces::{Result, SubscriptionDirectory};

pub mod keys;
pub mod local;

#[cfg(feature = "redis")]
pub mod redis;

pub use local::LocalDirectory;

#[cfg(feature = "redis")]
pub use self::redis::RedisDirectory;

/// Initialize the directory backend named by configuration.
pub async fn init_directory(config: &DirectoryConfig) -> Result<Arc<dyn SubscriptionDirectory>> {
    info!(backend = ?config.directory_type, "Initializing subscription directory");

    match config.directory_type {
        DirectoryType::Local => Ok(Arc::new(LocalDirectory::new())),
        #[cfg(feature = "redis")]
        DirectoryType::Redis => {
            let directory = RedisDirectory::connect(&config.redis).await?;
            Ok(Arc::new(directory))
        }
        #[cfg(not(feature = "redis"))]
        DirectoryType::Redis => {
            tracing::error!("Redis directory requested but 'redis' feature is not enabled");
            Err(crate::interfaces::DirectoryError::Config(
                "shared directory support is not compiled in".to_string(),
            ))
        }
    }
}
