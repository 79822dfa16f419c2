//! Subscription directory interface.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{SubscriberId, Subscription, UserId};

/// Result type for directory operations.
pub type Result<T> = std::result::Result<T, DirectoryError>;

/// Errors that can occur during directory operations.
///
/// Messages are safe to surface to callers: they never name storage keys or
/// the backend in use. The underlying cause is kept as the error source.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("Subscription directory unavailable")]
    Unavailable(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Stored subscription could not be decoded")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid directory configuration: {0}")]
    Config(String),
}

impl DirectoryError {
    /// Whether retrying the same call later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DirectoryError::Unavailable(_))
    }
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for DirectoryError {
    fn from(err: redis::RedisError) -> Self {
        DirectoryError::Unavailable(Box::new(err))
    }
}

/// Interface for subscription metadata storage.
///
/// Index-style lookups (`find_by_user_id`, `find_by_server_id`, `find_all`)
/// silently skip index entries whose primary record no longer exists.
///
/// Implementations:
/// - `LocalDirectory`: in-process map, single instance deployments
/// - `RedisDirectory`: shared store for multi-instance deployments
#[async_trait]
pub trait SubscriptionDirectory: Send + Sync {
    /// Insert or overwrite a subscription record.
    async fn save(&self, subscription: &Subscription) -> Result<()>;

    /// Set the refresh time of an existing record to `at`.
    ///
    /// Never creates a record. Returns false when `id` has no record, including
    /// when it was removed concurrently.
    async fn touch(&self, id: &SubscriberId, at: DateTime<Utc>) -> Result<bool>;

    async fn find_by_id(&self, id: &SubscriberId) -> Result<Option<Subscription>>;

    async fn find_by_user_id(&self, user_id: &UserId) -> Result<Vec<Subscription>>;

    /// Subscriptions owned by one server process.
    async fn find_by_server_id(&self, server_id: &str) -> Result<Vec<Subscription>>;

    async fn find_all(&self) -> Result<Vec<Subscription>>;

    /// Remove a subscription. Removing a missing id is not an error.
    async fn remove(&self, id: &SubscriberId) -> Result<()>;

    async fn count(&self) -> Result<usize>;

    /// Remove every subscription whose last refresh is older than `threshold`.
    ///
    /// Returns the number of subscriptions removed.
    async fn remove_expired(&self, threshold: Duration) -> Result<usize>;

    /// Backend name, for logs only.
    fn backend(&self) -> &'static str;
}
