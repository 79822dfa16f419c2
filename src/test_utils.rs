//! Test utilities and mock implementations.
//!
//! This module provides a mock subscription directory that can be told to
//! fail, plus builders for common test values.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::directory::LocalDirectory;
use crate::domain::{EventContent, EventType, Severity, SubscriberId, Subscription, UserId};
use crate::interfaces::{DirectoryError, Result, SubscriptionDirectory};

/// Server id used by test fixtures.
pub const TEST_SERVER_ID: &str = "test-host:8080";

/// Mock directory backed by an in-memory map.
///
/// Records every `remove` call so tests can assert purge behavior.
#[derive(Default)]
pub struct MockDirectory {
    inner: LocalDirectory,
    fail_on_save: RwLock<bool>,
    fail_on_find: RwLock<bool>,
    fail_on_remove: RwLock<bool>,
    remove_before_touch: RwLock<bool>,
    removals: RwLock<HashMap<SubscriberId, usize>>,
}

impl MockDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_fail_on_save(&self, fail: bool) {
        *self.fail_on_save.write().await = fail;
    }

    pub async fn set_fail_on_find(&self, fail: bool) {
        *self.fail_on_find.write().await = fail;
    }

    pub async fn set_fail_on_remove(&self, fail: bool) {
        *self.fail_on_remove.write().await = fail;
    }

    /// Drop the record at the start of every `touch`, as a concurrent
    /// unsubscribe or peer sweep would.
    pub async fn set_remove_before_touch(&self, enabled: bool) {
        *self.remove_before_touch.write().await = enabled;
    }

    /// Number of `remove` calls seen for `id`, successful or not.
    pub async fn removal_count(&self, id: &SubscriberId) -> usize {
        self.removals.read().await.get(id).copied().unwrap_or(0)
    }

    async fn check(&self, flag: &RwLock<bool>) -> Result<()> {
        if *flag.read().await {
            return Err(unavailable());
        }
        Ok(())
    }
}

/// Error returned by a failing mock.
pub fn unavailable() -> DirectoryError {
    DirectoryError::Unavailable(Box::new(std::io::Error::new(
        std::io::ErrorKind::ConnectionRefused,
        "mock directory failure",
    )))
}

#[async_trait]
impl SubscriptionDirectory for MockDirectory {
    async fn save(&self, subscription: &Subscription) -> Result<()> {
        self.check(&self.fail_on_save).await?;
        self.inner.save(subscription).await
    }

    async fn touch(&self, id: &SubscriberId, at: DateTime<Utc>) -> Result<bool> {
        self.check(&self.fail_on_save).await?;
        if *self.remove_before_touch.read().await {
            self.inner.remove(id).await?;
        }
        self.inner.touch(id, at).await
    }

    async fn find_by_id(&self, id: &SubscriberId) -> Result<Option<Subscription>> {
        self.check(&self.fail_on_find).await?;
        self.inner.find_by_id(id).await
    }

    async fn find_by_user_id(&self, user_id: &UserId) -> Result<Vec<Subscription>> {
        self.check(&self.fail_on_find).await?;
        self.inner.find_by_user_id(user_id).await
    }

    async fn find_by_server_id(&self, server_id: &str) -> Result<Vec<Subscription>> {
        self.check(&self.fail_on_find).await?;
        self.inner.find_by_server_id(server_id).await
    }

    async fn find_all(&self) -> Result<Vec<Subscription>> {
        self.check(&self.fail_on_find).await?;
        self.inner.find_all().await
    }

    async fn remove(&self, id: &SubscriberId) -> Result<()> {
        *self.removals.write().await.entry(id.clone()).or_default() += 1;
        self.check(&self.fail_on_remove).await?;
        self.inner.remove(id).await
    }

    async fn count(&self) -> Result<usize> {
        self.check(&self.fail_on_find).await?;
        self.inner.count().await
    }

    async fn remove_expired(&self, threshold: Duration) -> Result<usize> {
        self.check(&self.fail_on_remove).await?;
        self.inner.remove_expired(threshold).await
    }

    fn backend(&self) -> &'static str {
        "mock"
    }
}

/// Parse a user id, panicking on blank input.
pub fn user(raw: &str) -> UserId {
    UserId::parse(raw).unwrap()
}

/// Build a subscription owned by [`TEST_SERVER_ID`].
pub fn make_subscription(user_id: &str, types: &[EventType]) -> Subscription {
    Subscription::create(user(user_id), None, types.iter().copied(), TEST_SERVER_ID)
}

/// Build event content with fixed title and message.
pub fn make_content(event_type: EventType) -> EventContent {
    EventContent::new(event_type, "T", "M", Severity::Info)
}
