//! In-process subscription directory.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::domain::{SubscriberId, Subscription, UserId};
use crate::interfaces::{Result, SubscriptionDirectory};

/// Directory backed by a map in this process.
///
/// Suitable for single-instance deployments and development. Applies no TTL
/// of its own; stale records are removed by the expiry sweep.
#[derive(Default)]
pub struct LocalDirectory {
    subscriptions: RwLock<HashMap<SubscriberId, Subscription>>,
}

impl LocalDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SubscriptionDirectory for LocalDirectory {
    async fn save(&self, subscription: &Subscription) -> Result<()> {
        self.subscriptions
            .write()
            .await
            .insert(subscription.id().clone(), subscription.clone());
        debug!(
            subscription = %subscription.id(),
            user = %subscription.user_id(),
            "Saved subscription"
        );
        Ok(())
    }

    async fn touch(&self, id: &SubscriberId, at: DateTime<Utc>) -> Result<bool> {
        match self.subscriptions.write().await.get_mut(id) {
            Some(subscription) => {
                subscription.refresh_at(at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn find_by_id(&self, id: &SubscriberId) -> Result<Option<Subscription>> {
        Ok(self.subscriptions.read().await.get(id).cloned())
    }

    async fn find_by_user_id(&self, user_id: &UserId) -> Result<Vec<Subscription>> {
        let store = self.subscriptions.read().await;
        Ok(store
            .values()
            .filter(|s| s.user_id() == user_id)
            .cloned()
            .collect())
    }

    async fn find_by_server_id(&self, server_id: &str) -> Result<Vec<Subscription>> {
        let store = self.subscriptions.read().await;
        Ok(store
            .values()
            .filter(|s| s.server_id() == server_id)
            .cloned()
            .collect())
    }

    async fn find_all(&self) -> Result<Vec<Subscription>> {
        Ok(self.subscriptions.read().await.values().cloned().collect())
    }

    async fn remove(&self, id: &SubscriberId) -> Result<()> {
        if self.subscriptions.write().await.remove(id).is_some() {
            debug!(subscription = %id, "Removed subscription");
        }
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.subscriptions.read().await.len())
    }

    async fn remove_expired(&self, threshold: Duration) -> Result<usize> {
        let now = Utc::now();
        let mut store = self.subscriptions.write().await;
        let before = store.len();
        store.retain(|_, s| !s.is_expired(now, threshold));
        let removed = before - store.len();

        if removed > 0 {
            info!(removed, "Removed expired subscriptions");
        }
        Ok(removed)
    }

    fn backend(&self) -> &'static str {
        "local"
    }
}
