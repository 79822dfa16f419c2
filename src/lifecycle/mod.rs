//! Subscription lifecycle.
//!
//! Owns the pairing between a directory record and the local connection that
//! serves it: subscribe creates both, unsubscribe removes both, and the
//! periodic jobs keep the directory in step with the connections this
//! process still holds.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::domain::{EventType, SseFrame, SubscriberId, Subscription, UserId};
use crate::interfaces::{Result, SubscriptionDirectory};
use crate::registry::{ConnectionHandle, ConnectionRegistry, ConnectionStats};

mod sweeper;

pub use sweeper::Sweeper;

/// SSE event name of the welcome frame.
pub const WELCOME_EVENT: &str = "connection";
/// Message carried by the welcome frame.
pub const WELCOME_MESSAGE: &str = "Connected to SSE stream";

/// Creates, refreshes and retires subscriptions.
pub struct SubscriptionService {
    directory: Arc<dyn SubscriptionDirectory>,
    registry: ConnectionRegistry,
    server_id: String,
    staleness_threshold: Duration,
}

impl SubscriptionService {
    pub fn new(
        directory: Arc<dyn SubscriptionDirectory>,
        registry: ConnectionRegistry,
        server_id: impl Into<String>,
        staleness_threshold: Duration,
    ) -> Self {
        Self {
            directory,
            registry,
            server_id: server_id.into(),
            staleness_threshold,
        }
    }

    pub fn server_id(&self) -> &str {
        &self.server_id
    }

    /// Open a subscription and return the connection for the transport.
    ///
    /// The connection is released again if the record cannot be stored.
    pub async fn subscribe(
        &self,
        user_id: UserId,
        client_info: Option<&str>,
        event_types: impl IntoIterator<Item = EventType>,
    ) -> Result<ConnectionHandle> {
        let subscription =
            Subscription::create(user_id, client_info, event_types, self.server_id.as_str());
        let id = subscription.id().clone();

        let handle = self.registry.register(id.clone()).await;

        if let Err(e) = self.directory.save(&subscription).await {
            warn!(subscription = %id, error = %e, "Failed to store subscription");
            self.registry.remove(&id).await;
            return Err(e);
        }

        if !self.registry.send(&id, welcome_frame(&id)).await {
            warn!(subscription = %id, "Failed to send welcome frame");
        }

        info!(
            subscription = %id,
            user = %subscription.user_id(),
            event_types = ?subscription.event_types(),
            "Subscription created"
        );
        Ok(handle)
    }

    /// Remove a subscription and close its connection. Missing ids are ignored.
    pub async fn unsubscribe(&self, id: &SubscriberId) -> Result<()> {
        let removed = self.registry.remove(id).await;
        self.directory.remove(id).await?;
        info!(subscription = %id, connection_closed = removed, "Subscription removed");
        Ok(())
    }

    pub async fn find(&self, id: &SubscriberId) -> Result<Option<Subscription>> {
        self.directory.find_by_id(id).await
    }

    /// Subscriptions known to the directory, across all processes sharing it.
    pub async fn active_subscription_count(&self) -> Result<usize> {
        self.directory.count().await
    }

    pub async fn user_subscription_count(&self, user_id: &UserId) -> Result<usize> {
        Ok(self.directory.find_by_user_id(user_id).await?.len())
    }

    /// Re-stamp the subscriptions whose connection is live in this process.
    ///
    /// A live connection whose record is gone can no longer be found by the
    /// router, so it is closed and the client reconnects. Returns the number
    /// of records refreshed.
    pub async fn refresh_live(&self) -> Result<usize> {
        let now = Utc::now();
        let mut refreshed = 0;
        let mut closed = 0;
        for id in self.registry.ids().await {
            if self.directory.touch(&id, now).await? {
                refreshed += 1;
            } else if self.registry.remove(&id).await {
                warn!(subscription = %id, "Closed connection without subscription record");
                closed += 1;
            }
        }

        debug!(refreshed, closed, "Refreshed live subscriptions");
        Ok(refreshed)
    }

    /// Remove records not refreshed within the staleness threshold.
    pub async fn sweep_expired(&self) -> Result<usize> {
        self.directory.remove_expired(self.staleness_threshold).await
    }

    pub fn backend(&self) -> &'static str {
        self.directory.backend()
    }

    /// Connections held by this process.
    pub async fn local_connections(&self) -> ConnectionStats {
        self.registry.stats().await
    }

    /// Close every local connection and drop its directory record.
    ///
    /// Directory failures are logged; every connection is closed regardless.
    /// Returns the number of connections closed.
    pub async fn shutdown_local(&self) -> usize {
        let ids = self.registry.ids().await;
        for id in &ids {
            if let Err(e) = self.directory.remove(id).await {
                warn!(subscription = %id, error = %e, "Failed to remove subscription on shutdown");
            }
        }
        self.registry.remove_all().await;
        ids.len()
    }
}

/// First frame written to every new connection.
pub fn welcome_frame(id: &SubscriberId) -> SseFrame {
    let data = json!({
        "message": WELCOME_MESSAGE,
        "subscriptionId": id.as_str(),
    });
    SseFrame::new(data.to_string())
        .with_id(id.as_str())
        .with_event(WELCOME_EVENT)
}
