//! Entry point for embedding processes.
//!
//! `EventHub` wires the directory, connection registry, lifecycle service and
//! router together and exposes the operations a transport or admin layer
//! calls. It delegates every directory and registry access to the service or
//! the router.
//!
//! # Example
//!
//! ```ignore
//! use sse_fanout::{Config, EventHub, EventType};
//!
//! let hub = EventHub::from_config(&Config::load(None)?).await?;
//! let _sweeper = hub.start_sweeper();
//!
//! let handle = hub.subscribe(Some("alice"), Some("browser"), [EventType::Alert]).await?;
//! hub.broadcast_global(EventType::Alert, "Disk", "Disk almost full", None).await?;
//! ```

use std::collections::VecDeque;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::{Config, LifecycleConfig};
use crate::directory::init_directory;
use crate::domain::{
    DomainError, Event, EventContent, EventType, Severity, SubscriberId, Subscription, UserId,
};
use crate::interfaces::{DirectoryError, SubscriptionDirectory};
use crate::lifecycle::{SubscriptionService, Sweeper};
use crate::publishing::{DeliveryReport, EventRouter, PublishError};
use crate::registry::{ConnectionHandle, ConnectionRegistry};
use crate::utils::bootstrap::resolve_server_id;

/// Errors surfaced to callers of the hub.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Directory(#[from] DirectoryError),

    #[error("A target user is required for user-specific events")]
    MissingTargetUser,
}

impl HubError {
    /// Whether retrying the same call later may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            HubError::Directory(e) => e.is_retryable(),
            _ => false,
        }
    }
}

impl From<PublishError> for HubError {
    fn from(err: PublishError) -> Self {
        match err {
            PublishError::Domain(e) => HubError::Domain(e),
            PublishError::Directory(e) => HubError::Directory(e),
        }
    }
}

/// Result type for hub operations.
pub type Result<T> = std::result::Result<T, HubError>;

/// Administrative snapshot.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HubStats {
    pub server_id: String,
    pub backend: &'static str,
    pub active_subscriptions: usize,
    pub local_connections: usize,
    pub connection_ids: Vec<String>,
}

/// Subscription and publishing facade.
pub struct EventHub {
    service: Arc<SubscriptionService>,
    router: EventRouter,
    lifecycle: LifecycleConfig,
    recent: Mutex<VecDeque<Event>>,
    recent_capacity: usize,
}

impl EventHub {
    /// Build a hub around an existing directory.
    pub fn new(directory: Arc<dyn SubscriptionDirectory>, config: &Config) -> Self {
        let server_id = resolve_server_id(&config.server);
        let registry = ConnectionRegistry::new(config.connections.clone());
        let service = Arc::new(SubscriptionService::new(
            directory.clone(),
            registry.clone(),
            server_id.as_str(),
            config.lifecycle.staleness_threshold(),
        ));
        let router = EventRouter::new(
            directory.clone(),
            registry,
            server_id.as_str(),
            config.publishing.concurrency,
        );

        info!(
            server_id = %server_id,
            backend = directory.backend(),
            "Event hub initialized"
        );

        Self {
            service,
            router,
            lifecycle: config.lifecycle.clone(),
            recent: Mutex::new(VecDeque::with_capacity(config.publishing.recent_events)),
            recent_capacity: config.publishing.recent_events,
        }
    }

    /// Build a hub with the directory backend named by configuration.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let directory = init_directory(&config.directory).await?;
        Ok(Self::new(directory, config))
    }

    pub fn server_id(&self) -> &str {
        self.service.server_id()
    }

    /// Spawn the periodic refresh and expiry jobs.
    pub fn start_sweeper(&self) -> JoinHandle<()> {
        Sweeper::new(self.service.clone(), &self.lifecycle).spawn()
    }

    /// Open a subscription. Absent or blank users subscribe anonymously.
    pub async fn subscribe(
        &self,
        user_id: Option<&str>,
        client_info: Option<&str>,
        event_types: impl IntoIterator<Item = EventType>,
    ) -> Result<ConnectionHandle> {
        let user = UserId::or_anonymous(user_id);
        Ok(self.service.subscribe(user, client_info, event_types).await?)
    }

    pub async fn unsubscribe(&self, id: &SubscriberId) -> Result<()> {
        Ok(self.service.unsubscribe(id).await?)
    }

    pub async fn find(&self, id: &SubscriberId) -> Result<Option<Subscription>> {
        Ok(self.service.find(id).await?)
    }

    /// Publish to every subscriber. Severity defaults to info.
    pub async fn broadcast_global(
        &self,
        event_type: EventType,
        title: &str,
        message: &str,
        severity: Option<Severity>,
    ) -> Result<DeliveryReport> {
        let content = EventContent::new(event_type, title, message, severity.unwrap_or_default());
        self.publish(Event::global(content)).await
    }

    /// Publish to one user's subscriptions. Severity defaults to info.
    pub async fn send_to_user(
        &self,
        user_id: &str,
        event_type: EventType,
        title: &str,
        message: &str,
        severity: Option<Severity>,
    ) -> Result<DeliveryReport> {
        let user = UserId::parse(user_id).map_err(|_| HubError::MissingTargetUser)?;
        let content = EventContent::new(event_type, title, message, severity.unwrap_or_default());
        self.publish(Event::for_user(user, content)).await
    }

    /// Route a prepared event and keep it in the recent list.
    pub async fn publish(&self, event: Event) -> Result<DeliveryReport> {
        let report = self.router.publish(&event).await?;
        self.remember(event).await;
        Ok(report)
    }

    async fn remember(&self, event: Event) {
        if self.recent_capacity == 0 {
            return;
        }
        let mut recent = self.recent.lock().await;
        while recent.len() >= self.recent_capacity {
            recent.pop_front();
        }
        recent.push_back(event);
    }

    /// Recently published events, oldest first.
    pub async fn recent_events(&self) -> Vec<Event> {
        self.recent.lock().await.iter().cloned().collect()
    }

    pub async fn active_count(&self) -> Result<usize> {
        Ok(self.service.active_subscription_count().await?)
    }

    /// Subscriptions held by one user. Absent or blank users have none.
    pub async fn user_subscription_count(&self, user_id: Option<&str>) -> Result<usize> {
        let Some(user) = user_id.and_then(|u| UserId::parse(u).ok()) else {
            return Ok(0);
        };
        Ok(self.service.user_subscription_count(&user).await?)
    }

    pub async fn stats(&self) -> Result<HubStats> {
        let connections = self.service.local_connections().await;
        Ok(HubStats {
            server_id: self.server_id().to_string(),
            backend: self.service.backend(),
            active_subscriptions: self.service.active_subscription_count().await?,
            local_connections: connections.total_connections,
            connection_ids: connections.connection_ids,
        })
    }

    /// Close every local connection and drop its directory record.
    pub async fn shutdown(&self) {
        let closed = self.service.shutdown_local().await;
        info!(closed, "Event hub shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::test_utils::{MockDirectory, TEST_SERVER_ID};

    fn config(recent_events: usize) -> Config {
        let mut config = Config::for_test();
        config.server = ServerConfig {
            server_id: Some(TEST_SERVER_ID.to_string()),
            ..Default::default()
        };
        config.publishing.recent_events = recent_events;
        config
    }

    fn hub() -> (EventHub, Arc<MockDirectory>) {
        let directory = Arc::new(MockDirectory::new());
        (EventHub::new(directory.clone(), &config(3)), directory)
    }

    #[tokio::test]
    async fn test_blank_user_subscribes_anonymously() {
        let (hub, _) = hub();

        let handle = hub.subscribe(Some("  "), None, []).await.unwrap();
        let stored = hub.find(handle.id()).await.unwrap().unwrap();

        assert!(stored.user_id().is_anonymous());
        assert_eq!(stored.client_info(), "Unknown");
        assert_eq!(stored.server_id(), TEST_SERVER_ID);
    }

    #[tokio::test]
    async fn test_send_to_blank_user_is_rejected() {
        let (hub, _) = hub();

        let err = hub
            .send_to_user("", EventType::Alert, "T", "M", None)
            .await
            .unwrap_err();

        assert!(matches!(err, HubError::MissingTargetUser));
        assert!(!err.is_retryable());
        assert!(hub.recent_events().await.is_empty());
    }

    #[tokio::test]
    async fn test_user_subscription_count_for_blank_user_is_zero() {
        let (hub, _) = hub();
        let _handle = hub.subscribe(None, None, []).await.unwrap();

        assert_eq!(hub.user_subscription_count(None).await.unwrap(), 0);
        assert_eq!(hub.user_subscription_count(Some("")).await.unwrap(), 0);
        assert_eq!(
            hub.user_subscription_count(Some("anonymous")).await.unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_severity_defaults_to_info() {
        let (hub, _) = hub();
        let mut handle = hub.subscribe(None, None, []).await.unwrap();
        handle.recv().await.unwrap();

        hub.broadcast_global(EventType::Notification, "T", "M", None)
            .await
            .unwrap();

        let frame = handle.recv().await.unwrap();
        let data: serde_json::Value = serde_json::from_str(&frame.data).unwrap();
        assert_eq!(data["severity"], "INFO");
    }

    #[tokio::test]
    async fn test_recent_events_are_bounded() {
        let (hub, _) = hub();

        for i in 0..5 {
            hub.broadcast_global(EventType::Metrics, &format!("t{i}"), "m", None)
                .await
                .unwrap();
        }

        let titles: Vec<String> = hub
            .recent_events()
            .await
            .iter()
            .map(|e| e.title().to_string())
            .collect();
        assert_eq!(titles, vec!["t2", "t3", "t4"]);
    }

    #[tokio::test]
    async fn test_recent_events_disabled() {
        let directory = Arc::new(MockDirectory::new());
        let hub = EventHub::new(directory, &config(0));

        hub.broadcast_global(EventType::Alert, "T", "M", None)
            .await
            .unwrap();

        assert!(hub.recent_events().await.is_empty());
    }

    #[tokio::test]
    async fn test_directory_failure_is_retryable() {
        let (hub, directory) = hub();
        directory.set_fail_on_find(true).await;

        let err = hub
            .broadcast_global(EventType::Alert, "T", "M", None)
            .await
            .unwrap_err();

        assert!(err.is_retryable());
        assert!(!err.to_string().contains("sse:"));
    }

    #[tokio::test]
    async fn test_stats_and_shutdown() {
        let (hub, directory) = hub();
        let _a = hub.subscribe(Some("u1"), None, []).await.unwrap();
        let _b = hub.subscribe(Some("u2"), None, []).await.unwrap();

        let stats = hub.stats().await.unwrap();
        assert_eq!(stats.active_subscriptions, 2);
        assert_eq!(stats.local_connections, 2);
        assert_eq!(stats.backend, "mock");

        hub.shutdown().await;

        let stats = hub.stats().await.unwrap();
        assert_eq!(stats.local_connections, 0);
        assert!(stats.connection_ids.is_empty());
        assert_eq!(directory.count().await.unwrap(), 0);
    }
}
