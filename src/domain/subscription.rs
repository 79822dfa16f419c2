//! Subscription aggregate.

use std::collections::BTreeSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Audience, EventType, SubscriberId, UserId};

/// Client descriptor recorded when the caller supplies none.
pub const UNKNOWN_CLIENT: &str = "Unknown";

/// One client's standing request for events.
///
/// An empty filter set matches every event type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    subscription_id: SubscriberId,
    user_id: UserId,
    client_info: String,
    subscribed_event_types: BTreeSet<EventType>,
    created_at: DateTime<Utc>,
    last_heartbeat: DateTime<Utc>,
    server_id: String,
}

impl Subscription {
    /// Create a new subscription with a generated id.
    pub fn create(
        user_id: UserId,
        client_info: Option<&str>,
        event_types: impl IntoIterator<Item = EventType>,
        server_id: impl Into<String>,
    ) -> Self {
        Self::with_id(
            SubscriberId::generate(),
            user_id,
            client_info,
            event_types,
            server_id,
        )
    }

    /// Create a subscription with an externally supplied id.
    pub fn with_id(
        subscription_id: SubscriberId,
        user_id: UserId,
        client_info: Option<&str>,
        event_types: impl IntoIterator<Item = EventType>,
        server_id: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            subscription_id,
            user_id,
            client_info: client_info.unwrap_or(UNKNOWN_CLIENT).to_string(),
            subscribed_event_types: event_types.into_iter().collect(),
            created_at: now,
            last_heartbeat: now,
            server_id: server_id.into(),
        }
    }

    pub fn id(&self) -> &SubscriberId {
        &self.subscription_id
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn client_info(&self) -> &str {
        &self.client_info
    }

    pub fn event_types(&self) -> &BTreeSet<EventType> {
        &self.subscribed_event_types
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_refresh(&self) -> DateTime<Utc> {
        self.last_heartbeat
    }

    pub fn server_id(&self) -> &str {
        &self.server_id
    }

    pub fn accepts_type(&self, event_type: EventType) -> bool {
        self.subscribed_event_types.is_empty() || self.subscribed_event_types.contains(&event_type)
    }

    /// Match predicate used by every delivery path.
    pub fn should_receive(&self, event_type: EventType, audience: &Audience) -> bool {
        if !self.accepts_type(event_type) {
            return false;
        }
        match audience {
            Audience::Global => true,
            Audience::User(target) => &self.user_id == target,
        }
    }

    /// Stamp the refresh time with now.
    pub fn refresh(&mut self) {
        self.refresh_at(Utc::now());
    }

    pub fn refresh_at(&mut self, at: DateTime<Utc>) {
        self.last_heartbeat = at;
    }

    /// Stamp the refresh time with an explicit instant.
    pub fn refreshed_at(mut self, at: DateTime<Utc>) -> Self {
        self.refresh_at(at);
        self
    }

    /// True when the last refresh is older than `threshold` at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>, threshold: Duration) -> bool {
        match chrono::Duration::from_std(threshold) {
            Ok(threshold) => self.last_heartbeat + threshold < now,
            Err(_) => false,
        }
    }
}
