//! Scoped events and their wire payload.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{DomainError, SseFrame, UserId};

/// Timestamp layout of the client-facing payload.
const WIRE_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Kind of event, used for subscription filtering and as the SSE event name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    Notification,
    SystemUpdate,
    UserAction,
    Metrics,
    Alert,
}

impl EventType {
    pub const ALL: [EventType; 5] = [
        EventType::Notification,
        EventType::SystemUpdate,
        EventType::UserAction,
        EventType::Metrics,
        EventType::Alert,
    ];

    /// Upper-case name as shown in payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Notification => "NOTIFICATION",
            EventType::SystemUpdate => "SYSTEM_UPDATE",
            EventType::UserAction => "USER_ACTION",
            EventType::Metrics => "METRICS",
            EventType::Alert => "ALERT",
        }
    }

    /// SSE event name: the lowercased type name.
    pub fn event_name(&self) -> String {
        self.as_str().to_ascii_lowercase()
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        EventType::ALL
            .into_iter()
            .find(|t| t.as_str() == upper)
            .ok_or_else(|| DomainError::UnknownEventType(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    #[default]
    Info,
    Success,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Success => "SUCCESS",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
        }
    }
}

impl FromStr for Severity {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "INFO" => Ok(Severity::Info),
            "SUCCESS" => Ok(Severity::Success),
            "WARNING" => Ok(Severity::Warning),
            "ERROR" => Ok(Severity::Error),
            _ => Err(DomainError::UnknownSeverity(s.to_string())),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Distribution scope discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventScope {
    Global,
    UserSpecific,
}

/// Who an event is addressed to.
///
/// Carries the target user only for user-specific events, so a scope/target
/// mismatch cannot exist once an [`Event`] is built.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Audience {
    Global,
    User(UserId),
}

impl Audience {
    pub fn scope(&self) -> EventScope {
        match self {
            Audience::Global => EventScope::Global,
            Audience::User(_) => EventScope::UserSpecific,
        }
    }

    pub fn target(&self) -> Option<&UserId> {
        match self {
            Audience::Global => None,
            Audience::User(user) => Some(user),
        }
    }
}

/// Client-visible content of an event.
#[derive(Debug, Clone, PartialEq)]
pub struct EventContent {
    pub event_type: EventType,
    pub title: String,
    pub message: String,
    pub severity: Severity,
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl EventContent {
    pub fn new(
        event_type: EventType,
        title: impl Into<String>,
        message: impl Into<String>,
        severity: Severity,
    ) -> Self {
        Self {
            event_type,
            title: title.into(),
            message: message.into(),
            severity,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// An immutable event ready for routing.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    id: String,
    content: EventContent,
    timestamp: DateTime<Utc>,
    audience: Audience,
}

impl Event {
    /// Build an event from an explicit scope and optional target.
    ///
    /// Fails unless the target is present exactly when the scope is
    /// user-specific.
    pub fn new(
        content: EventContent,
        scope: EventScope,
        target: Option<UserId>,
    ) -> Result<Self, DomainError> {
        let audience = match (scope, target) {
            (EventScope::Global, None) => Audience::Global,
            (EventScope::UserSpecific, Some(user)) => Audience::User(user),
            (EventScope::Global, Some(_)) => return Err(DomainError::UnexpectedTarget),
            (EventScope::UserSpecific, None) => return Err(DomainError::MissingTarget),
        };
        Ok(Self::with_audience(content, audience))
    }

    pub fn global(content: EventContent) -> Self {
        Self::with_audience(content, Audience::Global)
    }

    pub fn for_user(user: UserId, content: EventContent) -> Self {
        Self::with_audience(content, Audience::User(user))
    }

    fn with_audience(content: EventContent, audience: Audience) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            content,
            timestamp: Utc::now(),
            audience,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn event_type(&self) -> EventType {
        self.content.event_type
    }

    pub fn title(&self) -> &str {
        &self.content.title
    }

    pub fn message(&self) -> &str {
        &self.content.message
    }

    pub fn severity(&self) -> Severity {
        self.content.severity
    }

    pub fn metadata(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.content.metadata
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn audience(&self) -> &Audience {
        &self.audience
    }

    pub fn scope(&self) -> EventScope {
        self.audience.scope()
    }

    pub fn target_user(&self) -> Option<&UserId> {
        self.audience.target()
    }

    /// Flat client payload. Routing fields are not part of it.
    pub fn payload(&self) -> EventPayload<'_> {
        EventPayload {
            id: &self.id,
            event_type: self.content.event_type,
            title: &self.content.title,
            message: &self.content.message,
            timestamp: self.timestamp.format(WIRE_TIMESTAMP_FORMAT).to_string(),
            severity: self.content.severity,
            metadata: &self.content.metadata,
        }
    }

    /// Render the SSE frame delivered to each matching connection.
    pub fn to_frame(&self) -> Result<SseFrame, DomainError> {
        let data = serde_json::to_string(&self.payload())?;
        Ok(SseFrame::new(data)
            .with_id(self.id.clone())
            .with_event(self.content.event_type.event_name()))
    }
}

/// JSON body of a delivered frame.
#[derive(Debug, Serialize)]
pub struct EventPayload<'a> {
    pub id: &'a str,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub title: &'a str,
    pub message: &'a str,
    pub timestamp: String,
    pub severity: Severity,
    pub metadata: &'a BTreeMap<String, serde_json::Value>,
}
