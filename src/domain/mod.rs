//! Domain types shared by every component.
//!
//! - Identity value objects (`SubscriberId`, `UserId`)
//! - The `Subscription` aggregate and its match predicate
//! - Scoped `Event`s and the flat client payload
//! - `SseFrame`, the unit handed to the transport layer

mod event;
mod frame;
mod ids;
mod subscription;

pub use event::{Audience, Event, EventContent, EventPayload, EventScope, EventType, Severity};
pub use frame::SseFrame;
pub use ids::{SubscriberId, UserId, ANONYMOUS_USER};
pub use subscription::{Subscription, UNKNOWN_CLIENT};

/// Validation failures raised while constructing domain values.
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("Subscriber id must not be blank")]
    BlankSubscriberId,

    #[error("User id must not be blank")]
    BlankUserId,

    #[error("Unknown event type: {0}")]
    UnknownEventType(String),

    #[error("Unknown severity: {0}")]
    UnknownSeverity(String),

    #[error("User-specific event requires a target user")]
    MissingTarget,

    #[error("Global event must not carry a target user")]
    UnexpectedTarget,

    #[error("Failed to encode event payload: {0}")]
    Encode(#[from] serde_json::Error),
}
