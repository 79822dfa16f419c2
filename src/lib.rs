//! sse-fanout - subscription lifecycle and scoped event fan-out
//!
//! Tracks which clients want which events, holds the live connection for each
//! client, and routes global or per-user events to the matching connections.
//! Subscription records can be shared between processes through Redis.

pub mod config;
pub mod directory;
pub mod domain;
pub mod facade;
pub mod interfaces;
pub mod lifecycle;
pub mod publishing;
pub mod registry;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod utils;

pub use config::Config;
pub use domain::{
    Event, EventContent, EventScope, EventType, Severity, SseFrame, SubscriberId, Subscription,
    UserId,
};
pub use facade::{EventHub, HubError, HubStats};
pub use interfaces::{DirectoryError, SubscriptionDirectory};
pub use publishing::DeliveryReport;
pub use registry::{ConnectionHandle, ConnectionRegistry};
