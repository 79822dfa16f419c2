//! Connection and publishing limits.

use std::time::Duration;

use serde::Deserialize;

/// Default maximum lifetime of one connection (30 minutes).
pub const DEFAULT_MAX_LIFETIME_SECS: u64 = 30 * 60;

/// Default per-connection outbound frame buffer.
pub const DEFAULT_CONNECTION_BUFFER: usize = 64;

/// Default bound on a single frame write.
pub const DEFAULT_WRITE_TIMEOUT_MS: u64 = 5_000;

/// Default number of concurrent deliveries per publish.
pub const DEFAULT_PUBLISH_CONCURRENCY: usize = 64;

/// Default size of the recent-event ring.
pub const DEFAULT_RECENT_EVENTS: usize = 100;

/// Limits applied by the connection registry.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConnectionLimits {
    /// Connections are closed once this old, whatever their activity.
    pub max_lifetime_secs: u64,
    /// Frames queued per connection before writes start waiting.
    pub buffer: usize,
    /// A write not accepted within this bound counts as a transport failure.
    pub write_timeout_ms: u64,
}

impl ConnectionLimits {
    pub fn max_lifetime(&self) -> Duration {
        Duration::from_secs(self.max_lifetime_secs)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

impl Default for ConnectionLimits {
    fn default() -> Self {
        Self {
            max_lifetime_secs: DEFAULT_MAX_LIFETIME_SECS,
            buffer: DEFAULT_CONNECTION_BUFFER,
            write_timeout_ms: DEFAULT_WRITE_TIMEOUT_MS,
        }
    }
}

/// Limits applied by the publishing router and facade.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PublishLimits {
    /// Deliveries in flight at once during one publish pass.
    pub concurrency: usize,
    /// Recently published events kept for inspection. Zero disables the ring.
    pub recent_events: usize,
}

impl Default for PublishLimits {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_PUBLISH_CONCURRENCY,
            recent_events: DEFAULT_RECENT_EVENTS,
        }
    }
}
