//! Subscription lifecycle timing.

use std::time::Duration;

use serde::Deserialize;

/// Timing for the periodic refresh and expiry sweeps.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// How often live subscriptions are re-stamped.
    pub refresh_interval_secs: u64,
    /// How often stale subscriptions are evicted.
    pub expiry_interval_secs: u64,
    /// A subscription not refreshed for this long is stale.
    pub staleness_threshold_secs: u64,
}

impl LifecycleConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn expiry_interval(&self) -> Duration {
        Duration::from_secs(self.expiry_interval_secs)
    }

    pub fn staleness_threshold(&self) -> Duration {
        Duration::from_secs(self.staleness_threshold_secs)
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: 60,
            expiry_interval_secs: 120,
            staleness_threshold_secs: 120,
        }
    }
}
