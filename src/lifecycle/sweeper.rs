//! Periodic refresh and expiry jobs.
//!
//! Both jobs run on one background task. Failures are logged and the loop
//! carries on with the next tick.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};

use super::SubscriptionService;
use crate::config::LifecycleConfig;
use crate::interfaces::Result;

/// Floor applied to both intervals; a zero period is not schedulable.
const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Background task keeping the directory in step with local connections.
pub struct Sweeper {
    service: Arc<SubscriptionService>,
    refresh_interval: Duration,
    expiry_interval: Duration,
}

impl Sweeper {
    pub fn new(service: Arc<SubscriptionService>, config: &LifecycleConfig) -> Self {
        Self {
            service,
            refresh_interval: config.refresh_interval().max(MIN_INTERVAL),
            expiry_interval: config.expiry_interval().max(MIN_INTERVAL),
        }
    }

    /// Spawn the jobs as a background task.
    ///
    /// Returns a handle that can be used to abort the task.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut refresh = interval(self.refresh_interval);
            refresh.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut expiry = interval(self.expiry_interval);
            expiry.set_missed_tick_behavior(MissedTickBehavior::Skip);

            // Both intervals fire immediately; skip that first tick.
            refresh.tick().await;
            expiry.tick().await;

            loop {
                tokio::select! {
                    _ = refresh.tick() => {
                        if let Err(e) = self.run_refresh_once().await {
                            warn!(error = %e, "Subscription refresh failed");
                        }
                    }
                    _ = expiry.tick() => {
                        match self.run_expiry_once().await {
                            Ok(removed) if removed > 0 => {
                                info!(removed, "Expiry sweep removed stale subscriptions");
                            }
                            Ok(_) => {}
                            Err(e) => warn!(error = %e, "Expiry sweep failed"),
                        }
                    }
                }
            }
        })
    }

    /// Run the refresh job once.
    pub async fn run_refresh_once(&self) -> Result<usize> {
        self.service.refresh_live().await
    }

    /// Run the expiry job once.
    pub async fn run_expiry_once(&self) -> Result<usize> {
        self.service.sweep_expired().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConnectionLimits;
    use crate::domain::SubscriberId;
    use crate::interfaces::SubscriptionDirectory;
    use crate::registry::ConnectionRegistry;
    use crate::test_utils::{make_subscription, MockDirectory, TEST_SERVER_ID};

    fn sweeper_with(
        directory: Arc<MockDirectory>,
        registry: ConnectionRegistry,
        config: &LifecycleConfig,
    ) -> Sweeper {
        let service = Arc::new(SubscriptionService::new(
            directory,
            registry,
            TEST_SERVER_ID,
            config.staleness_threshold(),
        ));
        Sweeper::new(service, config)
    }

    #[tokio::test]
    async fn test_sweeper_run_once() {
        let directory = Arc::new(MockDirectory::new());
        let registry = ConnectionRegistry::new(ConnectionLimits::default());
        let sweeper = sweeper_with(directory.clone(), registry, &LifecycleConfig::default());

        let stale = make_subscription("u1", &[])
            .refreshed_at(chrono::Utc::now() - chrono::Duration::minutes(10));
        directory.save(&stale).await.unwrap();

        assert_eq!(sweeper.run_refresh_once().await.unwrap(), 0);
        assert_eq!(sweeper.run_expiry_once().await.unwrap(), 1);
        assert_eq!(directory.count().await.unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_keeps_running_after_errors() {
        let directory = Arc::new(MockDirectory::new());
        directory.set_fail_on_remove(true).await;
        directory.set_fail_on_save(true).await;
        directory.set_fail_on_find(true).await;
        let registry = ConnectionRegistry::new(ConnectionLimits::default());
        let _live = registry.register(SubscriberId::parse("s1").unwrap()).await;

        let config = LifecycleConfig {
            refresh_interval_secs: 1,
            expiry_interval_secs: 1,
            staleness_threshold_secs: 120,
        };
        let handle = sweeper_with(directory, registry, &config).spawn();

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(!handle.is_finished());

        handle.abort();
        let result = tokio::time::timeout(Duration::from_secs(1), handle).await;
        assert!(result.is_ok());
    }
}
