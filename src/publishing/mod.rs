//! Scoped event router.
//!
//! Resolves the candidate subscriptions for an event from the directory,
//! applies the match predicate, and writes the event frame to every matching
//! connection held by this process. Connections that fail a write are purged
//! from the directory after the pass.
//!
//! Matching subscriptions owned by another process are counted and skipped:
//! each process delivers only to the connections it holds.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::domain::{Audience, DomainError, Event, SseFrame, SubscriberId, Subscription};
use crate::interfaces::{DirectoryError, SubscriptionDirectory};
use crate::registry::ConnectionRegistry;


/// Errors raised while publishing.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

/// Outcome of one publish pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryReport {
    pub event_id: String,
    /// Subscriptions returned by the directory for the event's audience.
    pub candidates: usize,
    /// Candidates passing the match predicate.
    pub matched: usize,
    /// Matches owned by another process, left untouched.
    pub remote: usize,
    pub delivered: usize,
    /// Subscribers whose write failed; each was removed from the directory.
    pub failed: Vec<SubscriberId>,
}

impl DeliveryReport {
    fn empty(event_id: &str) -> Self {
        Self {
            event_id: event_id.to_string(),
            candidates: 0,
            matched: 0,
            remote: 0,
            delivered: 0,
            failed: Vec::new(),
        }
    }
}

/// Routes events to local connections by audience.
pub struct EventRouter {
    directory: Arc<dyn SubscriptionDirectory>,
    registry: ConnectionRegistry,
    server_id: String,
    concurrency: usize,
}

impl EventRouter {
    pub fn new(
        directory: Arc<dyn SubscriptionDirectory>,
        registry: ConnectionRegistry,
        server_id: impl Into<String>,
        concurrency: usize,
    ) -> Self {
        Self {
            directory,
            registry,
            server_id: server_id.into(),
            concurrency: concurrency.max(1),
        }
    }

    /// Deliver an event to every matching local connection.
    #[tracing::instrument(
        name = "publish",
        skip_all,
        fields(event_id = %event.id(), event_type = %event.event_type(), scope = ?event.scope())
    )]
    pub async fn publish(&self, event: &Event) -> Result<DeliveryReport, PublishError> {
        let candidates = match event.audience() {
            Audience::Global => self.directory.find_all().await?,
            Audience::User(user) => {
                let candidates = self.directory.find_by_user_id(user).await?;
                if candidates.is_empty() {
                    warn!(user = %user, "No subscriptions found for user");
                    return Ok(DeliveryReport::empty(event.id()));
                }
                candidates
            }
        };

        let frame = event.to_frame()?;
        let report = self.deliver(event, candidates, frame).await;

        info!(
            candidates = report.candidates,
            matched = report.matched,
            remote = report.remote,
            delivered = report.delivered,
            failed = report.failed.len(),
            "Event published"
        );
        Ok(report)
    }

    async fn deliver(
        &self,
        event: &Event,
        candidates: Vec<Subscription>,
        frame: SseFrame,
    ) -> DeliveryReport {
        let candidate_count = candidates.len();
        let (local, remote): (Vec<Subscription>, Vec<Subscription>) = candidates
            .into_iter()
            .filter(|s| s.should_receive(event.event_type(), event.audience()))
            .partition(|s| s.server_id() == self.server_id);
        let matched_count = local.len() + remote.len();
        let matched: Vec<SubscriberId> = local.into_iter().map(|s| s.id().clone()).collect();

        let outcomes: Vec<(SubscriberId, bool)> = stream::iter(matched)
            .map(|id| {
                let frame = frame.clone();
                async move {
                    let sent = self.registry.send(&id, frame).await;
                    (id, sent)
                }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut delivered = 0;
        let mut failed = Vec::new();
        for (id, sent) in outcomes {
            if sent {
                delivered += 1;
            } else {
                failed.push(id);
            }
        }

        for id in &failed {
            self.purge(id).await;
        }

        DeliveryReport {
            event_id: event.id().to_string(),
            candidates: candidate_count,
            matched: matched_count,
            remote: remote.len(),
            delivered,
            failed,
        }
    }

    async fn purge(&self, id: &SubscriberId) {
        debug!(subscription = %id, "Purging subscription after failed delivery");
        if let Err(e) = self.directory.remove(id).await {
            warn!(subscription = %id, error = %e, "Failed to purge subscription");
        }
    }
}
