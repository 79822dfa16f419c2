//! Registry of live connections held by this process.
//!
//! Each connection is a bounded channel: the registry keeps the sending half,
//! the transport layer owns the receiving half through a [`ConnectionHandle`].
//! A watcher task per connection removes the entry on any terminal event:
//! - lifetime elapsed (timeout)
//! - handle dropped or closed by the transport (completion)
//!
//! Write failures are discovered in [`ConnectionRegistry::send`], which removes
//! the entry as well. Connections are never persisted or shared between
//! processes.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::Stream;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot, RwLock};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::ConnectionLimits;
use crate::domain::{SseFrame, SubscriberId};


/// Registry-side state of one connection.
struct Connection {
    /// Distinguishes a re-registered id from the connection it replaced.
    generation: u64,
    sender: mpsc::Sender<SseFrame>,
    /// Dropping this stops the watcher, which releases the last sender.
    _shutdown: oneshot::Sender<()>,
}

/// Receiving half of a connection, held open by the transport layer.
///
/// Yields frames until the registry closes the connection. Dropping the
/// handle completes the connection and removes it from the registry.
pub struct ConnectionHandle {
    id: SubscriberId,
    receiver: mpsc::Receiver<SseFrame>,
    deadline: Instant,
}

impl ConnectionHandle {
    pub fn id(&self) -> &SubscriberId {
        &self.id
    }

    /// Instant at which the registry closes this connection.
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Next frame, or `None` once the connection is closed and drained.
    pub async fn recv(&mut self) -> Option<SseFrame> {
        self.receiver.recv().await
    }

    /// Next frame if one is already queued.
    pub fn try_recv(&mut self) -> Option<SseFrame> {
        self.receiver.try_recv().ok()
    }

    /// Complete the connection from the transport side.
    pub fn close(mut self) {
        self.receiver.close();
    }
}

impl Stream for ConnectionHandle {
    type Item = SseFrame;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<SseFrame>> {
        self.receiver.poll_recv(cx)
    }
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("id", &self.id)
            .field("deadline", &self.deadline)
            .finish()
    }
}

/// Snapshot of the registry for administrative endpoints.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStats {
    pub total_connections: usize,
    pub connection_ids: Vec<String>,
}

/// Table of live connections keyed by subscriber id.
///
/// Cheap to clone; clones share the same table.
#[derive(Clone)]
pub struct ConnectionRegistry {
    connections: Arc<RwLock<HashMap<SubscriberId, Connection>>>,
    limits: ConnectionLimits,
    next_generation: Arc<AtomicU64>,
}

impl ConnectionRegistry {
    pub fn new(limits: ConnectionLimits) -> Self {
        Self {
            connections: Arc::new(RwLock::new(HashMap::new())),
            limits,
            next_generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn limits(&self) -> &ConnectionLimits {
        &self.limits
    }

    /// Open a connection for `id` and return the transport's handle.
    ///
    /// An existing connection with the same id is replaced and closed.
    pub async fn register(&self, id: SubscriberId) -> ConnectionHandle {
        let (sender, receiver) = mpsc::channel(self.limits.buffer.max(1));
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let lifetime = self.limits.max_lifetime();
        let deadline = Instant::now() + lifetime;

        let watched = sender.clone();
        let total = {
            let mut connections = self.connections.write().await;
            let replaced = connections.insert(
                id.clone(),
                Connection {
                    generation,
                    sender,
                    _shutdown: shutdown_tx,
                },
            );
            if replaced.is_some() {
                warn!(subscription = %id, "Replaced existing connection");
            }
            connections.len()
        };

        let registry = self.clone();
        let watched_id = id.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => {
                    warn!(subscription = %watched_id, "Connection timed out");
                    drop(watched);
                    registry.remove_generation(&watched_id, generation).await;
                }
                _ = watched.closed() => {
                    debug!(subscription = %watched_id, "Connection completed");
                    drop(watched);
                    registry.remove_generation(&watched_id, generation).await;
                }
                _ = shutdown_rx => {}
            }
        });

        info!(subscription = %id, total, "Connection registered");

        ConnectionHandle {
            id,
            receiver,
            deadline,
        }
    }

    /// Write a frame to one connection.
    ///
    /// Returns false when no connection exists or the write fails. A failed
    /// write removes the connection.
    pub async fn send(&self, id: &SubscriberId, frame: SseFrame) -> bool {
        let (sender, generation) = {
            let connections = self.connections.read().await;
            match connections.get(id) {
                Some(conn) => (conn.sender.clone(), conn.generation),
                None => return false,
            }
        };

        match sender.send_timeout(frame, self.limits.write_timeout()).await {
            Ok(()) => true,
            Err(e) => {
                error!(subscription = %id, error = %e, "Failed to send to connection");
                drop(sender);
                self.remove_generation(id, generation).await;
                false
            }
        }
    }

    /// Close and remove a connection. Removing a missing id is a no-op.
    pub async fn remove(&self, id: &SubscriberId) -> bool {
        let (removed, total) = {
            let mut connections = self.connections.write().await;
            let removed = connections.remove(id);
            (removed, connections.len())
        };

        match removed {
            Some(_) => {
                info!(subscription = %id, total, "Connection removed");
                true
            }
            None => false,
        }
    }

    /// Remove `id` only if it still maps to the given connection generation.
    async fn remove_generation(&self, id: &SubscriberId, generation: u64) {
        let mut connections = self.connections.write().await;
        if connections.get(id).map(|c| c.generation) == Some(generation) {
            connections.remove(id);
            debug!(subscription = %id, total = connections.len(), "Connection released");
        }
    }

    pub async fn contains(&self, id: &SubscriberId) -> bool {
        self.connections.read().await.contains_key(id)
    }

    pub async fn count(&self) -> usize {
        self.connections.read().await.len()
    }

    pub async fn ids(&self) -> Vec<SubscriberId> {
        self.connections.read().await.keys().cloned().collect()
    }

    /// Close every connection.
    pub async fn remove_all(&self) {
        let drained: Vec<_> = self.connections.write().await.drain().collect();
        info!(count = drained.len(), "Removed all connections");
    }

    pub async fn stats(&self) -> ConnectionStats {
        let connections = self.connections.read().await;
        let mut connection_ids: Vec<String> =
            connections.keys().map(|id| id.to_string()).collect();
        connection_ids.sort();
        ConnectionStats {
            total_connections: connections.len(),
            connection_ids,
        }
    }
}
