//! Redis subscription directory.
//!
//! Stores one JSON record per subscription plus three id sets (by user, by
//! server, all). Removal is a sequence of idempotent steps rather than a
//! transaction: a crash between steps can leave an index entry pointing at a
//! missing record, and every lookup treats such an entry as not found.

use std::time::Duration;

use async_trait::async_trait;
use backon::Retryable;
use chrono::{DateTime, Utc};
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::{AsyncCommands, Client};
use tracing::{debug, info, warn};

use super::keys::{
    record_key, server_subscriptions_key, subscription_key, user_subscriptions_key,
    ALL_SUBSCRIPTIONS_KEY,
};
use crate::config::RedisConfig;
use crate::domain::{SubscriberId, Subscription, UserId};
use crate::interfaces::{Result, SubscriptionDirectory};
use crate::utils::retry::connection_backoff;

/// Directory shared between processes through Redis.
pub struct RedisDirectory {
    conn: ConnectionManager,
    record_ttl: Duration,
}

impl RedisDirectory {
    /// Connect to Redis, retrying with backoff while the server is unreachable.
    pub async fn connect(config: &RedisConfig) -> Result<Self> {
        let client = Client::open(config.url.as_str())?;
        let response_timeout = config.response_timeout();
        let connection_timeout = config.connection_timeout();

        let conn = (|| async {
            let manager_config = ConnectionManagerConfig::new()
                .set_response_timeout(response_timeout)
                .set_connection_timeout(connection_timeout);
            ConnectionManager::new_with_config(client.clone(), manager_config).await
        })
        .retry(connection_backoff())
        .notify(|err, delay| {
            warn!(error = %err, retry_in = ?delay, "Redis connection failed, retrying");
        })
        .await?;

        info!(url = %config.url, "Connected to Redis for subscriptions");

        Ok(Self::with_connection(conn, config.record_ttl()))
    }

    /// Wrap an existing connection.
    pub fn with_connection(conn: ConnectionManager, record_ttl: Duration) -> Self {
        Self { conn, record_ttl }
    }

    fn ttl_secs(&self) -> u64 {
        self.record_ttl.as_secs().max(1)
    }

    /// Fetch primary records for a list of ids, keeping ids whose record is gone.
    async fn load_records(&self, ids: Vec<String>) -> Result<Vec<(String, StoredRecord)>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let keys: Vec<String> = ids.iter().map(|id| record_key(id)).collect();

        let mut conn = self.conn.clone();
        let values: Vec<Option<String>> =
            redis::cmd("MGET").arg(&keys).query_async(&mut conn).await?;

        Ok(ids
            .into_iter()
            .zip(values)
            .map(|(id, value)| {
                let record = StoredRecord::read(&id, value);
                (id, record)
            })
            .collect())
    }

    async fn load_record(&self, id: &SubscriberId) -> Result<StoredRecord> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(subscription_key(id)).await?;
        Ok(StoredRecord::read(id.as_str(), value))
    }

    /// Resolve an index set into the records that still exist.
    async fn find_by_index(&self, index_key: &str) -> Result<Vec<Subscription>> {
        let mut conn = self.conn.clone();
        let ids: Vec<String> = conn.smembers(index_key).await?;

        Ok(self
            .load_records(ids)
            .await?
            .into_iter()
            .filter_map(|(_, record)| record.into_subscription())
            .collect())
    }

    /// Delete a record and its index memberships.
    async fn purge(&self, subscription: &Subscription) -> Result<()> {
        let id = subscription.id().as_str();
        let mut conn = self.conn.clone();

        let _: () = conn.del(subscription_key(subscription.id())).await?;
        let _: () = conn
            .srem(user_subscriptions_key(subscription.user_id()), id)
            .await?;
        let _: () = conn
            .srem(server_subscriptions_key(subscription.server_id()), id)
            .await?;
        let _: () = conn.srem(ALL_SUBSCRIPTIONS_KEY, id).await?;

        debug!(subscription = %id, "Removed subscription from Redis");
        Ok(())
    }

    /// Delete whatever is left of an id whose record is missing or undecodable.
    ///
    /// Index sets named by an undecodable record are cleaned when the owning
    /// user or server can still be read from it; otherwise they expire on
    /// their own TTL.
    async fn purge_remains(&self, id: &str, record: &StoredRecord) -> Result<()> {
        let mut conn = self.conn.clone();

        let _: () = conn.del(record_key(id)).await?;
        if let StoredRecord::Corrupt { user_id, server_id } = record {
            if let Some(user_id) = user_id {
                let _: () = conn.srem(user_subscriptions_key(user_id), id).await?;
            }
            if let Some(server_id) = server_id {
                let _: () = conn.srem(server_subscriptions_key(server_id), id).await?;
            }
        }
        let _: () = conn.srem(ALL_SUBSCRIPTIONS_KEY, id).await?;

        debug!(subscription = %id, "Removed dangling subscription id");
        Ok(())
    }
}

/// Primary record as read back from Redis.
enum StoredRecord {
    Found(Subscription),
    Missing,
    /// Present but not decodable; owners are kept when still readable.
    Corrupt {
        user_id: Option<UserId>,
        server_id: Option<String>,
    },
}

impl StoredRecord {
    fn read(id: &str, value: Option<String>) -> Self {
        let Some(json) = value else {
            return StoredRecord::Missing;
        };
        match serde_json::from_str(&json) {
            Ok(subscription) => StoredRecord::Found(subscription),
            Err(e) => {
                warn!(subscription = %id, error = %e, "Skipping undecodable subscription record");
                let raw: serde_json::Value = serde_json::from_str(&json).unwrap_or_default();
                StoredRecord::Corrupt {
                    user_id: raw["userId"].as_str().and_then(|u| UserId::parse(u).ok()),
                    server_id: raw["serverId"]
                        .as_str()
                        .filter(|s| !s.trim().is_empty())
                        .map(str::to_string),
                }
            }
        }
    }

    fn into_subscription(self) -> Option<Subscription> {
        match self {
            StoredRecord::Found(subscription) => Some(subscription),
            _ => None,
        }
    }
}

#[async_trait]
impl SubscriptionDirectory for RedisDirectory {
    async fn save(&self, subscription: &Subscription) -> Result<()> {
        let json = serde_json::to_string(subscription)?;
        let id = subscription.id().as_str();
        let ttl = self.ttl_secs();
        let user_key = user_subscriptions_key(subscription.user_id());
        let server_key = server_subscriptions_key(subscription.server_id());

        let mut pipe = redis::pipe();
        pipe.cmd("SET")
            .arg(subscription_key(subscription.id()))
            .arg(json)
            .arg("EX")
            .arg(ttl)
            .ignore()
            .cmd("SADD")
            .arg(&user_key)
            .arg(id)
            .ignore()
            .cmd("EXPIRE")
            .arg(&user_key)
            .arg(ttl)
            .ignore()
            .cmd("SADD")
            .arg(&server_key)
            .arg(id)
            .ignore()
            .cmd("EXPIRE")
            .arg(&server_key)
            .arg(ttl)
            .ignore()
            .cmd("SADD")
            .arg(ALL_SUBSCRIPTIONS_KEY)
            .arg(id)
            .ignore();

        let mut conn = self.conn.clone();
        let _: () = pipe.query_async(&mut conn).await?;

        debug!(subscription = %id, "Saved subscription to Redis");
        Ok(())
    }

    async fn touch(&self, id: &SubscriberId, at: DateTime<Utc>) -> Result<bool> {
        let Some(subscription) = self.find_by_id(id).await? else {
            return Ok(false);
        };
        let json = serde_json::to_string(&subscription.clone().refreshed_at(at))?;
        let ttl = self.ttl_secs();
        let mut conn = self.conn.clone();

        // XX: a record removed since the read stays removed.
        let stored: Option<String> = redis::cmd("SET")
            .arg(subscription_key(id))
            .arg(json)
            .arg("XX")
            .arg("EX")
            .arg(ttl)
            .query_async(&mut conn)
            .await?;
        if stored.is_none() {
            debug!(subscription = %id, "Subscription removed before refresh");
            return Ok(false);
        }

        // EXPIRE renews existing sets and never adds a member.
        let mut pipe = redis::pipe();
        pipe.cmd("EXPIRE")
            .arg(user_subscriptions_key(subscription.user_id()))
            .arg(ttl)
            .ignore()
            .cmd("EXPIRE")
            .arg(server_subscriptions_key(subscription.server_id()))
            .arg(ttl)
            .ignore();
        let _: () = pipe.query_async(&mut conn).await?;

        Ok(true)
    }

    async fn find_by_id(&self, id: &SubscriberId) -> Result<Option<Subscription>> {
        Ok(self.load_record(id).await?.into_subscription())
    }

    async fn find_by_user_id(&self, user_id: &UserId) -> Result<Vec<Subscription>> {
        self.find_by_index(&user_subscriptions_key(user_id)).await
    }

    async fn find_by_server_id(&self, server_id: &str) -> Result<Vec<Subscription>> {
        self.find_by_index(&server_subscriptions_key(server_id)).await
    }

    async fn find_all(&self) -> Result<Vec<Subscription>> {
        self.find_by_index(ALL_SUBSCRIPTIONS_KEY).await
    }

    async fn remove(&self, id: &SubscriberId) -> Result<()> {
        match self.load_record(id).await? {
            StoredRecord::Found(subscription) => self.purge(&subscription).await,
            remains => self.purge_remains(id.as_str(), &remains).await,
        }
    }

    async fn count(&self) -> Result<usize> {
        let mut conn = self.conn.clone();
        let count: usize = conn.scard(ALL_SUBSCRIPTIONS_KEY).await?;
        Ok(count)
    }

    async fn remove_expired(&self, threshold: Duration) -> Result<usize> {
        let mut conn = self.conn.clone();
        let ids: Vec<String> = conn.smembers(ALL_SUBSCRIPTIONS_KEY).await?;
        let now = Utc::now();

        let mut expired = 0;
        let mut dangling = 0;
        for (id, record) in self.load_records(ids).await? {
            match record {
                StoredRecord::Found(subscription) if subscription.is_expired(now, threshold) => {
                    info!(subscription = %id, "Removing expired subscription");
                    match self.purge(&subscription).await {
                        Ok(()) => expired += 1,
                        Err(e) => warn!(
                            subscription = %id,
                            error = %e,
                            "Failed to remove expired subscription"
                        ),
                    }
                }
                StoredRecord::Found(_) => {}
                remains => match self.purge_remains(&id, &remains).await {
                    Ok(()) => dangling += 1,
                    Err(e) => warn!(
                        subscription = %id,
                        error = %e,
                        "Failed to prune dangling subscription id"
                    ),
                },
            }
        }

        if expired > 0 {
            info!(removed = expired, "Removed expired subscriptions from Redis");
        }
        if dangling > 0 {
            info!(pruned = dangling, "Pruned ids without a usable subscription record");
        }
        Ok(expired)
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}
