//! Shared-store key layout.
//!
//! Every process sharing a store must agree on these names exactly.

use crate::domain::{SubscriberId, UserId};

const SUBSCRIPTION_KEY_PREFIX: &str = "sse:subscription:";
const USER_SUBSCRIPTIONS_KEY_PREFIX: &str = "sse:user:subscriptions:";
const SERVER_SUBSCRIPTIONS_KEY_PREFIX: &str = "sse:server:subscriptions:";

/// Global index of every subscription id. Carries no TTL.
pub const ALL_SUBSCRIPTIONS_KEY: &str = "sse:subscriptions:all";

/// Primary record key.
pub fn subscription_key(id: &SubscriberId) -> String {
    record_key(id.as_str())
}

/// Primary record key for a raw id read back from an index set.
pub fn record_key(raw_id: &str) -> String {
    format!("{}{}", SUBSCRIPTION_KEY_PREFIX, raw_id)
}

/// By-user index set key.
pub fn user_subscriptions_key(user_id: &UserId) -> String {
    format!("{}{}", USER_SUBSCRIPTIONS_KEY_PREFIX, user_id)
}

/// By-server index set key.
pub fn server_subscriptions_key(server_id: &str) -> String {
    format!("{}{}", SERVER_SUBSCRIPTIONS_KEY_PREFIX, server_id)
}
