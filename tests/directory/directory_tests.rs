//! SubscriptionDirectory interface tests.
//!
//! These tests verify the contract of the SubscriptionDirectory trait.
//! Each backend should run these tests. Ids are unique per call so the
//! suite can run against a store shared with other data.

use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use sse_fanout::domain::{EventType, SubscriberId, Subscription, UserId};
use sse_fanout::SubscriptionDirectory;

const THRESHOLD: Duration = Duration::from_secs(120);

fn unique(prefix: &str) -> String {
    format!("{}-{}", prefix, &Uuid::new_v4().simple().to_string()[..12])
}

/// Create a subscription for a fresh user on a fresh server.
pub fn make_subscription() -> Subscription {
    make_subscription_for(&unique("user"), &unique("server"))
}

pub fn make_subscription_for(user: &str, server: &str) -> Subscription {
    Subscription::create(
        UserId::parse(user).unwrap(),
        Some("contract-test"),
        [EventType::Alert, EventType::Metrics],
        server,
    )
}

fn ids(subscriptions: &[Subscription]) -> Vec<SubscriberId> {
    let mut ids: Vec<SubscriberId> = subscriptions.iter().map(|s| s.id().clone()).collect();
    ids.sort();
    ids
}

// =============================================================================
// save / find_by_id
// =============================================================================

pub async fn test_save_and_find_by_id<D: SubscriptionDirectory>(directory: &D) {
    let subscription = make_subscription();

    directory
        .save(&subscription)
        .await
        .expect("save should succeed");

    let found = directory
        .find_by_id(subscription.id())
        .await
        .expect("find_by_id should succeed")
        .expect("subscription should exist");

    assert_eq!(found, subscription);
}

pub async fn test_find_missing_id<D: SubscriptionDirectory>(directory: &D) {
    let found = directory
        .find_by_id(&SubscriberId::generate())
        .await
        .expect("find_by_id should succeed");

    assert!(found.is_none(), "unknown id should be None");
}

pub async fn test_save_overwrites<D: SubscriptionDirectory>(directory: &D) {
    let original = make_subscription().refreshed_at(Utc::now() - chrono::Duration::minutes(1));
    directory.save(&original).await.unwrap();

    let mut refreshed = original.clone();
    refreshed.refresh();
    directory.save(&refreshed).await.unwrap();

    let found = directory.find_by_id(original.id()).await.unwrap().unwrap();
    assert_eq!(found.last_refresh(), refreshed.last_refresh());

    let by_user = directory.find_by_user_id(original.user_id()).await.unwrap();
    assert_eq!(by_user.len(), 1, "overwrite must not duplicate index entries");
}

pub async fn test_touch_updates_refresh<D: SubscriptionDirectory>(directory: &D) {
    let original = make_subscription().refreshed_at(Utc::now() - chrono::Duration::minutes(1));
    directory.save(&original).await.unwrap();
    let at = Utc::now();

    let touched = directory
        .touch(original.id(), at)
        .await
        .expect("touch should succeed");

    assert!(touched);
    let found = directory.find_by_id(original.id()).await.unwrap().unwrap();
    assert!(found.last_refresh() > original.last_refresh());
    assert_eq!(found.user_id(), original.user_id());
    assert_eq!(found.event_types(), original.event_types());

    directory.remove(original.id()).await.unwrap();
}

pub async fn test_touch_removed_id_does_not_recreate<D: SubscriptionDirectory>(directory: &D) {
    let subscription = make_subscription_for(&unique("user"), &unique("server"));
    directory.save(&subscription).await.unwrap();
    directory.remove(subscription.id()).await.unwrap();

    let touched = directory
        .touch(subscription.id(), Utc::now())
        .await
        .expect("touch should succeed");

    assert!(!touched, "touch must report a missing record");
    assert!(directory
        .find_by_id(subscription.id())
        .await
        .unwrap()
        .is_none());
    assert!(directory
        .find_by_user_id(subscription.user_id())
        .await
        .unwrap()
        .is_empty());
    assert!(directory
        .find_by_server_id(subscription.server_id())
        .await
        .unwrap()
        .is_empty());
    let all = directory.find_all().await.unwrap();
    assert!(!all.iter().any(|s| s.id() == subscription.id()));
}

pub async fn test_touch_unknown_id<D: SubscriptionDirectory>(directory: &D) {
    let touched = directory
        .touch(&SubscriberId::generate(), Utc::now())
        .await
        .expect("touch should succeed");

    assert!(!touched);
}

// =============================================================================
// index lookups
// =============================================================================

pub async fn test_find_by_user_id<D: SubscriptionDirectory>(directory: &D) {
    let user = unique("user");
    let server = unique("server");
    let first = make_subscription_for(&user, &server);
    let second = make_subscription_for(&user, &server);
    let other = make_subscription();

    for s in [&first, &second, &other] {
        directory.save(s).await.unwrap();
    }

    let found = directory
        .find_by_user_id(&UserId::parse(user.as_str()).unwrap())
        .await
        .expect("find_by_user_id should succeed");

    assert_eq!(ids(&found), ids(&[first, second]));
}

pub async fn test_find_by_unknown_user<D: SubscriptionDirectory>(directory: &D) {
    let found = directory
        .find_by_user_id(&UserId::parse(unique("nobody")).unwrap())
        .await
        .expect("find_by_user_id should succeed");

    assert!(found.is_empty());
}

pub async fn test_find_by_server_id<D: SubscriptionDirectory>(directory: &D) {
    let server = unique("server");
    let first = make_subscription_for(&unique("user"), &server);
    let second = make_subscription_for(&unique("user"), &server);
    let elsewhere = make_subscription();

    for s in [&first, &second, &elsewhere] {
        directory.save(s).await.unwrap();
    }

    let found = directory
        .find_by_server_id(&server)
        .await
        .expect("find_by_server_id should succeed");

    assert_eq!(ids(&found), ids(&[first, second]));
}

pub async fn test_find_all_includes_saved<D: SubscriptionDirectory>(directory: &D) {
    let first = make_subscription();
    let second = make_subscription();
    directory.save(&first).await.unwrap();
    directory.save(&second).await.unwrap();

    let all = ids(&directory.find_all().await.expect("find_all should succeed"));

    assert!(all.contains(first.id()));
    assert!(all.contains(second.id()));
}

// =============================================================================
// remove / count
// =============================================================================

pub async fn test_remove_clears_every_lookup<D: SubscriptionDirectory>(directory: &D) {
    let subscription = make_subscription();
    directory.save(&subscription).await.unwrap();

    directory
        .remove(subscription.id())
        .await
        .expect("remove should succeed");

    assert!(directory
        .find_by_id(subscription.id())
        .await
        .unwrap()
        .is_none());
    assert!(directory
        .find_by_user_id(subscription.user_id())
        .await
        .unwrap()
        .is_empty());
    assert!(directory
        .find_by_server_id(subscription.server_id())
        .await
        .unwrap()
        .is_empty());
    assert!(!ids(&directory.find_all().await.unwrap()).contains(subscription.id()));
}

pub async fn test_remove_is_idempotent<D: SubscriptionDirectory>(directory: &D) {
    let subscription = make_subscription();
    directory.save(&subscription).await.unwrap();

    directory.remove(subscription.id()).await.unwrap();
    directory
        .remove(subscription.id())
        .await
        .expect("second remove should succeed");
    directory
        .remove(&SubscriberId::generate())
        .await
        .expect("removing an unknown id should succeed");
}

pub async fn test_count_tracks_saves_and_removes<D: SubscriptionDirectory>(directory: &D) {
    let before = directory.count().await.expect("count should succeed");

    let first = make_subscription();
    let second = make_subscription();
    directory.save(&first).await.unwrap();
    directory.save(&second).await.unwrap();
    directory.save(&second).await.unwrap();
    assert_eq!(directory.count().await.unwrap(), before + 2);

    directory.remove(first.id()).await.unwrap();
    assert_eq!(directory.count().await.unwrap(), before + 1);

    directory.remove(second.id()).await.unwrap();
    assert_eq!(directory.count().await.unwrap(), before);
}

// =============================================================================
// remove_expired
// =============================================================================

pub async fn test_remove_expired<D: SubscriptionDirectory>(directory: &D) {
    let stale = make_subscription().refreshed_at(Utc::now() - chrono::Duration::minutes(10));
    let fresh = make_subscription();
    directory.save(&stale).await.unwrap();
    directory.save(&fresh).await.unwrap();

    let removed = directory
        .remove_expired(THRESHOLD)
        .await
        .expect("remove_expired should succeed");

    assert!(removed >= 1, "stale subscription should be removed");
    assert!(directory.find_by_id(stale.id()).await.unwrap().is_none());
    assert!(directory
        .find_by_user_id(stale.user_id())
        .await
        .unwrap()
        .is_empty());
    assert!(directory.find_by_id(fresh.id()).await.unwrap().is_some());
}

pub async fn test_remove_expired_keeps_recent<D: SubscriptionDirectory>(directory: &D) {
    let recent = make_subscription().refreshed_at(Utc::now() - chrono::Duration::seconds(60));
    directory.save(&recent).await.unwrap();

    directory.remove_expired(THRESHOLD).await.unwrap();

    assert!(directory.find_by_id(recent.id()).await.unwrap().is_some());
}

/// Run every directory contract test against `$directory`.
#[macro_export]
macro_rules! run_directory_tests {
    ($directory:expr) => {
        use $crate::directory::directory_tests::*;

        // save / find_by_id
        test_save_and_find_by_id($directory).await;
        println!("  test_save_and_find_by_id: PASSED");

        test_find_missing_id($directory).await;
        println!("  test_find_missing_id: PASSED");

        test_save_overwrites($directory).await;
        println!("  test_save_overwrites: PASSED");

        // touch
        test_touch_updates_refresh($directory).await;
        println!("  test_touch_updates_refresh: PASSED");

        test_touch_removed_id_does_not_recreate($directory).await;
        println!("  test_touch_removed_id_does_not_recreate: PASSED");

        test_touch_unknown_id($directory).await;
        println!("  test_touch_unknown_id: PASSED");

        // index lookups
        test_find_by_user_id($directory).await;
        println!("  test_find_by_user_id: PASSED");

        test_find_by_unknown_user($directory).await;
        println!("  test_find_by_unknown_user: PASSED");

        test_find_by_server_id($directory).await;
        println!("  test_find_by_server_id: PASSED");

        test_find_all_includes_saved($directory).await;
        println!("  test_find_all_includes_saved: PASSED");

        // remove / count
        test_remove_clears_every_lookup($directory).await;
        println!("  test_remove_clears_every_lookup: PASSED");

        test_remove_is_idempotent($directory).await;
        println!("  test_remove_is_idempotent: PASSED");

        test_count_tracks_saves_and_removes($directory).await;
        println!("  test_count_tracks_saves_and_removes: PASSED");

        // remove_expired
        test_remove_expired($directory).await;
        println!("  test_remove_expired: PASSED");

        test_remove_expired_keeps_recent($directory).await;
        println!("  test_remove_expired_keeps_recent: PASSED");
    };
}
