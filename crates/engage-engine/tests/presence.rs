//! Presence integration tests.

mod common;

use std::time::Duration;

use chrono::Duration as TimeDelta;

use common::{at, user, Harness};
use engage_engine::EngineError;

const TEN_MINUTES: Duration = Duration::from_secs(10 * 60);

#[tokio::test]
async fn stale_users_are_swept() {
    let harness = Harness::new();
    let presence = &harness.engine.presence;
    let t0 = at(12, 0, 0);

    assert!(presence.heartbeat(user(7), t0).await.unwrap());
    assert_eq!(presence.online_count().await.unwrap(), 1);

    let removed = presence
        .sweep(TEN_MINUTES, t0 + TimeDelta::minutes(11))
        .await
        .unwrap();

    assert_eq!(removed, 1);
    assert_eq!(presence.online_count().await.unwrap(), 0);
    assert_eq!(
        presence
            .last_seen_age(user(7), t0 + TimeDelta::minutes(11))
            .await
            .unwrap(),
        None
    );
}

#[tokio::test]
async fn recent_users_survive_a_sweep() {
    let harness = Harness::new();
    let presence = &harness.engine.presence;
    let t0 = at(12, 0, 0);

    presence.heartbeat(user(1), t0).await.unwrap();
    presence
        .heartbeat(user(2), t0 + TimeDelta::minutes(8))
        .await
        .unwrap();

    let removed = presence
        .sweep(TEN_MINUTES, t0 + TimeDelta::minutes(11))
        .await
        .unwrap();

    assert_eq!(removed, 1);
    assert_eq!(presence.online_count().await.unwrap(), 1);
    assert!(presence
        .last_seen_age(user(2), t0 + TimeDelta::minutes(11))
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn last_seen_age_measures_from_heartbeat() {
    let harness = Harness::new();
    let presence = &harness.engine.presence;
    let t0 = at(9, 30, 0);

    presence.heartbeat(user(3), t0).await.unwrap();

    assert_eq!(
        presence.last_seen_age(user(3), t0).await.unwrap(),
        Some(Duration::ZERO)
    );
    assert_eq!(
        presence
            .last_seen_age(user(3), t0 + TimeDelta::seconds(90))
            .await
            .unwrap(),
        Some(Duration::from_secs(90))
    );
    // A clock behind the heartbeat does not go negative.
    assert_eq!(
        presence
            .last_seen_age(user(3), t0 - TimeDelta::seconds(5))
            .await
            .unwrap(),
        Some(Duration::ZERO)
    );
    assert_eq!(presence.last_seen_age(user(4), t0).await.unwrap(), None);
}

#[tokio::test]
async fn repeated_heartbeat_refreshes_timestamp() {
    let harness = Harness::new();
    let presence = &harness.engine.presence;
    let t0 = at(12, 0, 0);

    assert!(presence.heartbeat(user(5), t0).await.unwrap());
    assert!(!presence
        .heartbeat(user(5), t0 + TimeDelta::minutes(9))
        .await
        .unwrap());
    assert_eq!(presence.online_count().await.unwrap(), 1);

    let removed = presence
        .sweep(TEN_MINUTES, t0 + TimeDelta::minutes(11))
        .await
        .unwrap();
    assert_eq!(removed, 0);
}

#[tokio::test]
async fn unreachable_fast_store_fails_heartbeat() {
    let harness = Harness::unreachable();
    let engine = &harness.engine;

    let err = engine.presence.heartbeat(user(1), at(12, 0, 0)).await.unwrap_err();
    assert!(matches!(err, EngineError::StoreUnavailable(_)));
    assert!(matches!(
        engine.presence.online_count().await,
        Err(EngineError::StoreUnavailable(_))
    ));
}
