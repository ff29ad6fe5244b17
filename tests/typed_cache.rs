mod common;

use std::time::Duration;

use kvbridge::TypedCache;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Session {
    user_id: u64,
    roles: Vec<String>,
}

fn session(user_id: u64) -> Session {
    Session {
        user_id,
        roles: vec!["reader".to_string()],
    }
}

#[tokio::test]
async fn test_round_trip() {
    let (_server, client) = common::standalone().await;
    let cache = TypedCache::new(client);

    assert!(cache.set("session:1", &session(1)).await.unwrap());
    assert_eq!(cache.get::<Session>("session:1").await.unwrap(), Some(session(1)));
    assert_eq!(cache.get::<Session>("session:2").await.unwrap(), None);
    assert_eq!(
        cache.get_string("session:1").await.unwrap().as_deref(),
        Some(r#"{"user_id":1,"roles":["reader"]}"#)
    );
}

#[tokio::test]
async fn test_round_trip_cluster() {
    let (_cluster, client) = common::clustered().await;
    let cache = TypedCache::new(client);

    for id in 0..20 {
        cache.set(&format!("session:{}", id), &session(id)).await.unwrap();
    }
    for id in 0..20 {
        let loaded: Option<Session> = cache.get(&format!("session:{}", id)).await.unwrap();
        assert_eq!(loaded, Some(session(id)));
    }
}

#[tokio::test]
async fn test_empty_value_is_not_written() {
    let (server, client) = common::standalone().await;
    let cache = TypedCache::new(client);

    assert!(!cache.set("nothing", &Option::<Session>::None).await.unwrap());
    assert!(!cache.set_with_expiry("nothing", &(), 60).await.unwrap());
    assert!(!cache.push_tail("queue", &Option::<u8>::None).await.unwrap());

    assert!(!server
        .commands_seen()
        .iter()
        .any(|c| c == "SET" || c == "SETEX" || c == "RPUSH"));
}

#[tokio::test]
async fn test_expiry() {
    let (server, client) = common::standalone().await;
    let cache = TypedCache::new(client);

    assert!(cache.set_with_expiry("token", &"abc", 30).await.unwrap());
    assert!(cache.ttl("token").await.unwrap() > 0);

    server.fast_forward(Duration::from_secs(31));
    assert_eq!(cache.get::<String>("token").await.unwrap(), None);
}

#[tokio::test]
async fn test_non_positive_ttl_stores_without_expiry() {
    let (_server, client) = common::standalone().await;
    let cache = TypedCache::new(client);

    assert!(cache.set_with_expiry("forever", &1u8, 0).await.unwrap());
    assert_eq!(cache.ttl("forever").await.unwrap(), -1);
    cache.set_string_with_expiry("raw", "x", -5).await.unwrap();
    assert_eq!(cache.ttl("raw").await.unwrap(), -1);
}

#[tokio::test]
async fn test_expire_and_ttl() {
    let (_server, client) = common::standalone().await;
    let cache = TypedCache::new(client);

    cache.set_string("report", "x").await.unwrap();
    assert!(cache.expire("report", 120).await.unwrap());
    let ttl = cache.ttl("report").await.unwrap();
    assert!((119..=120).contains(&ttl), "ttl was {}", ttl);
}

#[tokio::test]
async fn test_delete_is_idempotent() {
    let (_server, client) = common::standalone().await;
    let cache = TypedCache::new(client);

    cache.set("k", &42u32).await.unwrap();
    assert_eq!(cache.delete("k").await.unwrap(), 1);
    assert_eq!(cache.delete("k").await.unwrap(), 0);
    assert_eq!(cache.get::<u32>("k").await.unwrap(), None);
}

#[tokio::test]
async fn test_queue_keeps_push_order() {
    let (_server, client) = common::standalone().await;
    let cache = TypedCache::new(client);

    assert_eq!(cache.range::<Session>("sessions", 0, -1).await.unwrap(), None);
    for id in 1..=3 {
        assert!(cache.push_tail("sessions", &session(id)).await.unwrap());
    }
    assert_eq!(cache.len("sessions").await.unwrap(), 3);
    assert_eq!(
        cache.range::<Session>("sessions", 0, -1).await.unwrap(),
        Some(vec![session(1), session(2), session(3)])
    );
    assert_eq!(
        cache.range::<Session>("sessions", 1, 1).await.unwrap(),
        Some(vec![session(2)])
    );

    assert_eq!(
        cache.blocking_pop::<Session>("sessions", 1).await.unwrap(),
        Some(session(1))
    );
    assert_eq!(cache.len("sessions").await.unwrap(), 2);
}

#[tokio::test]
async fn test_blocking_pop_times_out() {
    let (_server, client) = common::standalone().await;
    let cache = TypedCache::new(client);

    assert_eq!(cache.blocking_pop::<Session>("idle", 1).await.unwrap(), None);
}

#[tokio::test]
async fn test_sorted_set_helpers() {
    let (_server, client) = common::standalone().await;
    let cache = TypedCache::new(client);

    assert_eq!(cache.zadd("delays", 100.0, "job-a").await.unwrap(), 1);
    assert_eq!(
        cache
            .zadd_many("delays", &[("job-b", 200.0), ("job-c", 300.0)])
            .await
            .unwrap(),
        2
    );
    assert_eq!(cache.zcard("delays").await.unwrap(), 3);
    assert!(cache.zexists("delays", "job-b").await.unwrap());
    assert_eq!(
        cache.zrange_by_score("delays", 0.0, 250.0).await.unwrap(),
        ["job-a", "job-b"]
    );

    assert!(cache.zrem("delays", "job-a").await.unwrap());
    assert!(cache.zrem("delays", "job-a").await.unwrap());
    assert!(!cache.zexists("delays", "job-a").await.unwrap());
}
