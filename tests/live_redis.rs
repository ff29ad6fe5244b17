//! Smoke tests against real servers.
//!
//! These tests require Redis running on localhost and are marked with
//! #[ignore] by default.
//!
//! Setup with Docker:
//! ```bash
//! docker run -d --name redis -p 6379:6379 redis:7
//! docker run -d --name redis-cluster -p 7000-7005:7000-7005 grokzen/redis-cluster:latest
//! ```
//!
//! Run tests:
//! ```bash
//! cargo test --test live_redis -- --ignored
//! ```

use kvbridge::{ClientBuilder, KvClient, RetryPolicy, TypedCache};
use std::time::Duration;

async fn create_client(servers: &str, cluster: bool) -> KvClient {
    ClientBuilder::new()
        .servers(servers)
        .cluster(cluster)
        .retry_policy(RetryPolicy::bounded(3, Duration::from_millis(200)))
        .build()
        .await
        .expect("Failed to connect")
}

async fn smoke(client: &KvClient) {
    client.del("kvbridge:smoke").await.unwrap();
    client.rpush("kvbridge:smoke", &["a", "b"]).await.unwrap();
    assert_eq!(
        client.blpop("kvbridge:smoke", 1).await.unwrap().as_deref(),
        Some("a")
    );
    assert_eq!(client.llen("kvbridge:smoke").await.unwrap(), 1);
    client.del("kvbridge:smoke").await.unwrap();

    let cache = TypedCache::new(client.clone());
    assert!(cache
        .set_with_expiry("kvbridge:typed", &vec![1, 2, 3], 60)
        .await
        .unwrap());
    assert_eq!(
        cache.get::<Vec<i32>>("kvbridge:typed").await.unwrap(),
        Some(vec![1, 2, 3])
    );
    cache.delete("kvbridge:typed").await.unwrap();
}

#[tokio::test]
#[ignore]
async fn test_standalone_smoke() {
    let client = create_client("127.0.0.1:6379", false).await;
    smoke(&client).await;
}

#[tokio::test]
#[ignore]
async fn test_cluster_smoke() {
    let client = create_client("127.0.0.1:7000,127.0.0.1:7001,127.0.0.1:7002", true).await;
    smoke(&client).await;
}
