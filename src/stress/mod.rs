//! Internal stress tests for pooled concurrency.
//!
//! Many tasks share one client whose pool is far smaller than the number of
//! tasks, so borrows queue up on the pool and connections get reused.

use std::time::Duration;

use crate::core::builder::ClientBuilder;
use crate::testing::{MockCluster, MockServer};
use crate::RetryPolicy;

#[tokio::test]
async fn test_pool_contention_stress() {
    let server = MockServer::start().await;
    let client = ClientBuilder::new()
        .servers(server.address())
        .max_total(8)
        .build()
        .await
        .expect("Failed to connect");

    let mut handles = Vec::new();
    for i in 0..500 {
        let client = client.clone();
        handles.push(tokio::spawn(async move {
            let key = format!("stress:{}", i);
            client.set(&key, &i.to_string()).await.unwrap();
            assert_eq!(client.get(&key).await.unwrap(), Some(i.to_string()));
            client.incr("stress:counter").await.unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(
        client.get("stress:counter").await.unwrap().as_deref(),
        Some("500")
    );
}

#[tokio::test]
async fn test_blocking_pops_do_not_starve_the_pool() {
    let server = MockServer::start().await;
    let client = ClientBuilder::new()
        .servers(server.address())
        .max_total(4)
        .build()
        .await
        .expect("Failed to connect");

    let mut consumers = Vec::new();
    for _ in 0..3 {
        let client = client.clone();
        consumers.push(tokio::spawn(async move {
            client.blpop("stress:queue", 5).await.unwrap()
        }));
    }

    // One connection is left for everything else while the consumers wait.
    tokio::time::sleep(Duration::from_millis(100)).await;
    for i in 0..3 {
        client
            .rpush("stress:queue", &[format!("job-{}", i).as_str()])
            .await
            .unwrap();
    }

    let mut popped = Vec::new();
    for consumer in consumers {
        popped.push(consumer.await.unwrap().expect("consumer timed out"));
    }
    popped.sort();
    assert_eq!(popped, vec!["job-0", "job-1", "job-2"]);
}

#[tokio::test]
async fn test_cluster_stress_with_faults() {
    let cluster = MockCluster::start(3).await;
    let client = ClientBuilder::new()
        .servers(cluster.addresses().join(","))
        .cluster(true)
        .retry_policy(RetryPolicy::unbounded(Duration::from_millis(20)))
        .build()
        .await
        .expect("Failed to connect");

    for node in 0..3 {
        cluster.node(node).fail_next(2);
    }

    let mut handles = Vec::new();
    for i in 0..200 {
        let client = client.clone();
        handles.push(tokio::spawn(async move {
            let key = format!("stress:{{user{}}}:name", i % 50);
            client.sadd("stress:members", &[key.as_str()]).await.unwrap();
            client.set(&key, "x").await.unwrap();
            assert!(client.exists(&key).await.unwrap());
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(client.scard("stress:members").await.unwrap(), 50);
}
