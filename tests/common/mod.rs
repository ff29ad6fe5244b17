//! Helpers shared by the integration tests.

#![allow(dead_code)]

use std::time::Duration;

use kvbridge::testing::{MockCluster, MockServer};
use kvbridge::{ClientBuilder, KvClient, RetryPolicy};

/// A retry delay short enough for tests that exercise the retry loop.
pub const TEST_BACKOFF: Duration = Duration::from_millis(50);

/// A standalone client talking to a fresh mock server.
pub async fn standalone() -> (MockServer, KvClient) {
    let server = MockServer::start().await;
    let client = ClientBuilder::new()
        .servers(server.address())
        .retry_policy(RetryPolicy::unbounded(TEST_BACKOFF))
        .build()
        .await
        .expect("Failed to connect");
    (server, client)
}

/// A cluster client talking to a fresh three-node mock cluster.
pub async fn clustered() -> (MockCluster, KvClient) {
    let cluster = MockCluster::start(3).await;
    let client = ClientBuilder::new()
        .servers(cluster.addresses().join(","))
        .cluster(true)
        .retry_policy(RetryPolicy::unbounded(TEST_BACKOFF))
        .build()
        .await
        .expect("Failed to connect");
    (cluster, client)
}
