//! One connection pool per cluster node.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::core::pool::{Pool, PoolConfig};

/// Lazily created pools keyed by node address.
///
/// Every node gets a pool built from the same template, so `max_total`
/// applies per node just like the pool capacity of the cluster handle it
/// replaces.
#[derive(Debug, Clone)]
pub struct NodePools {
    template: PoolConfig,
    pools: Arc<RwLock<HashMap<String, Pool>>>,
}

impl NodePools {
    /// Creates an empty set of pools; `template.address` is ignored.
    pub fn new(template: PoolConfig) -> Self {
        Self {
            template,
            pools: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Returns the pool for `address`, creating it on first use.
    pub async fn get(&self, address: &str) -> Pool {
        if let Some(pool) = self.pools.read().await.get(address) {
            return pool.clone();
        }

        let mut pools = self.pools.write().await;
        pools
            .entry(address.to_string())
            .or_insert_with(|| {
                let mut config = self.template.clone();
                config.address = address.to_string();
                Pool::new(config)
            })
            .clone()
    }

    /// Drops pools of nodes that are no longer part of the cluster.
    pub async fn retain(&self, live: &[String]) {
        self.pools
            .write()
            .await
            .retain(|address, _| live.iter().any(|l| l == address));
    }

    /// Number of nodes with a pool.
    pub async fn len(&self) -> usize {
        self.pools.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pools_are_created_once_per_node() {
        let pools = NodePools::new(PoolConfig::new("unused").max_total(3));

        let a = pools.get("127.0.0.1:7000").await;
        let again = pools.get("127.0.0.1:7000").await;
        let b = pools.get("127.0.0.1:7001").await;

        assert_eq!(a.address(), "127.0.0.1:7000");
        assert_eq!(b.address(), "127.0.0.1:7001");
        assert_eq!(again.available(), 3);
        assert_eq!(pools.len().await, 2);
    }

    #[tokio::test]
    async fn test_retain_drops_departed_nodes() {
        let pools = NodePools::new(PoolConfig::new("unused"));
        pools.get("127.0.0.1:7000").await;
        pools.get("127.0.0.1:7001").await;

        pools.retain(&["127.0.0.1:7001".to_string()]).await;
        assert_eq!(pools.len().await, 1);
    }
}
