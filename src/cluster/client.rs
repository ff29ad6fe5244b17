//! Cluster client: slot routing and redirect handling.

use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::core::backend::Backend;
use crate::core::command::Cmd;
use crate::core::config::{ServerAddr, Topology};
use crate::core::pool::PoolConfig;
use crate::proto::frame::Frame;
use crate::{Error, Result};

use super::commands::{asking, cluster_slots};
use super::pool::NodePools;
use super::slot::key_slot;
use super::topology::ClusterTopology;

/// Client for a sharded cluster.
///
/// Routes each command to the master owning its key's slot, follows
/// `MOVED` (slot map updated) and `ASK` (one-off, after `ASKING`)
/// redirections, and gives up with [`Error::TooManyRedirections`] once a
/// single command has been redirected more than `max_redirections` times.
#[derive(Clone)]
pub struct ClusterClient {
    seeds: Arc<Vec<ServerAddr>>,
    topology: Arc<RwLock<ClusterTopology>>,
    pools: NodePools,
    max_redirections: u32,
}

impl ClusterClient {
    /// Connects using `seeds` and discovers the slot map.
    ///
    /// `template` supplies the per-node pool settings.
    pub async fn connect(
        seeds: Vec<ServerAddr>,
        template: PoolConfig,
        max_redirections: u32,
    ) -> Result<Self> {
        if seeds.is_empty() {
            return Err(Error::config("no seed nodes for cluster"));
        }

        let client = Self {
            seeds: Arc::new(seeds),
            topology: Arc::new(RwLock::new(ClusterTopology::new())),
            pools: NodePools::new(template),
            max_redirections,
        };
        client.refresh_topology().await?;

        let masters = client.topology.read().await.masters();
        info!(masters = masters.len(), "cluster topology discovered");
        Ok(client)
    }

    /// Re-reads the slot map from the first seed (or known master) that
    /// answers.
    pub async fn refresh_topology(&self) -> Result<()> {
        let known = self.topology.read().await.masters();
        let candidates = self
            .seeds
            .iter()
            .map(|s| (s.to_string(), s.host.clone()))
            .chain(known.into_iter().map(|m| {
                let host = m.rsplit_once(':').map(|(h, _)| h.to_string()).unwrap_or_default();
                (m, host)
            }));

        let mut last_err = None;
        for (address, host) in candidates {
            match self.fetch_topology(&address, &host).await {
                Ok(topology) if !topology.slot_ranges.is_empty() => {
                    let masters = topology.masters();
                    *self.topology.write().await = topology;
                    self.pools.retain(&masters).await;
                    return Ok(());
                }
                Ok(_) => debug!(%address, "node reported no slots"),
                Err(e) => {
                    debug!(%address, error = %e, "topology fetch failed");
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.unwrap_or(Error::ClusterDown))
    }

    async fn fetch_topology(&self, address: &str, host: &str) -> Result<ClusterTopology> {
        let mut conn = self.pools.get(address).await.get().await?;
        let reply = conn.execute(&cluster_slots()).await?;
        ClusterTopology::from_cluster_slots(reply, host)
    }

    /// Number of masters in the current slot map.
    pub async fn master_count(&self) -> usize {
        self.topology.read().await.masters().len()
    }

    /// Returns true if every slot has an owner.
    pub async fn is_fully_covered(&self) -> bool {
        let topology = self.topology.read().await;
        let mut next = 0u32;
        for range in &topology.slot_ranges {
            if u32::from(range.start) != next {
                return false;
            }
            next = u32::from(range.end) + 1;
        }
        next == u32::from(super::SLOT_COUNT)
    }

    async fn address_for(&self, cmd: &Cmd) -> Result<String> {
        let topology = self.topology.read().await;
        let address = match cmd.routing_key() {
            Some(key) => topology.master_for_slot(key_slot(key)).map(str::to_string),
            None => topology.masters().into_iter().next(),
        };
        address.ok_or(Error::ClusterDown)
    }

    #[instrument(skip(self, cmd), fields(command = cmd.name()), level = "debug")]
    async fn run(&self, cmd: Cmd) -> Result<Frame> {
        let mut redirect: Option<String> = None;
        let mut ask = false;

        for hop in 0..=self.max_redirections {
            let address = match redirect.take() {
                Some(address) => address,
                None => match self.address_for(&cmd).await {
                    Ok(address) => address,
                    Err(e) => {
                        self.refresh_quietly().await;
                        return Err(e);
                    }
                },
            };

            let result = self.send_to(&address, &cmd, ask).await;
            ask = false;
            match result {
                Err(Error::Moved { slot, address }) => {
                    debug!(hop, slot, %address, "MOVED");
                    self.topology.write().await.reassign(slot, &address);
                    redirect = Some(address);
                }
                Err(Error::Ask { slot, address }) => {
                    debug!(hop, slot, %address, "ASK");
                    ask = true;
                    redirect = Some(address);
                }
                Err(e) if e.poisons_connection() || matches!(e, Error::ClusterDown) => {
                    // the node may have failed over; pick up the new map before
                    // the caller's retry
                    self.refresh_quietly().await;
                    return Err(e);
                }
                other => return other,
            }
        }

        Err(Error::TooManyRedirections {
            limit: self.max_redirections,
        })
    }

    async fn send_to(&self, address: &str, cmd: &Cmd, ask: bool) -> Result<Frame> {
        let pool = self.pools.get(address).await;
        let mut conn = pool.get().await?;
        if ask {
            conn.execute(&asking()).await?;
        }
        conn.execute(cmd).await
    }

    async fn refresh_quietly(&self) {
        if let Err(e) = self.refresh_topology().await {
            warn!(error = %e, "cluster topology refresh failed");
        }
    }
}

impl Backend for ClusterClient {
    fn execute(&self, cmd: Cmd) -> BoxFuture<'_, Result<Frame>> {
        Box::pin(self.run(cmd))
    }

    fn topology(&self) -> Topology {
        Topology::Clustered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::command;
    use crate::testing::MockCluster;

    async fn connect(cluster: &MockCluster) -> ClusterClient {
        let seeds = vec![ServerAddr::parse(&cluster.addresses()[0]).unwrap()];
        ClusterClient::connect(seeds, PoolConfig::new("unused"), 5).await.unwrap()
    }

    #[tokio::test]
    async fn test_connect_discovers_all_masters() {
        let cluster = MockCluster::start(3).await;
        let client = connect(&cluster).await;
        assert_eq!(client.master_count().await, 3);
        assert!(client.is_fully_covered().await);
    }

    #[tokio::test]
    async fn test_commands_reach_owning_node() {
        let cluster = MockCluster::start(3).await;
        let client = connect(&cluster).await;

        for i in 0..20 {
            let key = format!("user:{}", i);
            client.execute(command::set(&key, "x")).await.unwrap();
            let reply = client.execute(command::get(&key)).await.unwrap();
            assert_eq!(reply, Frame::bulk("x"));
        }
        assert_eq!(cluster.redirects_sent(), 0);
    }

    #[tokio::test]
    async fn test_moved_is_followed_and_remembered() {
        let cluster = MockCluster::start(3).await;
        let client = connect(&cluster).await;

        // the client believes node 0 owns everything
        {
            let mut topology = client.topology.write().await;
            for slot in [key_slot("foo"), key_slot("bar")] {
                topology.reassign(slot, &cluster.addresses()[0]);
            }
        }

        client.execute(command::set("foo", "1")).await.unwrap();
        let moved_once = cluster.redirects_sent();
        client.execute(command::get("foo")).await.unwrap();
        assert_eq!(cluster.redirects_sent(), moved_once);
    }

    #[tokio::test]
    async fn test_redirect_limit() {
        let cluster = MockCluster::start(2).await;
        let seeds = vec![ServerAddr::parse(&cluster.addresses()[0]).unwrap()];
        let client = ClusterClient::connect(seeds, PoolConfig::new("unused"), 0)
            .await
            .unwrap();

        let key = (0..)
            .map(|i| format!("k{}", i))
            .find(|k| cluster.owner_of(k) != 0)
            .unwrap();
        client
            .topology
            .write()
            .await
            .reassign(key_slot(&key), &cluster.addresses()[0]);

        let err = client.execute(command::get(&key)).await.unwrap_err();
        assert!(matches!(err, Error::TooManyRedirections { limit: 0 }));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_connect_without_seeds() {
        let result = ClusterClient::connect(Vec::new(), PoolConfig::new("unused"), 5).await;
        assert!(matches!(result, Err(Error::Config { .. })));
    }
}
