//! The seam between the command surface and the topology that serves it.

use futures::future::BoxFuture;
use tracing::{debug, instrument};

use crate::core::command::Cmd;
use crate::core::config::Topology;
use crate::core::pool::{Pool, PoolConfig};
use crate::proto::frame::Frame;
use crate::Result;

/// Executes single commands against some backend topology.
///
/// [`KvClient`](crate::KvClient) holds exactly one backend and sends every
/// attempt of every operation through [`Backend::execute`]; the topology
/// decision is made once, when the backend is built.
pub trait Backend: Send + Sync {
    /// Runs one attempt of `cmd` and returns the reply. Error replies are
    /// already converted into typed errors.
    fn execute(&self, cmd: Cmd) -> BoxFuture<'_, Result<Frame>>;

    /// Which topology this backend talks to.
    fn topology(&self) -> Topology;
}

/// A single node reached through a connection pool.
#[derive(Debug, Clone)]
pub struct StandaloneBackend {
    pool: Pool,
}

impl StandaloneBackend {
    /// Connects to the node, failing fast if it is unreachable.
    pub async fn connect(config: PoolConfig) -> Result<Self> {
        let pool = Pool::connect(config).await?;
        Ok(Self { pool })
    }

    /// The underlying pool.
    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    #[instrument(skip(self, cmd), fields(command = cmd.name()), level = "debug")]
    async fn run(&self, cmd: Cmd) -> Result<Frame> {
        // the guard goes back to the pool however this function exits
        let mut conn = self.pool.get().await?;
        let reply = conn.execute(&cmd).await;
        debug!(ok = reply.is_ok(), "standalone reply");
        reply
    }
}

impl Backend for StandaloneBackend {
    fn execute(&self, cmd: Cmd) -> BoxFuture<'_, Result<Frame>> {
        Box::pin(self.run(cmd))
    }

    fn topology(&self) -> Topology {
        Topology::Standalone
    }
}
