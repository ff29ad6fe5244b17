//! Bounded pool of exclusive connections to one node.
//!
//! Blocking pops hold their connection for as long as the server blocks, so
//! connections are lent out exclusively instead of being multiplexed. A
//! [`PooledConnection`] guard returns its connection on drop, which covers
//! the success path, the error path and cancellation alike.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

use crate::core::command::{self, Cmd};
use crate::core::connection::Connection;
use crate::proto::frame::Frame;
use crate::{Error, Result};

/// Configuration for one node's pool.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct PoolConfig {
    /// `host:port` of the node.
    pub address: String,
    /// Maximum connections open at once (idle + borrowed).
    pub max_total: usize,
    /// Maximum idle connections kept for reuse.
    pub max_idle: usize,
    /// How long a borrow waits for a free slot.
    pub max_wait: Duration,
    /// PING idle connections before lending them out.
    pub test_on_borrow: bool,
    /// Network timeout for each connection.
    pub timeout: Duration,
    /// Database selected on new connections.
    pub database: Option<u8>,
    /// Name announced on new connections.
    pub client_name: Option<String>,
}

impl PoolConfig {
    /// Pool settings for `address` with the standalone defaults.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            max_total: crate::core::config::STANDALONE_MAX_TOTAL,
            max_idle: crate::core::config::STANDALONE_MAX_IDLE,
            max_wait: crate::core::config::STANDALONE_MAX_WAIT,
            test_on_borrow: true,
            timeout: crate::core::config::DEFAULT_TIMEOUT,
            database: None,
            client_name: None,
        }
    }

    /// Sets the capacity.
    pub fn max_total(mut self, max_total: usize) -> Self {
        self.max_total = max_total.max(1);
        self
    }

    /// Sets the idle limit.
    pub fn max_idle(mut self, max_idle: usize) -> Self {
        self.max_idle = max_idle;
        self
    }

    /// Sets the borrow wait limit.
    pub fn max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    /// Sets the network timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Enables or disables PING-on-borrow.
    pub fn test_on_borrow(mut self, enabled: bool) -> Self {
        self.test_on_borrow = enabled;
        self
    }

    /// Selects a logical database on connect.
    pub fn database(mut self, database: Option<u8>) -> Self {
        self.database = database;
        self
    }

    /// Sets the connection name.
    pub fn client_name(mut self, name: Option<String>) -> Self {
        self.client_name = name;
        self
    }
}

#[derive(Debug)]
struct PoolInner {
    config: PoolConfig,
    permits: Arc<Semaphore>,
    idle: Mutex<VecDeque<Connection>>,
}

impl PoolInner {
    fn idle(&self) -> MutexGuard<'_, VecDeque<Connection>> {
        self.idle.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// A cheaply clonable handle to a connection pool.
#[derive(Debug, Clone)]
pub struct Pool {
    inner: Arc<PoolInner>,
}

impl Pool {
    /// Creates an empty pool; no connection is opened yet.
    pub fn new(config: PoolConfig) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                permits: Arc::new(Semaphore::new(config.max_total)),
                idle: Mutex::new(VecDeque::with_capacity(config.max_idle)),
                config,
            }),
        }
    }

    /// Creates a pool and opens one validated connection, so an unreachable
    /// node is reported immediately.
    pub async fn connect(config: PoolConfig) -> Result<Self> {
        let pool = Self::new(config);
        let conn = pool.get().await?;
        drop(conn);
        Ok(pool)
    }

    /// The node address this pool dials.
    pub fn address(&self) -> &str {
        &self.inner.config.address
    }

    /// Number of idle connections ready for reuse.
    pub fn idle_count(&self) -> usize {
        self.inner.idle().len()
    }

    /// Number of connections that could still be borrowed right now.
    pub fn available(&self) -> usize {
        self.inner.permits.available_permits()
    }

    /// Borrows a connection, waiting up to the configured max wait.
    pub async fn get(&self) -> Result<PooledConnection> {
        let config = &self.inner.config;
        let permit = tokio::time::timeout(
            config.max_wait,
            self.inner.permits.clone().acquire_owned(),
        )
        .await
        .map_err(|_| Error::PoolTimeout {
            address: config.address.clone(),
        })?
        .map_err(|_| Error::protocol("connection pool closed"))?;

        loop {
            let candidate = self.inner.idle().pop_front();
            let Some(mut conn) = candidate else {
                break;
            };
            if !config.test_on_borrow {
                return Ok(self.wrap(conn, permit));
            }
            match conn.request(&command::ping().into_frame(), None).await {
                Ok(Frame::SimpleString(_)) => return Ok(self.wrap(conn, permit)),
                _ => debug!(address = %config.address, "discarding stale pooled connection"),
            }
        }

        let conn = self.open().await?;
        Ok(self.wrap(conn, permit))
    }

    async fn open(&self) -> Result<Connection> {
        let config = &self.inner.config;
        let mut conn = Connection::connect(&config.address, config.timeout).await?;
        if let Some(db) = config.database {
            let reply = conn.request(&command::select(db).into_frame(), None).await?;
            command::frame_to_ok(reply)?;
        }
        if let Some(name) = &config.client_name {
            let reply = conn
                .request(&command::client_setname(name).into_frame(), None)
                .await?;
            command::frame_to_ok(reply)?;
        }
        debug!(address = %config.address, "opened connection");
        Ok(conn)
    }

    fn wrap(&self, conn: Connection, permit: OwnedSemaphorePermit) -> PooledConnection {
        PooledConnection {
            conn: Some(conn),
            pool: self.inner.clone(),
            broken: false,
            _permit: permit,
        }
    }
}

/// A borrowed connection. Dropping it hands the connection back to the pool,
/// or discards it if the last exchange left it in an unknown state.
#[derive(Debug)]
pub struct PooledConnection {
    conn: Option<Connection>,
    pool: Arc<PoolInner>,
    broken: bool,
    _permit: OwnedSemaphorePermit,
}

impl PooledConnection {
    /// Sends a raw frame and returns the raw reply.
    pub async fn request(&mut self, frame: &Frame, blocking: Option<Duration>) -> Result<Frame> {
        let Some(conn) = self.conn.as_mut() else {
            return Err(Error::protocol("connection already released"));
        };
        // stays set if this future is dropped mid-exchange
        self.broken = true;
        let result = conn.request(frame, blocking).await;
        self.broken = match &result {
            Ok(_) => false,
            Err(e) => e.poisons_connection(),
        };
        result
    }

    /// Executes a command and returns the reply, with error replies mapped to
    /// typed errors.
    pub async fn execute(&mut self, cmd: &Cmd) -> Result<Frame> {
        let frame = self.request(&cmd.to_frame(), cmd.blocking_time()).await?;
        command::parse_frame_response(frame)
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };
        if self.broken {
            return;
        }
        let mut idle = self.pool.idle();
        if idle.len() < self.pool.config.max_idle {
            idle.push_back(conn);
        }
    }
}
