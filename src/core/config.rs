//! Client configuration.
//!
//! Configuration is read once at startup (from a [`ClientBuilder`] or from
//! the environment) and never changes afterwards.
//!
//! [`ClientBuilder`]: crate::ClientBuilder

use std::fmt;
use std::time::Duration;

use crate::core::retry::RetryPolicy;
use crate::{Error, Result};

/// Default port when an address omits one.
pub const DEFAULT_PORT: u16 = 6379;
/// Cluster: pool capacity per node when `max_total` is 0.
pub const DEFAULT_CLUSTER_MAX_TOTAL: usize = 1500;
/// Cluster: redirect limit when unset or non-positive.
pub const DEFAULT_MAX_REDIRECTIONS: u32 = 200;
/// Network timeout when unset.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(10_000);
/// Standalone: pool capacity.
pub const STANDALONE_MAX_TOTAL: usize = 500;
/// Standalone: idle connections kept around.
pub const STANDALONE_MAX_IDLE: usize = 10;
/// Standalone: how long a borrow may wait for a free connection.
pub const STANDALONE_MAX_WAIT: Duration = Duration::from_millis(100_000);

/// Backend topology, fixed for the lifetime of a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Topology {
    /// One node behind a connection pool.
    #[default]
    Standalone,
    /// A sharded cluster with slot routing and redirections.
    Clustered,
}

/// A parsed `host:port` server address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServerAddr {
    /// Host name or IP literal.
    pub host: String,
    /// TCP port.
    pub port: u16,
}

impl ServerAddr {
    /// Parses `host:port`, `host` or `redis://host:port`.
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        let with_scheme = if input.contains("://") {
            input.to_string()
        } else {
            format!("redis://{}", input)
        };

        let url = url::Url::parse(&with_scheme)
            .map_err(|e| Error::config(format!("invalid server address {:?}: {}", input, e)))?;
        if url.scheme() != "redis" {
            return Err(Error::config(format!(
                "invalid scheme in {:?}, expected redis://",
                input
            )));
        }
        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| Error::config(format!("missing host in {:?}", input)))?;

        Ok(Self {
            host: host.to_string(),
            port: url.port().unwrap_or(DEFAULT_PORT),
        })
    }
}

impl fmt::Display for ServerAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Everything needed to construct a [`KvClient`](crate::KvClient).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Seed nodes; standalone mode uses the first one.
    pub servers: Vec<ServerAddr>,
    /// Which backend to build.
    pub topology: Topology,
    /// Pool capacity (per node in cluster mode). `0` selects the default.
    pub max_total: usize,
    /// Cluster redirect limit. `0` selects the default.
    pub max_redirections: u32,
    /// Network timeout for connect, read and write.
    pub timeout: Duration,
    /// Logical database selected on every standalone connection.
    pub database: Option<u8>,
    /// Name announced with `CLIENT SETNAME`.
    pub client_name: Option<String>,
    /// How failed commands are retried.
    pub retry: RetryPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            servers: Vec::new(),
            topology: Topology::Standalone,
            max_total: 0,
            max_redirections: 0,
            timeout: DEFAULT_TIMEOUT,
            database: None,
            client_name: None,
            retry: RetryPolicy::default(),
        }
    }
}

impl ClientConfig {
    /// Parses a comma-separated server list. Blank entries are skipped; an
    /// empty result is a configuration error.
    pub fn parse_servers(servers: &str) -> Result<Vec<ServerAddr>> {
        let parsed = servers
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ServerAddr::parse)
            .collect::<Result<Vec<_>>>()?;

        if parsed.is_empty() {
            return Err(Error::config("redis servers is empty, check config setting"));
        }
        Ok(parsed)
    }

    /// Reads the configuration from `REDIS_*` environment variables.
    ///
    /// | variable                 | meaning                        |
    /// |--------------------------|--------------------------------|
    /// | `REDIS_SERVERS`          | comma-separated `host:port`    |
    /// | `REDIS_CLUSTER`          | `true`/`1` for cluster mode    |
    /// | `REDIS_MAX_TOTAL`        | pool capacity                  |
    /// | `REDIS_MAX_REDIRECTIONS` | cluster redirect limit         |
    /// | `REDIS_TIMEOUT_MS`       | network timeout (ms)           |
    /// | `REDIS_DATABASE`         | logical database (standalone)  |
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let servers = lookup("REDIS_SERVERS").unwrap_or_default();
        let mut config = ClientConfig {
            servers: Self::parse_servers(&servers)?,
            ..Default::default()
        };

        if let Some(flag) = lookup("REDIS_CLUSTER") {
            if matches!(flag.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes") {
                config.topology = Topology::Clustered;
            }
        }
        if let Some(v) = lookup("REDIS_MAX_TOTAL") {
            config.max_total = parse_number("REDIS_MAX_TOTAL", &v)?;
        }
        if let Some(v) = lookup("REDIS_MAX_REDIRECTIONS") {
            // non-positive means "use the default"
            let n: i64 = parse_number("REDIS_MAX_REDIRECTIONS", &v)?;
            config.max_redirections = n.max(0) as u32;
        }
        if let Some(v) = lookup("REDIS_TIMEOUT_MS") {
            let ms: i64 = parse_number("REDIS_TIMEOUT_MS", &v)?;
            config.timeout = Duration::from_millis(ms.max(0) as u64);
        }
        if let Some(v) = lookup("REDIS_DATABASE") {
            config.database = Some(parse_number("REDIS_DATABASE", &v)?);
        }
        Ok(config)
    }

    /// Validates the configuration and fills in defaults.
    pub fn normalize(mut self) -> Result<Self> {
        if self.servers.is_empty() {
            return Err(Error::config("redis servers is empty, check config setting"));
        }
        if self.timeout.is_zero() {
            self.timeout = DEFAULT_TIMEOUT;
        }
        match self.topology {
            Topology::Clustered => {
                if self.max_total == 0 {
                    self.max_total = DEFAULT_CLUSTER_MAX_TOTAL;
                }
                if self.max_redirections == 0 {
                    self.max_redirections = DEFAULT_MAX_REDIRECTIONS;
                }
            }
            Topology::Standalone => {
                if self.max_total == 0 {
                    self.max_total = STANDALONE_MAX_TOTAL;
                }
            }
        }
        Ok(self)
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::config(format!("{} is not a number: {:?}", name, value)))
}
