use std::time::Duration;

use crate::core::config::{ClientConfig, Topology};
use crate::core::retry::RetryPolicy;
use crate::{Error, KvClient};

/// Builder for configuring and creating a [`KvClient`].
///
/// # Example
///
/// ```no_run
/// use kvbridge::ClientBuilder;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let client = ClientBuilder::new()
///     .servers("10.0.0.1:7000,10.0.0.2:7000")
///     .cluster(true)
///     .max_redirections(16)
///     .build()
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct ClientBuilder {
    servers: Option<String>,
    topology: Topology,
    max_total: usize,
    max_redirections: u32,
    timeout: Option<Duration>,
    database: Option<u8>,
    client_name: Option<String>,
    retry: Option<RetryPolicy>,
}

impl ClientBuilder {
    /// Creates a new [`ClientBuilder`] instance.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the server list.
    ///
    /// # Arguments
    ///
    /// * `servers` - Comma-separated `host:port` entries; standalone mode
    ///   uses the first one, cluster mode treats all of them as seeds
    #[inline]
    pub fn servers(mut self, servers: impl Into<String>) -> Self {
        self.servers = Some(servers.into());
        self
    }

    /// Selects cluster (`true`) or standalone (`false`) mode.
    #[inline]
    pub fn cluster(mut self, enabled: bool) -> Self {
        self.topology = if enabled {
            Topology::Clustered
        } else {
            Topology::Standalone
        };
        self
    }

    /// Sets the pool capacity (per node in cluster mode). `0` keeps the
    /// default.
    #[inline]
    pub fn max_total(mut self, max_total: usize) -> Self {
        self.max_total = max_total;
        self
    }

    /// Sets how many redirections one cluster command may follow.
    #[inline]
    pub fn max_redirections(mut self, max_redirections: u32) -> Self {
        self.max_redirections = max_redirections;
        self
    }

    /// Sets the network timeout for connect, read and write.
    #[inline]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the logical database selected on standalone connections.
    ///
    /// # Arguments
    ///
    /// * `database` - Database number (0-15)
    #[inline]
    pub fn database(mut self, database: u8) -> Self {
        self.database = Some(database);
        self
    }

    /// Sets the client connection name.
    ///
    /// # Arguments
    ///
    /// * `name` - Client name displayed in `CLIENT LIST`
    #[inline]
    pub fn client_name(mut self, name: impl Into<String>) -> Self {
        self.client_name = Some(name.into());
        self
    }

    /// Sets the retry policy. Defaults to retrying forever every 30 seconds.
    #[inline]
    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Produces the configuration without connecting.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the server list is missing, empty or
    /// malformed.
    pub fn config(&self) -> Result<ClientConfig, Error> {
        let servers = ClientConfig::parse_servers(self.servers.as_deref().unwrap_or_default())?;
        let mut config = ClientConfig {
            servers,
            topology: self.topology,
            max_total: self.max_total,
            max_redirections: self.max_redirections,
            database: self.database,
            client_name: self.client_name.clone(),
            retry: self.retry.clone().unwrap_or_default(),
            ..Default::default()
        };
        if let Some(timeout) = self.timeout {
            config.timeout = timeout;
        }
        config.normalize()
    }

    /// Builds the [`KvClient`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the server list is unusable.
    /// Returns [`Error::Io`] if the standalone node or every cluster seed is
    /// unreachable.
    pub async fn build(self) -> Result<KvClient, Error> {
        KvClient::connect(self.config()?).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_new() {
        let builder = ClientBuilder::new();
        assert!(builder.servers.is_none());
        assert_eq!(builder.topology, Topology::Standalone);
    }

    #[test]
    fn test_builder_set_servers() {
        let builder = ClientBuilder::new().servers("127.0.0.1:6379");
        assert_eq!(builder.servers, Some("127.0.0.1:6379".to_string()));
    }

    #[test]
    fn test_builder_set_cluster() {
        assert_eq!(ClientBuilder::new().cluster(true).topology, Topology::Clustered);
        assert_eq!(
            ClientBuilder::new().cluster(true).cluster(false).topology,
            Topology::Standalone
        );
    }

    #[test]
    fn test_builder_chaining() {
        let config = ClientBuilder::new()
            .servers("127.0.0.1:7000, 127.0.0.1:7001")
            .cluster(true)
            .max_redirections(5)
            .timeout(Duration::from_millis(250))
            .client_name("worker")
            .retry_policy(RetryPolicy::bounded(3, Duration::from_secs(1)))
            .config()
            .unwrap();

        assert_eq!(config.servers.len(), 2);
        assert_eq!(config.topology, Topology::Clustered);
        assert_eq!(config.max_total, 1500);
        assert_eq!(config.max_redirections, 5);
        assert_eq!(config.timeout, Duration::from_millis(250));
        assert_eq!(config.client_name.as_deref(), Some("worker"));
        assert_eq!(config.retry.max_attempts(), Some(3));
    }

    #[tokio::test]
    async fn test_builder_build_without_servers() {
        let result = ClientBuilder::new().build().await;
        match result {
            Err(Error::Config { message }) => {
                assert_eq!(message, "redis servers is empty, check config setting");
            }
            other => panic!("expected Config error, got {:?}", other),
        }
    }
}
