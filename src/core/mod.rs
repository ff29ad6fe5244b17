//! # Core
//!
//! The command surface of the crate: [`KvClient`] and everything it is
//! built from.
//!
//! ## Modules
//!
//! - [`backend`] - The standalone/cluster seam
//! - [`builder`] - Client builder
//! - [`command`] - Command builders and reply converters
//! - [`config`] - Startup configuration
//! - [`connection`] - Single connection management
//! - [`pool`] - Bounded connection pool
//! - [`retry`] - Retry policy and backoff
//!

#![warn(missing_docs)]

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::info;

pub use crate::proto::error::{Error, Result};

use crate::cluster::ClusterClient;
use crate::proto::frame::Frame;

/// The standalone/cluster seam.
pub mod backend;
/// Client builder configuration.
pub mod builder;
/// Command construction helpers.
pub mod command;
/// Startup configuration.
pub mod config;
/// Low-level connection management.
pub mod connection;
/// Connection pooling.
pub mod pool;
/// Retry policy.
pub mod retry;

use backend::{Backend, StandaloneBackend};
use command::{Cmd, SortOptions};
use config::{ClientConfig, Topology};
use pool::PoolConfig;
use retry::RetryPolicy;

/// Per-key wait used when polling several keys of a cluster for a blocking
/// pop, since one multi-key blocking command cannot span slots.
const CLUSTER_POLL_SECS: u64 = 1;

/// Key-value client working against one node or a whole cluster.
///
/// Every operation is one command (or a short, documented sequence of
/// commands) run through the client's [`RetryPolicy`]: transient failures
/// are logged, waited out and retried, while server-side errors such as
/// `WRONGTYPE` come straight back as [`Error::Server`].
///
/// Cloning is cheap and clones share the backend, so a single client built
/// at startup can be handed to every part of the application.
///
/// # Example
///
/// ```no_run
/// use kvbridge::ClientBuilder;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = ClientBuilder::new()
///         .servers("127.0.0.1:6379")
///         .build()
///         .await?;
///     client.set("greeting", "hello").await?;
///     assert_eq!(client.get("greeting").await?.as_deref(), Some("hello"));
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct KvClient {
    backend: Arc<dyn Backend>,
    retry: RetryPolicy,
    cancel: Option<CancellationToken>,
}

impl fmt::Debug for KvClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KvClient")
            .field("topology", &self.backend.topology())
            .field("retry", &self.retry)
            .field("cancellable", &self.cancel.is_some())
            .finish()
    }
}

impl KvClient {
    /// Builds the backend selected by `config.topology` and connects it.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] if the server list is empty. Standalone mode opens
    /// one connection up front, so an unreachable node fails here too.
    pub async fn connect(config: ClientConfig) -> Result<Self> {
        let config = config.normalize()?;
        let first = config
            .servers
            .first()
            .ok_or_else(|| Error::config("redis servers is empty, check config setting"))?;

        let backend: Arc<dyn Backend> = match config.topology {
            Topology::Standalone => {
                let pool = PoolConfig::new(first.to_string())
                    .max_total(config.max_total)
                    .timeout(config.timeout)
                    .database(config.database)
                    .client_name(config.client_name.clone());
                Arc::new(StandaloneBackend::connect(pool).await?)
            }
            Topology::Clustered => {
                let template = PoolConfig::new(String::new())
                    .max_total(config.max_total)
                    .timeout(config.timeout)
                    .client_name(config.client_name.clone());
                Arc::new(
                    ClusterClient::connect(
                        config.servers.clone(),
                        template,
                        config.max_redirections,
                    )
                    .await?,
                )
            }
        };

        info!(
            topology = ?config.topology,
            servers = config.servers.len(),
            max_total = config.max_total,
            timeout_ms = config.timeout.as_millis() as u64,
            "key-value client initialized"
        );
        Ok(Self::from_backend(backend, config.retry))
    }

    /// Wraps an existing backend.
    pub fn from_backend(backend: Arc<dyn Backend>, retry: RetryPolicy) -> Self {
        Self {
            backend,
            retry,
            cancel: None,
        }
    }

    /// Returns a clone whose operations stop with [`Error::Cancelled`] once
    /// `token` is cancelled, including while waiting between retries.
    pub fn with_cancellation(&self, token: CancellationToken) -> Self {
        Self {
            cancel: Some(token),
            ..self.clone()
        }
    }

    /// Returns a clone using a different retry policy.
    pub fn with_retry_policy(&self, retry: RetryPolicy) -> Self {
        Self {
            retry,
            ..self.clone()
        }
    }

    /// The topology this client talks to.
    pub fn topology(&self) -> Topology {
        self.backend.topology()
    }

    /// The retry policy in effect.
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    async fn run<T>(&self, cmd: Cmd, convert: fn(Frame) -> Result<T>) -> Result<T> {
        let name = cmd.name().to_string();
        self.retry
            .run(&name, self.cancel.as_ref(), || {
                let cmd = cmd.clone();
                async move { convert(self.backend.execute(cmd).await?) }
            })
            .await
    }

    // ---- strings and keys ----

    /// Gets the value of `key`; `None` if it does not exist.
    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        self.run(command::get(key), command::frame_to_string).await
    }

    /// Sets `key` to `value` with no expiry.
    pub async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.run(command::set(key, value), command::frame_to_ok).await
    }

    /// Sets `key` to `value`, expiring after `seconds` (SETEX).
    pub async fn set_with_expiry(&self, key: &str, value: &str, seconds: u64) -> Result<()> {
        self.run(command::setex(key, seconds, value), command::frame_to_ok)
            .await
    }

    /// Sets `key` only if it does not exist yet. Returns true if it was set.
    pub async fn set_if_not_exist(&self, key: &str, value: &str) -> Result<bool> {
        self.run(command::setnx(key, value), command::frame_to_bool)
            .await
    }

    /// Increments the integer at `key` and returns the new value.
    pub async fn incr(&self, key: &str) -> Result<i64> {
        self.run(command::incr(key), command::frame_to_int).await
    }

    /// Deletes `key`. Returns the number of keys removed (0 or 1).
    pub async fn del(&self, key: &str) -> Result<i64> {
        self.run(command::del(key), command::frame_to_int).await
    }

    /// Deletes several keys, one command per key so that keys in different
    /// cluster slots are fine. Returns the number of keys removed.
    pub async fn del_many(&self, keys: &[&str]) -> Result<i64> {
        let mut removed = 0;
        for key in keys {
            removed += self.del(key).await?;
        }
        Ok(removed)
    }

    /// Returns true if `key` exists.
    pub async fn exists(&self, key: &str) -> Result<bool> {
        self.run(command::exists(key), command::frame_to_bool).await
    }

    /// Remaining time to live in seconds. `-1` means no expiry, `-2` means
    /// the key does not exist.
    pub async fn ttl(&self, key: &str) -> Result<i64> {
        self.run(command::ttl(key), command::frame_to_int).await
    }

    /// Sets a timeout on `key`. Returns false if the key does not exist.
    pub async fn expire(&self, key: &str, seconds: i64) -> Result<bool> {
        self.run(command::expire(key, seconds), command::frame_to_bool)
            .await
    }

    /// Expires `key` at a unix timestamp (seconds).
    pub async fn expire_at(&self, key: &str, unix_time: i64) -> Result<bool> {
        self.run(command::expireat(key, unix_time), command::frame_to_bool)
            .await
    }

    /// Removes the timeout on `key`. Returns false if there was none.
    pub async fn persist(&self, key: &str) -> Result<bool> {
        self.run(command::persist(key), command::frame_to_bool).await
    }

    // ---- sorted sets ----

    /// Adds `member` with `score`. Returns the number of new members.
    pub async fn zadd(&self, key: &str, score: f64, member: &str) -> Result<i64> {
        self.run(command::zadd(key, score, member), command::frame_to_int)
            .await
    }

    /// Adds several `(member, score)` pairs in one command.
    pub async fn zadd_many(&self, key: &str, members: &[(&str, f64)]) -> Result<i64> {
        if members.is_empty() {
            return Ok(0);
        }
        self.run(
            command::zadd_many(key, members.iter().copied()),
            command::frame_to_int,
        )
        .await
    }

    /// Removes `member`. Returns the number of members removed.
    pub async fn zrem(&self, key: &str, member: &str) -> Result<i64> {
        self.run(command::zrem(key, member), command::frame_to_int)
            .await
    }

    /// Members with a score in `[min, max]`, lowest score first. Infinite
    /// bounds are allowed.
    pub async fn zrange_by_score(&self, key: &str, min: f64, max: f64) -> Result<Vec<String>> {
        let cmd = command::zrangebyscore(key, &score_bound(min), &score_bound(max));
        self.run(cmd, command::frame_to_vec_string).await
    }

    /// Members by rank, `stop = -1` meaning the last one.
    pub async fn zrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>> {
        self.run(command::zrange(key, start, stop), command::frame_to_vec_string)
            .await
    }

    /// Number of members.
    pub async fn zcard(&self, key: &str) -> Result<i64> {
        self.run(command::zcard(key), command::frame_to_int).await
    }

    /// Adds `increment` to the score of `member` and returns the new score.
    pub async fn zincrby(&self, key: &str, increment: f64, member: &str) -> Result<f64> {
        self.run(command::zincrby(key, increment, member), |frame| {
            command::frame_to_float(frame)?
                .ok_or_else(|| Error::unexpected_reply("ZINCRBY returned no score"))
        })
        .await
    }

    /// Returns true if `member` is in the sorted set.
    pub async fn zexists(&self, key: &str, member: &str) -> Result<bool> {
        self.run(command::zscore(key, member), |frame| {
            Ok(command::frame_to_float(frame)?.is_some())
        })
        .await
    }

    // ---- sets ----

    /// Adds members. Returns how many were not already present.
    pub async fn sadd(&self, key: &str, members: &[&str]) -> Result<i64> {
        if members.is_empty() {
            return Ok(0);
        }
        self.run(command::sadd(key, members), command::frame_to_int)
            .await
    }

    /// Removes members. Returns how many were present.
    pub async fn srem(&self, key: &str, members: &[&str]) -> Result<i64> {
        if members.is_empty() {
            return Ok(0);
        }
        self.run(command::srem(key, members), command::frame_to_int)
            .await
    }

    /// Number of members.
    pub async fn scard(&self, key: &str) -> Result<i64> {
        self.run(command::scard(key), command::frame_to_int).await
    }

    /// Removes and returns a random member.
    pub async fn spop(&self, key: &str) -> Result<Option<String>> {
        self.run(command::spop(key, None), command::frame_to_string)
            .await
    }

    /// Removes and returns up to `count` random members.
    pub async fn spop_count(&self, key: &str, count: u64) -> Result<Vec<String>> {
        self.run(command::spop(key, Some(count)), command::frame_to_vec_string)
            .await
    }

    /// Returns true if `member` is in the set.
    pub async fn sismember(&self, key: &str, member: &str) -> Result<bool> {
        self.run(command::sismember(key, member), command::frame_to_bool)
            .await
    }

    /// All members.
    pub async fn smembers(&self, key: &str) -> Result<HashSet<String>> {
        self.run(command::smembers(key), command::frame_to_set).await
    }

    // ---- hashes ----

    /// Sets one field. Returns 1 if the field is new, 0 if it was updated.
    pub async fn hset(&self, key: &str, field: &str, value: &str) -> Result<i64> {
        self.run(command::hset(key, field, value), command::frame_to_int)
            .await
    }

    /// Sets several fields at once.
    pub async fn hmset(&self, key: &str, fields: &[(&str, &str)]) -> Result<()> {
        if fields.is_empty() {
            return Ok(());
        }
        self.run(
            command::hmset(key, fields.iter().copied()),
            command::frame_to_ok,
        )
        .await
    }

    /// Value of `field`; `None` if the field or key does not exist.
    pub async fn hget(&self, key: &str, field: &str) -> Result<Option<String>> {
        self.run(command::hget(key, field), command::frame_to_string)
            .await
    }

    /// Returns true if `field` exists.
    pub async fn hexists(&self, key: &str, field: &str) -> Result<bool> {
        self.run(command::hexists(key, field), command::frame_to_bool)
            .await
    }

    /// All values.
    pub async fn hvals(&self, key: &str) -> Result<Vec<String>> {
        self.run(command::hvals(key), command::frame_to_vec_string)
            .await
    }

    /// All field names.
    pub async fn hkeys(&self, key: &str) -> Result<HashSet<String>> {
        self.run(command::hkeys(key), command::frame_to_set).await
    }

    // ---- lists ----

    /// Pushes values onto the head. Returns the new length.
    pub async fn lpush(&self, key: &str, values: &[&str]) -> Result<i64> {
        if values.is_empty() {
            return self.llen(key).await;
        }
        self.run(command::lpush(key, values), command::frame_to_int)
            .await
    }

    /// Pushes values onto the tail. Returns the new length.
    pub async fn rpush(&self, key: &str, values: &[&str]) -> Result<i64> {
        if values.is_empty() {
            return self.llen(key).await;
        }
        self.run(command::rpush(key, values), command::frame_to_int)
            .await
    }

    /// Removes and returns the head element.
    pub async fn lpop(&self, key: &str) -> Result<Option<String>> {
        self.run(command::lpop(key), command::frame_to_string).await
    }

    /// Removes and returns the tail element.
    pub async fn rpop(&self, key: &str) -> Result<Option<String>> {
        self.run(command::rpop(key), command::frame_to_string).await
    }

    /// Pops the head of `key`, waiting up to `timeout_secs` for an element
    /// (`0` waits forever). `None` on timeout.
    pub async fn blpop(&self, key: &str, timeout_secs: u64) -> Result<Option<String>> {
        self.run(command::blpop(&[key], timeout_secs), command::frame_to_popped)
            .await
    }

    /// Pops the tail of `key`, waiting up to `timeout_secs` for an element
    /// (`0` waits forever). `None` on timeout.
    pub async fn brpop(&self, key: &str, timeout_secs: u64) -> Result<Option<String>> {
        self.run(command::brpop(&[key], timeout_secs), command::frame_to_popped)
            .await
    }

    /// Pops the head of the first non-empty list among `keys`, returning the
    /// key it came from and the value.
    ///
    /// On a single node this is one atomic `BLPOP`. In a cluster the keys
    /// may live on different nodes, so each key is polled in turn for one
    /// second until an element shows up or `timeout_secs` has passed.
    pub async fn blpop_multi(
        &self,
        keys: &[&str],
        timeout_secs: u64,
    ) -> Result<Option<(String, String)>> {
        self.blocking_pop_multi(keys, timeout_secs, command::blpop)
            .await
    }

    /// Tail-popping counterpart of [`KvClient::blpop_multi`].
    pub async fn brpop_multi(
        &self,
        keys: &[&str],
        timeout_secs: u64,
    ) -> Result<Option<(String, String)>> {
        self.blocking_pop_multi(keys, timeout_secs, command::brpop)
            .await
    }

    async fn blocking_pop_multi(
        &self,
        keys: &[&str],
        timeout_secs: u64,
        build: fn(&[&str], u64) -> Cmd,
    ) -> Result<Option<(String, String)>> {
        if keys.is_empty() {
            return Err(Error::InvalidArgument {
                message: "blocking pop needs at least one key".to_string(),
            });
        }
        if self.topology() == Topology::Standalone {
            return self
                .run(build(keys, timeout_secs), command::frame_to_key_value)
                .await;
        }

        let deadline = (timeout_secs > 0)
            .then(|| tokio::time::Instant::now() + Duration::from_secs(timeout_secs));
        loop {
            for key in keys {
                let popped = self
                    .run(build(&[*key], CLUSTER_POLL_SECS), command::frame_to_key_value)
                    .await?;
                if popped.is_some() {
                    return Ok(popped);
                }
                if deadline.is_some_and(|d| tokio::time::Instant::now() >= d) {
                    return Ok(None);
                }
            }
        }
    }

    /// Elements in `[start, stop]`, `stop = -1` meaning the tail.
    pub async fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>> {
        self.run(command::lrange(key, start, stop), command::frame_to_vec_string)
            .await
    }

    /// Element at `index`; negative indexes count from the tail.
    pub async fn lindex(&self, key: &str, index: i64) -> Result<Option<String>> {
        self.run(command::lindex(key, index), command::frame_to_string)
            .await
    }

    /// Overwrites the element at `index`.
    pub async fn lset(&self, key: &str, index: i64, value: &str) -> Result<()> {
        self.run(command::lset(key, index, value), command::frame_to_ok)
            .await
    }

    /// Removes elements equal to `value`: the first `count` from the head
    /// when positive, from the tail when negative, all when zero.
    pub async fn lrem(&self, key: &str, count: i64, value: &str) -> Result<i64> {
        self.run(command::lrem(key, count, value), command::frame_to_int)
            .await
    }

    /// Length of the list; 0 if it does not exist.
    pub async fn llen(&self, key: &str) -> Result<i64> {
        self.run(command::llen(key), command::frame_to_int).await
    }

    /// Returns true if some element equals `value`. Scans the whole list.
    pub async fn exists_in_list(&self, key: &str, value: &str) -> Result<bool> {
        Ok(self.lrange(key, 0, -1).await?.iter().any(|v| v == value))
    }

    /// Pushes `value` onto the head unless an equal element is already in
    /// the list. Returns true if it was pushed.
    ///
    /// The check and the push are two commands, so two callers racing on
    /// the same value can both push it.
    pub async fn lpush_unique(&self, key: &str, value: &str) -> Result<bool> {
        if self.exists_in_list(key, value).await? {
            return Ok(false);
        }
        self.lpush(key, &[value]).await?;
        Ok(true)
    }

    // ---- sort ----

    /// Sorts a list, set or sorted set and returns the result.
    ///
    /// With `GET` patterns the reply holds one entry per pattern per element,
    /// in order; a pattern naming a missing key yields `None` in its place.
    pub async fn sort(&self, key: &str, options: &SortOptions) -> Result<Vec<Option<String>>> {
        self.run(command::sort(key, options), command::frame_to_vec_opt_string)
            .await
    }
}

fn score_bound(score: f64) -> String {
    if score == f64::INFINITY {
        "+inf".to_string()
    } else if score == f64::NEG_INFINITY {
        "-inf".to_string()
    } else {
        score.to_string()
    }
}
