//! Typed caching on top of [`KvClient`].
//!
//! [`TypedCache`] stores domain values as encoded strings (JSON by default)
//! so callers deal with their own types instead of raw strings. Reads that
//! find nothing usable, whether the key is missing, blank or holds
//! something the codec cannot decode, come back as `None`; failures of the
//! backend itself are still reported as errors.

mod codec;

pub use codec::{Codec, JsonCodec};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::{KvClient, Result};

/// A typed façade over one [`KvClient`].
///
/// # Example
///
/// ```no_run
/// use kvbridge::{ClientBuilder, TypedCache};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct Session {
///     user_id: u64,
/// }
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let client = ClientBuilder::new().servers("127.0.0.1:6379").build().await?;
/// let cache = TypedCache::new(client);
///
/// cache.set_with_expiry("session:abc", &Session { user_id: 42 }, 3600).await?;
/// let session: Option<Session> = cache.get("session:abc").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct TypedCache<C = JsonCodec> {
    client: KvClient,
    codec: C,
}

impl TypedCache<JsonCodec> {
    /// Creates a JSON-encoding cache.
    pub fn new(client: KvClient) -> Self {
        Self::with_codec(client, JsonCodec)
    }
}

impl<C: Codec> TypedCache<C> {
    /// Creates a cache using `codec`.
    pub fn with_codec(client: KvClient, codec: C) -> Self {
        Self { client, codec }
    }

    /// The underlying client, for raw operations.
    pub fn client(&self) -> &KvClient {
        &self.client
    }

    fn encode<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Option<String> {
        match self.codec.encode(value) {
            Ok(raw) if is_empty_encoding(&raw) => {
                debug!(key, "empty encoding, write skipped");
                None
            }
            Ok(raw) => Some(raw),
            Err(e) => {
                warn!(key, error = %e, "value could not be encoded, write skipped");
                None
            }
        }
    }

    fn decode<T: DeserializeOwned>(&self, key: &str, raw: &str) -> Option<T> {
        if raw.trim().is_empty() {
            return None;
        }
        match self.codec.decode(raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, error = %e, "stored value could not be decoded");
                None
            }
        }
    }

    /// Reads and decodes `key`. Missing, blank and undecodable values are all
    /// `None`.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let raw = self.client.get(key).await?;
        Ok(raw.and_then(|raw| self.decode(key, &raw)))
    }

    /// Stores `value` with no expiry. Returns false if the value encoded to
    /// nothing and the write was skipped.
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<bool> {
        self.set_with_expiry(key, value, 0).await
    }

    /// Stores `value`, expiring after `ttl_secs`; `ttl_secs <= 0` stores it
    /// without expiry. Returns false if the write was skipped.
    pub async fn set_with_expiry<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl_secs: i64,
    ) -> Result<bool> {
        let Some(raw) = self.encode(key, value) else {
            return Ok(false);
        };
        self.set_string_with_expiry(key, &raw, ttl_secs).await?;
        Ok(true)
    }

    /// Deletes `key`. Returns the number of keys removed, so a second call
    /// returns 0.
    pub async fn delete(&self, key: &str) -> Result<i64> {
        self.client.del(key).await
    }

    /// Pops and decodes the head of the list at `key`, waiting up to
    /// `timeout_secs` (`0` = forever). `None` on timeout.
    pub async fn blocking_pop<T: DeserializeOwned>(
        &self,
        key: &str,
        timeout_secs: u64,
    ) -> Result<Option<T>> {
        let raw = self.client.blpop(key, timeout_secs).await?;
        Ok(raw.and_then(|raw| self.decode(key, &raw)))
    }

    /// Encodes `value` and appends it to the list at `key`. Returns false if
    /// the push was skipped.
    pub async fn push_tail<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<bool> {
        let Some(raw) = self.encode(key, value) else {
            return Ok(false);
        };
        self.client.rpush(key, &[raw.as_str()]).await?;
        Ok(true)
    }

    /// Decodes the list elements in `[start, end]` (`end = -1` for the tail),
    /// in stored order. `None` when the range is empty.
    pub async fn range<T: DeserializeOwned>(
        &self,
        key: &str,
        start: i64,
        end: i64,
    ) -> Result<Option<Vec<T>>> {
        let raw = self.client.lrange(key, start, end).await?;
        if raw.is_empty() {
            return Ok(None);
        }
        Ok(Some(
            raw.iter().filter_map(|item| self.decode(key, item)).collect(),
        ))
    }

    /// Length of the list at `key`.
    pub async fn len(&self, key: &str) -> Result<i64> {
        self.client.llen(key).await
    }

    /// Reads `key` as a plain string.
    pub async fn get_string(&self, key: &str) -> Result<Option<String>> {
        self.client.get(key).await
    }

    /// Stores a plain string with no expiry.
    pub async fn set_string(&self, key: &str, value: &str) -> Result<()> {
        self.client.set(key, value).await
    }

    /// Stores a plain string, expiring after `ttl_secs` (`<= 0` = never).
    pub async fn set_string_with_expiry(&self, key: &str, value: &str, ttl_secs: i64) -> Result<()> {
        if ttl_secs <= 0 {
            self.client.set(key, value).await
        } else {
            self.client.set_with_expiry(key, value, ttl_secs as u64).await
        }
    }

    /// Returns true if `member` is in the sorted set.
    pub async fn zexists(&self, key: &str, member: &str) -> Result<bool> {
        self.client.zexists(key, member).await
    }

    /// Removes `member`; reports success whether or not it was present.
    pub async fn zrem(&self, key: &str, member: &str) -> Result<bool> {
        self.client.zrem(key, member).await?;
        Ok(true)
    }

    /// Members with a score in `[min, max]`.
    pub async fn zrange_by_score(&self, key: &str, min: f64, max: f64) -> Result<Vec<String>> {
        self.client.zrange_by_score(key, min, max).await
    }

    /// Adds several `(member, score)` pairs.
    pub async fn zadd_many(&self, key: &str, members: &[(&str, f64)]) -> Result<i64> {
        self.client.zadd_many(key, members).await
    }

    /// Adds one member.
    pub async fn zadd(&self, key: &str, score: f64, member: &str) -> Result<i64> {
        self.client.zadd(key, score, member).await
    }

    /// Number of sorted-set members.
    pub async fn zcard(&self, key: &str) -> Result<i64> {
        self.client.zcard(key).await
    }

    /// Sets a timeout on `key`; reports success whether or not the key
    /// existed.
    pub async fn expire(&self, key: &str, seconds: i64) -> Result<bool> {
        self.client.expire(key, seconds).await?;
        Ok(true)
    }

    /// Remaining time to live in seconds.
    pub async fn ttl(&self, key: &str) -> Result<i64> {
        self.client.ttl(key).await
    }
}

/// `""` and `null` carry no value worth storing.
fn is_empty_encoding(raw: &str) -> bool {
    let raw = raw.trim();
    raw.is_empty() || raw == "null"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{ClientConfig, ServerAddr};
    use crate::testing::MockServer;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Job {
        id: u32,
        name: String,
    }

    async fn cache(server: &MockServer) -> TypedCache {
        let config = ClientConfig {
            servers: vec![ServerAddr::parse(&server.address()).unwrap()],
            ..Default::default()
        };
        TypedCache::new(KvClient::connect(config).await.unwrap())
    }

    #[test]
    fn test_is_empty_encoding() {
        assert!(is_empty_encoding(""));
        assert!(is_empty_encoding("null"));
        assert!(is_empty_encoding("  "));
        assert!(!is_empty_encoding("\"\""));
        assert!(!is_empty_encoding("0"));
    }

    #[tokio::test]
    async fn test_undecodable_value_reads_as_none() {
        let server = MockServer::start().await;
        let cache = cache(&server).await;

        cache.set_string("job:1", "{broken").await.unwrap();
        assert_eq!(cache.get::<Job>("job:1").await.unwrap(), None);
        assert_eq!(
            cache.get_string("job:1").await.unwrap().as_deref(),
            Some("{broken")
        );
    }

    #[tokio::test]
    async fn test_blank_value_reads_as_none() {
        let server = MockServer::start().await;
        let cache = cache(&server).await;

        cache.set_string("job:2", "").await.unwrap();
        assert_eq!(cache.get::<Job>("job:2").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_range_skips_undecodable_elements() {
        let server = MockServer::start().await;
        let cache = cache(&server).await;
        let job = Job {
            id: 1,
            name: "a".to_string(),
        };

        cache.push_tail("jobs", &job).await.unwrap();
        cache.client().rpush("jobs", &["garbage"]).await.unwrap();

        assert_eq!(cache.range::<Job>("jobs", 0, -1).await.unwrap(), Some(vec![job]));
        assert_eq!(cache.len("jobs").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_wrappers_report_success() {
        let server = MockServer::start().await;
        let cache = cache(&server).await;

        assert!(cache.zrem("board", "nobody").await.unwrap());
        assert!(cache.expire("missing", 10).await.unwrap());
    }
}
