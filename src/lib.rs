//! # kvbridge
//!
//! Key-value client for Redis-compatible servers that works the same way
//! against a single node or a sharded cluster, plus a typed caching layer
//! on top of it.
//!
//! - [`KvClient`] exposes strings, keys, sorted sets, sets, hashes, lists and
//!   `SORT` behind one API. Whether it talks to one node or a cluster is
//!   decided once, at construction.
//! - Transient failures (connection drops, timeouts, cluster reshuffles)
//!   are retried according to a [`RetryPolicy`]. The default waits 30
//!   seconds between attempts and never gives up.
//! - [`TypedCache`] stores serde types as JSON (or any other [`Codec`]).
//!
//! ## Features
//!
//! - `test-utils` - in-process mock server and cluster ([`testing`])
//!
//! ## Example
//!
//! ```no_run
//! use kvbridge::ClientBuilder;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ClientBuilder::new()
//!         .servers("10.0.0.1:7000,10.0.0.2:7000")
//!         .cluster(true)
//!         .build()
//!         .await?;
//!     client.rpush("jobs", &["a", "b"]).await?;
//!     let next = client.blpop("jobs", 5).await?;
//!     assert_eq!(next.as_deref(), Some("a"));
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

pub mod cache;
pub mod cluster;
pub mod core;
pub mod proto;

#[cfg(test)]
mod stress;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use crate::cache::{Codec, JsonCodec, TypedCache};
pub use crate::cluster::key_slot;
pub use crate::core::builder::ClientBuilder;
pub use crate::core::command::SortOptions;
pub use crate::core::config::{ClientConfig, ServerAddr, Topology};
pub use crate::core::retry::{Backoff, ExponentialBackoff, FixedBackoff, RetryPolicy};
pub use crate::core::{Error, KvClient, Result};
