//! In-process mock servers for tests.
//!
//! [`MockServer`] answers the command set [`KvClient`](crate::KvClient)
//! uses over loopback TCP. [`MockCluster`] runs several of them as one
//! cluster, redirecting with `MOVED` and `ASK` like the real thing. Both
//! shut down when dropped.

mod cluster;
mod server;
mod store;

pub use cluster::MockCluster;
pub use server::MockServer;
