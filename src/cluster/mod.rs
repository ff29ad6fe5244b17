//! Clustered backend.
//!
//! Keys map to one of 16384 hash slots; each slot is served by one master.
//! The client learns the slot map with `CLUSTER SLOTS`, routes every command
//! to the owner of its key's slot, and follows `MOVED`/`ASK` redirections up
//! to a configured limit.

mod client;
pub mod commands;
mod errors;
mod pool;
mod slot;
mod topology;

pub use client::ClusterClient;
pub use errors::parse_redis_error;
pub use slot::{key_slot, SLOT_COUNT};
pub use topology::{ClusterTopology, SlotRange};
