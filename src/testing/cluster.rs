//! A mock cluster: several mock nodes over one shared data set.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::cluster::{key_slot, SLOT_COUNT};
use crate::proto::frame::Frame;

use super::server::{bind, MockServer, NodeState};
use super::store::Store;

/// Slot ownership shared by every node of a [`MockCluster`].
#[derive(Debug)]
pub(crate) struct ClusterState {
    addresses: Vec<String>,
    owners: Mutex<Vec<usize>>,
    migrating: Mutex<HashMap<u16, usize>>,
    redirects: AtomicUsize,
}

impl ClusterState {
    fn owners(&self) -> MutexGuard<'_, Vec<usize>> {
        self.owners.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn owner(&self, slot: u16) -> usize {
        self.owners()[usize::from(slot)]
    }

    pub(crate) fn migrating(&self, slot: u16) -> Option<usize> {
        self.migrating
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&slot)
            .copied()
    }

    pub(crate) fn address(&self, node: usize) -> &str {
        &self.addresses[node]
    }

    pub(crate) fn count_redirect(&self) {
        self.redirects.fetch_add(1, Ordering::SeqCst);
    }

    /// `CLUSTER SLOTS` reply: one entry per run of consecutive slots with
    /// the same owner.
    pub(crate) fn slots_frame(&self) -> Frame {
        let owners = self.owners();
        let mut ranges = Vec::new();
        let mut start = 0usize;
        for slot in 1..=owners.len() {
            if slot == owners.len() || owners[slot] != owners[start] {
                let node = owners[start];
                let (host, port) = self.addresses[node]
                    .rsplit_once(':')
                    .unwrap_or((self.addresses[node].as_str(), "0"));
                ranges.push(Frame::Array(vec![
                    Frame::Integer(start as i64),
                    Frame::Integer(slot as i64 - 1),
                    Frame::Array(vec![
                        Frame::bulk(host.to_string()),
                        Frame::Integer(port.parse().unwrap_or_default()),
                        Frame::bulk(format!("node-{}", node)),
                    ]),
                ]));
                start = slot;
            }
        }
        Frame::Array(ranges)
    }
}

/// A set of mock nodes splitting the slot space evenly.
///
/// Nodes share one data set but only serve keys of slots they own; anything
/// else is answered with `MOVED` (or `ASK` while a slot is migrating), like
/// a real cluster.
#[derive(Debug)]
pub struct MockCluster {
    nodes: Vec<MockServer>,
    state: Arc<ClusterState>,
}

impl MockCluster {
    /// Starts `n` nodes (at least one).
    pub async fn start(n: usize) -> Self {
        let n = n.max(1);
        let mut listeners = Vec::with_capacity(n);
        for _ in 0..n {
            listeners.push(bind().await);
        }
        let addresses = listeners
            .iter()
            .map(|l| l.local_addr().map(|a| a.to_string()).unwrap_or_default())
            .collect();

        let slots = usize::from(SLOT_COUNT);
        let owners = (0..slots).map(|slot| slot * n / slots).collect();
        let state = Arc::new(ClusterState {
            addresses,
            owners: Mutex::new(owners),
            migrating: Mutex::new(HashMap::new()),
            redirects: AtomicUsize::new(0),
        });

        let store = Arc::new(Store::new());
        let nodes = listeners
            .into_iter()
            .enumerate()
            .map(|(i, listener)| {
                let node = NodeState::new(store.clone(), Some((state.clone(), i)));
                MockServer::spawn(listener, Arc::new(node))
            })
            .collect();

        Self { nodes, state }
    }

    /// Node addresses, in node order.
    pub fn addresses(&self) -> Vec<String> {
        self.nodes.iter().map(MockServer::address).collect()
    }

    /// The node at `index`.
    pub fn node(&self, index: usize) -> &MockServer {
        &self.nodes[index]
    }

    /// Index of the node owning `key`'s slot.
    pub fn owner_of(&self, key: &str) -> usize {
        self.state.owner(key_slot(key))
    }

    /// Hands `key`'s slot to node `to`; the old owner answers `MOVED` from
    /// now on.
    pub fn move_slot(&self, key: &str, to: usize) {
        let slot = key_slot(key);
        self.state.owners()[usize::from(slot)] = to;
        self.finish_migration(key);
    }

    /// Starts migrating `key`'s slot to node `to`: the owner answers `ASK`,
    /// and `to` serves the slot only right after `ASKING`.
    pub fn start_migration(&self, key: &str, to: usize) {
        self.state
            .migrating
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key_slot(key), to);
    }

    /// Ends a migration started with [`MockCluster::start_migration`]
    /// without changing the owner.
    pub fn finish_migration(&self, key: &str) {
        self.state
            .migrating
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&key_slot(key));
    }

    /// `MOVED` and `ASK` replies sent so far, across all nodes.
    pub fn redirects_sent(&self) -> usize {
        self.state.redirects.load(Ordering::SeqCst)
    }
}
