//! Slot map parsed from `CLUSTER SLOTS`.

use crate::proto::frame::Frame;
use crate::{Error, Result};

/// A range of hash slots and the nodes serving it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotRange {
    /// First slot (inclusive).
    pub start: u16,
    /// Last slot (inclusive).
    pub end: u16,
    /// `host:port` of the master.
    pub master: String,
    /// `host:port` of each replica.
    pub replicas: Vec<String>,
}

impl SlotRange {
    /// Returns true if `slot` falls inside this range.
    pub fn contains(&self, slot: u16) -> bool {
        (self.start..=self.end).contains(&slot)
    }
}

/// The cluster's slot map.
#[derive(Debug, Clone, Default)]
pub struct ClusterTopology {
    /// Ranges sorted by start slot.
    pub slot_ranges: Vec<SlotRange>,
}

impl ClusterTopology {
    /// Creates an empty topology.
    pub fn new() -> Self {
        Self::default()
    }

    /// The master serving `slot`, if the slot is covered.
    pub fn master_for_slot(&self, slot: u16) -> Option<&str> {
        self.slot_ranges
            .iter()
            .find(|range| range.contains(slot))
            .map(|range| range.master.as_str())
    }

    /// Every distinct master address.
    pub fn masters(&self) -> Vec<String> {
        let mut masters: Vec<String> = self.slot_ranges.iter().map(|r| r.master.clone()).collect();
        masters.sort();
        masters.dedup();
        masters
    }

    /// Points a single slot at `address`, splitting the range that held it.
    /// Applied on `MOVED` so the next command goes straight to the new owner.
    pub fn reassign(&mut self, slot: u16, address: &str) {
        let Some(pos) = self.slot_ranges.iter().position(|r| r.contains(slot)) else {
            self.slot_ranges.push(SlotRange {
                start: slot,
                end: slot,
                master: address.to_string(),
                replicas: Vec::new(),
            });
            self.slot_ranges.sort_by_key(|r| r.start);
            return;
        };
        if self.slot_ranges[pos].master == address {
            return;
        }

        let old = self.slot_ranges.remove(pos);
        let mut pieces = Vec::with_capacity(3);
        if old.start < slot {
            pieces.push(SlotRange {
                end: slot - 1,
                ..old.clone()
            });
        }
        pieces.push(SlotRange {
            start: slot,
            end: slot,
            master: address.to_string(),
            replicas: Vec::new(),
        });
        if slot < old.end {
            pieces.push(SlotRange {
                start: slot + 1,
                ..old
            });
        }
        for (i, piece) in pieces.into_iter().enumerate() {
            self.slot_ranges.insert(pos + i, piece);
        }
    }

    /// Parses a `CLUSTER SLOTS` reply.
    ///
    /// `queried_host` replaces empty node IPs, which the server uses to mean
    /// "the host you are talking to".
    pub fn from_cluster_slots(frame: Frame, queried_host: &str) -> Result<Self> {
        let Frame::Array(ranges) = frame else {
            return Err(Error::protocol("CLUSTER SLOTS response must be an array"));
        };

        let mut slot_ranges = Vec::with_capacity(ranges.len());
        for range in ranges {
            let Frame::Array(items) = range else {
                continue;
            };
            let (Some(Frame::Integer(start)), Some(Frame::Integer(end))) =
                (items.first(), items.get(1))
            else {
                continue;
            };
            let Some(master) = items.get(2).map(|f| parse_node(f, queried_host)).transpose()?
            else {
                continue;
            };
            let replicas = items
                .iter()
                .skip(3)
                .filter_map(|f| parse_node(f, queried_host).ok())
                .collect();

            slot_ranges.push(SlotRange {
                start: *start as u16,
                end: *end as u16,
                master,
                replicas,
            });
        }

        slot_ranges.sort_by_key(|r| r.start);
        Ok(Self { slot_ranges })
    }
}

fn parse_node(frame: &Frame, queried_host: &str) -> Result<String> {
    let Frame::Array(items) = frame else {
        return Err(Error::protocol("node info must be an array"));
    };
    let host = match items.first() {
        Some(Frame::BulkString(Some(ip))) if !ip.is_empty() => {
            String::from_utf8_lossy(ip).into_owned()
        }
        Some(Frame::BulkString(_)) | Some(Frame::Null) => queried_host.to_string(),
        _ => return Err(Error::protocol("node ip must be a bulk string")),
    };
    let Some(Frame::Integer(port)) = items.get(1) else {
        return Err(Error::protocol("node port must be an integer"));
    };
    Ok(format!("{}:{}", host, port))
}
