//! Cluster management commands.

use crate::core::command::Cmd;

/// Creates a CLUSTER SLOTS command, used to discover the slot map.
pub fn cluster_slots() -> Cmd {
    Cmd::new("CLUSTER").arg("SLOTS")
}

/// Creates an ASKING command.
///
/// Sent right before a command redirected by `ASK`; it only affects the
/// command that immediately follows on the same connection.
pub fn asking() -> Cmd {
    Cmd::new("ASKING")
}
