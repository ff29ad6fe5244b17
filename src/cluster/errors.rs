//! Typed view of error replies.
//!
//! Redirections and cluster-state errors arrive as ordinary error replies:
//! - `MOVED <slot> <host>:<port>` - the slot has a new owner
//! - `ASK <slot> <host>:<port>` - the slot is migrating
//! - `CLUSTERDOWN ...` / `TRYAGAIN ...` - transient cluster states

use crate::Error;

/// Converts an error reply into an [`Error`].
///
/// Unknown replies become [`Error::Server`] with the message verbatim.
pub fn parse_redis_error(error_msg: &[u8]) -> Error {
    let msg = String::from_utf8_lossy(error_msg);
    let msg = msg.trim();

    if let Some((slot, address)) = msg.strip_prefix("MOVED ").and_then(parse_redirect) {
        return Error::Moved { slot, address };
    }
    if let Some((slot, address)) = msg.strip_prefix("ASK ").and_then(parse_redirect) {
        return Error::Ask { slot, address };
    }
    if msg.starts_with("CLUSTERDOWN") {
        return Error::ClusterDown;
    }
    if msg.starts_with("TRYAGAIN") {
        return Error::TryAgain;
    }
    if msg.starts_with("CROSSSLOT") {
        return Error::CrossSlot;
    }

    Error::Server {
        message: msg.to_string(),
    }
}

/// Parses `"<slot> <host>:<port>"`.
fn parse_redirect(args: &str) -> Option<(u16, String)> {
    let mut parts = args.split_whitespace();
    let slot = parts.next()?.parse().ok()?;
    let address = parts.next()?.to_string();
    if parts.next().is_some() {
        return None;
    }
    Some((slot, address))
}
