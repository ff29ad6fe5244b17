//! A mock node speaking RESP over loopback TCP.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::debug;

use crate::cluster::key_slot;
use crate::core::connection::Connection;
use crate::proto::frame::Frame;

use super::cluster::ClusterState;
use super::store::Store;

/// Commands a client sends on its own (pool validation, connection setup,
/// topology discovery). Fault injection leaves them alone.
const HOUSEKEEPING: &[&str] = &["PING", "SELECT", "CLIENT", "CLUSTER", "ASKING"];

#[derive(Debug)]
pub(crate) struct NodeState {
    pub(crate) store: Arc<Store>,
    pub(crate) cluster: Option<(Arc<ClusterState>, usize)>,
    fail_next: AtomicUsize,
    seen: Mutex<Vec<String>>,
}

impl NodeState {
    pub(crate) fn new(store: Arc<Store>, cluster: Option<(Arc<ClusterState>, usize)>) -> Self {
        Self {
            store,
            cluster,
            fail_next: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    fn take_failure(&self) -> bool {
        self.fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn record(&self, name: &str) {
        self.seen
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(name.to_string());
    }
}

/// An in-process server answering the command set the client uses.
///
/// Data lives in memory; expirations follow the tokio clock. The server
/// stops when the handle is dropped.
#[derive(Debug)]
pub struct MockServer {
    address: String,
    state: Arc<NodeState>,
    _shutdown: DropGuard,
}

impl MockServer {
    /// Starts a standalone server on an ephemeral loopback port.
    pub async fn start() -> Self {
        let listener = bind().await;
        Self::spawn(listener, Arc::new(NodeState::new(Arc::new(Store::new()), None)))
    }

    pub(crate) fn spawn(listener: TcpListener, state: Arc<NodeState>) -> Self {
        let address = listener
            .local_addr()
            .map(|a| a.to_string())
            .unwrap_or_default();
        let shutdown = CancellationToken::new();

        let token = shutdown.clone();
        let accept_state = state.clone();
        tokio::spawn(async move {
            loop {
                let accepted = tokio::select! {
                    _ = token.cancelled() => return,
                    accepted = listener.accept() => accepted,
                };
                match accepted {
                    Ok((stream, _)) => {
                        let state = accept_state.clone();
                        let token = token.clone();
                        tokio::spawn(async move {
                            tokio::select! {
                                _ = token.cancelled() => {}
                                _ = serve(state, stream) => {}
                            }
                        });
                    }
                    Err(e) => debug!(error = %e, "mock accept failed"),
                }
            }
        });

        Self {
            address,
            state,
            _shutdown: shutdown.drop_guard(),
        }
    }

    /// `host:port` the server listens on.
    pub fn address(&self) -> String {
        self.address.clone()
    }

    /// Drops the connection instead of answering the next `n` data
    /// commands. Connection setup, PING and cluster commands are not
    /// counted.
    pub fn fail_next(&self, n: usize) {
        self.state.fail_next.fetch_add(n, Ordering::SeqCst);
    }

    /// Names of every command received so far, upper-cased, in order.
    pub fn commands_seen(&self) -> Vec<String> {
        self.state
            .seen
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Advances the clock used for expirations by `by`.
    pub fn fast_forward(&self, by: Duration) {
        self.state.store.fast_forward(by);
    }
}

pub(crate) async fn bind() -> TcpListener {
    match TcpListener::bind("127.0.0.1:0").await {
        Ok(listener) => listener,
        Err(e) => panic!("mock server could not bind a loopback port: {}", e),
    }
}

async fn serve(state: Arc<NodeState>, stream: TcpStream) {
    let mut conn = Connection::new(stream);
    let mut asking = false;

    loop {
        let Ok(frame) = conn.read_frame().await else {
            return;
        };
        let args: Vec<String> = match frame {
            Frame::Array(items) => items.iter().filter_map(Frame::as_text).collect(),
            _ => Vec::new(),
        };
        let Some(name) = args.first().map(|n| n.to_ascii_uppercase()) else {
            let _ = conn.write_frame(&Frame::error("ERR invalid request")).await;
            continue;
        };
        state.record(&name);

        if !HOUSEKEEPING.contains(&name.as_str()) && state.take_failure() {
            debug!(command = %name, "mock dropping connection");
            return;
        }

        let reply = match name.as_str() {
            "ASKING" => {
                asking = true;
                let _ = conn.write_frame(&Frame::simple("OK")).await;
                continue;
            }
            "CLUSTER" => match &state.cluster {
                Some((cluster, _)) => cluster.slots_frame(),
                None => Frame::error("ERR This instance has cluster support disabled"),
            },
            _ => match redirect(&state, &name, &args, asking) {
                Some(reply) => reply,
                None => execute(&state, &name, &args).await,
            },
        };
        asking = false;

        if conn.write_frame(&reply).await.is_err() {
            return;
        }
    }
}

async fn execute(state: &NodeState, name: &str, args: &[String]) -> Frame {
    if name != "BLPOP" && name != "BRPOP" {
        return state.store.execute(args);
    }
    if args.len() < 3 {
        return Frame::error(format!(
            "ERR wrong number of arguments for '{}' command",
            name.to_ascii_lowercase()
        ));
    }
    let (keys, timeout) = args[1..].split_at(args.len() - 2);
    let Some(timeout) = timeout[0].parse::<f64>().ok().filter(|t| *t >= 0.0) else {
        return Frame::error("ERR timeout is not a float or out of range");
    };
    state
        .store
        .blocking_pop(keys, Duration::from_secs_f64(timeout), name == "BLPOP")
        .await
}

/// Keys a data command operates on.
fn command_keys<'a>(name: &str, args: &'a [String]) -> &'a [String] {
    match name {
        "PING" | "SELECT" | "CLIENT" => &[],
        "BLPOP" | "BRPOP" if args.len() >= 3 => &args[1..args.len() - 1],
        "DEL" | "EXISTS" => &args[1..],
        _ => &args[1..args.len().min(2)],
    }
}

/// The reply a cluster node gives instead of serving a key it does not own.
fn redirect(state: &NodeState, name: &str, args: &[String], asking: bool) -> Option<Frame> {
    let (cluster, me) = state.cluster.as_ref()?;
    let keys = command_keys(name, args);
    let slot = key_slot(keys.first()?);
    if keys.iter().any(|k| key_slot(k) != slot) {
        return Some(Frame::error(
            "CROSSSLOT Keys in request don't hash to the same slot",
        ));
    }

    let owner = cluster.owner(slot);
    if let Some(target) = cluster.migrating(slot) {
        if *me == target && asking {
            return None;
        }
        if *me == owner {
            cluster.count_redirect();
            return Some(Frame::error(format!("ASK {} {}", slot, cluster.address(target))));
        }
    }
    if owner == *me {
        return None;
    }
    cluster.count_redirect();
    Some(Frame::error(format!("MOVED {} {}", slot, cluster.address(owner))))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_command_keys() {
        assert_eq!(command_keys("GET", &strings(&["GET", "k"])), &strings(&["k"])[..]);
        assert_eq!(
            command_keys("BLPOP", &strings(&["BLPOP", "a", "b", "0"])),
            &strings(&["a", "b"])[..]
        );
        assert!(command_keys("PING", &strings(&["PING"])).is_empty());
    }

    #[tokio::test]
    async fn test_fail_next_skips_housekeeping() {
        let server = MockServer::start().await;
        let mut conn = Connection::connect(&server.address(), Duration::from_secs(1))
            .await
            .unwrap();
        server.fail_next(1);

        let ping = Frame::Array(vec![Frame::bulk("PING")]);
        assert_eq!(conn.request(&ping, None).await.unwrap(), Frame::simple("PONG"));

        let get = Frame::Array(vec![Frame::bulk("GET"), Frame::bulk("k")]);
        assert!(conn.request(&get, None).await.is_err());
        assert_eq!(server.commands_seen(), vec!["PING", "GET"]);
    }
}
