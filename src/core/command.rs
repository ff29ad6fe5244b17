use std::collections::HashSet;
use std::time::Duration;

use bytes::Bytes;

use crate::cluster::parse_redis_error;
use crate::proto::frame::Frame;
use crate::{Error, Result};

/// A command ready to be sent to the backend.
///
/// Besides its arguments a command remembers the key it routes on (used by
/// the cluster backend to pick a slot) and, for blocking pops, how long the
/// server may legitimately keep the reply pending.
///
/// # Example
///
/// ```
/// use kvbridge::core::command::{self, Cmd};
///
/// let cmd = Cmd::new("SET").key("greeting").arg("hello");
/// assert_eq!(cmd.routing_key(), Some("greeting"));
/// let get_cmd = command::get("greeting");
/// assert_eq!(get_cmd.name(), "GET");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Cmd {
    args: Vec<Bytes>,
    key: Option<String>,
    blocking: Option<Duration>,
}

impl Cmd {
    /// Creates a new command with the given name.
    #[inline]
    pub fn new(name: &str) -> Self {
        Self {
            args: vec![Bytes::copy_from_slice(name.as_bytes())],
            key: None,
            blocking: None,
        }
    }

    /// Appends an argument.
    #[inline]
    pub fn arg(mut self, arg: impl AsRef<[u8]>) -> Self {
        self.args.push(Bytes::copy_from_slice(arg.as_ref()));
        self
    }

    /// Appends a key argument. The first key becomes the routing key.
    #[inline]
    pub fn key(mut self, key: &str) -> Self {
        if self.key.is_none() {
            self.key = Some(key.to_string());
        }
        self.arg(key)
    }

    /// Marks the command as blocking server-side for up to `seconds`
    /// (`0` = indefinitely).
    #[inline]
    pub fn blocking(mut self, seconds: u64) -> Self {
        self.blocking = Some(Duration::from_secs(seconds));
        self
    }

    /// The command name as given to [`Cmd::new`].
    pub fn name(&self) -> &str {
        std::str::from_utf8(&self.args[0]).unwrap_or("?")
    }

    /// The key this command routes on, if any.
    pub fn routing_key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// Server-side blocking time; `Some(ZERO)` means "forever".
    pub fn blocking_time(&self) -> Option<Duration> {
        self.blocking
    }

    /// Converts the command to a RESP array frame.
    #[inline]
    pub fn into_frame(self) -> Frame {
        Frame::Array(self.args.into_iter().map(|b| Frame::BulkString(Some(b))).collect())
    }

    /// Builds the request frame without consuming the command.
    pub fn to_frame(&self) -> Frame {
        Frame::Array(self.args.iter().cloned().map(|b| Frame::BulkString(Some(b))).collect())
    }
}

/// Options for the SORT command.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SortOptions {
    /// `BY pattern`
    pub by: Option<String>,
    /// `LIMIT offset count`
    pub limit: Option<(i64, i64)>,
    /// `GET pattern`, in order
    pub get: Vec<String>,
    /// `DESC` instead of the default ascending order
    pub desc: bool,
    /// `ALPHA`: compare lexicographically
    pub alpha: bool,
}

impl SortOptions {
    /// Ascending numeric sort with no extra clauses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `BY pattern`.
    pub fn by(mut self, pattern: impl Into<String>) -> Self {
        self.by = Some(pattern.into());
        self
    }

    /// Sets `LIMIT offset count`.
    pub fn limit(mut self, offset: i64, count: i64) -> Self {
        self.limit = Some((offset, count));
        self
    }

    /// Adds a `GET pattern` clause.
    pub fn get(mut self, pattern: impl Into<String>) -> Self {
        self.get.push(pattern.into());
        self
    }

    /// Sorts descending.
    pub fn desc(mut self) -> Self {
        self.desc = true;
        self
    }

    /// Sorts lexicographically.
    pub fn alpha(mut self) -> Self {
        self.alpha = true;
        self
    }
}

/// Creates a PING command.
#[inline]
pub fn ping() -> Cmd {
    Cmd::new("PING")
}

/// Creates a SELECT command.
#[inline]
pub fn select(db: u8) -> Cmd {
    Cmd::new("SELECT").arg(db.to_string())
}

/// Creates a CLIENT SETNAME command.
#[inline]
pub fn client_setname(name: &str) -> Cmd {
    Cmd::new("CLIENT").arg("SETNAME").arg(name)
}

/// Creates a GET command.
#[inline]
pub fn get(key: &str) -> Cmd {
    Cmd::new("GET").key(key)
}

/// Creates a SET command.
#[inline]
pub fn set(key: &str, value: &str) -> Cmd {
    Cmd::new("SET").key(key).arg(value)
}

/// Creates a SETEX command.
#[inline]
pub fn setex(key: &str, seconds: u64, value: &str) -> Cmd {
    Cmd::new("SETEX").key(key).arg(seconds.to_string()).arg(value)
}

/// Creates a SETNX command.
#[inline]
pub fn setnx(key: &str, value: &str) -> Cmd {
    Cmd::new("SETNX").key(key).arg(value)
}

/// Creates an INCR command.
#[inline]
pub fn incr(key: &str) -> Cmd {
    Cmd::new("INCR").key(key)
}

/// Creates a DEL command for a single key.
#[inline]
pub fn del(key: &str) -> Cmd {
    Cmd::new("DEL").key(key)
}

/// Creates an EXISTS command for a single key.
#[inline]
pub fn exists(key: &str) -> Cmd {
    Cmd::new("EXISTS").key(key)
}

/// Creates a TTL command.
#[inline]
pub fn ttl(key: &str) -> Cmd {
    Cmd::new("TTL").key(key)
}

/// Creates an EXPIRE command.
#[inline]
pub fn expire(key: &str, seconds: i64) -> Cmd {
    Cmd::new("EXPIRE").key(key).arg(seconds.to_string())
}

/// Creates an EXPIREAT command.
#[inline]
pub fn expireat(key: &str, unix_time: i64) -> Cmd {
    Cmd::new("EXPIREAT").key(key).arg(unix_time.to_string())
}

/// Creates a PERSIST command.
#[inline]
pub fn persist(key: &str) -> Cmd {
    Cmd::new("PERSIST").key(key)
}

/// Creates a ZADD command for one member.
#[inline]
pub fn zadd(key: &str, score: f64, member: &str) -> Cmd {
    Cmd::new("ZADD").key(key).arg(score.to_string()).arg(member)
}

/// Creates a ZADD command for several members.
pub fn zadd_many<'a>(key: &str, members: impl IntoIterator<Item = (&'a str, f64)>) -> Cmd {
    members
        .into_iter()
        .fold(Cmd::new("ZADD").key(key), |cmd, (member, score)| {
            cmd.arg(score.to_string()).arg(member)
        })
}

/// Creates a ZREM command.
#[inline]
pub fn zrem(key: &str, member: &str) -> Cmd {
    Cmd::new("ZREM").key(key).arg(member)
}

/// Creates a ZRANGEBYSCORE command. Bounds are passed verbatim so `-inf`,
/// `+inf` and exclusive `(` bounds work.
#[inline]
pub fn zrangebyscore(key: &str, min: &str, max: &str) -> Cmd {
    Cmd::new("ZRANGEBYSCORE").key(key).arg(min).arg(max)
}

/// Creates a ZRANGE command.
#[inline]
pub fn zrange(key: &str, start: i64, stop: i64) -> Cmd {
    Cmd::new("ZRANGE").key(key).arg(start.to_string()).arg(stop.to_string())
}

/// Creates a ZCARD command.
#[inline]
pub fn zcard(key: &str) -> Cmd {
    Cmd::new("ZCARD").key(key)
}

/// Creates a ZINCRBY command.
#[inline]
pub fn zincrby(key: &str, increment: f64, member: &str) -> Cmd {
    Cmd::new("ZINCRBY").key(key).arg(increment.to_string()).arg(member)
}

/// Creates a ZSCORE command.
#[inline]
pub fn zscore(key: &str, member: &str) -> Cmd {
    Cmd::new("ZSCORE").key(key).arg(member)
}

/// Creates an SADD command.
pub fn sadd(key: &str, members: &[&str]) -> Cmd {
    members.iter().fold(Cmd::new("SADD").key(key), |cmd, m| cmd.arg(m))
}

/// Creates an SREM command.
pub fn srem(key: &str, members: &[&str]) -> Cmd {
    members.iter().fold(Cmd::new("SREM").key(key), |cmd, m| cmd.arg(m))
}

/// Creates an SCARD command.
#[inline]
pub fn scard(key: &str) -> Cmd {
    Cmd::new("SCARD").key(key)
}

/// Creates an SPOP command, optionally with a count.
#[inline]
pub fn spop(key: &str, count: Option<u64>) -> Cmd {
    let cmd = Cmd::new("SPOP").key(key);
    match count {
        Some(n) => cmd.arg(n.to_string()),
        None => cmd,
    }
}

/// Creates an SISMEMBER command.
#[inline]
pub fn sismember(key: &str, member: &str) -> Cmd {
    Cmd::new("SISMEMBER").key(key).arg(member)
}

/// Creates an SMEMBERS command.
#[inline]
pub fn smembers(key: &str) -> Cmd {
    Cmd::new("SMEMBERS").key(key)
}

/// Creates an HSET command.
#[inline]
pub fn hset(key: &str, field: &str, value: &str) -> Cmd {
    Cmd::new("HSET").key(key).arg(field).arg(value)
}

/// Creates an HMSET command.
pub fn hmset<'a>(key: &str, fields: impl IntoIterator<Item = (&'a str, &'a str)>) -> Cmd {
    fields
        .into_iter()
        .fold(Cmd::new("HMSET").key(key), |cmd, (field, value)| {
            cmd.arg(field).arg(value)
        })
}

/// Creates an HGET command.
#[inline]
pub fn hget(key: &str, field: &str) -> Cmd {
    Cmd::new("HGET").key(key).arg(field)
}

/// Creates an HEXISTS command.
#[inline]
pub fn hexists(key: &str, field: &str) -> Cmd {
    Cmd::new("HEXISTS").key(key).arg(field)
}

/// Creates an HVALS command.
#[inline]
pub fn hvals(key: &str) -> Cmd {
    Cmd::new("HVALS").key(key)
}

/// Creates an HKEYS command.
#[inline]
pub fn hkeys(key: &str) -> Cmd {
    Cmd::new("HKEYS").key(key)
}

/// Creates an LPUSH command.
pub fn lpush(key: &str, values: &[&str]) -> Cmd {
    values.iter().fold(Cmd::new("LPUSH").key(key), |cmd, v| cmd.arg(v))
}

/// Creates an RPUSH command.
pub fn rpush(key: &str, values: &[&str]) -> Cmd {
    values.iter().fold(Cmd::new("RPUSH").key(key), |cmd, v| cmd.arg(v))
}

/// Creates an LPOP command.
#[inline]
pub fn lpop(key: &str) -> Cmd {
    Cmd::new("LPOP").key(key)
}

/// Creates an RPOP command.
#[inline]
pub fn rpop(key: &str) -> Cmd {
    Cmd::new("RPOP").key(key)
}

/// Creates a BLPOP command over one or more keys.
pub fn blpop(keys: &[&str], timeout_secs: u64) -> Cmd {
    keys.iter()
        .fold(Cmd::new("BLPOP"), |cmd, k| cmd.key(k))
        .arg(timeout_secs.to_string())
        .blocking(timeout_secs)
}

/// Creates a BRPOP command over one or more keys.
pub fn brpop(keys: &[&str], timeout_secs: u64) -> Cmd {
    keys.iter()
        .fold(Cmd::new("BRPOP"), |cmd, k| cmd.key(k))
        .arg(timeout_secs.to_string())
        .blocking(timeout_secs)
}

/// Creates an LRANGE command.
#[inline]
pub fn lrange(key: &str, start: i64, stop: i64) -> Cmd {
    Cmd::new("LRANGE").key(key).arg(start.to_string()).arg(stop.to_string())
}

/// Creates an LINDEX command.
#[inline]
pub fn lindex(key: &str, index: i64) -> Cmd {
    Cmd::new("LINDEX").key(key).arg(index.to_string())
}

/// Creates an LSET command.
#[inline]
pub fn lset(key: &str, index: i64, value: &str) -> Cmd {
    Cmd::new("LSET").key(key).arg(index.to_string()).arg(value)
}

/// Creates an LREM command.
#[inline]
pub fn lrem(key: &str, count: i64, value: &str) -> Cmd {
    Cmd::new("LREM").key(key).arg(count.to_string()).arg(value)
}

/// Creates an LLEN command.
#[inline]
pub fn llen(key: &str) -> Cmd {
    Cmd::new("LLEN").key(key)
}

/// Creates a SORT command.
pub fn sort(key: &str, options: &SortOptions) -> Cmd {
    let mut cmd = Cmd::new("SORT").key(key);
    if let Some(by) = &options.by {
        cmd = cmd.arg("BY").arg(by);
    }
    if let Some((offset, count)) = options.limit {
        cmd = cmd.arg("LIMIT").arg(offset.to_string()).arg(count.to_string());
    }
    for pattern in &options.get {
        cmd = cmd.arg("GET").arg(pattern);
    }
    if options.desc {
        cmd = cmd.arg("DESC");
    }
    if options.alpha {
        cmd = cmd.arg("ALPHA");
    }
    cmd
}

/// Turns an error reply into a typed [`Error`]; passes anything else through.
#[inline]
pub fn parse_frame_response(frame: Frame) -> Result<Frame> {
    match frame {
        Frame::Error(e) => Err(parse_redis_error(&e)),
        _ => Ok(frame),
    }
}

fn unexpected(frame: &Frame, wanted: &str) -> Error {
    Error::unexpected_reply(format!("expected {} reply, got {:?}", wanted, frame))
}

/// Expects a `+OK` (or any status) reply.
pub fn frame_to_ok(frame: Frame) -> Result<()> {
    match parse_frame_response(frame)? {
        Frame::SimpleString(_) => Ok(()),
        other => Err(unexpected(&other, "status")),
    }
}

/// Converts a bulk string reply to text; null becomes `None`.
pub fn frame_to_string(frame: Frame) -> Result<Option<String>> {
    match parse_frame_response(frame)? {
        Frame::BulkString(Some(b)) => Ok(Some(String::from_utf8_lossy(&b).into_owned())),
        Frame::SimpleString(s) => Ok(Some(String::from_utf8_lossy(&s).into_owned())),
        f if f.is_null() => Ok(None),
        other => Err(unexpected(&other, "bulk string")),
    }
}

/// Converts an integer reply.
pub fn frame_to_int(frame: Frame) -> Result<i64> {
    match parse_frame_response(frame)? {
        Frame::Integer(i) => Ok(i),
        Frame::BulkString(Some(b)) => std::str::from_utf8(&b)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| Error::unexpected_reply("invalid integer")),
        other => Err(unexpected(&other, "integer")),
    }
}

/// Converts an integer reply where `1` means true.
pub fn frame_to_bool(frame: Frame) -> Result<bool> {
    Ok(frame_to_int(frame)? > 0)
}

/// Converts a bulk-string score reply; null becomes `None`.
pub fn frame_to_float(frame: Frame) -> Result<Option<f64>> {
    match frame_to_string(frame)? {
        Some(s) => s
            .parse::<f64>()
            .map(Some)
            .map_err(|_| Error::unexpected_reply(format!("invalid float: {}", s))),
        None => Ok(None),
    }
}

/// Converts an array reply to strings, preserving order. A null reply is an
/// empty list; null elements are skipped.
pub fn frame_to_vec_string(frame: Frame) -> Result<Vec<String>> {
    match parse_frame_response(frame)? {
        Frame::Array(items) => Ok(items
            .into_iter()
            .filter_map(|item| item.as_text())
            .collect()),
        f if f.is_null() => Ok(Vec::new()),
        other => Err(unexpected(&other, "array")),
    }
}

/// Converts an array reply position by position, null elements included,
/// for replies where an element's index carries meaning (`SORT ... GET`).
pub fn frame_to_vec_opt_string(frame: Frame) -> Result<Vec<Option<String>>> {
    match parse_frame_response(frame)? {
        Frame::Array(items) => Ok(items.iter().map(Frame::as_text).collect()),
        f if f.is_null() => Ok(Vec::new()),
        other => Err(unexpected(&other, "array")),
    }
}

/// Converts an array reply to a set of strings.
pub fn frame_to_set(frame: Frame) -> Result<HashSet<String>> {
    Ok(frame_to_vec_string(frame)?.into_iter().collect())
}

/// Extracts the value from a `[key, value]` blocking-pop reply; a timeout
/// (null) becomes `None`.
pub fn frame_to_popped(frame: Frame) -> Result<Option<String>> {
    match parse_frame_response(frame)? {
        Frame::Array(mut items) if items.len() == 2 => Ok(items.pop().and_then(|f| f.as_text())),
        f if f.is_null() => Ok(None),
        other => Err(unexpected(&other, "[key, value]")),
    }
}

/// Like [`frame_to_popped`] but keeps the key the value came from.
pub fn frame_to_key_value(frame: Frame) -> Result<Option<(String, String)>> {
    match parse_frame_response(frame)? {
        Frame::Array(items) if items.len() == 2 => {
            let mut texts = items.iter().map(Frame::as_text);
            match (texts.next().flatten(), texts.next().flatten()) {
                (Some(key), Some(value)) => Ok(Some((key, value))),
                _ => Err(Error::unexpected_reply("blocking pop reply with null element")),
            }
        }
        f if f.is_null() => Ok(None),
        other => Err(unexpected(&other, "[key, value]")),
    }
}
