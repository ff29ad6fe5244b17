//! In-memory data set shared by mock nodes.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::Notify;
use tokio::time::Instant;

use crate::proto::frame::Frame;

const WRONGTYPE: &str = "WRONGTYPE Operation against a key holding the wrong kind of value";
const NOT_INTEGER: &str = "ERR value is not an integer or out of range";
const NOT_FLOAT: &str = "ERR value is not a valid float";
const SYNTAX: &str = "ERR syntax error";

type Reply = Result<Frame, Frame>;

#[derive(Debug)]
enum Value {
    Str(String),
    List(VecDeque<String>),
    Set(HashSet<String>),
    ZSet(HashMap<String, f64>),
    Hash(BTreeMap<String, String>),
}

impl Value {
    fn as_str(&mut self) -> Option<&mut String> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    fn as_list(&mut self) -> Option<&mut VecDeque<String>> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    fn as_set(&mut self) -> Option<&mut HashSet<String>> {
        match self {
            Value::Set(s) => Some(s),
            _ => None,
        }
    }

    fn as_zset(&mut self) -> Option<&mut HashMap<String, f64>> {
        match self {
            Value::ZSet(z) => Some(z),
            _ => None,
        }
    }

    fn as_hash(&mut self) -> Option<&mut BTreeMap<String, String>> {
        match self {
            Value::Hash(h) => Some(h),
            _ => None,
        }
    }

    fn is_empty_collection(&self) -> bool {
        match self {
            Value::Str(_) => false,
            Value::List(l) => l.is_empty(),
            Value::Set(s) => s.is_empty(),
            Value::ZSet(z) => z.is_empty(),
            Value::Hash(h) => h.is_empty(),
        }
    }
}

#[derive(Debug)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn new(value: Value) -> Self {
        Self {
            value,
            expires_at: None,
        }
    }
}

type Map = HashMap<String, Entry>;

/// Keys, values and expirations of a mock data set.
#[derive(Debug, Default)]
pub(crate) struct Store {
    data: Mutex<Map>,
    skew: Mutex<Duration>,
    pushed: Notify,
}

impl Store {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn data(&self) -> MutexGuard<'_, Map> {
        self.data.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn now(&self) -> Instant {
        Instant::now() + *self.skew.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Moves the store's notion of time forward, expiring keys early.
    pub(crate) fn fast_forward(&self, by: Duration) {
        *self.skew.lock().unwrap_or_else(|e| e.into_inner()) += by;
    }

    /// Runs one non-blocking command.
    pub(crate) fn execute(&self, args: &[String]) -> Frame {
        match self.dispatch(args) {
            Ok(frame) | Err(frame) => frame,
        }
    }

    /// Pops from the first non-empty list among `keys`, waiting up to
    /// `timeout` (`ZERO` = forever) for a push.
    pub(crate) async fn blocking_pop(&self, keys: &[String], timeout: Duration, left: bool) -> Frame {
        let deadline = (!timeout.is_zero()).then(|| Instant::now() + timeout);
        loop {
            let notified = self.pushed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            match self.try_pop(keys, left) {
                Ok(Some((key, value))) => {
                    return Frame::Array(vec![Frame::bulk(key), Frame::bulk(value)])
                }
                Ok(None) => {}
                Err(e) => return e,
            }

            match deadline {
                Some(deadline) => {
                    if tokio::time::timeout_at(deadline, notified).await.is_err() {
                        return Frame::Null;
                    }
                }
                None => notified.await,
            }
        }
    }

    fn try_pop(&self, keys: &[String], left: bool) -> Result<Option<(String, String)>, Frame> {
        let now = self.now();
        let mut data = self.data();
        for key in keys {
            let popped = match lookup(&mut data, key, now, Value::as_list)? {
                Some(list) if left => list.pop_front(),
                Some(list) => list.pop_back(),
                None => None,
            };
            if let Some(value) = popped {
                drop_if_empty(&mut data, key);
                return Ok(Some((key.clone(), value)));
            }
        }
        Ok(None)
    }

    fn dispatch(&self, args: &[String]) -> Reply {
        let Some(name) = args.first().map(|n| n.to_ascii_uppercase()) else {
            return Err(Frame::error("ERR empty command"));
        };
        let a = &args[1..];
        let now = self.now();
        let mut guard = self.data();
        let data = &mut *guard;

        match name.as_str() {
            "PING" => Ok(match a.first() {
                Some(msg) => Frame::bulk(msg.clone()),
                None => Frame::simple("PONG"),
            }),
            "SELECT" | "CLIENT" => Ok(Frame::simple("OK")),

            "GET" => {
                arity(&name, a, 1)?;
                Ok(lookup(data, &a[0], now, Value::as_str)?
                    .map(|s| Frame::bulk(s.clone()))
                    .unwrap_or(Frame::BulkString(None)))
            }
            "SET" => {
                arity(&name, a, 2)?;
                data.insert(a[0].clone(), Entry::new(Value::Str(a[1].clone())));
                Ok(Frame::simple("OK"))
            }
            "SETEX" => {
                arity(&name, a, 3)?;
                let secs = parse_int(&a[1])?;
                if secs <= 0 {
                    return Err(Frame::error("ERR invalid expire time in 'setex' command"));
                }
                data.insert(
                    a[0].clone(),
                    Entry {
                        value: Value::Str(a[2].clone()),
                        expires_at: Some(now + Duration::from_secs(secs as u64)),
                    },
                );
                Ok(Frame::simple("OK"))
            }
            "SETNX" => {
                arity(&name, a, 2)?;
                purge(data, &a[0], now);
                if data.contains_key(&a[0]) {
                    return Ok(Frame::Integer(0));
                }
                data.insert(a[0].clone(), Entry::new(Value::Str(a[1].clone())));
                Ok(Frame::Integer(1))
            }
            "INCR" => {
                arity(&name, a, 1)?;
                let s = lookup_or_create(data, &a[0], now, Value::as_str, || {
                    Value::Str("0".to_string())
                })?;
                let n = parse_int(s.as_str())?
                    .checked_add(1)
                    .ok_or_else(|| Frame::error(NOT_INTEGER))?;
                *s = n.to_string();
                Ok(Frame::Integer(n))
            }
            "DEL" | "EXISTS" => {
                arity(&name, a, 1)?;
                let mut count = 0;
                for key in a {
                    purge(data, key, now);
                    let hit = if name == "DEL" {
                        data.remove(key).is_some()
                    } else {
                        data.contains_key(key)
                    };
                    count += i64::from(hit);
                }
                Ok(Frame::Integer(count))
            }
            "TTL" => {
                arity(&name, a, 1)?;
                purge(data, &a[0], now);
                Ok(Frame::Integer(match data.get(&a[0]) {
                    None => -2,
                    Some(Entry {
                        expires_at: None, ..
                    }) => -1,
                    Some(Entry {
                        expires_at: Some(at),
                        ..
                    }) => ((at.saturating_duration_since(now).as_millis() + 500) / 1000) as i64,
                }))
            }
            "EXPIRE" | "EXPIREAT" => {
                arity(&name, a, 2)?;
                let mut secs = parse_int(&a[1])?;
                if name == "EXPIREAT" {
                    secs -= unix_now();
                }
                purge(data, &a[0], now);
                if !data.contains_key(&a[0]) {
                    return Ok(Frame::Integer(0));
                }
                if secs <= 0 {
                    data.remove(&a[0]);
                } else if let Some(entry) = data.get_mut(&a[0]) {
                    entry.expires_at = Some(now + Duration::from_secs(secs as u64));
                }
                Ok(Frame::Integer(1))
            }
            "PERSIST" => {
                arity(&name, a, 1)?;
                purge(data, &a[0], now);
                let cleared = data
                    .get_mut(&a[0])
                    .and_then(|entry| entry.expires_at.take())
                    .is_some();
                Ok(Frame::Integer(i64::from(cleared)))
            }

            "ZADD" => {
                arity(&name, a, 3)?;
                if (a.len() - 1) % 2 != 0 {
                    return Err(Frame::error(SYNTAX));
                }
                let pairs = a[1..]
                    .chunks(2)
                    .map(|p| -> Result<(f64, String), Frame> {
                        Ok((parse_float(&p[0])?, p[1].clone()))
                    })
                    .collect::<Result<Vec<_>, Frame>>()?;
                let zset = lookup_or_create(data, &a[0], now, Value::as_zset, || {
                    Value::ZSet(HashMap::new())
                })?;
                let added = pairs
                    .into_iter()
                    .filter(|(score, member)| zset.insert(member.clone(), *score).is_none())
                    .count();
                Ok(Frame::Integer(added as i64))
            }
            "ZREM" => {
                arity(&name, a, 2)?;
                let removed = match lookup(data, &a[0], now, Value::as_zset)? {
                    Some(zset) => a[1..].iter().filter(|m| zset.remove(*m).is_some()).count(),
                    None => 0,
                };
                drop_if_empty(data, &a[0]);
                Ok(Frame::Integer(removed as i64))
            }
            "ZRANGEBYSCORE" => {
                arity(&name, a, 3)?;
                let (min, min_open) = parse_bound(&a[1])?;
                let (max, max_open) = parse_bound(&a[2])?;
                let members = match lookup(data, &a[0], now, Value::as_zset)? {
                    Some(zset) => sorted_members(zset)
                        .into_iter()
                        .filter(|(_, s)| if min_open { *s > min } else { *s >= min })
                        .filter(|(_, s)| if max_open { *s < max } else { *s <= max })
                        .map(|(m, _)| m)
                        .collect(),
                    None => Vec::new(),
                };
                Ok(array(members))
            }
            "ZRANGE" => {
                arity(&name, a, 3)?;
                let (start, stop) = (parse_int(&a[1])?, parse_int(&a[2])?);
                let members = match lookup(data, &a[0], now, Value::as_zset)? {
                    Some(zset) => {
                        let sorted: Vec<String> =
                            sorted_members(zset).into_iter().map(|(m, _)| m).collect();
                        slice(&sorted, start, stop).to_vec()
                    }
                    None => Vec::new(),
                };
                Ok(array(members))
            }
            "ZCARD" => {
                arity(&name, a, 1)?;
                let len = lookup(data, &a[0], now, Value::as_zset)?.map_or(0, |z| z.len());
                Ok(Frame::Integer(len as i64))
            }
            "ZINCRBY" => {
                arity(&name, a, 3)?;
                let increment = parse_float(&a[1])?;
                let zset = lookup_or_create(data, &a[0], now, Value::as_zset, || {
                    Value::ZSet(HashMap::new())
                })?;
                let score = zset.entry(a[2].clone()).or_insert(0.0);
                *score += increment;
                Ok(Frame::bulk(score.to_string()))
            }
            "ZSCORE" => {
                arity(&name, a, 2)?;
                let score = lookup(data, &a[0], now, Value::as_zset)?
                    .and_then(|z| z.get(&a[1]).copied());
                Ok(score
                    .map(|s| Frame::bulk(s.to_string()))
                    .unwrap_or(Frame::BulkString(None)))
            }

            "SADD" => {
                arity(&name, a, 2)?;
                let set = lookup_or_create(data, &a[0], now, Value::as_set, || {
                    Value::Set(HashSet::new())
                })?;
                let added = a[1..].iter().filter(|m| set.insert((*m).clone())).count();
                Ok(Frame::Integer(added as i64))
            }
            "SREM" => {
                arity(&name, a, 2)?;
                let removed = match lookup(data, &a[0], now, Value::as_set)? {
                    Some(set) => a[1..].iter().filter(|m| set.remove(*m)).count(),
                    None => 0,
                };
                drop_if_empty(data, &a[0]);
                Ok(Frame::Integer(removed as i64))
            }
            "SCARD" => {
                arity(&name, a, 1)?;
                let len = lookup(data, &a[0], now, Value::as_set)?.map_or(0, |s| s.len());
                Ok(Frame::Integer(len as i64))
            }
            "SPOP" => {
                arity(&name, a, 1)?;
                let count = a.get(1).map(|c| parse_int(c)).transpose()?;
                let popped: Vec<String> = match lookup(data, &a[0], now, Value::as_set)? {
                    Some(set) => {
                        let take = count.map_or(1, |c| c.max(0) as usize);
                        let chosen: Vec<String> = set.iter().take(take).cloned().collect();
                        for member in &chosen {
                            set.remove(member);
                        }
                        chosen
                    }
                    None => Vec::new(),
                };
                drop_if_empty(data, &a[0]);
                Ok(match count {
                    Some(_) => array(popped),
                    None => popped
                        .into_iter()
                        .next()
                        .map(Frame::bulk)
                        .unwrap_or(Frame::BulkString(None)),
                })
            }
            "SISMEMBER" => {
                arity(&name, a, 2)?;
                let hit = lookup(data, &a[0], now, Value::as_set)?.is_some_and(|s| s.contains(&a[1]));
                Ok(Frame::Integer(i64::from(hit)))
            }
            "SMEMBERS" => {
                arity(&name, a, 1)?;
                let members = lookup(data, &a[0], now, Value::as_set)?
                    .map(|s| s.iter().cloned().collect())
                    .unwrap_or_default();
                Ok(array(members))
            }

            "HSET" | "HMSET" => {
                arity(&name, a, 3)?;
                if (a.len() - 1) % 2 != 0 {
                    return Err(Frame::error(SYNTAX));
                }
                let hash = lookup_or_create(data, &a[0], now, Value::as_hash, || {
                    Value::Hash(BTreeMap::new())
                })?;
                let added = a[1..]
                    .chunks(2)
                    .filter(|p| hash.insert(p[0].clone(), p[1].clone()).is_none())
                    .count();
                Ok(if name == "HSET" {
                    Frame::Integer(added as i64)
                } else {
                    Frame::simple("OK")
                })
            }
            "HGET" => {
                arity(&name, a, 2)?;
                let value = lookup(data, &a[0], now, Value::as_hash)?.and_then(|h| h.get(&a[1]).cloned());
                Ok(value.map(Frame::bulk).unwrap_or(Frame::BulkString(None)))
            }
            "HEXISTS" => {
                arity(&name, a, 2)?;
                let hit = lookup(data, &a[0], now, Value::as_hash)?.is_some_and(|h| h.contains_key(&a[1]));
                Ok(Frame::Integer(i64::from(hit)))
            }
            "HVALS" | "HKEYS" => {
                arity(&name, a, 1)?;
                let items = match lookup(data, &a[0], now, Value::as_hash)? {
                    Some(h) if name == "HVALS" => h.values().cloned().collect(),
                    Some(h) => h.keys().cloned().collect(),
                    None => Vec::new(),
                };
                Ok(array(items))
            }

            "LPUSH" | "RPUSH" => {
                arity(&name, a, 2)?;
                let list = lookup_or_create(data, &a[0], now, Value::as_list, || {
                    Value::List(VecDeque::new())
                })?;
                for value in &a[1..] {
                    if name == "LPUSH" {
                        list.push_front(value.clone());
                    } else {
                        list.push_back(value.clone());
                    }
                }
                let len = list.len();
                self.pushed.notify_waiters();
                Ok(Frame::Integer(len as i64))
            }
            "LPOP" | "RPOP" => {
                arity(&name, a, 1)?;
                let popped = match lookup(data, &a[0], now, Value::as_list)? {
                    Some(list) if name == "LPOP" => list.pop_front(),
                    Some(list) => list.pop_back(),
                    None => None,
                };
                drop_if_empty(data, &a[0]);
                Ok(popped.map(Frame::bulk).unwrap_or(Frame::BulkString(None)))
            }
            "LRANGE" => {
                arity(&name, a, 3)?;
                let (start, stop) = (parse_int(&a[1])?, parse_int(&a[2])?);
                let items = match lookup(data, &a[0], now, Value::as_list)? {
                    Some(list) => slice(list.make_contiguous(), start, stop).to_vec(),
                    None => Vec::new(),
                };
                Ok(array(items))
            }
            "LINDEX" => {
                arity(&name, a, 2)?;
                let index = parse_int(&a[1])?;
                let item = lookup(data, &a[0], now, Value::as_list)?
                    .and_then(|list| resolve_index(list.len(), index).and_then(|i| list.get(i).cloned()));
                Ok(item.map(Frame::bulk).unwrap_or(Frame::BulkString(None)))
            }
            "LSET" => {
                arity(&name, a, 3)?;
                let index = parse_int(&a[1])?;
                let list = lookup(data, &a[0], now, Value::as_list)?
                    .ok_or_else(|| Frame::error("ERR no such key"))?;
                let i = resolve_index(list.len(), index)
                    .ok_or_else(|| Frame::error("ERR index out of range"))?;
                list[i] = a[2].clone();
                Ok(Frame::simple("OK"))
            }
            "LREM" => {
                arity(&name, a, 3)?;
                let count = parse_int(&a[1])?;
                let removed = match lookup(data, &a[0], now, Value::as_list)? {
                    Some(list) => remove_matching(list, count, &a[2]),
                    None => 0,
                };
                drop_if_empty(data, &a[0]);
                Ok(Frame::Integer(removed as i64))
            }
            "LLEN" => {
                arity(&name, a, 1)?;
                let len = lookup(data, &a[0], now, Value::as_list)?.map_or(0, |l| l.len());
                Ok(Frame::Integer(len as i64))
            }

            "SORT" => {
                arity(&name, a, 1)?;
                sort(data, now, a)
            }

            _ => Err(Frame::error(format!("ERR unknown command '{}'", args[0]))),
        }
    }
}

fn arity(name: &str, args: &[String], min: usize) -> Result<(), Frame> {
    if args.len() < min {
        return Err(Frame::error(format!(
            "ERR wrong number of arguments for '{}' command",
            name.to_ascii_lowercase()
        )));
    }
    Ok(())
}

fn parse_int(s: &str) -> Result<i64, Frame> {
    s.trim().parse().map_err(|_| Frame::error(NOT_INTEGER))
}

fn parse_float(s: &str) -> Result<f64, Frame> {
    s.trim()
        .parse::<f64>()
        .ok()
        .filter(|f| !f.is_nan())
        .ok_or_else(|| Frame::error(NOT_FLOAT))
}

/// Parses a score bound; a leading `(` makes it exclusive.
fn parse_bound(s: &str) -> Result<(f64, bool), Frame> {
    match s.strip_prefix('(') {
        Some(rest) => Ok((parse_float(rest)?, true)),
        None => Ok((parse_float(s)?, false)),
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

fn array(items: Vec<String>) -> Frame {
    Frame::Array(items.into_iter().map(Frame::bulk).collect())
}

fn purge(data: &mut Map, key: &str, now: Instant) {
    if data
        .get(key)
        .and_then(|e| e.expires_at)
        .is_some_and(|at| at <= now)
    {
        data.remove(key);
    }
}

fn drop_if_empty(data: &mut Map, key: &str) {
    if data.get(key).is_some_and(|e| e.value.is_empty_collection()) {
        data.remove(key);
    }
}

fn lookup<'a, T>(
    data: &'a mut Map,
    key: &str,
    now: Instant,
    pick: fn(&mut Value) -> Option<&mut T>,
) -> Result<Option<&'a mut T>, Frame> {
    purge(data, key, now);
    match data.get_mut(key) {
        None => Ok(None),
        Some(entry) => pick(&mut entry.value)
            .map(Some)
            .ok_or_else(|| Frame::error(WRONGTYPE)),
    }
}

fn lookup_or_create<'a, T>(
    data: &'a mut Map,
    key: &str,
    now: Instant,
    pick: fn(&mut Value) -> Option<&mut T>,
    empty: fn() -> Value,
) -> Result<&'a mut T, Frame> {
    purge(data, key, now);
    let entry = data
        .entry(key.to_string())
        .or_insert_with(|| Entry::new(empty()));
    pick(&mut entry.value).ok_or_else(|| Frame::error(WRONGTYPE))
}

fn sorted_members(zset: &HashMap<String, f64>) -> Vec<(String, f64)> {
    let mut members: Vec<(String, f64)> = zset.iter().map(|(m, s)| (m.clone(), *s)).collect();
    members.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal).then_with(|| a.0.cmp(&b.0)));
    members
}

fn resolve_index(len: usize, index: i64) -> Option<usize> {
    let len = len as i64;
    let i = if index < 0 { len + index } else { index };
    (0..len).contains(&i).then_some(i as usize)
}

/// Inclusive range with negative indexes counting from the end.
fn slice<T>(items: &[T], start: i64, stop: i64) -> &[T] {
    let len = items.len() as i64;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if start > stop || start >= len {
        return &[];
    }
    &items[start as usize..=stop as usize]
}

fn remove_matching(list: &mut VecDeque<String>, count: i64, value: &str) -> usize {
    let limit = if count == 0 { usize::MAX } else { count.unsigned_abs() as usize };
    let mut removed = 0;
    if count >= 0 {
        let mut i = 0;
        while i < list.len() && removed < limit {
            if list[i] == value {
                list.remove(i);
                removed += 1;
            } else {
                i += 1;
            }
        }
    } else {
        let mut i = list.len();
        while i > 0 && removed < limit {
            i -= 1;
            if list[i] == value {
                list.remove(i);
                removed += 1;
            }
        }
    }
    removed
}

fn sort(data: &mut Map, now: Instant, a: &[String]) -> Reply {
    let key = &a[0];
    let mut by: Option<&str> = None;
    let mut limit: Option<(i64, i64)> = None;
    let mut gets: Vec<&str> = Vec::new();
    let mut desc = false;
    let mut alpha = false;

    let mut i = 1;
    while i < a.len() {
        match a[i].to_ascii_uppercase().as_str() {
            "BY" if i + 1 < a.len() => {
                by = Some(a[i + 1].as_str());
                i += 1;
            }
            "LIMIT" if i + 2 < a.len() => {
                limit = Some((parse_int(&a[i + 1])?, parse_int(&a[i + 2])?));
                i += 2;
            }
            "GET" if i + 1 < a.len() => {
                gets.push(a[i + 1].as_str());
                i += 1;
            }
            "ASC" => desc = false,
            "DESC" => desc = true,
            "ALPHA" => alpha = true,
            _ => return Err(Frame::error(SYNTAX)),
        }
        i += 1;
    }

    purge(data, key, now);
    let elements: Vec<String> = match data.get(key).map(|e| &e.value) {
        None => Vec::new(),
        Some(Value::List(l)) => l.iter().cloned().collect(),
        Some(Value::Set(s)) => s.iter().cloned().collect(),
        Some(Value::ZSet(z)) => sorted_members(z).into_iter().map(|(m, _)| m).collect(),
        Some(_) => return Err(Frame::error(WRONGTYPE)),
    };

    let string_at = |data: &Map, pattern: &str, element: &str| -> Option<String> {
        let name = pattern.replacen('*', element, 1);
        match data.get(&name) {
            Some(Entry {
                value: Value::Str(s),
                expires_at,
            }) if expires_at.map_or(true, |at| at > now) => Some(s.clone()),
            _ => None,
        }
    };

    let mut keyed: Vec<(String, String)> = elements
        .into_iter()
        .map(|e| {
            let weight = match by {
                Some(pattern) => string_at(&*data, pattern, &e).unwrap_or_default(),
                None => e.clone(),
            };
            (e, weight)
        })
        .collect();

    let skip_sort = by.is_some_and(|p| !p.contains('*'));
    if !skip_sort {
        if alpha {
            keyed.sort_by(|x, y| x.1.cmp(&y.1));
        } else {
            let mut scored = Vec::with_capacity(keyed.len());
            for (e, w) in keyed {
                let score = if w.is_empty() {
                    0.0
                } else {
                    w.parse::<f64>().map_err(|_| {
                        Frame::error("ERR One or more scores can't be converted into double")
                    })?
                };
                scored.push((e, w, score));
            }
            scored.sort_by(|x, y| x.2.partial_cmp(&y.2).unwrap_or(Ordering::Equal).then_with(|| x.0.cmp(&y.0)));
            keyed = scored.into_iter().map(|(e, w, _)| (e, w)).collect();
        }
        if desc {
            keyed.reverse();
        }
    }

    let mut sorted: Vec<String> = keyed.into_iter().map(|(e, _)| e).collect();
    if let Some((offset, count)) = limit {
        let offset = offset.max(0) as usize;
        let count = if count < 0 { usize::MAX } else { count as usize };
        sorted = sorted.into_iter().skip(offset).take(count).collect();
    }

    if gets.is_empty() {
        return Ok(array(sorted));
    }
    let mut out = Vec::with_capacity(sorted.len() * gets.len());
    for e in &sorted {
        for pattern in &gets {
            out.push(if *pattern == "#" {
                Frame::bulk(e.clone())
            } else {
                string_at(&*data, pattern, e)
                    .map(Frame::bulk)
                    .unwrap_or(Frame::BulkString(None))
            });
        }
    }
    Ok(Frame::Array(out))
}
