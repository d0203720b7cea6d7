//! A small in-process RESP server for the integration tests.
//!
//! It implements just enough of the command set, with real Redis reply
//! semantics, for the conformance suite and the benchmark to run against it.

#![allow(dead_code)]

use std::{
    collections::{HashMap, HashSet, VecDeque},
    net::SocketAddr,
    sync::{Arc, Mutex},
};

use bytes::Bytes;
use resp_parity::{Connection, Frame};
use tokio::{
    net::{TcpListener, TcpStream},
    sync::broadcast,
};

/// Ways the server can misbehave.
#[derive(Debug, Default, Clone)]
pub struct Options {
    /// Commands the server pretends not to know.
    pub disabled: Vec<&'static str>,
    /// Subscribing also delivers every message published on the channel before.
    pub replay_history: bool,
    /// Every message is delivered twice.
    pub duplicate_delivery: bool,
    /// `SAVE` reports a background save in progress this many times first.
    pub busy_saves: usize,
}

/// Starts a server on an ephemeral port and returns its address.
pub async fn spawn() -> SocketAddr {
    spawn_with(Options::default()).await
}

pub async fn spawn_with(options: Options) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (messages, _) = broadcast::channel(64);
    let shared = Arc::new(Shared {
        store: Mutex::new(Store::default()),
        subscribers: Mutex::new(HashMap::new()),
        history: Mutex::new(Vec::new()),
        busy_saves: Mutex::new(options.busy_saves),
        messages,
        options,
    });

    tokio::spawn(async move {
        loop {
            let Ok((socket, _)) = listener.accept().await else {
                return;
            };
            let shared = shared.clone();
            tokio::spawn(async move { handle(socket, shared).await });
        }
    });
    addr
}

/// An address nothing listens on.
pub async fn dead_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

struct Shared {
    store: Mutex<Store>,
    /// Subscriber count per channel.
    subscribers: Mutex<HashMap<Bytes, i64>>,
    /// Every message published so far.
    history: Mutex<Vec<(Bytes, Bytes)>>,
    busy_saves: Mutex<usize>,
    messages: broadcast::Sender<(Bytes, Bytes)>,
    options: Options,
}

#[derive(Default)]
struct Store {
    strings: HashMap<Bytes, Bytes>,
    lists: HashMap<Bytes, VecDeque<Bytes>>,
    hashes: HashMap<Bytes, Vec<(Bytes, Bytes)>>,
    sets: HashMap<Bytes, HashSet<Bytes>>,
    zsets: HashMap<Bytes, Vec<(f64, Bytes)>>,
}

async fn handle(socket: TcpStream, shared: Arc<Shared>) {
    let mut connection = Connection::new(socket);
    let mut messages = shared.messages.subscribe();
    let mut channels: Vec<Bytes> = Vec::new();
    let mut queued: Option<Vec<Vec<Bytes>>> = None;

    loop {
        let frame = tokio::select! {
            frame = connection.read_frame() => match frame {
                Ok(Some(frame)) => frame,
                _ => break,
            },
            message = messages.recv(), if !channels.is_empty() => {
                if let Ok((channel, payload)) = message {
                    if channels.contains(&channel) {
                        let push = bulks(vec![Bytes::from("message"), channel, payload]);
                        let copies = if shared.options.duplicate_delivery { 2 } else { 1 };
                        for _ in 0..copies {
                            if connection.write_frame(&push).await.is_err() {
                                break;
                            }
                        }
                    }
                }
                continue;
            }
        };

        let Some(args) = tokens(frame) else {
            break;
        };
        let name = String::from_utf8_lossy(&args[0]).to_uppercase();
        if shared.options.disabled.contains(&name.as_str()) {
            let reply = Frame::SimpleError(format!("ERR unknown command '{name}'"));
            if connection.write_frame(&reply).await.is_err() {
                break;
            }
            continue;
        }

        let replies = match name.as_str() {
            "SHUTDOWN" => break,
            "SUBSCRIBE" => {
                if channels.is_empty() {
                    // only messages published from now on
                    messages = shared.messages.subscribe();
                }
                let mut replies: Vec<Frame> = args[1..]
                    .iter()
                    .map(|channel| {
                        if !channels.contains(channel) {
                            channels.push(channel.clone());
                            *shared.subscribers.lock().unwrap().entry(channel.clone()).or_default() += 1;
                        }
                        confirmation("subscribe", channel, channels.len())
                    })
                    .collect();
                if shared.options.replay_history {
                    let history = shared.history.lock().unwrap();
                    replies.extend(
                        history
                            .iter()
                            .filter(|(channel, _)| args[1..].contains(channel))
                            .map(|(channel, payload)| {
                                bulks(vec![Bytes::from("message"), channel.clone(), payload.clone()])
                            }),
                    );
                }
                replies
            }
            "UNSUBSCRIBE" => args[1..]
                .iter()
                .map(|channel| {
                    if let Some(at) = channels.iter().position(|c| c == channel) {
                        channels.remove(at);
                        *shared.subscribers.lock().unwrap().entry(channel.clone()).or_default() -= 1;
                    }
                    confirmation("unsubscribe", channel, channels.len())
                })
                .collect(),
            "PUBLISH" if args.len() == 3 => {
                let receivers = shared
                    .subscribers
                    .lock()
                    .unwrap()
                    .get(&args[1])
                    .copied()
                    .unwrap_or(0);
                let message = (args[1].clone(), args[2].clone());
                shared.history.lock().unwrap().push(message.clone());
                let _ = shared.messages.send(message);
                vec![Frame::Integer(receivers)]
            }
            "MULTI" if queued.is_some() => {
                vec![Frame::SimpleError("ERR MULTI calls can not be nested".into())]
            }
            "MULTI" => {
                queued = Some(Vec::new());
                vec![ok()]
            }
            "SAVE" if queued.is_none() && take_busy_save(&shared) => vec![Frame::SimpleError(
                "ERR Background save already in progress".into(),
            )],
            "DISCARD" => {
                queued = None;
                vec![ok()]
            }
            "EXEC" => match queued.take() {
                Some(commands) => {
                    let mut store = shared.store.lock().unwrap();
                    vec![Frame::Array(
                        commands.iter().map(|args| store.execute(args)).collect(),
                    )]
                }
                None => vec![Frame::SimpleError("ERR EXEC without MULTI".into())],
            },
            _ => match queued.as_mut() {
                Some(commands) => {
                    commands.push(args);
                    vec![Frame::SimpleString("QUEUED".into())]
                }
                None => vec![shared.store.lock().unwrap().execute(&args)],
            },
        };

        for reply in replies {
            if connection.write_frame(&reply).await.is_err() {
                break;
            }
        }
    }

    let mut subscribers = shared.subscribers.lock().unwrap();
    for channel in channels {
        *subscribers.entry(channel).or_default() -= 1;
    }
}

fn take_busy_save(shared: &Shared) -> bool {
    let mut busy = shared.busy_saves.lock().unwrap();
    if *busy == 0 {
        return false;
    }
    *busy -= 1;
    true
}

fn tokens(frame: Frame) -> Option<Vec<Bytes>> {
    match frame {
        Frame::Array(items) if !items.is_empty() => items
            .into_iter()
            .map(|item| match item {
                Frame::BulkString(bytes) => Some(bytes),
                _ => None,
            })
            .collect(),
        _ => None,
    }
}

fn ok() -> Frame {
    Frame::SimpleString("OK".into())
}

fn bulks(items: Vec<Bytes>) -> Frame {
    Frame::Array(items.into_iter().map(Frame::BulkString).collect())
}

fn confirmation(kind: &str, channel: &Bytes, count: usize) -> Frame {
    Frame::Array(vec![
        Frame::BulkString(Bytes::from(kind.to_string())),
        Frame::BulkString(channel.clone()),
        Frame::Integer(count as i64),
    ])
}

fn wrong_args(name: &str) -> Frame {
    Frame::SimpleError(format!(
        "ERR wrong number of arguments for '{}' command",
        name.to_lowercase()
    ))
}

fn not_integer() -> Frame {
    Frame::SimpleError("ERR value is not an integer or out of range".into())
}

fn parse_i64(bytes: &[u8]) -> Option<i64> {
    std::str::from_utf8(bytes).ok()?.parse().ok()
}

/// Resolves a Redis style inclusive range with negative indices.
fn range(len: usize, start: &[u8], stop: &[u8]) -> Option<std::ops::Range<usize>> {
    let len = len as i64;
    let resolve = |i: i64| if i < 0 { len + i } else { i };
    let start = resolve(parse_i64(start)?).max(0);
    let stop = resolve(parse_i64(stop)?).min(len - 1);
    if start > stop {
        return Some(0..0);
    }
    Some(start as usize..stop as usize + 1)
}

impl Store {
    fn execute(&mut self, args: &[Bytes]) -> Frame {
        let name = String::from_utf8_lossy(&args[0]).to_uppercase();
        let a = &args[1..];
        match (name.as_str(), a.len()) {
            ("PING", 0) => Frame::SimpleString("PONG".into()),
            ("FLUSHALL", _) => {
                *self = Store::default();
                ok()
            }
            ("SAVE", 0) => ok(),
            ("BGSAVE", 0) => Frame::SimpleString("Background saving started".into()),
            ("SET", 2) => {
                self.strings.insert(a[0].clone(), a[1].clone());
                ok()
            }
            ("GET", 1) => match self.strings.get(&a[0]) {
                Some(value) => Frame::BulkString(value.clone()),
                None => Frame::NullBulkString,
            },
            ("APPEND", 2) => {
                let mut value = self.strings.get(&a[0]).map(|v| v.to_vec()).unwrap_or_default();
                value.extend_from_slice(&a[1]);
                let len = value.len() as i64;
                self.strings.insert(a[0].clone(), value.into());
                Frame::Integer(len)
            }
            ("INCR", 1) => self.add(&a[0], 1),
            ("DECR", 1) => self.add(&a[0], -1),
            ("MSET", n) if n > 0 && n % 2 == 0 => {
                for pair in a.chunks(2) {
                    self.strings.insert(pair[0].clone(), pair[1].clone());
                }
                ok()
            }
            ("MGET", n) if n > 0 => Frame::Array(
                a.iter()
                    .map(|key| match self.strings.get(key) {
                        Some(value) => Frame::BulkString(value.clone()),
                        None => Frame::NullBulkString,
                    })
                    .collect(),
            ),
            ("DEL", n) if n > 0 => {
                let removed = a.iter().filter(|k| self.strings.remove(*k).is_some()).count();
                Frame::Integer(removed as i64)
            }
            ("LPUSH", n) if n > 1 => {
                let list = self.lists.entry(a[0].clone()).or_default();
                for item in &a[1..] {
                    list.push_front(item.clone());
                }
                Frame::Integer(list.len() as i64)
            }
            ("RPUSH", n) if n > 1 => {
                let list = self.lists.entry(a[0].clone()).or_default();
                list.extend(a[1..].iter().cloned());
                Frame::Integer(list.len() as i64)
            }
            ("LRANGE", 3) => {
                let list = self.lists.get(&a[0]).cloned().unwrap_or_default();
                match range(list.len(), &a[1], &a[2]) {
                    Some(r) => bulks(list.range(r).cloned().collect()),
                    None => not_integer(),
                }
            }
            ("LPOP", 1) => match self.lists.get_mut(&a[0]).and_then(VecDeque::pop_front) {
                Some(item) => Frame::BulkString(item),
                None => Frame::NullBulkString,
            },
            ("RPOP", 1) => match self.lists.get_mut(&a[0]).and_then(VecDeque::pop_back) {
                Some(item) => Frame::BulkString(item),
                None => Frame::NullBulkString,
            },
            ("LLEN", 1) => Frame::Integer(self.lists.get(&a[0]).map_or(0, |l| l.len()) as i64),
            ("HSET", n) | ("HMSET", n) if n > 1 && n % 2 == 1 => {
                let hash = self.hashes.entry(a[0].clone()).or_default();
                let mut added = 0;
                for pair in a[1..].chunks(2) {
                    match hash.iter_mut().find(|(f, _)| *f == pair[0]) {
                        Some(entry) => entry.1 = pair[1].clone(),
                        None => {
                            hash.push((pair[0].clone(), pair[1].clone()));
                            added += 1;
                        }
                    }
                }
                if name == "HSET" {
                    Frame::Integer(added)
                } else {
                    ok()
                }
            }
            ("HGET", 2) => match self.hash_field(&a[0], &a[1]) {
                Some(value) => Frame::BulkString(value),
                None => Frame::NullBulkString,
            },
            ("HMGET", n) if n > 1 => Frame::Array(
                a[1..]
                    .iter()
                    .map(|field| match self.hash_field(&a[0], field) {
                        Some(value) => Frame::BulkString(value),
                        None => Frame::NullBulkString,
                    })
                    .collect(),
            ),
            ("HGETALL", 1) => {
                // reversed, so order-sensitive comparisons would notice
                let fields = self.hashes.get(&a[0]).cloned().unwrap_or_default();
                bulks(
                    fields
                        .into_iter()
                        .rev()
                        .flat_map(|(f, v)| [f, v])
                        .collect(),
                )
            }
            ("HDEL", n) if n > 1 => {
                let hash = self.hashes.entry(a[0].clone()).or_default();
                let before = hash.len();
                hash.retain(|(f, _)| !a[1..].contains(f));
                Frame::Integer((before - hash.len()) as i64)
            }
            ("SADD", n) if n > 1 => {
                let set = self.sets.entry(a[0].clone()).or_default();
                let added = a[1..].iter().filter(|m| set.insert((*m).clone())).count();
                Frame::Integer(added as i64)
            }
            ("SISMEMBER", 2) => {
                let hit = self.sets.get(&a[0]).is_some_and(|s| s.contains(&a[1]));
                Frame::Integer(hit as i64)
            }
            ("SMEMBERS", 1) => bulks(
                self.sets
                    .get(&a[0])
                    .map(|s| s.iter().cloned().collect())
                    .unwrap_or_default(),
            ),
            ("SREM", n) if n > 1 => {
                let set = self.sets.entry(a[0].clone()).or_default();
                let removed = a[1..].iter().filter(|m| set.remove(*m)).count();
                Frame::Integer(removed as i64)
            }
            ("ZADD", n) if n > 1 && n % 2 == 1 => {
                let zset = self.zsets.entry(a[0].clone()).or_default();
                let mut added = 0;
                for pair in a[1..].chunks(2) {
                    let Some(score) = std::str::from_utf8(&pair[0])
                        .ok()
                        .and_then(|s| s.parse::<f64>().ok())
                    else {
                        return Frame::SimpleError("ERR value is not a valid float".into());
                    };
                    match zset.iter_mut().find(|(_, m)| *m == pair[1]) {
                        Some(entry) => entry.0 = score,
                        None => {
                            zset.push((score, pair[1].clone()));
                            added += 1;
                        }
                    }
                }
                zset.sort_by(|x, y| x.0.total_cmp(&y.0).then_with(|| x.1.cmp(&y.1)));
                Frame::Integer(added)
            }
            ("ZRANGE", 3) => {
                let zset = self.zsets.get(&a[0]).cloned().unwrap_or_default();
                match range(zset.len(), &a[1], &a[2]) {
                    Some(r) => bulks(zset[r].iter().map(|(_, m)| m.clone()).collect()),
                    None => not_integer(),
                }
            }
            ("ZREM", n) if n > 1 => {
                let zset = self.zsets.entry(a[0].clone()).or_default();
                let before = zset.len();
                zset.retain(|(_, m)| !a[1..].contains(m));
                Frame::Integer((before - zset.len()) as i64)
            }
            (
                "PING" | "SAVE" | "BGSAVE" | "SET" | "GET" | "APPEND" | "INCR" | "DECR" | "MSET"
                | "MGET" | "DEL" | "LPUSH" | "RPUSH" | "LRANGE" | "LPOP" | "RPOP" | "LLEN"
                | "HSET" | "HMSET" | "HGET" | "HMGET" | "HGETALL" | "HDEL" | "SADD"
                | "SISMEMBER" | "SMEMBERS" | "SREM" | "ZADD" | "ZRANGE" | "ZREM" | "PUBLISH",
                _,
            ) => wrong_args(&name),
            _ => Frame::SimpleError(format!("ERR unknown command '{name}'")),
        }
    }

    fn add(&mut self, key: &Bytes, by: i64) -> Frame {
        let current = match self.strings.get(key) {
            Some(value) => match parse_i64(value) {
                Some(n) => n,
                None => return not_integer(),
            },
            None => 0,
        };
        let next = current + by;
        self.strings.insert(key.clone(), Bytes::from(next.to_string()));
        Frame::Integer(next)
    }

    fn hash_field(&self, key: &Bytes, field: &Bytes) -> Option<Bytes> {
        self.hashes
            .get(key)?
            .iter()
            .find(|(f, _)| f == field)
            .map(|(_, v)| v.clone())
    }
}
