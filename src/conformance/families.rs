//! Scripts of the families that are plain request/reply sequences.
//!
//! Every family uses its own keys and only relies on the namespace having
//! been flushed before the suite starts.

use super::{Expect, Step};
use crate::cmd::{Command, CommandKind as K};

const GREETING: &str = "Hello, World!";
const SUFFIX: &str = " from the harness";
/// Protocol delimiters and whitespace inside a value must round-trip untouched.
const AWKWARD: &str = "line one\r\nline two \"quoted\"\t*3\r\n";

pub(crate) fn strings() -> Vec<Step> {
    vec![
        Step::new(
            "set",
            Command::with_args(K::Set, ["mykey", GREETING]),
            Expect::ok(),
        ),
        Step::new(
            "append",
            Command::with_args(K::Append, ["mykey", SUFFIX]),
            Expect::Integer((GREETING.len() + SUFFIX.len()) as i64),
        )
        .requires(&["set"]),
        Step::new(
            "get-appended",
            Command::with_args(K::Get, ["mykey"]),
            Expect::bulk(format!("{GREETING}{SUFFIX}")),
        )
        .requires(&["append"]),
        Step::new(
            "set-awkward",
            Command::with_args(K::Set, ["awkward", AWKWARD]),
            Expect::ok(),
        ),
        Step::new(
            "get-awkward",
            Command::with_args(K::Get, ["awkward"]),
            Expect::bulk(AWKWARD),
        )
        .requires(&["set-awkward"]),
        Step::new(
            "get-missing",
            Command::with_args(K::Get, ["missingkey"]),
            Expect::Nil,
        ),
        Step::new(
            "set-counter",
            Command::with_args(K::Set, ["counter", "0"]),
            Expect::ok(),
        ),
        Step::new(
            "incr",
            Command::with_args(K::Incr, ["counter"]),
            Expect::Integer(1),
        )
        .requires(&["set-counter"]),
        Step::new(
            "incr-again",
            Command::with_args(K::Incr, ["counter"]),
            Expect::Integer(2),
        )
        .requires(&["incr"]),
        Step::new(
            "decr",
            Command::with_args(K::Decr, ["counter"]),
            Expect::Integer(1),
        )
        .requires(&["incr-again"]),
        Step::new(
            "incr-fresh",
            Command::with_args(K::Incr, ["freshcounter"]),
            Expect::Integer(1),
        ),
        Step::new(
            "decr-fresh",
            Command::with_args(K::Decr, ["freshcounter"]),
            Expect::Integer(0),
        )
        .requires(&["incr-fresh"]),
        Step::new(
            "mset",
            Command::with_args(K::MSet, ["a", "1", "b", "2", "c", "3"]),
            Expect::ok(),
        ),
        Step::new(
            "mget",
            Command::with_args(K::MGet, ["a", "b", "c"]),
            Expect::bulks(["1", "2", "3"]),
        )
        .requires(&["mset"]),
    ]
}

pub(crate) fn lists() -> Vec<Step> {
    vec![
        Step::new(
            "lpush",
            Command::with_args(K::LPush, ["mylist", "c", "b", "a"]),
            Expect::Integer(3),
        ),
        Step::new(
            "rpush",
            Command::with_args(K::RPush, ["mylist", "d", "e", "f"]),
            Expect::Integer(6),
        )
        .requires(&["lpush"]),
        Step::new(
            "lrange",
            Command::with_args(K::LRange, ["mylist", "0", "-1"]),
            Expect::bulks(["a", "b", "c", "d", "e", "f"]),
        )
        .requires(&["rpush"]),
        Step::new(
            "lpop",
            Command::with_args(K::LPop, ["mylist"]),
            Expect::bulk("a"),
        )
        .requires(&["rpush"]),
        Step::new(
            "rpop",
            Command::with_args(K::RPop, ["mylist"]),
            Expect::bulk("f"),
        )
        .requires(&["lpop"]),
        Step::new(
            "llen",
            Command::with_args(K::LLen, ["mylist"]),
            Expect::Integer(4),
        )
        .requires(&["rpop"]),
    ]
}

pub(crate) fn hashes() -> Vec<Step> {
    vec![
        Step::new(
            "hset",
            Command::with_args(K::HSet, ["myhash", "field1", "value1"]),
            Expect::Integer(1),
        ),
        Step::new(
            "hget",
            Command::with_args(K::HGet, ["myhash", "field1"]),
            Expect::bulk("value1"),
        )
        .requires(&["hset"]),
        Step::new(
            "hmset",
            Command::with_args(K::HMSet, ["myhash", "field2", "value2", "field3", "value3"]),
            Expect::ok(),
        ),
        Step::new(
            "hmget",
            Command::with_args(K::HMGet, ["myhash", "field1", "field2", "field3"]),
            Expect::bulks(["value1", "value2", "value3"]),
        )
        .requires(&["hset", "hmset"]),
        Step::new(
            "hgetall",
            Command::with_args(K::HGetAll, ["myhash"]),
            Expect::pairs([
                ("field1", "value1"),
                ("field2", "value2"),
                ("field3", "value3"),
            ]),
        )
        .requires(&["hset", "hmset"]),
        Step::new(
            "hdel",
            Command::with_args(K::HDel, ["myhash", "field1", "field3"]),
            Expect::Integer(2),
        )
        .requires(&["hset", "hmset"]),
        Step::new(
            "hget-deleted",
            Command::with_args(K::HGet, ["myhash", "field1"]),
            Expect::Nil,
        )
        .requires(&["hdel"]),
    ]
}

pub(crate) fn sets() -> Vec<Step> {
    vec![
        Step::new(
            "sadd",
            Command::with_args(K::SAdd, ["myset", "a", "b", "c"]),
            Expect::Integer(3),
        ),
        Step::new(
            "sismember-hit",
            Command::with_args(K::SIsMember, ["myset", "a"]),
            Expect::Integer(1),
        )
        .requires(&["sadd"]),
        Step::new(
            "sismember-miss",
            Command::with_args(K::SIsMember, ["myset", "d"]),
            Expect::Integer(0),
        ),
        Step::new(
            "smembers",
            Command::with_args(K::SMembers, ["myset"]),
            Expect::members(["a", "b", "c"]),
        )
        .requires(&["sadd"]),
        Step::new(
            "srem",
            Command::with_args(K::SRem, ["myset", "b"]),
            Expect::Integer(1),
        )
        .requires(&["sadd"]),
        Step::new(
            "smembers-after-srem",
            Command::with_args(K::SMembers, ["myset"]),
            Expect::members(["a", "c"]),
        )
        .requires(&["srem"]),
    ]
}

pub(crate) fn sorted_sets() -> Vec<Step> {
    vec![
        Step::new(
            "zadd",
            Command::with_args(K::ZAdd, ["mysortedset", "1", "a", "2", "b", "3", "c"]),
            Expect::Integer(3),
        ),
        Step::new(
            "zrange",
            Command::with_args(K::ZRange, ["mysortedset", "0", "-1"]),
            Expect::bulks(["a", "b", "c"]),
        )
        .requires(&["zadd"]),
        Step::new(
            "zrem",
            Command::with_args(K::ZRem, ["mysortedset", "b"]),
            Expect::Integer(1),
        )
        .requires(&["zadd"]),
        Step::new(
            "zrange-after-zrem",
            Command::with_args(K::ZRange, ["mysortedset", "0", "-1"]),
            Expect::bulks(["a", "c"]),
        )
        .requires(&["zrem"]),
    ]
}

/// `MULTI` queues commands until `EXEC` runs them all or `DISCARD` drops them.
///
/// Queued commands are only sent when `MULTI` was acknowledged, otherwise
/// they would execute immediately and pollute the abort path checks.
pub(crate) fn transactions() -> Vec<Step> {
    vec![
        // commit path
        Step::new("multi", Command::new(K::Multi), Expect::ok()),
        Step::new(
            "queue-set",
            Command::with_args(K::Set, ["txkey1", "value1"]),
            Expect::queued(),
        )
        .requires(&["multi"]),
        Step::new(
            "queue-incr",
            Command::with_args(K::Incr, ["txcounter"]),
            Expect::queued(),
        )
        .requires(&["queue-set"]),
        Step::new(
            "exec",
            Command::new(K::Exec),
            Expect::Array(vec![Expect::ok(), Expect::Integer(1)]),
        )
        .requires(&["queue-incr"]),
        Step::new(
            "committed-set-visible",
            Command::with_args(K::Get, ["txkey1"]),
            Expect::bulk("value1"),
        )
        .requires(&["exec"]),
        Step::new(
            "committed-incr-visible",
            Command::with_args(K::Get, ["txcounter"]),
            Expect::bulk("1"),
        )
        .requires(&["exec"]),
        // abort path
        Step::new("multi-abort", Command::new(K::Multi), Expect::ok()),
        Step::new(
            "queue-discarded-set",
            Command::with_args(K::Set, ["txkey2", "value2"]),
            Expect::queued(),
        )
        .requires(&["multi-abort"]),
        Step::new("discard", Command::new(K::Discard), Expect::ok())
            .requires(&["queue-discarded-set"]),
        Step::new(
            "discarded-set-invisible",
            Command::with_args(K::Get, ["txkey2"]),
            Expect::Nil,
        )
        .requires(&["discard"]),
    ]
}
