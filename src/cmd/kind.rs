//! Static table of the commands the harness knows how to drive.

use std::fmt;

use crate::Frame;

/// The reply shape a command produces on a compliant server.
///
/// This decides how a reply is compared: unordered shapes are compared as
/// multisets, never positionally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyShape {
    /// `+OK` style status.
    Status,
    Integer,
    /// Bulk string or nil.
    Bulk,
    /// Array whose element order is defined by the command.
    OrderedArray,
    /// Array of members of an unordered collection.
    UnorderedArray,
    /// Flat array of alternating field/value pairs of an unordered collection.
    Pairs,
    /// Push messages of the pub/sub protocol.
    Push,
    /// The server may close the connection instead of replying.
    MaybeNone,
    /// Anything; used for commands outside this table.
    Any,
}

impl ReplyShape {
    /// Whether a non-error `frame` has this shape.
    ///
    /// Error replies are never accepted.
    pub fn accepts(self, frame: &Frame) -> bool {
        match (self, frame) {
            (_, Frame::SimpleError(_)) => false,
            (ReplyShape::Any, _) => true,
            (ReplyShape::Status, Frame::SimpleString(_)) => true,
            (ReplyShape::Integer, Frame::Integer(_)) => true,
            (ReplyShape::Bulk, Frame::BulkString(_)) => true,
            (ReplyShape::Bulk, f) => f.is_nil(),
            (ReplyShape::OrderedArray | ReplyShape::UnorderedArray, Frame::Array(_)) => true,
            (ReplyShape::OrderedArray | ReplyShape::UnorderedArray, f) => f.is_nil(),
            (ReplyShape::Pairs, Frame::Array(items)) => items.len() % 2 == 0,
            (ReplyShape::Push, Frame::Array(_)) => true,
            (ReplyShape::MaybeNone, _) => true,
            _ => false,
        }
    }
}

macro_rules! command_kinds {
    ($($variant:ident => ($name:literal, $shape:ident)),+ $(,)?) => {
        /// Every command the harness issues, with its wire name and reply shape.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum CommandKind {
            $($variant,)+
        }

        impl CommandKind {
            pub const ALL: &'static [CommandKind] = &[$(CommandKind::$variant,)+];

            /// Upper case name as sent on the wire.
            pub fn name(self) -> &'static str {
                match self {
                    $(CommandKind::$variant => $name,)+
                }
            }

            pub fn reply_shape(self) -> ReplyShape {
                match self {
                    $(CommandKind::$variant => ReplyShape::$shape,)+
                }
            }
        }
    };
}

command_kinds! {
    FlushAll => ("FLUSHALL", Status),
    Ping => ("PING", Status),
    Set => ("SET", Status),
    Get => ("GET", Bulk),
    Append => ("APPEND", Integer),
    Incr => ("INCR", Integer),
    Decr => ("DECR", Integer),
    MSet => ("MSET", Status),
    MGet => ("MGET", OrderedArray),
    Del => ("DEL", Integer),
    LPush => ("LPUSH", Integer),
    RPush => ("RPUSH", Integer),
    LRange => ("LRANGE", OrderedArray),
    LPop => ("LPOP", Bulk),
    RPop => ("RPOP", Bulk),
    LLen => ("LLEN", Integer),
    HSet => ("HSET", Integer),
    HGet => ("HGET", Bulk),
    HMSet => ("HMSET", Status),
    HMGet => ("HMGET", OrderedArray),
    HGetAll => ("HGETALL", Pairs),
    HDel => ("HDEL", Integer),
    SAdd => ("SADD", Integer),
    SIsMember => ("SISMEMBER", Integer),
    SMembers => ("SMEMBERS", UnorderedArray),
    SRem => ("SREM", Integer),
    ZAdd => ("ZADD", Integer),
    ZRange => ("ZRANGE", OrderedArray),
    ZRem => ("ZREM", Integer),
    Multi => ("MULTI", Status),
    Exec => ("EXEC", OrderedArray),
    Discard => ("DISCARD", Status),
    Subscribe => ("SUBSCRIBE", Push),
    Unsubscribe => ("UNSUBSCRIBE", Push),
    Publish => ("PUBLISH", Integer),
    BgSave => ("BGSAVE", Status),
    Save => ("SAVE", Status),
    Shutdown => ("SHUTDOWN", MaybeNone),
}

impl CommandKind {
    /// Looks a command name up, ignoring case.
    pub fn lookup(token: &[u8]) -> Option<CommandKind> {
        CommandKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.name().as_bytes().eq_ignore_ascii_case(token))
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
