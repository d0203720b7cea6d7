use std::fmt;

use bytes::Bytes;

use crate::{Error, Frame, LResult};

/// The reply a conformance step expects, in decoded form.
///
/// Comparisons are always made on [`Frame`]s, never on server rendered
/// text. Replies of unordered collections are compared as multisets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expect {
    Status(String),
    /// A status reply starting with the given text.
    StatusPrefix(String),
    /// An error reply starting with the given text.
    Error(String),
    Integer(i64),
    Bulk(Bytes),
    /// Nil bulk string, nil array or RESP3 null.
    Nil,
    /// Element-wise, in order.
    Array(Vec<Expect>),
    /// Members of an unordered collection, in any order.
    Unordered(Vec<Bytes>),
    /// Flat field/value pairs of an unordered collection, in any order.
    Pairs(Vec<(Bytes, Bytes)>),
    /// The server closes the connection without replying.
    Closed,
    AnyOf(Vec<Expect>),
}

impl Expect {
    pub fn ok() -> Self {
        Expect::Status("OK".into())
    }

    /// Reply to a command sent inside `MULTI`.
    pub fn queued() -> Self {
        Expect::Status("QUEUED".into())
    }

    pub fn bulk(value: impl Into<Bytes>) -> Self {
        Expect::Bulk(value.into())
    }

    pub fn bulks<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Bytes>,
    {
        Expect::Array(items.into_iter().map(Expect::bulk).collect())
    }

    pub fn members<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Bytes>,
    {
        Expect::Unordered(items.into_iter().map(Into::into).collect())
    }

    pub fn pairs<I, K, V>(items: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<Bytes>,
        V: Into<Bytes>,
    {
        Expect::Pairs(
            items
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Checks the outcome of a round-trip against this expectation.
    pub fn check(&self, result: &LResult<Frame>) -> bool {
        match (self, result) {
            (Expect::AnyOf(options), _) => options.iter().any(|e| e.check(result)),
            (Expect::Closed, Err(Error::ConnectionClosed)) => true,
            (Expect::Closed, Err(Error::Io(e))) => matches!(
                e.kind(),
                std::io::ErrorKind::ConnectionReset | std::io::ErrorKind::BrokenPipe
            ),
            (_, Ok(frame)) => self.matches(frame),
            _ => false,
        }
    }

    pub fn matches(&self, frame: &Frame) -> bool {
        match (self, frame) {
            (Expect::Status(s), Frame::SimpleString(actual)) => s == actual,
            (Expect::StatusPrefix(p), Frame::SimpleString(actual)) => actual.starts_with(p.as_str()),
            (Expect::Error(p), Frame::SimpleError(actual)) => actual.starts_with(p.as_str()),
            (Expect::Integer(i), Frame::Integer(actual)) => i == actual,
            (Expect::Bulk(b), Frame::BulkString(actual)) => b == actual,
            (Expect::Nil, f) => f.is_nil(),
            (Expect::Array(items), Frame::Array(actual)) => {
                items.len() == actual.len() && items.iter().zip(actual).all(|(e, f)| e.matches(f))
            }
            (Expect::Unordered(members), Frame::Array(actual)) => {
                let Some(mut actual) = collect_bytes(actual) else {
                    return false;
                };
                let mut expected: Vec<&[u8]> = members.iter().map(|m| &m[..]).collect();
                expected.sort_unstable();
                actual.sort_unstable();
                expected == actual
            }
            (Expect::Pairs(pairs), Frame::Array(actual)) => {
                let Some(flat) = collect_bytes(actual) else {
                    return false;
                };
                if flat.len() % 2 != 0 {
                    return false;
                }
                let mut actual: Vec<(&[u8], &[u8])> =
                    flat.chunks(2).map(|pair| (pair[0], pair[1])).collect();
                let mut expected: Vec<(&[u8], &[u8])> =
                    pairs.iter().map(|(k, v)| (&k[..], &v[..])).collect();
                expected.sort_unstable();
                actual.sort_unstable();
                expected == actual
            }
            (Expect::AnyOf(options), f) => options.iter().any(|e| e.matches(f)),
            _ => false,
        }
    }
}

fn collect_bytes(frames: &[Frame]) -> Option<Vec<&[u8]>> {
    frames.iter().map(Frame::as_bytes).collect()
}

impl fmt::Display for Expect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expect::Status(s) => write!(f, "{s}"),
            Expect::StatusPrefix(p) => write!(f, "{p}..."),
            Expect::Error(p) => write!(f, "(error) {p}..."),
            Expect::Integer(i) => write!(f, "(integer) {i}"),
            Expect::Bulk(b) => write!(f, "\"{}\"", b.escape_ascii()),
            Expect::Nil => write!(f, "(nil)"),
            Expect::Array(items) if items.is_empty() => write!(f, "(empty array)"),
            Expect::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "{}) {item}", i + 1)?;
                }
                Ok(())
            }
            Expect::Unordered(members) => {
                let members: Vec<String> = members
                    .iter()
                    .map(|m| format!("\"{}\"", m.escape_ascii()))
                    .collect();
                write!(f, "{{{}}} in any order", members.join(", "))
            }
            Expect::Pairs(pairs) => {
                let pairs: Vec<String> = pairs
                    .iter()
                    .map(|(k, v)| format!("\"{}\" => \"{}\"", k.escape_ascii(), v.escape_ascii()))
                    .collect();
                write!(f, "{{{}}} in any order", pairs.join(", "))
            }
            Expect::Closed => write!(f, "(connection closed)"),
            Expect::AnyOf(options) => {
                let options: Vec<String> = options.iter().map(ToString::to_string).collect();
                write!(f, "{}", options.join(" | "))
            }
        }
    }
}
