use crate::{Error, LResult};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::fmt;
use std::io::Cursor;

/// A frame in Redis Serialization Protocol (RESP).
///
/// Replies from the servers under test are decoded into this type, and
/// commands are sent as an `Array` of `BulkString`s.
///
/// See: <https://redis.io/docs/latest/develop/reference/protocol-spec/>
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    // RESP 2
    SimpleString(String),
    SimpleError(String),
    Integer(i64),
    BulkString(Bytes),
    Array(Vec<Frame>),
    NullBulkString,
    NullArray,
    // RESP 3
    Null,
}

impl Frame {
    /// Checks whether a complete frame can be decoded from `src`.
    ///
    /// On success the cursor is left right after the frame. Returns
    /// [`Error::Incomplete`] when more bytes are needed.
    pub fn check(src: &mut Cursor<&[u8]>) -> LResult<()> {
        let start = src.position();
        match get_u8(src)? {
            b'+' | b'-' => {
                get_line(src)?;
                Ok(())
            }
            b':' => {
                let _ = get_decimal(src)?;
                Ok(())
            }
            b'$' => match get_decimal(src)? {
                -1 => Ok(()),
                len if len < -1 => Err(invalid_length(src, start, len)),
                // skip that number of bytes + 2 for '\r\n'
                len => skip(src, usize::try_from(len)? + 2),
            },
            b'*' => match get_decimal(src)? {
                -1 => Ok(()),
                len if len < -1 => Err(invalid_length(src, start, len)),
                len => {
                    for _ in 0..len {
                        Frame::check(src)?;
                    }
                    Ok(())
                }
            },
            b'_' => {
                let line = get_line(src)?;
                if line.is_empty() {
                    Ok(())
                } else {
                    Err(Error::protocol(
                        "invalid `null` data type frame format",
                        start,
                        &src.get_ref()[start as usize..],
                    ))
                }
            }
            actual => Err(Error::protocol(
                format!("invalid frame type byte `{}`", actual.escape_ascii()),
                start,
                &src.get_ref()[start as usize..],
            )),
        }
    }

    /// Decodes one frame. [`Frame::check`] must have succeeded on the same bytes.
    pub fn parse(src: &mut Cursor<&[u8]>) -> LResult<Frame> {
        let start = src.position();
        // The first byte of the frame indicates the data type.
        match get_u8(src)? {
            b'+' => {
                let line = get_line(src)?.to_vec();
                Ok(Frame::SimpleString(String::from_utf8(line)?))
            }
            b'-' => {
                let line = get_line(src)?.to_vec();
                Ok(Frame::SimpleError(String::from_utf8(line)?))
            }
            b':' => Ok(Frame::Integer(get_decimal(src)?)),
            b'$' => match get_decimal(src)? {
                -1 => Ok(Frame::NullBulkString),
                len if len < -1 => Err(invalid_length(src, start, len)),
                len => {
                    let len = usize::try_from(len)?;
                    let n = len + 2;
                    if src.remaining() < n {
                        return Err(Error::Incomplete);
                    }
                    let chunk = src.chunk();
                    if &chunk[len..n] != b"\r\n" {
                        return Err(Error::protocol(
                            "bulk string is not terminated by CRLF",
                            start,
                            &src.get_ref()[start as usize..],
                        ));
                    }
                    let data = Bytes::copy_from_slice(&chunk[..len]);
                    src.advance(n);
                    Ok(Frame::BulkString(data))
                }
            },
            b'*' => match get_decimal(src)? {
                -1 => Ok(Frame::NullArray),
                len if len < -1 => Err(invalid_length(src, start, len)),
                len => {
                    let len = usize::try_from(len)?;
                    let mut out = Vec::with_capacity(len);
                    for _ in 0..len {
                        out.push(Frame::parse(src)?);
                    }
                    Ok(Frame::Array(out))
                }
            },
            b'_' => {
                let line = get_line(src)?;
                if line.is_empty() {
                    Ok(Frame::Null)
                } else {
                    Err(Error::protocol(
                        "invalid `null` data type frame format",
                        start,
                        &src.get_ref()[start as usize..],
                    ))
                }
            }
            first_byte => Err(Error::protocol(
                format!(
                    "first byte was not a valid RESP data type `{}`",
                    first_byte.escape_ascii()
                ),
                start,
                &src.get_ref()[start as usize..],
            )),
        }
    }

    /// Appends the wire encoding of this frame to `dst`.
    ///
    /// Bulk strings are length prefixed, so their payload may contain any
    /// byte, including `\r\n`.
    pub fn encode(&self, dst: &mut BytesMut) {
        match self {
            Frame::SimpleString(val) => {
                dst.put_u8(b'+');
                dst.put_slice(val.as_bytes());
                dst.put_slice(b"\r\n");
            }
            Frame::SimpleError(val) => {
                dst.put_u8(b'-');
                dst.put_slice(val.as_bytes());
                dst.put_slice(b"\r\n");
            }
            Frame::Integer(val) => {
                dst.put_u8(b':');
                put_decimal(dst, *val);
            }
            Frame::BulkString(val) => {
                dst.put_u8(b'$');
                put_decimal(dst, val.len() as i64);
                dst.put_slice(val);
                dst.put_slice(b"\r\n");
            }
            Frame::Array(val) => {
                dst.put_u8(b'*');
                put_decimal(dst, val.len() as i64);
                for entry in val {
                    entry.encode(dst);
                }
            }
            Frame::NullBulkString => dst.put_slice(b"$-1\r\n"),
            Frame::NullArray => dst.put_slice(b"*-1\r\n"),
            Frame::Null => dst.put_slice(b"_\r\n"),
        }
    }

    /// Any of the nil representations RESP2 and RESP3 use.
    pub fn is_nil(&self) -> bool {
        matches!(self, Frame::NullBulkString | Frame::NullArray | Frame::Null)
    }

    /// The payload of a string-like frame.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Frame::SimpleString(s) => Some(s.as_bytes()),
            Frame::BulkString(b) => Some(b),
            _ => None,
        }
    }

    fn fmt_indented(&self, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
        match self {
            Frame::SimpleString(s) => write!(f, "{s}"),
            Frame::SimpleError(s) => write!(f, "(error) {s}"),
            Frame::Integer(i) => write!(f, "(integer) {i}"),
            Frame::BulkString(b) => write!(f, "\"{}\"", b.escape_ascii()),
            Frame::NullBulkString | Frame::NullArray | Frame::Null => write!(f, "(nil)"),
            Frame::Array(items) if items.is_empty() => write!(f, "(empty array)"),
            Frame::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, "\n{:indent$}", "")?;
                    }
                    let label = format!("{}) ", i + 1);
                    write!(f, "{label}")?;
                    item.fmt_indented(f, indent + label.len())?;
                }
                Ok(())
            }
        }
    }
}

/// Renders the frame the way `redis-cli` does.
impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_indented(f, 0)
    }
}

fn invalid_length(src: &Cursor<&[u8]>, start: u64, len: i64) -> Error {
    Error::protocol(
        format!("invalid frame length {len}, only valid negative length is -1"),
        start,
        &src.get_ref()[start as usize..],
    )
}

fn put_decimal(dst: &mut BytesMut, val: i64) {
    dst.put_slice(val.to_string().as_bytes());
    dst.put_slice(b"\r\n");
}

fn get_u8(src: &mut Cursor<&[u8]>) -> LResult<u8> {
    if !src.has_remaining() {
        return Err(Error::Incomplete);
    }
    Ok(src.get_u8())
}

fn skip(src: &mut Cursor<&[u8]>, n: usize) -> LResult<()> {
    if src.remaining() < n {
        return Err(Error::Incomplete);
    }
    src.advance(n);
    Ok(())
}

fn get_decimal(src: &mut Cursor<&[u8]>) -> LResult<i64> {
    use atoi::atoi;

    let start = src.position();
    let line = get_line(src)?;

    atoi::<i64>(line).ok_or_else(|| {
        Error::protocol(
            "invalid decimal in frame header",
            start,
            &src.get_ref()[start as usize..],
        )
    })
}

fn get_line<'a>(src: &'a mut Cursor<&[u8]>) -> LResult<&'a [u8]> {
    let start = src.position() as usize;
    let end = src.get_ref().len().saturating_sub(1);

    for i in start..end {
        if src.get_ref()[i] == b'\r' && src.get_ref()[i + 1] == b'\n' {
            src.set_position((i + 2) as u64);
            return Ok(&src.get_ref()[start..i]);
        }
    }
    Err(Error::Incomplete)
}
