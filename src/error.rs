use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Not enough bytes are buffered to decode a full frame yet.
    #[error("incomplete frame")]
    Incomplete,
    #[error("protocol error at byte {offset}: {message} (near `{excerpt}`)")]
    Protocol {
        message: String,
        /// Absolute stream offset of the first byte of the offending frame.
        offset: u64,
        excerpt: String,
    },
    #[error("connection closed by peer")]
    ConnectionClosed,
    #[error("no reply within {0:?}")]
    Timeout(Duration),
    #[error(transparent)]
    Conversion(#[from] std::num::TryFromIntError),
    #[error(transparent)]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("server replied with an error: {0}")]
    Response(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("latency histogram: {0}")]
    Histogram(String),
}

impl Error {
    /// Builds a protocol error positioned relative to the decode buffer.
    ///
    /// The decoder only sees a cursor over the buffered bytes, so the
    /// `Connection` rebases the offset onto the stream with [`Error::at_offset`].
    pub(crate) fn protocol(message: impl Into<String>, offset: u64, bytes: &[u8]) -> Self {
        Error::Protocol {
            message: message.into(),
            offset,
            excerpt: excerpt(bytes),
        }
    }

    pub(crate) fn at_offset(self, base: u64) -> Self {
        match self {
            Error::Protocol {
                message,
                offset,
                excerpt,
            } => Error::Protocol {
                message,
                offset: base + offset,
                excerpt,
            },
            other => other,
        }
    }

    /// `true` when the connection that produced this error can no longer be
    /// trusted to be in sync with the server and must be reopened.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Error::Io(_) | Error::ConnectionClosed | Error::Timeout(_) | Error::Protocol { .. }
        )
    }
}

fn excerpt(bytes: &[u8]) -> String {
    const MAX: usize = 32;
    let end = bytes.len().min(MAX);
    bytes[..end].escape_ascii().to_string()
}
