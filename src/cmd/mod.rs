use std::fmt;

use bytes::{Bytes, BytesMut};

use crate::{Error, Frame, LResult};

pub mod kind;
pub use kind::{CommandKind, ReplyShape};

/// A command ready to be sent to a server: its name followed by arguments.
///
/// Built once and never mutated afterwards. On the wire it is an array of
/// bulk strings, so arguments may hold any bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// `None` for commands built from user templates that are not in the table.
    kind: Option<CommandKind>,
    tokens: Vec<Bytes>,
}

impl Command {
    pub fn new(kind: CommandKind) -> Self {
        Self {
            kind: Some(kind),
            tokens: vec![Bytes::from_static(kind.name().as_bytes())],
        }
    }

    pub fn with_args<I, T>(kind: CommandKind, args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Bytes>,
    {
        let mut cmd = Self::new(kind);
        cmd.tokens.extend(args.into_iter().map(Into::into));
        cmd
    }

    pub fn arg(mut self, arg: impl Into<Bytes>) -> Self {
        self.tokens.push(arg.into());
        self
    }

    /// Builds a command from raw tokens, the first being the command name.
    pub fn from_tokens(tokens: Vec<Bytes>) -> LResult<Self> {
        let Some(name) = tokens.first() else {
            return Err(Error::Config("a command needs at least a name".into()));
        };
        Ok(Self {
            kind: CommandKind::lookup(name),
            tokens,
        })
    }

    pub fn kind(&self) -> Option<CommandKind> {
        self.kind
    }

    /// The name as sent, e.g. `SET`.
    pub fn name(&self) -> String {
        String::from_utf8_lossy(&self.tokens[0]).to_uppercase()
    }

    pub fn tokens(&self) -> &[Bytes] {
        &self.tokens
    }

    pub fn reply_shape(&self) -> ReplyShape {
        self.kind.map_or(ReplyShape::Any, CommandKind::reply_shape)
    }

    pub fn to_frame(&self) -> Frame {
        Frame::Array(self.tokens.iter().cloned().map(Frame::BulkString).collect())
    }

    /// The exact bytes written to the server for this command.
    pub fn encode(&self) -> Bytes {
        let mut dst = BytesMut::new();
        self.to_frame().encode(&mut dst);
        dst.freeze()
    }
}

/// Renders the command as it would be typed into `redis-cli`, quoting
/// arguments that hold whitespace, quotes or non printable bytes.
impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, token) in self.tokens.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            let plain = !token.is_empty()
                && token
                    .iter()
                    .all(|b| b.is_ascii_graphic() && *b != b'"' && *b != b'\'');
            if plain {
                write!(f, "{}", token.escape_ascii())?;
            } else {
                write!(f, "\"{}\"", token.escape_ascii())?;
            }
        }
        Ok(())
    }
}
