use bytes::Bytes;
use tracing::debug;

use crate::{
    clients::Client,
    cmd::{Command, CommandKind},
    ConnectionStream, Error, Frame, LResult,
};

/// A message received on a subscribed channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub channel: String,
    pub payload: Bytes,
}

/// A client that has entered pub/sub mode.
///
/// Once subscribed, the connection only carries push frames, so the
/// `Subscriber` exposes reads of messages instead of general requests.
#[derive(Debug)]
pub struct Subscriber<S> {
    client: Client<S>,
}

impl<S: ConnectionStream> Subscriber<S> {
    pub(crate) fn new(client: Client<S>) -> Self {
        Self { client }
    }

    /// Waits for the `kind` confirmation (`subscribe` or `unsubscribe`) of `channel`.
    pub(crate) async fn confirm(&mut self, kind: &str, channel: &str) -> LResult<()> {
        let frame = self.read_push().await?;
        match push_parts(&frame) {
            Some((k, c, Frame::Integer(_))) if k == kind.as_bytes() && c == channel.as_bytes() => {
                debug!(kind, channel, "confirmed");
                Ok(())
            }
            _ => Err(Error::Response(format!(
                "expected `{kind}` confirmation for `{channel}`, got: {frame}"
            ))),
        }
    }

    /// Waits for the next published message, bounded by the request timeout.
    pub async fn next_message(&mut self) -> LResult<Message> {
        let frame = self.read_push().await?;
        into_message(&frame).ok_or_else(|| Error::Response(format!("expected a message, got: {frame}")))
    }

    /// Waits for the next push frame of any kind, bounded by the request timeout.
    pub async fn next_push(&mut self) -> LResult<Frame> {
        self.read_push().await
    }

    /// Sends `UNSUBSCRIBE` for `channels`.
    ///
    /// The confirmations arrive as push frames, after any message the server
    /// delivered before processing the command.
    pub async fn unsubscribe(&mut self, channels: &[String]) -> LResult<()> {
        let cmd = Command::with_args(CommandKind::Unsubscribe, channels.iter().cloned());
        self.client.write_command(&cmd).await
    }

    async fn read_push(&mut self) -> LResult<Frame> {
        let timeout = self.client.request_timeout();
        tokio::time::timeout(timeout, self.client.read_reply())
            .await
            .map_err(|_| Error::Timeout(timeout))?
    }
}

/// Splits a three element push frame into its kind, channel and payload.
fn push_parts(frame: &Frame) -> Option<(&[u8], &[u8], &Frame)> {
    match frame {
        Frame::Array(items) if items.len() == 3 => {
            Some((items[0].as_bytes()?, items[1].as_bytes()?, &items[2]))
        }
        _ => None,
    }
}

fn into_message(frame: &Frame) -> Option<Message> {
    match push_parts(frame)? {
        (b"message", channel, Frame::BulkString(payload)) => Some(Message {
            channel: String::from_utf8_lossy(channel).into_owned(),
            payload: payload.clone(),
        }),
        _ => None,
    }
}
