use std::time::Duration;

use tokio::net::{TcpStream, ToSocketAddrs};
use tracing::debug;

use crate::{
    clients::Subscriber,
    cmd::{Command, CommandKind},
    Connection, ConnectionStream, Error, Frame, LResult,
};

/// Time allowed for a single round-trip unless configured otherwise.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Established connection with a server under test.
///
/// Backed by a single stream, `Client` provides basic network client
/// functionality (no pooling, retrying, pipelining, ...). Every request is a
/// strict round-trip: the reply of one command is read before the next
/// command is written.
#[derive(Debug)]
pub struct Client<S> {
    /// The stream decorated with the RESP encoder / decoder.
    connection: Connection<S>,
    /// Upper bound for writing a command and reading its reply.
    request_timeout: Duration,
}

impl Client<TcpStream> {
    /// Establish a connection with the server located at `addr`.
    ///
    /// Fails with [`Error::Timeout`] if the TCP handshake does not complete
    /// within `connect_timeout`.
    pub async fn connect(
        addr: impl ToSocketAddrs,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> LResult<Self> {
        let socket = tokio::time::timeout(connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| Error::Timeout(connect_timeout))??;
        // Requests are tiny and strictly sequential, Nagle only adds latency.
        socket.set_nodelay(true)?;
        Ok(Client::new(socket, request_timeout))
    }
}

impl<S: ConnectionStream> Client<S> {
    pub fn new(stream: S, request_timeout: Duration) -> Self {
        Self {
            connection: Connection::new(stream),
            request_timeout,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Sends `cmd` and waits for its reply.
    ///
    /// Error replies from the server are returned as [`Frame::SimpleError`],
    /// not as `Err`: for the harness they are just another reply to compare.
    #[tracing::instrument(skip_all, fields(cmd = %cmd), level = "debug")]
    pub async fn request(&mut self, cmd: &Command) -> LResult<Frame> {
        let timeout = self.request_timeout;
        tokio::time::timeout(timeout, async {
            self.write_command(cmd).await?;
            self.read_reply().await
        })
        .await
        .map_err(|_| Error::Timeout(timeout))?
    }

    /// Ping the server, returning `PONG` or the echoed message.
    pub async fn ping(&mut self) -> LResult<Frame> {
        match self.request(&Command::new(CommandKind::Ping)).await? {
            Frame::SimpleError(msg) => Err(Error::Response(msg)),
            frame => Ok(frame),
        }
    }

    /// Enter the subscribed state on `channels`.
    ///
    /// Returns once the server confirmed every subscription, so a message
    /// published after this returns is guaranteed to be delivered.
    pub async fn subscribe(mut self, channels: &[String]) -> LResult<Subscriber<S>> {
        let cmd = Command::with_args(CommandKind::Subscribe, channels.iter().cloned());
        self.write_command(&cmd).await?;
        let mut subscriber = Subscriber::new(self);
        for channel in channels {
            subscriber.confirm("subscribe", channel).await?;
        }
        Ok(subscriber)
    }

    /// Writes `cmd` without waiting for a reply, bounded by the request timeout.
    pub(crate) async fn write_command(&mut self, cmd: &Command) -> LResult<()> {
        let frame = cmd.to_frame();
        debug!(request = ?frame);
        let timeout = self.request_timeout;
        tokio::time::timeout(timeout, self.connection.write_frame(&frame))
            .await
            .map_err(|_| Error::Timeout(timeout))?
    }

    /// Reads the next frame, treating a clean close as [`Error::ConnectionClosed`].
    pub(crate) async fn read_reply(&mut self) -> LResult<Frame> {
        let response = self.connection.read_frame().await?;
        debug!(?response);
        // Receiving `None` indicates the connection has been closed by the
        // server without sending a frame.
        response.ok_or(Error::ConnectionClosed)
    }

    /// Closes the write half of the connection.
    pub async fn close(mut self) -> LResult<()> {
        self.connection.shutdown().await
    }
}
