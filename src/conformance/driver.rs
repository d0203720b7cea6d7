use std::time::Duration;

use tokio::net::TcpStream;
use tracing::{debug, warn};

use crate::{
    cmd::Command,
    config::{Target, Timeouts},
    Client, Error, Frame, LResult,
};

/// Long-lived connection of the suite to one target.
///
/// A connection-level failure leaves the stream in an unknown framing
/// state, so the client is dropped and the next request reconnects.
#[derive(Debug)]
pub(crate) struct Driver {
    target: Target,
    timeouts: Timeouts,
    client: Option<Client<TcpStream>>,
}

impl Driver {
    pub(crate) fn new(target: Target, timeouts: Timeouts) -> Self {
        Self {
            target,
            timeouts,
            client: None,
        }
    }

    pub(crate) fn target(&self) -> &Target {
        &self.target
    }

    pub(crate) fn timeouts(&self) -> Timeouts {
        self.timeouts
    }

    pub(crate) async fn request(&mut self, cmd: &Command) -> LResult<Frame> {
        let mut client = match self.client.take() {
            Some(client) => client,
            None => {
                debug!(addr = %self.target.addr, "connecting");
                self.open().await?
            }
        };
        let result = client.request(cmd).await;
        match &result {
            Err(e) if e.is_connection_error() => {
                warn!(server = %self.target.name, error = %e, "dropping connection");
            }
            _ => self.client = Some(client),
        }
        result
    }

    /// Opens a fresh connection owned by the caller, e.g. for pub/sub.
    pub(crate) async fn open(&self) -> LResult<Client<TcpStream>> {
        Client::connect(
            self.target.addr.as_str(),
            self.timeouts.connect,
            self.timeouts.request,
        )
        .await
    }

    /// Forgets the current connection, e.g. after the server shut down.
    pub(crate) fn disconnect(&mut self) {
        self.client = None;
    }

    /// Polls the target until it accepts connections and answers `PING`,
    /// bounded by the restart timeout.
    pub(crate) async fn wait_until_ready(&mut self) -> LResult<Frame> {
        const POLL_INTERVAL: Duration = Duration::from_millis(100);

        let deadline = tokio::time::Instant::now() + self.timeouts.restart;
        loop {
            let attempt = match self.open().await {
                Ok(mut client) => {
                    let pong = client.ping().await;
                    pong.map(|pong| (client, pong))
                }
                Err(e) => Err(e),
            };
            match attempt {
                Ok((client, pong)) => {
                    self.client = Some(client);
                    return Ok(pong);
                }
                Err(e) if tokio::time::Instant::now() + POLL_INTERVAL >= deadline => {
                    return Err(match e {
                        Error::Response(_) => e,
                        _ => Error::Timeout(self.timeouts.restart),
                    })
                }
                Err(e) => debug!(error = %e, "target not ready yet"),
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}
