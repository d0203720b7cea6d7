use tokio::sync::broadcast::{error::TryRecvError, Receiver};

/// Listens for the benchmark stop signal.
///
/// Stop is signalled using a `Receiver`. Only a single value is ever sent.
/// Once a value has been sent via the broadcast channel, or the sender has
/// been dropped, workers should stop.
///
/// The `Shutdown` struct listens for the signal and tracks that the signal has
/// been received. Workers poll it between round-trips so that a command in
/// flight is always completed before they exit.
#[derive(Debug)]
pub(crate) struct Shutdown {
    /// `true` if the shutdown signal has been received.
    is_shutdown: bool,
    /// The receive half of the channel used to listen for shutdown signals.
    notify: Receiver<()>,
}

impl Shutdown {
    /// Creates a new `Shutdown` backed by the given `Receiver`.
    pub(crate) fn new(notify: Receiver<()>) -> Shutdown {
        Shutdown {
            is_shutdown: false,
            notify,
        }
    }

    /// Returns `true` if the shutdown signal has been received, without waiting.
    pub(crate) fn poll(&mut self) -> bool {
        if !self.is_shutdown {
            self.is_shutdown = !matches!(self.notify.try_recv(), Err(TryRecvError::Empty));
        }
        self.is_shutdown
    }

    /// Receive the shutdown notice, waiting if necessary.
    pub(crate) async fn recv(&mut self) {
        // If we've already received a shutdown signal, there's no need to wait
        // for another one.
        if self.is_shutdown {
            return;
        }

        // Wait for a shutdown signal, cannot receive a `lag error` as only one value is ever sent.
        let _ = self.notify.recv().await;
        // Remember that the signal has been received.
        self.is_shutdown = true;
    }
}
