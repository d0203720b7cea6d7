use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use bytes::Bytes;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::{result::Latencies, Workload};
use crate::{config::Timeouts, Client, LResult, Shutdown};

/// How a worker learns that the run is over.
#[derive(Debug)]
pub(super) enum Stop {
    Deadline(Shutdown),
    /// Stop once the shared counter reached this many completions.
    Iterations(u64),
}

/// What one worker did during a run.
#[derive(Debug)]
pub(super) struct WorkerReport {
    pub(super) id: usize,
    pub(super) completed: u64,
    pub(super) error_replies: u64,
    pub(super) latencies: Latencies,
    /// Set when the worker stopped because of a connection failure.
    pub(super) failure: Option<String>,
}

/// Drives load against a single target over its own connection.
#[derive(Debug)]
pub(super) struct Worker {
    pub(super) id: usize,
    pub(super) addr: String,
    pub(super) timeouts: Timeouts,
    pub(super) workload: Arc<Workload>,
    pub(super) value: Bytes,
    /// Completions of every worker of the target.
    pub(super) counter: Arc<AtomicU64>,
    pub(super) stop: Stop,
}

impl Worker {
    #[tracing::instrument(skip(self), fields(worker = self.id, addr = %self.addr))]
    pub(super) async fn run(mut self) -> LResult<WorkerReport> {
        let mut report = WorkerReport {
            id: self.id,
            completed: 0,
            error_replies: 0,
            latencies: Latencies::new()?,
            failure: None,
        };

        let connect = Client::connect(
            self.addr.as_str(),
            self.timeouts.connect,
            self.timeouts.request,
        );
        let connected = match &mut self.stop {
            // No command is in flight yet, so giving up on the connect is safe.
            Stop::Deadline(shutdown) => tokio::select! {
                res = connect => Some(res),
                _ = shutdown.recv() => None,
            },
            Stop::Iterations(_) => Some(connect.await),
        };
        let mut client = match connected {
            None => return Ok(report),
            Some(Ok(client)) => client,
            Some(Err(e)) => {
                warn!(error = %e, "worker could not connect");
                report.failure = Some(e.to_string());
                return Ok(report);
            }
        };

        let mut seq = 0u64;
        'run: loop {
            for cmd in self.workload.commands(self.id, seq, &self.value) {
                if self.should_stop() {
                    break 'run;
                }
                let start = Instant::now();
                match client.request(&cmd).await {
                    Ok(reply) => {
                        let elapsed = start.elapsed();
                        match cmd.kind() {
                            Some(kind) => report.latencies.record(kind.name(), elapsed),
                            None => report.latencies.record(&cmd.name(), elapsed),
                        }
                        if !cmd.reply_shape().accepts(&reply) {
                            report.error_replies += 1;
                        }
                        report.completed += 1;
                        // only fully completed round-trips are counted
                        self.counter.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => {
                        warn!(error = %e, completed = report.completed, "worker stopped early");
                        report.failure = Some(e.to_string());
                        break 'run;
                    }
                }
            }
            seq += 1;
        }

        debug!(completed = report.completed, "worker done");
        Ok(report)
    }

    fn should_stop(&mut self) -> bool {
        match &mut self.stop {
            Stop::Deadline(shutdown) => shutdown.poll(),
            Stop::Iterations(total) => self.counter.load(Ordering::Relaxed) >= *total,
        }
    }
}
