use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use bytes::Bytes;
use tokio::{sync::broadcast, time::Instant};
use tracing::{error, info};

use super::{
    result::{BenchmarkResult, Latencies, WorkerFailure},
    worker::{Stop, Worker},
    BenchConfig, StopCondition,
};
use crate::{
    config::{Target, Timeouts},
    LResult, Shutdown,
};

/// Runs the configured load against each target and collects one
/// [`BenchmarkResult`] per target.
#[derive(Debug, Clone)]
pub struct Runner {
    config: BenchConfig,
    timeouts: Timeouts,
}

impl Runner {
    pub fn new(config: BenchConfig, timeouts: Timeouts) -> Self {
        Self { config, timeouts }
    }

    /// Benchmarks every target, in the order given.
    ///
    /// Targets run one after another unless `side_by_side` is set. Results
    /// are kept per target and never aggregated across targets.
    pub async fn run(&self, targets: &[Target]) -> LResult<Vec<BenchmarkResult>> {
        if !self.config.side_by_side {
            let mut results = Vec::with_capacity(targets.len());
            for target in targets {
                results.push(self.run_target(target).await?);
            }
            return Ok(results);
        }

        let handles: Vec<_> = targets
            .iter()
            .map(|target| {
                let runner = self.clone();
                let target = target.clone();
                tokio::spawn(async move { runner.run_target(&target).await })
            })
            .collect();
        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            // a panic here is a bug in the runner itself, not a worker failure
            results.push(handle.await.map_err(std::io::Error::other)??);
        }
        Ok(results)
    }

    #[tracing::instrument(skip_all, fields(server = %target.name))]
    pub async fn run_target(&self, target: &Target) -> LResult<BenchmarkResult> {
        info!(
            addr = %target.addr,
            concurrency = self.config.concurrency,
            stop = ?self.config.stop,
            "starting benchmark"
        );

        let counter = Arc::new(AtomicU64::new(0));
        let workload = Arc::new(self.config.workload.clone());
        let value = Bytes::from(vec![b'x'; self.config.value_size]);
        let (notify_stop, _) = broadcast::channel(1);

        let start = Instant::now();
        let handles: Vec<_> = (0..self.config.concurrency)
            .map(|id| {
                let stop = match self.config.stop {
                    StopCondition::Duration(_) => Stop::Deadline(Shutdown::new(notify_stop.subscribe())),
                    StopCondition::Iterations(total) => Stop::Iterations(total),
                };
                let worker = Worker {
                    id,
                    addr: target.addr.clone(),
                    timeouts: self.timeouts,
                    workload: workload.clone(),
                    value: value.clone(),
                    counter: counter.clone(),
                    stop,
                };
                tokio::spawn(worker.run())
            })
            .collect();

        let timer = match self.config.stop {
            StopCondition::Duration(duration) => {
                let notify_stop = notify_stop.clone();
                Some(tokio::spawn(async move {
                    tokio::time::sleep(duration).await;
                    let _ = notify_stop.send(());
                }))
            }
            StopCondition::Iterations(_) => None,
        };

        let mut latencies = Latencies::new()?;
        let mut failures = Vec::new();
        let mut error_replies = 0;
        let mut crashed = 0;
        for handle in handles {
            match handle.await {
                Ok(Ok(report)) => {
                    latencies.merge(&report.latencies)?;
                    error_replies += report.error_replies;
                    if let Some(error) = report.failure {
                        failures.push(WorkerFailure {
                            worker: report.id,
                            completed: report.completed,
                            error,
                        });
                    }
                }
                Ok(Err(e)) => return Err(e),
                Err(e) => {
                    error!(error = %e, "worker task crashed");
                    crashed += 1;
                }
            }
        }
        let elapsed = start.elapsed();
        // Every worker finished, so the timer is only still running when
        // they all failed before the deadline.
        if let Some(timer) = timer {
            timer.abort();
        }

        // All workers have been joined, no increment can race this read.
        let completed = counter.load(Ordering::Relaxed);
        let result = BenchmarkResult::new(
            target.name.clone(),
            self.config.concurrency,
            elapsed,
            completed,
            error_replies,
            &latencies,
            failures,
            crashed,
        );
        info!(
            completed,
            elapsed = ?elapsed,
            throughput = result.throughput(),
            failed_workers = result.failures.len(),
            "benchmark done"
        );
        Ok(result)
    }
}
