use std::{collections::BTreeMap, fmt, time::Duration};

use hdrhistogram::Histogram;

use crate::{Error, LResult};

/// Latency distribution of one command kind, in microseconds.
#[derive(Debug, Clone, PartialEq)]
pub struct LatencySummary {
    pub count: u64,
    pub mean_us: f64,
    pub p50_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

impl LatencySummary {
    fn from_histogram(histogram: &Histogram<u64>) -> Self {
        Self {
            count: histogram.len(),
            mean_us: histogram.mean(),
            p50_us: histogram.value_at_quantile(0.50),
            p99_us: histogram.value_at_quantile(0.99),
            max_us: histogram.max(),
        }
    }
}

/// A worker that stopped before the run's stopping condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerFailure {
    pub worker: usize,
    /// Round-trips the worker completed before failing.
    pub completed: u64,
    pub error: String,
}

/// Per command kind latency histograms recorded by one worker.
#[derive(Debug)]
pub(crate) struct Latencies {
    template: Histogram<u64>,
    by_command: BTreeMap<String, Histogram<u64>>,
}

impl Latencies {
    pub(crate) fn new() -> LResult<Self> {
        let template = Histogram::new(3).map_err(|e| Error::Histogram(e.to_string()))?;
        Ok(Self {
            template,
            by_command: BTreeMap::new(),
        })
    }

    pub(crate) fn record(&mut self, command: &str, elapsed: Duration) {
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        match self.by_command.get_mut(command) {
            Some(histogram) => histogram.saturating_record(micros),
            None => {
                let mut histogram = self.template.clone();
                histogram.saturating_record(micros);
                self.by_command.insert(command.to_string(), histogram);
            }
        }
    }

    pub(crate) fn merge(&mut self, other: &Latencies) -> LResult<()> {
        for (command, histogram) in &other.by_command {
            self.by_command
                .entry(command.clone())
                .or_insert_with(|| self.template.clone())
                .add(histogram)
                .map_err(|e| Error::Histogram(e.to_string()))?;
        }
        Ok(())
    }

    fn summaries(&self) -> BTreeMap<String, LatencySummary> {
        self.by_command
            .iter()
            .map(|(command, h)| (command.clone(), LatencySummary::from_histogram(h)))
            .collect()
    }
}

/// Outcome of benchmarking one target. Read-only once built.
#[derive(Debug, Clone)]
pub struct BenchmarkResult {
    pub target: String,
    pub concurrency: usize,
    /// Wall-clock time from the first worker start until every worker stopped.
    pub elapsed: Duration,
    /// Round-trips completed by all workers.
    pub completed: u64,
    /// Completed round-trips whose reply was an error or had the wrong shape.
    pub error_replies: u64,
    pub latencies: BTreeMap<String, LatencySummary>,
    pub failures: Vec<WorkerFailure>,
    /// Worker tasks that panicked.
    pub crashed: usize,
}

impl BenchmarkResult {
    pub(crate) fn new(
        target: String,
        concurrency: usize,
        elapsed: Duration,
        completed: u64,
        error_replies: u64,
        latencies: &Latencies,
        failures: Vec<WorkerFailure>,
        crashed: usize,
    ) -> Self {
        Self {
            target,
            concurrency,
            elapsed,
            completed,
            error_replies,
            latencies: latencies.summaries(),
            failures,
            crashed,
        }
    }

    /// Completed commands per second.
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.completed as f64 / secs
        } else {
            0.0
        }
    }
}

impl fmt::Display for BenchmarkResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== {} ({} workers) ===", self.target, self.concurrency)?;
        writeln!(f, "Throughput: {:.2} cmd/sec", self.throughput())?;
        writeln!(f, "Completed: {}", self.completed)?;
        writeln!(f, "Elapsed: {:.2}s", self.elapsed.as_secs_f64())?;
        if self.error_replies > 0 {
            writeln!(f, "Error replies: {}", self.error_replies)?;
        }
        for (command, l) in &self.latencies {
            writeln!(
                f,
                "  {command:<10} n={} avg={:.1}us p50={}us p99={}us max={}us",
                l.count, l.mean_us, l.p50_us, l.p99_us, l.max_us
            )?;
        }
        for failure in &self.failures {
            writeln!(
                f,
                "  worker {} stopped early after {} commands: {}",
                failure.worker, failure.completed, failure.error
            )?;
        }
        if self.crashed > 0 {
            writeln!(f, "  {} workers crashed", self.crashed)?;
        }
        Ok(())
    }
}
