use tracing::info;

use crate::{
    bench::Runner,
    config::Config,
    conformance::Suite,
    report::Report,
    LResult,
};

/// One harness run: conformance suite, then benchmark, against every target.
///
/// Everything the run needs is owned here and lives exactly as long as the
/// run; connections are opened by the suite and the workers and closed
/// before `run` returns.
#[derive(Debug)]
pub struct Harness {
    config: Config,
}

impl Harness {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Runs the suite on each target in turn, then benchmarks them.
    ///
    /// The suite flushes each target first and the benchmark writes only
    /// `bench:` keys, so running both in one session is safe. Errors are only
    /// returned for problems of the harness itself; a failing target shows up
    /// in the report.
    pub async fn run(&self) -> LResult<Report> {
        let Config {
            targets,
            families,
            bench,
            timeouts,
            ..
        } = &self.config;

        let mut conformance = Vec::with_capacity(targets.len());
        if !families.is_empty() {
            for target in targets {
                info!(server = %target.name, addr = %target.addr, ?families, "running conformance suite");
                let suite = Suite::new(target.clone(), *timeouts, families);
                conformance.push(suite.run().await);
            }
        }

        let benchmarks = match bench {
            Some(bench) => Runner::new(bench.clone(), *timeouts).run(targets).await?,
            None => Vec::new(),
        };

        Ok(Report::new(conformance, benchmarks))
    }
}
