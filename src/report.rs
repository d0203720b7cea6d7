//! Summary of a harness run.

use std::fmt;

use crate::{
    bench::BenchmarkResult,
    conformance::{Actual, Outcome, SuiteReport},
};

/// A conformance step on which the targets disagree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Divergence {
    /// `family/step` identifier.
    pub step: String,
    /// Per target: its name and what it did, `None` when it never reached the step.
    pub targets: Vec<(String, Option<(Outcome, Actual)>)>,
}

impl Divergence {
    /// Compares the records of every target step by step.
    ///
    /// Steps diverge when their outcomes differ, or when every target failed
    /// them but with different replies. Steps are listed in the order the
    /// first target that ran them ran them.
    pub fn find(suites: &[SuiteReport]) -> Vec<Divergence> {
        let mut steps: Vec<String> = Vec::new();
        for suite in suites {
            for record in &suite.records {
                let id = record.id();
                if !steps.contains(&id) {
                    steps.push(id);
                }
            }
        }

        steps
            .into_iter()
            .filter_map(|step| {
                let targets: Vec<_> = suites
                    .iter()
                    .map(|suite| {
                        let seen = suite
                            .records
                            .iter()
                            .find(|r| r.id() == step)
                            .map(|r| (r.outcome(), r.actual().clone()));
                        (suite.target.clone(), seen)
                    })
                    .collect();
                diverges(&targets).then_some(Divergence { step, targets })
            })
            .collect()
    }
}

fn diverges(targets: &[(String, Option<(Outcome, Actual)>)]) -> bool {
    let Some((_, first)) = targets.first() else {
        return false;
    };
    let Some((outcome, actual)) = first else {
        return targets.iter().any(|(_, seen)| seen.is_some());
    };
    targets.iter().any(|(_, seen)| match seen {
        None => true,
        Some((o, _)) if o != outcome => true,
        Some((o, a)) => *o == Outcome::Failed && a != actual,
    })
}

/// Everything a harness run produced, per target and never aggregated.
#[derive(Debug, Clone)]
pub struct Report {
    pub conformance: Vec<SuiteReport>,
    pub divergences: Vec<Divergence>,
    pub benchmarks: Vec<BenchmarkResult>,
}

impl Report {
    pub fn new(conformance: Vec<SuiteReport>, benchmarks: Vec<BenchmarkResult>) -> Self {
        let divergences = Divergence::find(&conformance);
        Self {
            conformance,
            divergences,
            benchmarks,
        }
    }

    /// True when every target passed every assertion it ran and no
    /// benchmark worker crashed.
    ///
    /// Workers that stopped early on a connection failure are reported but
    /// do not fail the run.
    pub fn passed(&self) -> bool {
        self.conformance.iter().all(SuiteReport::passed)
            && self.benchmarks.iter().all(|b| b.crashed == 0)
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.conformance.is_empty() {
            writeln!(f, "Conformance")?;
            for suite in &self.conformance {
                writeln!(
                    f,
                    "=== {}: {} passed, {} failed, {} skipped ===",
                    suite.target,
                    suite.count(Outcome::Passed),
                    suite.count(Outcome::Failed),
                    suite.count(Outcome::Skipped),
                )?;
                for record in suite.failures() {
                    writeln!(f, "{} {}", record.outcome(), record.id())?;
                    writeln!(f, "  command:  {}", record.command())?;
                    writeln!(f, "  expected: {}", record.expected())?;
                    writeln!(f, "  actual:   {}", record.actual())?;
                }
            }
        }

        if !self.divergences.is_empty() {
            writeln!(f, "\nDivergences")?;
            for divergence in &self.divergences {
                writeln!(f, "{}", divergence.step)?;
                for (target, seen) in &divergence.targets {
                    match seen {
                        Some((outcome, actual)) => {
                            writeln!(f, "  {target}: {outcome} {actual}")?
                        }
                        None => writeln!(f, "  {target}: not run")?,
                    }
                }
            }
        }

        if !self.benchmarks.is_empty() {
            writeln!(f, "\nBenchmark")?;
            for result in &self.benchmarks {
                write!(f, "{result}")?;
            }
        }

        writeln!(f, "\nResult: {}", if self.passed() { "PASS" } else { "FAIL" })
    }
}
