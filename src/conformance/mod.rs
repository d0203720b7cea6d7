//! The conformance suite: fixed scripts of commands and expected replies,
//! grouped in families and run against one target at a time.

mod driver;
mod expect;
mod families;
mod persistence;
mod pubsub;
mod record;
mod script;

pub use expect::Expect;
pub use record::{Actual, AssertionRecord, Outcome};
pub use script::Step;

use std::fmt;

use serde::Deserialize;
use tracing::info;

use crate::{
    cmd::{Command, CommandKind},
    config::{Target, Timeouts},
};
use driver::Driver;

/// A group of related conformance steps.
///
/// Declaration order is the run order. Persistence restarts the target, so
/// it comes last.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, clap::ValueEnum, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum Family {
    Strings,
    Lists,
    Hashes,
    Sets,
    SortedSets,
    Transactions,
    PubSub,
    Persistence,
}

impl Family {
    pub const ALL: [Family; 8] = [
        Family::Strings,
        Family::Lists,
        Family::Hashes,
        Family::Sets,
        Family::SortedSets,
        Family::Transactions,
        Family::PubSub,
        Family::Persistence,
    ];

    /// Every family that leaves the target running.
    pub const DEFAULT: [Family; 7] = [
        Family::Strings,
        Family::Lists,
        Family::Hashes,
        Family::Sets,
        Family::SortedSets,
        Family::Transactions,
        Family::PubSub,
    ];

    /// Sorts `families` into run order, dropping repeats.
    pub fn in_run_order(mut families: Vec<Family>) -> Vec<Family> {
        families.sort_unstable();
        families.dedup();
        families
    }

    pub fn label(self) -> &'static str {
        match self {
            Family::Strings => "strings",
            Family::Lists => "lists",
            Family::Hashes => "hashes",
            Family::Sets => "sets",
            Family::SortedSets => "sorted-sets",
            Family::Transactions => "transactions",
            Family::PubSub => "pub-sub",
            Family::Persistence => "persistence",
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Runs the selected families against one target.
#[derive(Debug)]
pub struct Suite {
    driver: Driver,
    families: Vec<Family>,
}

impl Suite {
    pub fn new(target: Target, timeouts: Timeouts, families: &[Family]) -> Self {
        Self {
            driver: Driver::new(target, timeouts),
            families: Family::in_run_order(families.to_vec()),
        }
    }

    /// Flushes the target, then runs every family in order.
    ///
    /// Never fails: connection problems end up in the records like any
    /// other mismatch.
    #[tracing::instrument(skip_all, fields(server = %self.driver.target().name))]
    pub async fn run(mut self) -> SuiteReport {
        let mut records = Vec::new();
        let setup = vec![Step::new(
            "flushall",
            Command::new(CommandKind::FlushAll),
            Expect::ok(),
        )];
        script::run_steps(&mut self.driver, "setup", setup, &mut records).await;

        for family in self.families.clone() {
            let before = records.len();
            self.run_family(family, &mut records).await;
            let failed = records[before..]
                .iter()
                .filter(|r| r.outcome() == Outcome::Failed)
                .count();
            info!(
                %family,
                steps = records.len() - before,
                failed,
                "family done"
            );
        }
        self.driver.disconnect();

        SuiteReport {
            target: self.driver.target().name.clone(),
            records,
        }
    }

    async fn run_family(&mut self, family: Family, records: &mut Vec<AssertionRecord>) {
        let label = family.label();
        let steps = match family {
            Family::Strings => families::strings(),
            Family::Lists => families::lists(),
            Family::Hashes => families::hashes(),
            Family::Sets => families::sets(),
            Family::SortedSets => families::sorted_sets(),
            Family::Transactions => families::transactions(),
            Family::PubSub => return pubsub::run(&self.driver, records).await,
            Family::Persistence => return persistence::run(&mut self.driver, records).await,
        };
        script::run_steps(&mut self.driver, label, steps, records).await;
    }
}

/// Every assertion recorded against one target, in execution order.
#[derive(Debug, Clone)]
pub struct SuiteReport {
    pub target: String,
    pub records: Vec<AssertionRecord>,
}

impl SuiteReport {
    pub fn count(&self, outcome: Outcome) -> usize {
        self.records
            .iter()
            .filter(|r| r.outcome() == outcome)
            .count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &AssertionRecord> {
        self.records
            .iter()
            .filter(|r| r.outcome() == Outcome::Failed)
    }

    /// True when no assertion failed. Skipped steps always follow a failed
    /// one, so they need no separate check.
    pub fn passed(&self) -> bool {
        self.failures().next().is_none()
    }
}
