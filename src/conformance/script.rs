use std::collections::HashSet;

use tracing::{debug, warn};

use super::{driver::Driver, AssertionRecord, Expect};
use crate::{
    cmd::{Command, CommandKind},
    Frame,
};

/// One scripted round-trip of a conformance family.
#[derive(Debug, Clone)]
pub struct Step {
    pub(crate) name: &'static str,
    pub(crate) command: Command,
    pub(crate) expect: Expect,
    /// Earlier steps whose side effects this step relies on.
    pub(crate) requires: &'static [&'static str],
}

impl Step {
    pub fn new(name: &'static str, command: Command, expect: Expect) -> Self {
        Self {
            name,
            command,
            expect,
            requires: &[],
        }
    }

    pub fn requires(mut self, steps: &'static [&'static str]) -> Self {
        self.requires = steps;
        self
    }
}

/// Runs `steps` in order against the driver's target.
///
/// Every step is recorded. A step is skipped, and its command not sent,
/// when one of the steps it requires did not pass; a plain mismatch never
/// stops the remaining steps.
///
/// A transaction opened by a passing `MULTI` is always closed again: when its
/// `EXEC` or `DISCARD` step is skipped, or the steps run out, an unrecorded
/// `DISCARD` is sent so later steps are not queued on the server.
pub(crate) async fn run_steps(
    driver: &mut Driver,
    group: &'static str,
    steps: Vec<Step>,
    records: &mut Vec<AssertionRecord>,
) {
    let mut passed: HashSet<&'static str> = HashSet::new();
    let mut in_multi = false;
    for step in steps {
        let kind = step.command.kind();
        let closes_multi = matches!(kind, Some(CommandKind::Exec | CommandKind::Discard));

        if let Some(missing) = step.requires.iter().find(|dep| !passed.contains(*dep)) {
            debug!(group, step = step.name, missing, "skipping step");
            if closes_multi && in_multi {
                discard(driver, group).await;
                in_multi = false;
            }
            records.push(AssertionRecord::skipped(
                group,
                step.name,
                &step.command,
                step.expect,
            ));
            continue;
        }

        let result = driver.request(&step.command).await;
        let record = AssertionRecord::new(group, step.name, &step.command, step.expect, &result);
        if closes_multi {
            in_multi = false;
        }
        if record.passed() {
            if kind == Some(CommandKind::Multi) {
                in_multi = true;
            }
            passed.insert(step.name);
        } else {
            warn!(
                group,
                step = step.name,
                expected = %record.expected(),
                actual = %record.actual(),
                "assertion failed"
            );
        }
        records.push(record);
    }

    if in_multi {
        discard(driver, group).await;
    }
}

async fn discard(driver: &mut Driver, group: &'static str) {
    debug!(group, "discarding open transaction");
    match driver.request(&Command::new(CommandKind::Discard)).await {
        Ok(Frame::SimpleString(_)) => {}
        // A fresh connection never has a transaction open.
        _ => driver.disconnect(),
    }
}
