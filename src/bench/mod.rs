//! Concurrent throughput measurement of one or more targets.

use std::time::Duration;

use bytes::Bytes;
use clap::ValueEnum;
use serde::Deserialize;

use crate::{
    cmd::{Command, CommandKind},
    Error, LResult,
};

mod result;
pub use result::{BenchmarkResult, LatencySummary, WorkerFailure};

mod runner;
pub use runner::Runner;

mod worker;

/// When the workers of a target stop issuing commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopCondition {
    /// Run until the deadline, then finish the command in flight.
    Duration(Duration),
    /// Run until this many commands completed on the target.
    Iterations(u64),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkloadKind {
    #[default]
    Set,
    SetGet,
    SetGetDel,
    Template,
}

/// The command mix every worker issues in a loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Workload {
    /// `SET` of a fresh key every iteration.
    Set,
    /// `SET` then `GET` of the same fresh key.
    SetGet,
    /// `SET`, `GET` and `DEL` of the same fresh key.
    SetGetDel,
    /// User supplied tokens; `{worker}`, `{seq}` and `{value}` are substituted.
    Template(Vec<String>),
}

impl Workload {
    pub fn new(kind: WorkloadKind, template: Option<&str>) -> LResult<Self> {
        match (kind, template) {
            (WorkloadKind::Set, _) => Ok(Workload::Set),
            (WorkloadKind::SetGet, _) => Ok(Workload::SetGet),
            (WorkloadKind::SetGetDel, _) => Ok(Workload::SetGetDel),
            (WorkloadKind::Template, Some(template)) => {
                let tokens: Vec<String> = template.split_whitespace().map(String::from).collect();
                if tokens.is_empty() {
                    return Err(Error::Config("the benchmark template is empty".into()));
                }
                Ok(Workload::Template(tokens))
            }
            (WorkloadKind::Template, None) => Err(Error::Config(
                "the `template` workload needs a command template".into(),
            )),
        }
    }

    /// Commands of iteration `seq` of `worker`.
    ///
    /// Keys live under `bench:` and embed the worker id and sequence number,
    /// so they never collide with each other nor with the conformance keys.
    pub(crate) fn commands(&self, worker: usize, seq: u64, value: &Bytes) -> Vec<Command> {
        match self {
            Workload::Set => {
                vec![Command::new(CommandKind::Set)
                    .arg(bench_key(worker, seq))
                    .arg(value.clone())]
            }
            Workload::SetGet | Workload::SetGetDel => {
                let key = Bytes::from(bench_key(worker, seq));
                let mut cmds = vec![
                    Command::new(CommandKind::Set)
                        .arg(key.clone())
                        .arg(value.clone()),
                    Command::new(CommandKind::Get).arg(key.clone()),
                ];
                if *self == Workload::SetGetDel {
                    cmds.push(Command::new(CommandKind::Del).arg(key));
                }
                cmds
            }
            Workload::Template(tokens) => {
                let tokens = tokens
                    .iter()
                    .map(|token| match token.as_str() {
                        "{value}" => value.clone(),
                        token => Bytes::from(
                            token
                                .replace("{worker}", &worker.to_string())
                                .replace("{seq}", &seq.to_string()),
                        ),
                    })
                    .collect();
                // `Workload::new` rejects empty templates
                Command::from_tokens(tokens).into_iter().collect()
            }
        }
    }
}

fn bench_key(worker: usize, seq: u64) -> String {
    format!("bench:{worker}:{seq}")
}

#[derive(Debug, Clone)]
pub struct BenchConfig {
    /// Workers per target.
    pub concurrency: usize,
    pub stop: StopCondition,
    pub workload: Workload,
    /// Size of the values written.
    pub value_size: usize,
    /// Run every target at the same time instead of one after another.
    pub side_by_side: bool,
}
