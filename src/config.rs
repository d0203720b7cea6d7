//! Configuration of a harness run.
//!
//! Supports both command-line arguments and a TOML configuration file.
//! CLI arguments take precedence over config file values.

use std::{path::PathBuf, str::FromStr, time::Duration};

use clap::Parser;
use serde::Deserialize;

use crate::{
    bench::{BenchConfig, StopCondition, Workload, WorkloadKind},
    conformance::Family,
    Error, LResult, DEFAULT_HOST, DEFAULT_PORT,
};

/// One server endpoint under test.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Target {
    /// Label used in reports.
    pub name: String,
    /// `host:port` of the server.
    pub addr: String,
    /// Program and arguments that start the server again after the
    /// persistence family shut it down. When absent the harness waits for
    /// an external supervisor to bring it back.
    #[serde(default)]
    pub restart_command: Option<Vec<String>>,
}

impl Target {
    pub fn new(name: impl Into<String>, addr: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            addr: addr.into(),
            restart_command: None,
        }
    }
}

/// Parses `name=host:port` or a bare `host:port`, which doubles as the name.
impl FromStr for Target {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, addr) = match s.split_once('=') {
            Some((name, addr)) => (name.trim(), addr.trim()),
            None => (s.trim(), s.trim()),
        };
        let valid = !name.is_empty()
            && addr
                .rsplit_once(':')
                .is_some_and(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok());
        if !valid {
            return Err(Error::Config(format!(
                "target `{s}` is not of the form [name=]host:port"
            )));
        }
        Ok(Target::new(name, addr))
    }
}

/// Bounds on every wait the harness performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub connect: Duration,
    /// Covers one round-trip, and one pub/sub wait.
    pub request: Duration,
    /// How long a target may take to come back after `SHUTDOWN`.
    pub restart: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_millis(default_connect_timeout_ms()),
            request: Duration::from_millis(default_request_timeout_ms()),
            restart: Duration::from_millis(default_restart_timeout_ms()),
        }
    }
}

/// Command-line arguments of the harness.
#[derive(Parser, Debug, Default)]
#[command(name = "resp-parity", version, author)]
/// Checks that Redis protocol servers reply identically, then benchmarks them side by side.
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Target server as `[name=]host:port`, repeat for every server
    #[arg(short, long = "target")]
    pub targets: Vec<Target>,

    /// Conformance families to run, comma separated
    #[arg(short, long, value_enum, value_delimiter = ',')]
    pub families: Vec<Family>,

    /// Do not run the conformance suite
    #[arg(long)]
    pub skip_conformance: bool,

    /// Do not run the benchmark
    #[arg(long)]
    pub skip_benchmark: bool,

    /// Concurrent workers per target
    #[arg(short = 'n', long)]
    pub concurrency: Option<usize>,

    /// Benchmark duration in seconds
    #[arg(short, long, conflicts_with = "iterations")]
    pub duration: Option<u64>,

    /// Stop the benchmark after this many completed commands per target
    #[arg(short, long)]
    pub iterations: Option<u64>,

    /// Command mix issued by the benchmark workers
    #[arg(short, long, value_enum)]
    pub workload: Option<WorkloadKind>,

    /// Command template for the `template` workload, e.g. "SET k:{worker}:{seq} {value}"
    #[arg(long)]
    pub template: Option<String>,

    /// Size in bytes of the values written by the benchmark
    #[arg(long)]
    pub value_size: Option<usize>,

    /// Benchmark all targets at the same time instead of one after another
    #[arg(long)]
    pub side_by_side: bool,

    #[arg(long)]
    pub connect_timeout_ms: Option<u64>,

    #[arg(long)]
    pub request_timeout_ms: Option<u64>,

    #[arg(long)]
    pub restart_timeout_ms: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct TomlConfig {
    #[serde(default)]
    pub targets: Vec<Target>,
    #[serde(default)]
    pub conformance: ConformanceSection,
    #[serde(default)]
    pub benchmark: BenchmarkSection,
    #[serde(default)]
    pub timeouts: TimeoutsSection,
    pub log_level: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConformanceSection {
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub families: Option<Vec<Family>>,
}

impl Default for ConformanceSection {
    fn default() -> Self {
        Self {
            enabled: true,
            families: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BenchmarkSection {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_duration_secs")]
    pub duration_secs: u64,
    /// Takes precedence over `duration_secs` when set.
    pub iterations: Option<u64>,
    #[serde(default)]
    pub workload: WorkloadKind,
    pub template: Option<String>,
    #[serde(default = "default_value_size")]
    pub value_size: usize,
    #[serde(default)]
    pub side_by_side: bool,
}

impl Default for BenchmarkSection {
    fn default() -> Self {
        Self {
            enabled: true,
            concurrency: default_concurrency(),
            duration_secs: default_duration_secs(),
            iterations: None,
            workload: WorkloadKind::default(),
            template: None,
            value_size: default_value_size(),
            side_by_side: false,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimeoutsSection {
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_ms: u64,
    #[serde(default = "default_request_timeout_ms")]
    pub request_ms: u64,
    #[serde(default = "default_restart_timeout_ms")]
    pub restart_ms: u64,
}

impl Default for TimeoutsSection {
    fn default() -> Self {
        Self {
            connect_ms: default_connect_timeout_ms(),
            request_ms: default_request_timeout_ms(),
            restart_ms: default_restart_timeout_ms(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_concurrency() -> usize {
    50
}

fn default_duration_secs() -> u64 {
    10
}

fn default_value_size() -> usize {
    16
}

fn default_connect_timeout_ms() -> u64 {
    2_000
}

fn default_request_timeout_ms() -> u64 {
    5_000
}

fn default_restart_timeout_ms() -> u64 {
    30_000
}

fn default_log_level() -> String {
    "info".to_string()
}

/// The reference server and the candidate reimplementation, on adjacent ports.
fn default_targets() -> Vec<Target> {
    vec![
        Target::new("reference", format!("{DEFAULT_HOST}:{DEFAULT_PORT}")),
        Target::new("candidate", format!("{DEFAULT_HOST}:{}", DEFAULT_PORT - 1)),
    ]
}

/// Final resolved configuration of a harness run.
#[derive(Debug, Clone)]
pub struct Config {
    pub targets: Vec<Target>,
    /// Families to run, in execution order; empty disables the suite.
    pub families: Vec<Family>,
    /// `None` disables the benchmark.
    pub bench: Option<BenchConfig>,
    pub timeouts: Timeouts,
    pub log_level: String,
}

impl Config {
    /// Load configuration from CLI args and the optional TOML file they name.
    pub fn load() -> LResult<Self> {
        let cli = CliArgs::parse();
        let file = match cli.config {
            Some(ref path) => {
                let contents = std::fs::read_to_string(path).map_err(|e| {
                    Error::Config(format!("failed to read `{}`: {e}", path.display()))
                })?;
                toml::from_str(&contents).map_err(|e| {
                    Error::Config(format!("failed to parse `{}`: {e}", path.display()))
                })?
            }
            None => TomlConfig::default(),
        };
        Config::merge(cli, file)
    }

    /// Merges CLI args over file values and validates the result.
    pub fn merge(cli: CliArgs, file: TomlConfig) -> LResult<Self> {
        let targets = if !cli.targets.is_empty() {
            merge_targets(cli.targets, &file.targets)
        } else if !file.targets.is_empty() {
            file.targets
        } else {
            default_targets()
        };

        let families = if cli.skip_conformance || !file.conformance.enabled {
            Vec::new()
        } else if !cli.families.is_empty() {
            Family::in_run_order(cli.families)
        } else {
            Family::in_run_order(
                file.conformance
                    .families
                    .unwrap_or_else(|| Family::DEFAULT.to_vec()),
            )
        };

        let section = file.benchmark;
        let bench = if cli.skip_benchmark || !section.enabled {
            None
        } else {
            let stop = match (cli.iterations, cli.duration, section.iterations) {
                (Some(n), _, _) => StopCondition::Iterations(n),
                (None, Some(secs), _) => StopCondition::Duration(Duration::from_secs(secs)),
                (None, None, Some(n)) => StopCondition::Iterations(n),
                (None, None, None) => {
                    StopCondition::Duration(Duration::from_secs(section.duration_secs))
                }
            };
            let workload = Workload::new(
                cli.workload.unwrap_or(section.workload),
                cli.template.or(section.template).as_deref(),
            )?;
            Some(BenchConfig {
                concurrency: cli.concurrency.unwrap_or(section.concurrency),
                stop,
                workload,
                value_size: cli.value_size.unwrap_or(section.value_size),
                side_by_side: cli.side_by_side || section.side_by_side,
            })
        };

        let timeouts = Timeouts {
            connect: Duration::from_millis(
                cli.connect_timeout_ms.unwrap_or(file.timeouts.connect_ms),
            ),
            request: Duration::from_millis(
                cli.request_timeout_ms.unwrap_or(file.timeouts.request_ms),
            ),
            restart: Duration::from_millis(
                cli.restart_timeout_ms.unwrap_or(file.timeouts.restart_ms),
            ),
        };

        let config = Config {
            targets,
            families,
            bench,
            timeouts,
            log_level: cli
                .log_level
                .or(file.log_level)
                .unwrap_or_else(default_log_level),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> LResult<()> {
        if self.targets.is_empty() {
            return Err(Error::Config("at least one target is required".into()));
        }
        for (i, target) in self.targets.iter().enumerate() {
            if self.targets[..i].iter().any(|t| t.name == target.name) {
                return Err(Error::Config(format!(
                    "target name `{}` is used twice",
                    target.name
                )));
            }
        }
        if let Some(bench) = &self.bench {
            if bench.concurrency == 0 {
                return Err(Error::Config("concurrency must be at least 1".into()));
            }
            match bench.stop {
                StopCondition::Duration(d) if d.is_zero() => {
                    return Err(Error::Config("duration must be positive".into()))
                }
                StopCondition::Iterations(0) => {
                    return Err(Error::Config("iterations must be positive".into()))
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/// Targets given on the command line keep the restart command the file
/// configures for the same name.
fn merge_targets(cli: Vec<Target>, file: &[Target]) -> Vec<Target> {
    cli.into_iter()
        .map(|mut target| {
            if let Some(known) = file.iter().find(|t| t.name == target.name) {
                target.restart_command = known.restart_command.clone();
            }
            target
        })
        .collect()
}
