//! Durability across a restart of the target.
//!
//! The target is shut down by the suite itself. It comes back either through
//! the configured restart command or through an outside supervisor; in both
//! cases the suite polls until it answers again, within the restart timeout.

use std::{process::Stdio, time::Duration};

use tracing::{info, warn};

use super::{driver::Driver, AssertionRecord, Expect};
use crate::{
    cmd::{Command, CommandKind},
    Error, Frame, LResult,
};

const GROUP: &str = "persistence";
const KEY: &str = "persistkey";
const VALUE: &str = "persistent value";

/// Attempts at `SAVE` while a background save is still running.
const SAVE_ATTEMPTS: u32 = 50;
const SAVE_RETRY_DELAY: Duration = Duration::from_millis(100);

pub(crate) async fn run(driver: &mut Driver, records: &mut Vec<AssertionRecord>) {
    let set = Command::with_args(CommandKind::Set, [KEY, VALUE]);
    let result = driver.request(&set).await;
    records.push(AssertionRecord::new(GROUP, "set", &set, Expect::ok(), &result));
    let stored = records.last().is_some_and(AssertionRecord::passed);

    let bgsave = Command::new(CommandKind::BgSave);
    let result = driver.request(&bgsave).await;
    records.push(AssertionRecord::new(
        GROUP,
        "bgsave",
        &bgsave,
        Expect::StatusPrefix("Background saving".into()),
        &result,
    ));

    let save = Command::new(CommandKind::Save);
    let result = save_when_idle(driver, &save).await;
    records.push(AssertionRecord::new(GROUP, "save", &save, Expect::ok(), &result));

    let shutdown = Command::new(CommandKind::Shutdown);
    let result = driver.request(&shutdown).await;
    records.push(AssertionRecord::new(
        GROUP,
        "shutdown",
        &shutdown,
        Expect::AnyOf(vec![Expect::Closed, Expect::ok()]),
        &result,
    ));
    driver.disconnect();

    let restart = restart_description(driver);
    let result = restart_target(driver).await;
    records.push(AssertionRecord::new(
        GROUP,
        "restart",
        &restart,
        Expect::Status("PONG".into()),
        &result,
    ));
    let restarted = records.last().is_some_and(AssertionRecord::passed);

    let get = Command::with_args(CommandKind::Get, [KEY]);
    let expect = Expect::bulk(VALUE);
    if stored && restarted {
        let result = driver.request(&get).await;
        records.push(AssertionRecord::new(GROUP, "get-after-restart", &get, expect, &result));
    } else {
        records.push(AssertionRecord::skipped(GROUP, "get-after-restart", &get, expect));
    }
}

/// Sends `SAVE`, retrying while the server still runs the background save
/// started just before.
async fn save_when_idle(driver: &mut Driver, save: &Command) -> LResult<Frame> {
    let mut attempt = 1;
    loop {
        match driver.request(save).await? {
            Frame::SimpleError(msg) if msg.contains("in progress") && attempt < SAVE_ATTEMPTS => {
                attempt += 1;
                tokio::time::sleep(SAVE_RETRY_DELAY).await;
            }
            frame => return Ok(frame),
        }
    }
}

fn restart_description(driver: &Driver) -> String {
    match &driver.target().restart_command {
        Some(argv) => format!("(restart with `{}`, then PING)", argv.join(" ")),
        None => "(wait for restart, then PING)".to_string(),
    }
}

async fn restart_target(driver: &mut Driver) -> LResult<Frame> {
    if let Some(argv) = &driver.target().restart_command {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| Error::Config("empty restart command".into()))?;
        let child = tokio::process::Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .spawn()?;
        info!(server = %driver.target().name, pid = child.id(), "restart command spawned");
    } else {
        warn!(
            server = %driver.target().name,
            timeout = ?driver.timeouts().restart,
            "no restart command, waiting for the target to come back"
        );
    }
    driver.wait_until_ready().await
}
