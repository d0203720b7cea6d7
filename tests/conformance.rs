mod common;

use std::time::Duration;

use resp_parity::{
    config::{Target, Timeouts},
    conformance::{Family, Outcome, Suite, SuiteReport},
    Config, Harness,
};
use tracing_test::traced_test;

fn timeouts() -> Timeouts {
    Timeouts {
        connect: Duration::from_secs(1),
        request: Duration::from_secs(2),
        restart: Duration::from_secs(2),
    }
}

fn outcome(report: &SuiteReport, id: &str) -> Outcome {
    report
        .records
        .iter()
        .find(|r| r.id() == id)
        .unwrap_or_else(|| panic!("no record for {id}"))
        .outcome()
}

fn failures(report: &SuiteReport) -> String {
    report
        .failures()
        .map(|r| format!("{}: expected {} got {}\n", r.id(), r.expected(), r.actual()))
        .collect()
}

#[tokio::test]
#[traced_test]
async fn test_every_family_passes() {
    let addr = common::spawn().await;
    let target = Target::new("fake", addr.to_string());

    let report = Suite::new(target, timeouts(), &Family::ALL).run().await;

    assert!(report.passed(), "{}", failures(&report));
    assert_eq!(report.count(Outcome::Skipped), 0);
    assert_eq!(report.records[0].id(), "setup/flushall");
    let last = report.records.last().unwrap();
    assert_eq!(last.id(), "persistence/get-after-restart");
    assert!(logs_contain("family done"));
}

#[tokio::test]
async fn test_pub_sub_records_in_protocol_order() {
    let addr = common::spawn().await;
    let target = Target::new("fake", addr.to_string());

    let report = Suite::new(target, timeouts(), &[Family::PubSub]).run().await;

    let ids: Vec<_> = report.records.iter().map(|r| r.id()).collect();
    assert_eq!(
        ids,
        [
            "setup/flushall",
            "pub-sub/publish-before-subscribe",
            "pub-sub/subscribe",
            "pub-sub/publish",
            "pub-sub/receive",
            "pub-sub/unsubscribe",
        ]
    );
    assert!(report.passed(), "{}", failures(&report));
}

#[tokio::test]
async fn test_failed_multi_skips_queued_steps() {
    let addr = common::spawn_with(common::Options {
        disabled: vec!["MULTI"],
        ..Default::default()
    })
    .await;
    let target = Target::new("fake", addr.to_string());

    let report = Suite::new(target, timeouts(), &[Family::Transactions]).run().await;

    assert!(!report.passed());
    assert_eq!(outcome(&report, "transactions/multi"), Outcome::Failed);
    assert_eq!(outcome(&report, "transactions/multi-abort"), Outcome::Failed);
    for step in [
        "queue-set",
        "queue-incr",
        "exec",
        "committed-set-visible",
        "committed-incr-visible",
        "queue-discarded-set",
        "discard",
        "discarded-set-invisible",
    ] {
        let id = format!("transactions/{step}");
        assert_eq!(outcome(&report, &id), Outcome::Skipped, "{id}");
    }
    assert_eq!(report.count(Outcome::Failed), 2);
}

#[tokio::test]
async fn test_failed_queued_step_does_not_leave_transaction_open() {
    // The queued INCR is rejected, so EXEC is skipped with MULTI still open.
    // A nested MULTI would then be refused by the next family.
    let addr = common::spawn_with(common::Options {
        disabled: vec!["INCR"],
        ..Default::default()
    })
    .await;
    let target = Target::new("fake", addr.to_string());

    let report = Suite::new(target, timeouts(), &[Family::Transactions, Family::Persistence])
        .run()
        .await;

    assert_eq!(outcome(&report, "transactions/queue-incr"), Outcome::Failed);
    assert_eq!(outcome(&report, "transactions/exec"), Outcome::Skipped);
    for step in ["multi-abort", "queue-discarded-set", "discard", "discarded-set-invisible"] {
        let id = format!("transactions/{step}");
        assert_eq!(outcome(&report, &id), Outcome::Passed, "{id}");
    }
    let persistence: Vec<_> = report
        .records
        .iter()
        .filter(|r| r.id().starts_with("persistence/"))
        .collect();
    assert!(!persistence.is_empty());
    assert!(persistence.iter().all(|r| r.outcome() == Outcome::Passed));
    assert_eq!(report.count(Outcome::Failed), 1, "{}", failures(&report));
}

#[tokio::test]
async fn test_message_published_before_subscribing_is_a_failure() {
    let addr = common::spawn_with(common::Options {
        replay_history: true,
        ..Default::default()
    })
    .await;
    let target = Target::new("fake", addr.to_string());

    let report = Suite::new(target, timeouts(), &[Family::PubSub]).run().await;

    assert_eq!(outcome(&report, "pub-sub/publish-before-subscribe"), Outcome::Passed);
    assert_eq!(outcome(&report, "pub-sub/subscribe"), Outcome::Passed);
    assert_eq!(outcome(&report, "pub-sub/receive"), Outcome::Failed);
    let receive = report
        .records
        .iter()
        .find(|r| r.id() == "pub-sub/receive")
        .unwrap();
    assert!(receive.actual().to_string().contains("published before subscribing"));
}

#[tokio::test]
async fn test_duplicate_delivery_is_a_failure() {
    let addr = common::spawn_with(common::Options {
        duplicate_delivery: true,
        ..Default::default()
    })
    .await;
    let target = Target::new("fake", addr.to_string());

    let report = Suite::new(target, timeouts(), &[Family::PubSub]).run().await;

    assert_eq!(outcome(&report, "pub-sub/receive"), Outcome::Passed);
    // the second copy arrives where the unsubscribe confirmation belongs
    assert_eq!(outcome(&report, "pub-sub/unsubscribe"), Outcome::Failed);
    assert_eq!(report.count(Outcome::Failed), 1);
}

#[tokio::test]
async fn test_save_waits_for_background_save() {
    let addr = common::spawn_with(common::Options {
        busy_saves: 3,
        ..Default::default()
    })
    .await;
    let target = Target::new("fake", addr.to_string());

    let report = Suite::new(target, timeouts(), &[Family::Persistence]).run().await;

    assert_eq!(outcome(&report, "persistence/save"), Outcome::Passed);
    assert!(report.passed(), "{}", failures(&report));
}

#[tokio::test]
async fn test_rejected_subscribe_skips_publish() {
    let addr = common::spawn_with(common::Options {
        disabled: vec!["SUBSCRIBE"],
        ..Default::default()
    })
    .await;
    let target = Target::new("fake", addr.to_string());

    let report = Suite::new(target, timeouts(), &[Family::PubSub]).run().await;

    assert_eq!(outcome(&report, "pub-sub/publish-before-subscribe"), Outcome::Passed);
    assert_eq!(outcome(&report, "pub-sub/subscribe"), Outcome::Failed);
    assert_eq!(outcome(&report, "pub-sub/publish"), Outcome::Skipped);
    assert_eq!(outcome(&report, "pub-sub/receive"), Outcome::Skipped);
    assert_eq!(outcome(&report, "pub-sub/unsubscribe"), Outcome::Skipped);
}

#[tokio::test]
async fn test_unreachable_target_fails_every_step() {
    let addr = common::dead_addr().await;
    let target = Target::new("dead", addr.to_string());

    let report = Suite::new(target, timeouts(), &[Family::Strings]).run().await;

    assert!(!report.passed());
    assert_eq!(outcome(&report, "setup/flushall"), Outcome::Failed);
    assert_eq!(outcome(&report, "strings/set"), Outcome::Failed);
    assert_eq!(outcome(&report, "strings/append"), Outcome::Skipped);
}

#[tokio::test]
async fn test_restart_command_is_run() {
    let addr = common::spawn().await;
    let mut target = Target::new("fake", addr.to_string());
    target.restart_command = Some(vec!["true".into()]);

    let report = Suite::new(target, timeouts(), &[Family::Persistence]).run().await;

    assert!(report.passed(), "{}", failures(&report));
    let restart = report
        .records
        .iter()
        .find(|r| r.id() == "persistence/restart")
        .unwrap();
    assert!(restart.command().contains("`true`"));
}

#[tokio::test]
#[traced_test]
async fn test_harness_reports_divergence() {
    let reference = common::spawn().await;
    let candidate = common::spawn_with(common::Options {
        disabled: vec!["APPEND"],
        ..Default::default()
    })
    .await;
    let config = Config {
        targets: vec![
            Target::new("reference", reference.to_string()),
            Target::new("candidate", candidate.to_string()),
        ],
        families: vec![Family::Strings],
        bench: None,
        timeouts: timeouts(),
        log_level: "info".into(),
    };

    let report = Harness::new(config).run().await.unwrap();

    assert!(!report.passed());
    assert!(report.conformance[0].passed());
    assert!(!report.conformance[1].passed());
    let steps: Vec<_> = report.divergences.iter().map(|d| d.step.as_str()).collect();
    // the read depends on the append, so it is skipped on one side only
    assert_eq!(steps, ["strings/append", "strings/get-appended"]);

    let text = report.to_string();
    assert!(text.contains("Divergences"));
    assert!(text.contains("candidate: FAIL (error) ERR unknown command 'APPEND'"));
    assert!(text.contains("Result: FAIL"));
}
