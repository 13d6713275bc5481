//! CLI integration tests for `fit-rc`.

use assert_cmd::Command;
use predicates::prelude::*;

fn fit_rc() -> Command {
    #[allow(deprecated)]
    Command::cargo_bin("fit-rc").expect("binary `fit-rc` should be built")
}

#[test]
fn help_exits_zero() {
    fit_rc().arg("--help").assert().success().stdout(predicate::str::contains("supervised services"));
}

#[test]
fn status_without_a_daemon_reports_not_running() {
    let root = tempfile::tempdir().unwrap();
    std::fs::write(root.path().join("services.json"), "[]").unwrap();

    fit_rc()
        .arg("--root")
        .arg(root.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("not running"));
}

#[test]
fn unknown_service_name_is_a_usage_error() {
    let root = tempfile::tempdir().unwrap();
    std::fs::write(
        root.path().join("services.json"),
        r#"[{"name": "trace", "command": "sleep 1"}]"#,
    )
    .unwrap();

    fit_rc()
        .arg("--root")
        .arg(root.path())
        .arg("status")
        .arg("nope")
        .assert()
        .failure()
        .code(1);
}
