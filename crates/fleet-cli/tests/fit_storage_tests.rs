//! CLI integration tests for `fit-storage`.

use assert_cmd::Command;
use predicates::prelude::*;

fn fit_storage() -> Command {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("fit-storage").expect("binary `fit-storage` should be built");
    cmd.env_remove("STORAGE_TYPE").env_remove("STORAGE_ROOT");
    cmd
}

#[test]
fn help_exits_zero() {
    fit_storage().arg("--help").assert().success().stdout(predicate::str::contains("object store"));
}

#[test]
fn create_bucket_then_upload_then_download_round_trips() {
    let root = tempfile::tempdir().unwrap();
    let source = root.path().join("payload.json");
    std::fs::write(&source, r#"{"hello":"world"}"#).unwrap();

    fit_storage()
        .arg("--root")
        .arg(root.path())
        .arg("--bucket")
        .arg("resources")
        .arg("create-bucket")
        .assert()
        .success();

    fit_storage()
        .arg("--root")
        .arg(root.path())
        .arg("--bucket")
        .arg("resources")
        .arg("upload")
        .arg("a.json")
        .arg(&source)
        .assert()
        .success();

    let dest = root.path().join("out.json");
    fit_storage()
        .arg("--root")
        .arg(root.path())
        .arg("--bucket")
        .arg("resources")
        .arg("download")
        .arg("a.json")
        .arg(&dest)
        .assert()
        .success();

    let content = std::fs::read_to_string(&dest).unwrap();
    assert_eq!(content, r#"{"hello":"world"}"#);
}

#[test]
fn list_reports_uploaded_keys() {
    let root = tempfile::tempdir().unwrap();
    let source = root.path().join("a.bin");
    std::fs::write(&source, b"abc").unwrap();

    fit_storage()
        .arg("--root")
        .arg(root.path())
        .arg("--bucket")
        .arg("vectors")
        .arg("upload")
        .arg("a.bin")
        .arg(&source)
        .assert()
        .success();

    fit_storage()
        .arg("--root")
        .arg(root.path())
        .arg("--bucket")
        .arg("vectors")
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("a.bin"));
}

#[test]
fn download_missing_key_is_an_operational_error() {
    let root = tempfile::tempdir().unwrap();
    let dest = root.path().join("out.bin");

    fit_storage()
        .arg("--root")
        .arg(root.path())
        .arg("--bucket")
        .arg("resources")
        .arg("download")
        .arg("missing.bin")
        .arg(&dest)
        .assert()
        .failure()
        .code(1);
}
