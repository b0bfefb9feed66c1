//! Behavioural smoke tests for the CLI entrypoint.

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

#[test]
fn help_lists_the_lifecycle_verbs() {
    let mut cmd = cargo_bin_cmd!("cloudvol");
    cmd.arg("--help");
    cmd.assert().success().stdout(
        predicate::str::contains("create")
            .and(predicate::str::contains("mount"))
            .and(predicate::str::contains("capabilities")),
    );
}

#[test]
fn no_arguments_shows_usage_and_fails() {
    let mut cmd = cargo_bin_cmd!("cloudvol");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn create_rejects_conflicting_sources_at_the_flag_level() {
    let mut cmd = cargo_bin_cmd!("cloudvol");
    cmd.args([
        "create",
        "vol1",
        "--source-snapshot",
        "snap",
        "--source-image",
        "img",
    ]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}
