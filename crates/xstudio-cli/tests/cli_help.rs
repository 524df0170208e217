use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

#[test]
fn test_help_shows_all_commands() {
    cargo_bin_cmd!("xstudio")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("transform"))
        .stdout(predicate::str::contains("watch"))
        .stdout(predicate::str::contains("tree"))
        .stdout(predicate::str::contains("sample"))
        .stdout(predicate::str::contains("export"))
        .stdout(predicate::str::contains("insert-image"));
}

#[test]
fn test_config_help_shows_subcommands() {
    cargo_bin_cmd!("xstudio")
        .args(["config", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("path"))
        .stdout(predicate::str::contains("init"))
        .stdout(predicate::str::contains("set-service-url"));
}

#[test]
fn test_transform_help_shows_version_flag() {
    cargo_bin_cmd!("xstudio")
        .args(["transform", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("xslt-version"));
}

#[test]
fn test_invalid_xslt_version_rejected() {
    cargo_bin_cmd!("xstudio")
        .args(["transform", "--xml", "a.xml", "--xslt", "a.xsl"])
        .args(["--xslt-version", "4.0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("4.0"));
}

#[test]
fn test_version_flag() {
    cargo_bin_cmd!("xstudio")
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("0.1"));
}
