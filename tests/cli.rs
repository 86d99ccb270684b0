use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

/// Nothing listens on the discard port, so every request is refused at once.
const DEAD_PROXY: &str = "http://127.0.0.1:9/api/plugins/st-proxy-plugin/fetch";

#[test]
fn help_lists_subcommands() {
    cargo_bin_cmd!("chub-search")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("search"))
        .stdout(predicate::str::contains("tags"))
        .stdout(predicate::str::contains("download"))
        .stdout(predicate::str::contains("tui"));
}

#[test]
fn search_json_prints_empty_array_when_catalog_unreachable() {
    let config = TempDir::new().unwrap();
    cargo_bin_cmd!("chub-search")
        .args(["search", "--json", "--include", "elf, mage"])
        .args(["--proxy-url", DEAD_PROXY])
        .arg("--config-dir")
        .arg(config.path())
        .env("CHUB_HTTP_TIMEOUT_SECS", "5")
        .env_remove("CHUB_DIRECT")
        .assert()
        .success()
        .stdout(predicate::str::diff("[]\n"));
}

#[test]
fn search_plain_prints_empty_state() {
    let config = TempDir::new().unwrap();
    cargo_bin_cmd!("chub-search")
        .args(["search", "--query", "elf"])
        .args(["--proxy-url", DEAD_PROXY])
        .arg("--config-dir")
        .arg(config.path())
        .env("CHUB_HTTP_TIMEOUT_SECS", "5")
        .env_remove("CHUB_DIRECT")
        .assert()
        .success()
        .stdout(predicate::str::contains("No characters found"));
}

#[test]
fn unknown_sort_is_rejected() {
    cargo_bin_cmd!("chub-search")
        .args(["search", "--sort", "popularity"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown sort"));
}

#[test]
fn download_failure_exits_nonzero() {
    let data = TempDir::new().unwrap();
    cargo_bin_cmd!("chub-search")
        .args(["download", "alice/elara"])
        .args(["--proxy-url", DEAD_PROXY])
        .arg("--import-dir")
        .arg(data.path().join("imports"))
        .env("CHUB_HTTP_TIMEOUT_SECS", "5")
        .env_remove("CHUB_DIRECT")
        .assert()
        .failure()
        .stderr(predicate::str::contains("nothing imported"));
    assert!(!data.path().join("imports").join("alice_elara.png").exists());
}

#[test]
fn tui_once_headless_renders_and_logs() {
    let data = TempDir::new().unwrap();
    let config = TempDir::new().unwrap();
    cargo_bin_cmd!("chub-search")
        .args(["tui", "--once"])
        .arg("--data-dir")
        .arg(data.path())
        .arg("--config-dir")
        .arg(config.path())
        .env("TUI_HEADLESS", "1")
        .env_remove("RUST_LOG")
        .assert()
        .success();
    let log = std::fs::read_to_string(data.path().join("chub-search.log")).unwrap();
    assert!(log.contains("headless frame rendered"), "log was:\n{log}");
}

#[test]
fn completions_mention_binary_name() {
    cargo_bin_cmd!("chub-search")
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("chub-search"));
}
