//! End-to-end CLI tests for the arxin binary.

#![allow(deprecated)]

mod support;

use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use support::socket_guard::start_mock_server_or_skip;
use support::{atom_entry, atom_feed};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

/// Binary with an isolated config home so a developer's own config is never read.
fn arxin(temp: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("arxin").unwrap();
    cmd.env("XDG_CONFIG_HOME", temp.path().join("xdg-config"))
        .env_remove("RUST_LOG");
    cmd
}

fn write_config(temp: &TempDir, body: &str) -> std::path::PathBuf {
    let path = temp.path().join("arxin.toml");
    std::fs::write(&path, body).unwrap();
    path
}

async fn article_count(db_path: &Path) -> i64 {
    let db = arxin_core::Database::new(db_path).await.unwrap();
    let count = db.article_count().await.unwrap();
    db.close().await;
    count
}

#[test]
fn test_binary_help_displays_usage() {
    let temp = TempDir::new().unwrap();
    arxin(&temp)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("arXiv metadata ingestion"))
        .stdout(predicate::str::contains("backfill"));
}

#[test]
fn test_binary_version_displays_version() {
    let temp = TempDir::new().unwrap();
    arxin(&temp)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("arxin"));
}

#[test]
fn test_binary_requires_subcommand() {
    let temp = TempDir::new().unwrap();
    arxin(&temp).assert().failure();
}

#[test]
fn test_binary_invalid_flag_returns_error() {
    let temp = TempDir::new().unwrap();
    arxin(&temp)
        .args(["init", "--invalid-flag"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[tokio::test]
async fn test_init_creates_database_in_nested_dir() {
    let temp = TempDir::new().unwrap();
    let db_path = temp.path().join("data").join("arxiv.db");

    arxin(&temp)
        .arg("-q")
        .arg("init")
        .arg("--database")
        .arg(&db_path)
        .assert()
        .success();

    assert!(db_path.exists());
    assert_eq!(article_count(&db_path).await, 0);
}

#[test]
fn test_reset_without_confirmation_fails() {
    let temp = TempDir::new().unwrap();
    let db_path = temp.path().join("arxiv.db");

    arxin(&temp)
        .arg("reset")
        .arg("--database")
        .arg(&db_path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("--yes"));

    arxin(&temp)
        .args(["-q", "reset", "--yes", "--database"])
        .arg(&db_path)
        .assert()
        .success();
}

#[test]
fn test_unknown_config_key_fails() {
    let temp = TempDir::new().unwrap();
    let config = write_config(&temp, "concurrency = 4\n");

    arxin(&temp)
        .arg("init")
        .arg("--config")
        .arg(&config)
        .arg("--database")
        .arg(temp.path().join("arxiv.db"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown configuration key"));
}

#[test]
fn test_backfill_rejects_start_after_end() {
    let temp = TempDir::new().unwrap();
    arxin(&temp)
        .args(["backfill", "--start", "2024-02-01", "--end", "2024-01-01"])
        .arg("--database")
        .arg(temp.path().join("arxiv.db"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("is after end"));
}

#[tokio::test]
async fn test_backfill_against_mock_api_stores_articles() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let entries = [
        atom_entry(
            "http://arxiv.org/abs/2401.00001v1",
            "2024-01-02T00:00:00Z",
            "2024-01-02T00:00:00Z",
            "Transformers for galaxies",
            "A transformer trained on a galaxy dataset.",
            &["astro-ph.GA", "cs.LG"],
        ),
        atom_entry(
            "http://arxiv.org/abs/2401.00002v1",
            "2024-01-03T00:00:00Z",
            "2024-01-01T00:00:00Z",
            "Backwards in time",
            "Published after its last update.",
            &["cs.LG"],
        ),
    ];
    Mock::given(method("GET"))
        .and(path("/api/query"))
        .respond_with(ResponseTemplate::new(200).set_body_string(atom_feed(2, &entries)))
        .expect(1)
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let config = write_config(
        &temp,
        &format!("api_base_url = \"{}\"\npage_size = 50\n", server.uri()),
    );
    let db_path = temp.path().join("arxiv.db");
    let rejected_dir = temp.path().join("rejected");

    arxin(&temp)
        .args(["-q", "backfill", "--start", "2024-01-01", "--end", "2024-01-10"])
        .arg("--config")
        .arg(&config)
        .arg("--database")
        .arg(&db_path)
        .arg("--rejected-dir")
        .arg(&rejected_dir)
        .args(["--delay-ms", "0"])
        .assert()
        .success();

    assert_eq!(article_count(&db_path).await, 1);
    let payloads = std::fs::read_dir(&rejected_dir)
        .unwrap()
        .filter(|entry| {
            entry
                .as_ref()
                .unwrap()
                .path()
                .extension()
                .is_some_and(|ext| ext == "xml")
        })
        .count();
    assert_eq!(payloads, 1);
}

#[tokio::test]
async fn test_backfill_transport_failure_exits_non_zero() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/api/query"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let config = write_config(&temp, &format!("api_base_url = \"{}\"\n", server.uri()));

    let assert = arxin(&temp)
        .args(["-q", "backfill", "--start", "2024-01-01", "--end", "2024-01-10"])
        .arg("--config")
        .arg(&config)
        .arg("--database")
        .arg(temp.path().join("arxiv.db"))
        .args(["--delay-ms", "0"])
        .assert()
        .failure();
    assert_eq!(
        assert.get_output().status.code(),
        Some(2),
        "transport failure before any write should exit with 2"
    );
}
