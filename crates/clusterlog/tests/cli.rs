use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn clusterlog(socket_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("clusterlog").unwrap();
    cmd.env("CLUSTERLOG_SOCKET", socket_dir.path().join("missing.sock"))
        .env("NO_COLOR", "1")
        .arg("--no-start");
    cmd
}

#[test]
fn help_lists_commands() {
    Command::cargo_bin("clusterlog")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("get"))
        .stdout(predicate::str::contains("list"))
        .stdout(predicate::str::contains("resolve"));
}

#[test]
fn ping_reports_missing_daemon() {
    let dir = TempDir::new().unwrap();
    clusterlog(&dir)
        .arg("ping")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Daemon is not running"));
}

#[test]
fn nodes_fails_without_daemon() {
    let dir = TempDir::new().unwrap();
    clusterlog(&dir)
        .arg("nodes")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Daemon not running"));
}

#[test]
fn list_requires_a_node() {
    let dir = TempDir::new().unwrap();
    clusterlog(&dir)
        .arg("list")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--node-id or --node-ip"));
}

#[test]
fn follow_rejects_timeout() {
    let dir = TempDir::new().unwrap();
    clusterlog(&dir)
        .args(["get", "--actor-id", "a1", "--follow", "--timeout", "3"])
        .assert()
        .failure();
}

#[test]
fn node_state_needs_alive_or_dead() {
    let dir = TempDir::new().unwrap();
    clusterlog(&dir)
        .args(["node-state", "node-1", "gone"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("alive"));
}
