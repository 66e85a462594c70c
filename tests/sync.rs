// ABOUTME: Tests for the content-addressed file synchronizer.
// ABOUTME: Verifies changed-only transfer, deletions, and exclusions.

mod support;

use apostoli::stages::FileSynchronizer;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::time::Duration;
use support::fake_executor::FakeExecutor;
use tempfile::TempDir;

const REMOTE_ROOT: &str = "/opt/apostoli/demo";

fn digest_of(content: &str) -> String {
    format!("{:x}", Sha256::digest(content.as_bytes()))
}

fn source_tree() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("Dockerfile"), "FROM python:3\n").unwrap();
    std::fs::write(dir.path().join("app.py"), "print('hi')\n").unwrap();
    dir
}

fn excludes() -> Vec<String> {
    vec![".git".to_string(), "*.log".to_string()]
}

async fn sync(executor: &FakeExecutor, root: &Path) -> apostoli::stages::SyncSummary {
    FileSynchronizer::new(executor, Duration::from_secs(60))
        .sync(root, REMOTE_ROOT, &excludes())
        .await
        .unwrap()
}

/// Test: an empty remote receives every local file.
#[tokio::test]
async fn first_sync_transfers_everything() {
    let dir = source_tree();
    let executor = FakeExecutor::new();

    let summary = sync(&executor, dir.path()).await;

    assert_eq!(summary.transferred_files, 2);
    assert!(summary.transferred_bytes > 0);
    assert_eq!(summary.deleted_files, 0);
    assert!(executor.ran("tar -xpf - -C '/opt/apostoli/demo'"));
}

/// Test: a second sync with no local changes transfers zero bytes.
#[tokio::test]
async fn unchanged_tree_transfers_nothing() {
    let dir = source_tree();
    let executor = FakeExecutor::new();

    let manifest = format!(
        "{}  ./Dockerfile\n{}  ./app.py\n",
        digest_of("FROM python:3\n"),
        digest_of("print('hi')\n"),
    );
    executor.respond("sha256sum", 0, &manifest);

    let summary = sync(&executor, dir.path()).await;

    assert_eq!(summary.transferred_files, 0);
    assert_eq!(summary.transferred_bytes, 0);
    assert_eq!(summary.deleted_files, 0);
    assert!(!executor.ran("tar -xpf"));
    assert!(!executor.ran("rm -f --"));
}

/// Test: only the changed file is re-uploaded.
#[tokio::test]
async fn changed_file_is_the_only_transfer() {
    let dir = source_tree();
    let executor = FakeExecutor::new();

    let manifest = format!(
        "{}  ./Dockerfile\n{}  ./app.py\n",
        digest_of("FROM python:3\n"),
        digest_of("print('old')\n"),
    );
    executor.respond("sha256sum", 0, &manifest);

    let summary = sync(&executor, dir.path()).await;

    assert_eq!(summary.transferred_files, 1);
}

/// Test: remote-only paths are deleted so the mirror includes deletions.
#[tokio::test]
async fn stale_remote_files_are_removed() {
    let dir = source_tree();
    let executor = FakeExecutor::new();

    let manifest = format!(
        "{}  ./Dockerfile\n{}  ./app.py\n{}  ./removed.py\n",
        digest_of("FROM python:3\n"),
        digest_of("print('hi')\n"),
        digest_of("gone\n"),
    );
    executor.respond("sha256sum", 0, &manifest);

    let summary = sync(&executor, dir.path()).await;

    assert_eq!(summary.deleted_files, 1);
    assert_eq!(summary.transferred_files, 0);
    let rm = executor
        .commands()
        .into_iter()
        .find(|c| c.contains("rm -f --"))
        .expect("a deletion command should run");
    assert!(rm.contains("'removed.py'"));
    assert!(!rm.contains("app.py"));
}

/// Test: excluded paths are neither uploaded nor deleted, even when the
/// remote side created them (runtime logs, for example).
#[tokio::test]
async fn excluded_paths_are_left_alone() {
    let dir = source_tree();
    std::fs::write(dir.path().join("debug.log"), "local noise\n").unwrap();
    let executor = FakeExecutor::new();

    let manifest = format!(
        "{}  ./Dockerfile\n{}  ./app.py\n{}  ./server.log\n",
        digest_of("FROM python:3\n"),
        digest_of("print('hi')\n"),
        digest_of("remote noise\n"),
    );
    executor.respond("sha256sum", 0, &manifest);

    let summary = sync(&executor, dir.path()).await;

    assert_eq!(summary.transferred_files, 0, "local .log must not upload");
    assert_eq!(summary.deleted_files, 0, "remote .log must not be deleted");
}
