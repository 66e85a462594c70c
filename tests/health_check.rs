// ABOUTME: Tests for the bounded health-check retry loop.
// ABOUTME: Exercises termination conditions with a scripted executor.

mod support;

use apostoli::error::{Error, ExitCategory};
use apostoli::stages::{ContainerDeployer, HealthCheck, ProbeOutcome};
use apostoli::types::AppName;
use std::time::Duration;
use support::fake_executor::FakeExecutor;

fn fast_health(max_attempts: u32) -> HealthCheck {
    HealthCheck {
        max_attempts,
        interval: Duration::ZERO,
        settle: Duration::ZERO,
    }
}

fn deployer<'a>(executor: &'a FakeExecutor, app: &'a AppName) -> ContainerDeployer<'a, FakeExecutor> {
    ContainerDeployer::new(executor, app, 8080, "/opt/apostoli/demo", false)
}

/// Test: the loop exits early on the first attempt where the container
/// runs and the probe succeeds.
#[tokio::test]
async fn loop_exits_early_when_healthy() {
    let executor = FakeExecutor::new();
    let app = AppName::new("demo").unwrap();

    // Container reaches running on the third status check.
    executor.respond_seq("docker inspect", &[(1, ""), (1, ""), (0, "")]);
    executor.respond("curl", 0, "");

    let state = deployer(&executor, &app)
        .health_check(fast_health(30))
        .wait_healthy()
        .await;

    assert!(state.healthy());
    assert_eq!(state.attempts, 3);
    assert!(state.last_running);
    assert_eq!(state.last_probe, ProbeOutcome::Succeeded);
}

/// Test: a running container with a failing probe is not healthy, and
/// the probe is re-attempted up to the bound.
#[tokio::test]
async fn running_but_unresponsive_exhausts_attempts() {
    let executor = FakeExecutor::new();
    let app = AppName::new("demo").unwrap();

    executor.respond("docker inspect", 0, "");
    executor.respond("curl", 1, "");

    let state = deployer(&executor, &app)
        .health_check(fast_health(5))
        .wait_healthy()
        .await;

    assert!(!state.healthy());
    assert_eq!(state.attempts, 5);
    assert!(state.last_running);
    assert_eq!(state.last_probe, ProbeOutcome::Failed);
}

/// Test: a container that crashes mid-loop is observed; the loop does
/// not assume monotonic progress.
#[tokio::test]
async fn crash_after_start_is_observed() {
    let executor = FakeExecutor::new();
    let app = AppName::new("demo").unwrap();

    // Running on the first attempt (probe fails), then gone.
    executor.respond_seq("docker inspect", &[(0, ""), (1, "")]);
    executor.respond("curl", 1, "");

    let state = deployer(&executor, &app)
        .health_check(fast_health(3))
        .wait_healthy()
        .await;

    assert!(!state.healthy());
    assert_eq!(state.attempts, 3);
    assert!(!state.last_running);
    assert_eq!(state.last_probe, ProbeOutcome::NotAttempted);
}

/// Test: when the container never runs, no HTTP probe is sent at all.
#[tokio::test]
async fn probe_is_skipped_while_not_running() {
    let executor = FakeExecutor::new();
    let app = AppName::new("demo").unwrap();

    executor.respond("docker inspect", 1, "");

    let state = deployer(&executor, &app)
        .health_check(fast_health(4))
        .wait_healthy()
        .await;

    assert!(!state.healthy());
    assert!(!executor.ran("curl"), "no probe should run without a running container");
}

/// Test: exhaustion fails the deploy with a DeploymentError carrying
/// the last container log lines.
#[tokio::test]
async fn exhaustion_captures_container_logs() {
    let executor = FakeExecutor::new();
    let app = AppName::new("demo").unwrap();

    executor.respond("docker inspect", 1, "");
    executor.respond("docker logs", 0, "panic: connection refused\nexited with code 1");

    let result = deployer(&executor, &app)
        .health_check(fast_health(2))
        .deploy()
        .await;

    let err = result.unwrap_err();
    assert_eq!(err.category(), ExitCategory::Deployment);
    let message = err.to_string();
    assert!(message.contains("2 attempts"), "got: {message}");
    assert!(message.contains("exited with code 1"), "got: {message}");
    assert!(matches!(err, Error::Deployment(_)));
}

/// Test: compose presence switches every container command to compose.
#[tokio::test]
async fn compose_path_uses_compose_commands() {
    let executor = FakeExecutor::new();
    let app = AppName::new("demo").unwrap();

    executor.respond("docker compose ps", 0, "");
    executor.respond("curl", 0, "");

    let deployer = ContainerDeployer::new(&executor, &app, 8080, "/opt/apostoli/demo", true)
        .health_check(fast_health(3));
    let summary = deployer.deploy().await.unwrap();

    assert!(summary.contains("healthy after 1 attempt"));
    assert!(executor.ran("docker compose build --pull"));
    assert!(executor.ran("docker compose up -d"));
    assert!(!executor.ran("docker build -t"));
}

/// Test: a failed build aborts before any container is started.
#[tokio::test]
async fn build_failure_stops_before_start() {
    let executor = FakeExecutor::new();
    let app = AppName::new("demo").unwrap();

    executor.respond("docker build", 1, "missing base image");

    let err = deployer(&executor, &app)
        .health_check(fast_health(3))
        .deploy()
        .await
        .unwrap_err();

    assert_eq!(err.category(), ExitCategory::Deployment);
    assert!(err.to_string().contains("missing base image"));
    assert!(!executor.ran("docker run"));
}
