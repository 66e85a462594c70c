// ABOUTME: Container lifecycle stage: replace, rebuild, start, and confirm health.
// ABOUTME: The health check is an explicit bounded-retry state machine.

use crate::error::{Error, Result};
use crate::ssh::{Executor, RemoteCommand};
use crate::stages::result::{EXCERPT_LINES, excerpt};
use crate::stages::shell_quote;
use crate::types::AppName;
use std::time::Duration;

const STEP_TIMEOUT: Duration = Duration::from_secs(60);
const BUILD_TIMEOUT: Duration = Duration::from_secs(900);
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Parameters of the bounded health-check retry loop.
#[derive(Debug, Clone, Copy)]
pub struct HealthCheck {
    /// Hard cap on probe attempts.
    pub max_attempts: u32,
    /// Spacing between attempts.
    pub interval: Duration,
    /// Fixed delay before the first attempt.
    pub settle: Duration,
}

impl Default for HealthCheck {
    fn default() -> Self {
        Self {
            max_attempts: 30,
            interval: Duration::from_secs(2),
            settle: Duration::from_secs(5),
        }
    }
}

/// Result of the HTTP probe on the most recent attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// Container was not running, so no probe was sent.
    NotAttempted,
    Failed,
    Succeeded,
}

/// Transient state of the retry loop, discarded after it terminates.
#[derive(Debug, Clone, Copy)]
pub struct HealthCheckState {
    pub attempts: u32,
    pub last_running: bool,
    pub last_probe: ProbeOutcome,
}

impl HealthCheckState {
    fn new() -> Self {
        Self {
            attempts: 0,
            last_running: false,
            last_probe: ProbeOutcome::NotAttempted,
        }
    }

    /// The loop exits early only when the container runs and the probe
    /// succeeded on the same attempt.
    pub fn healthy(&self) -> bool {
        self.last_running && self.last_probe == ProbeOutcome::Succeeded
    }
}

/// Stops prior containers for the application, rebuilds, starts, and
/// confirms health within the retry bound.
pub struct ContainerDeployer<'a, E: Executor> {
    executor: &'a E,
    app: &'a AppName,
    port: u16,
    project_dir: String,
    uses_compose: bool,
    health: HealthCheck,
}

impl<'a, E: Executor> ContainerDeployer<'a, E> {
    pub fn new(
        executor: &'a E,
        app: &'a AppName,
        port: u16,
        project_dir: impl Into<String>,
        uses_compose: bool,
    ) -> Self {
        Self {
            executor,
            app,
            port,
            project_dir: project_dir.into(),
            uses_compose,
            health: HealthCheck::default(),
        }
    }

    /// Override the retry loop parameters.
    pub fn health_check(mut self, health: HealthCheck) -> Self {
        self.health = health;
        self
    }

    /// Full container stage: stop old, prune networks, build, start,
    /// wait for health. Returns a short summary for the stage excerpt.
    pub async fn deploy(&self) -> Result<String> {
        self.stop_previous().await?;
        self.prune_networks().await?;
        self.build().await?;
        self.start().await?;

        if !self.health.settle.is_zero() {
            tokio::time::sleep(self.health.settle).await;
        }

        let state = self.wait_healthy().await;
        if state.healthy() {
            tracing::info!(
                "{} healthy after {} attempt(s)",
                self.app,
                state.attempts
            );
            return Ok(format!(
                "container healthy after {} attempt(s)",
                state.attempts
            ));
        }

        let logs = self.container_logs().await.unwrap_or_default();
        Err(Error::Deployment(format!(
            "health check exhausted after {} attempts (running: {}, probe: {:?}); last logs:\n{}",
            state.attempts,
            state.last_running,
            state.last_probe,
            excerpt(&logs, EXCERPT_LINES)
        )))
    }

    /// Stop and remove any prior container or composition for this app.
    /// "Not found" is success, not failure.
    pub async fn stop_previous(&self) -> Result<()> {
        let script = if self.uses_compose {
            format!(
                "if [ -d {dir} ]; then cd {dir} && docker compose down --remove-orphans; fi",
                dir = shell_quote(&self.project_dir),
            )
        } else {
            format!(
                "if docker ps -a --format '{{{{.Names}}}}' | grep -qx {app}; then docker rm -f {app}; fi",
                app = shell_quote(self.app.as_str()),
            )
        };
        self.run_step("stop previous containers", &script, STEP_TIMEOUT)
            .await
    }

    /// Prune unused networks so repeated deployments don't collide on names.
    async fn prune_networks(&self) -> Result<()> {
        self.run_step(
            "prune networks",
            "docker network prune -f",
            STEP_TIMEOUT,
        )
        .await
    }

    async fn build(&self) -> Result<()> {
        let script = if self.uses_compose {
            format!(
                "cd {dir} && docker compose build --pull",
                dir = shell_quote(&self.project_dir),
            )
        } else {
            format!(
                "cd {dir} && docker build -t {app} .",
                dir = shell_quote(&self.project_dir),
                app = shell_quote(self.app.as_str()),
            )
        };
        self.run_step("build image", &script, BUILD_TIMEOUT).await
    }

    async fn start(&self) -> Result<()> {
        let script = if self.uses_compose {
            format!(
                "cd {dir} && docker compose up -d",
                dir = shell_quote(&self.project_dir),
            )
        } else {
            format!(
                "docker run -d --name {app} --restart always -p {port}:{port} {app}",
                app = shell_quote(self.app.as_str()),
                port = self.port,
            )
        };
        self.run_step("start containers", &script, STEP_TIMEOUT).await
    }

    /// The bounded retry loop: at most `max_attempts` attempts with
    /// `interval` spacing. Each attempt re-checks the container status
    /// before probing, so a container that crashes mid-loop is observed.
    pub async fn wait_healthy(&self) -> HealthCheckState {
        let mut state = HealthCheckState::new();

        while state.attempts < self.health.max_attempts {
            state.attempts += 1;

            state.last_running = self.container_running().await;
            state.last_probe = if state.last_running {
                if self.probe_http().await {
                    ProbeOutcome::Succeeded
                } else {
                    ProbeOutcome::Failed
                }
            } else {
                ProbeOutcome::NotAttempted
            };

            if state.healthy() {
                return state;
            }

            tracing::debug!(
                "health attempt {}/{}: running={} probe={:?}",
                state.attempts,
                self.health.max_attempts,
                state.last_running,
                state.last_probe
            );

            if state.attempts < self.health.max_attempts && !self.health.interval.is_zero() {
                tokio::time::sleep(self.health.interval).await;
            }
        }

        state
    }

    async fn container_running(&self) -> bool {
        let script = if self.uses_compose {
            format!(
                "cd {dir} && docker compose ps --status running -q | grep -q .",
                dir = shell_quote(&self.project_dir),
            )
        } else {
            format!(
                "[ \"$(docker inspect -f '{{{{.State.Running}}}}' {app} 2>/dev/null)\" = true ]",
                app = shell_quote(self.app.as_str()),
            )
        };
        let command = RemoteCommand::new(script, PROBE_TIMEOUT);
        matches!(self.executor.run(&command).await, Ok(output) if output.success())
    }

    async fn probe_http(&self) -> bool {
        let script = format!(
            "curl -sf -o /dev/null --max-time 5 http://localhost:{}/",
            self.port
        );
        let command = RemoteCommand::new(script, PROBE_TIMEOUT);
        matches!(self.executor.run(&command).await, Ok(output) if output.success())
    }

    /// Last lines of container logs, for the failure excerpt.
    async fn container_logs(&self) -> Result<String> {
        let script = if self.uses_compose {
            format!(
                "cd {dir} && docker compose logs --tail {n}",
                dir = shell_quote(&self.project_dir),
                n = EXCERPT_LINES,
            )
        } else {
            format!(
                "docker logs --tail {n} {app}",
                n = EXCERPT_LINES,
                app = shell_quote(self.app.as_str()),
            )
        };
        let command = RemoteCommand::new(script, STEP_TIMEOUT);
        let output = self.executor.run(&command).await?;
        Ok(output.combined())
    }

    async fn run_step(&self, what: &str, script: &str, timeout: Duration) -> Result<()> {
        tracing::debug!("{what}");
        let command = RemoteCommand::new(script, timeout);
        let output = self.executor.run(&command).await?;
        if !output.success() {
            return Err(Error::Deployment(format!(
                "{what} failed: {}",
                excerpt(&output.combined(), EXCERPT_LINES)
            )));
        }
        Ok(())
    }
}
