// ABOUTME: Teardown: the structural inverse of the deploy stages.
// ABOUTME: Every removal tolerates "already absent"; other apps are untouched.

use crate::error::{Error, Result};
use crate::ssh::{Executor, RemoteCommand};
use crate::stages::repo::COMPOSE_FILES;
use crate::stages::result::{EXCERPT_LINES, excerpt};
use crate::stages::shell_quote;
use crate::types::AppName;
use std::time::Duration;

const STEP_TIMEOUT: Duration = Duration::from_secs(120);

/// Removes everything a deployment created for one application:
/// containers, proxy configuration, and the remote project directory.
pub struct CleanupOrchestrator<'a, E: Executor> {
    executor: &'a E,
    app: &'a AppName,
    project_dir: String,
}

impl<'a, E: Executor> CleanupOrchestrator<'a, E> {
    pub fn new(executor: &'a E, app: &'a AppName, project_dir: impl Into<String>) -> Self {
        Self {
            executor,
            app,
            project_dir: project_dir.into(),
        }
    }

    /// Tear down in the inverse order of creation. Only invoked on
    /// explicit operator confirmation.
    pub async fn teardown(&self) -> Result<String> {
        self.remove_containers().await?;
        self.prune_networks().await?;
        self.remove_proxy_config().await?;
        self.reload_proxy().await?;
        self.remove_project_dir().await?;
        Ok(format!("all resources for {} removed", self.app))
    }

    /// Stop and remove the composition (including volumes) or the single
    /// container. Nothing running is success.
    async fn remove_containers(&self) -> Result<()> {
        let compose_present = COMPOSE_FILES
            .iter()
            .map(|f| format!("[ -f {}/{f} ]", shell_quote(&self.project_dir)))
            .collect::<Vec<_>>()
            .join(" || ");
        let script = format!(
            "if [ -d {dir} ] && {{ {compose_present}; }}; then \
             cd {dir} && docker compose down -v --remove-orphans; \
             elif docker ps -a --format '{{{{.Names}}}}' | grep -qx {app}; then \
             docker rm -f {app}; fi",
            dir = shell_quote(&self.project_dir),
            app = shell_quote(self.app.as_str()),
        );
        self.run_step("remove containers", &script).await
    }

    async fn prune_networks(&self) -> Result<()> {
        self.run_step("prune networks", "docker network prune -f")
            .await
    }

    /// Remove both the active link and the available entry for this app
    /// only; other applications' entries stay in place.
    async fn remove_proxy_config(&self) -> Result<()> {
        let script = format!(
            "rm -f /etc/nginx/sites-enabled/{app}.conf /etc/nginx/sites-available/{app}.conf",
            app = self.app,
        );
        self.run_step("remove proxy config", &script).await
    }

    /// Validate and reload so the removal takes effect safely. A host
    /// without nginx has nothing to reload.
    async fn reload_proxy(&self) -> Result<()> {
        let script = "if command -v nginx >/dev/null 2>&1; then \
                      nginx -t && systemctl reload nginx; fi";
        self.run_step("reload proxy", script).await
    }

    async fn remove_project_dir(&self) -> Result<()> {
        let script = format!("rm -rf {}", shell_quote(&self.project_dir));
        self.run_step("remove project directory", &script).await
    }

    async fn run_step(&self, what: &str, script: &str) -> Result<()> {
        tracing::debug!("{what}");
        let command = RemoteCommand::new(script, STEP_TIMEOUT);
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
