// ABOUTME: Read-only post-deployment checks.
// ABOUTME: All checks are advisory: failures become warnings, never pipeline errors.

use crate::diagnostics::{Diagnostics, Warning};
use crate::ssh::{Executor, RemoteCommand};
use crate::stages::shell_quote;
use crate::types::AppName;
use std::time::Duration;

const CHECK_TIMEOUT: Duration = Duration::from_secs(15);

/// Confirms the deployed application looks healthy from the host's own
/// point of view, plus a best-effort external reachability check.
pub struct DeploymentValidator<'a, E: Executor> {
    executor: &'a E,
    app: &'a AppName,
    port: u16,
    public_host: &'a str,
    project_dir: String,
    uses_compose: bool,
}

impl<'a, E: Executor> DeploymentValidator<'a, E> {
    pub fn new(
        executor: &'a E,
        app: &'a AppName,
        port: u16,
        public_host: &'a str,
        project_dir: impl Into<String>,
        uses_compose: bool,
    ) -> Self {
        Self {
            executor,
            app,
            port,
            public_host,
            project_dir: project_dir.into(),
            uses_compose,
        }
    }

    /// Run every check; each failure is recorded as a warning. The prior
    /// stages already decided go/no-go, so nothing here aborts the run.
    pub async fn validate(&self, diag: &mut Diagnostics) -> String {
        let mut passed = 0usize;
        let mut total = 0usize;

        let checks: [(&str, String); 5] = [
            (
                "nginx is active",
                "systemctl is-active --quiet nginx".to_string(),
            ),
            ("application container is running", self.running_script()),
            (
                "internal port is listening",
                format!(
                    "ss -tln | awk '{{print $4}}' | grep -q ':{port}$'",
                    port = self.port
                ),
            ),
            (
                "HTTP redirects to HTTPS",
                "test \"$(curl -s -o /dev/null -w '%{http_code}' --max-time 10 http://127.0.0.1/)\" = 301"
                    .to_string(),
            ),
            (
                "HTTPS answers",
                "curl -ks -o /dev/null -w '%{http_code}' --max-time 10 https://127.0.0.1/ \
                 | grep -Eq '^(2|3)'"
                    .to_string(),
            ),
        ];

        for (what, script) in checks {
            total += 1;
            if self.check(&script).await {
                passed += 1;
            } else {
                diag.warn(Warning::validation(format!("check failed: {what}")));
            }
        }

        // External reachability, probed from the orchestrator side.
        for scheme in ["http", "https"] {
            total += 1;
            if self.external_check(scheme).await {
                passed += 1;
            } else {
                diag.warn(Warning::validation(format!(
                    "{scheme}://{} not reachable externally",
                    self.public_host
                )));
            }
        }

        format!("{passed}/{total} validation checks passed")
    }

    fn running_script(&self) -> String {
        if self.uses_compose {
            format!(
                "cd {dir} && docker compose ps --status running -q | grep -q .",
                dir = shell_quote(&self.project_dir),
            )
        } else {
            format!(
                "[ \"$(docker inspect -f '{{{{.State.Running}}}}' {app} 2>/dev/null)\" = true ]",
                app = shell_quote(self.app.as_str()),
            )
        }
    }

    async fn check(&self, script: &str) -> bool {
        let command = RemoteCommand::new(script, CHECK_TIMEOUT);
        matches!(self.executor.run(&command).await, Ok(output) if output.success())
    }

    /// Best effort: curl from the local machine. Absence of curl or a
    /// firewalled orchestrator only produces a warning.
    async fn external_check(&self, scheme: &str) -> bool {
        let url = format!("{scheme}://{}/", self.public_host);
        let result = tokio::process::Command::new("curl")
            .args(["-ks", "-o", "/dev/null", "--max-time", "10", &url])
            .status()
            .await;
        matches!(result, Ok(status) if status.success())
    }
}
