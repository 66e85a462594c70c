// ABOUTME: Idempotent resource reconciliation for required host software.
// ABOUTME: Probes each tool first and installs only what is missing.

use crate::diagnostics::{Diagnostics, Warning};
use crate::error::{Error, Result};
use crate::ssh::{Executor, RemoteCommand};
use std::time::Duration;

const PROBE_TIMEOUT: Duration = Duration::from_secs(15);
const INSTALL_TIMEOUT: Duration = Duration::from_secs(600);
const SERVICE_TIMEOUT: Duration = Duration::from_secs(30);

/// A tool the reconciler keeps present on the host.
#[derive(Debug, Clone, Copy)]
pub struct Tool {
    pub name: &'static str,
    /// Exits zero when the tool is already installed.
    pub probe: &'static str,
    /// Installs the tool; assumed idempotent by itself.
    pub install: &'static str,
    /// systemd unit to enable and start, if the tool is a service.
    pub service: Option<&'static str>,
}

/// The three tools a deployment needs: container runtime, compose
/// plugin, and the reverse proxy.
pub const MANAGED_TOOLS: [Tool; 3] = [
    Tool {
        name: "docker",
        probe: "docker --version",
        install: "curl -fsSL https://get.docker.com | sh",
        service: Some("docker"),
    },
    Tool {
        name: "docker compose",
        probe: "docker compose version",
        install: "DEBIAN_FRONTEND=noninteractive apt-get update -qq && \
                  DEBIAN_FRONTEND=noninteractive apt-get install -y -qq docker-compose-plugin",
        service: None,
    },
    Tool {
        name: "nginx",
        probe: "nginx -v",
        install: "DEBIAN_FRONTEND=noninteractive apt-get update -qq && \
                  DEBIAN_FRONTEND=noninteractive apt-get install -y -qq nginx",
        service: Some("nginx"),
    },
];

/// Brings the host to the desired software state, acting only on the delta.
pub struct ResourceReconciler<'a, E: Executor> {
    executor: &'a E,
}

impl<'a, E: Executor> ResourceReconciler<'a, E> {
    pub fn new(executor: &'a E) -> Self {
        Self { executor }
    }

    /// Ensure every managed tool is present and its service running.
    /// Returns the names of the tools that were actually installed.
    pub async fn ensure_all(&self, diag: &mut Diagnostics) -> Result<Vec<&'static str>> {
        let mut installed = Vec::new();
        for tool in MANAGED_TOOLS {
            if self.ensure(&tool, diag).await? {
                installed.push(tool.name);
            }
        }
        Ok(installed)
    }

    /// Check-then-install guard for one tool. Returns true when the
    /// installer ran. Safe under re-invocation.
    pub async fn ensure(&self, tool: &Tool, diag: &mut Diagnostics) -> Result<bool> {
        let probe = RemoteCommand::new(tool.probe, PROBE_TIMEOUT);
        let already_present = self.executor.run(&probe).await?.success();

        let installed = if already_present {
            tracing::debug!("{} already present, skipping install", tool.name);
            false
        } else {
            tracing::info!("installing {}", tool.name);
            let install = RemoteCommand::new(tool.install, INSTALL_TIMEOUT);
            let output = self.executor.run(&install).await?;
            if !output.success() {
                return Err(Error::Deployment(format!(
                    "failed to install {}: {}",
                    tool.name,
                    output.combined()
                )));
            }
            true
        };

        // Start/enable failures are warnings: a running service that
        // refuses a restart does not indicate a broken environment.
        if let Some(service) = tool.service {
            let enable = RemoteCommand::new(
                format!("systemctl enable --now {service}"),
                SERVICE_TIMEOUT,
            );
            match self.executor.run(&enable).await {
                Ok(output) if output.success() => {}
                Ok(output) => diag.warn(Warning::service_start(format!(
                    "could not enable {service}: {}",
                    output.combined()
                ))),
                Err(e) => diag.warn(Warning::service_start(format!(
                    "could not enable {service}: {e}"
                ))),
            }
        }

        Ok(installed)
    }
}
