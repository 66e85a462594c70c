// ABOUTME: Sequences the deployment stages with fail-fast semantics.
// ABOUTME: Owns the config and produces one StageResult per executed stage.

use crate::config::DeploymentConfig;
use crate::diagnostics::{Diagnostics, Warning};
use crate::error::{Error, ExitCategory, Result};
use crate::logging::Redactor;
use crate::ssh::{Executor, RemoteCommand};
use crate::stages::cleanup::CleanupOrchestrator;
use crate::stages::containers::{ContainerDeployer, HealthCheck};
use crate::stages::provision::ResourceReconciler;
use crate::stages::proxy::ProxyConfigurer;
use crate::stages::repo::{FetchOutcome, RepositoryFetcher};
use crate::stages::result::{Stage, StageResult};
use crate::stages::shell_quote;
use crate::stages::sync::FileSynchronizer;
use crate::stages::validate::DeploymentValidator;
use std::path::PathBuf;
use std::time::Duration;

/// Everything the pipeline observed: one result per executed stage,
/// plus the error that stopped it, if any.
#[derive(Debug)]
pub struct PipelineReport {
    pub results: Vec<StageResult>,
    pub error: Option<Error>,
}

impl PipelineReport {
    pub fn success(&self) -> bool {
        self.error.is_none()
    }

    pub fn category(&self) -> ExitCategory {
        self.error
            .as_ref()
            .map(|e| e.category())
            .unwrap_or(ExitCategory::Success)
    }
}

/// Drives a remote host through the dependent, idempotent deployment
/// stages. Strictly sequential: a stage does not begin until its
/// predecessor reported success.
pub struct Pipeline<'a> {
    config: &'a DeploymentConfig,
    redactor: &'a Redactor,
    work_dir: PathBuf,
    ping_enabled: bool,
    health: HealthCheck,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a DeploymentConfig, redactor: &'a Redactor, work_dir: PathBuf) -> Self {
        Self {
            config,
            redactor,
            work_dir,
            ping_enabled: true,
            health: HealthCheck::default(),
        }
    }

    /// Disable the advisory ping probe (it never gates the pipeline).
    pub fn ping(mut self, enabled: bool) -> Self {
        self.ping_enabled = enabled;
        self
    }

    /// Override the container health-check parameters.
    pub fn health_check(mut self, health: HealthCheck) -> Self {
        self.health = health;
        self
    }

    /// Run the full deployment. Fail-fast: the first stage error ends
    /// the run with its category; the validator only emits warnings.
    pub async fn run<E: Executor>(&self, executor: &E, diag: &mut Diagnostics) -> PipelineReport {
        let mut results = Vec::new();

        let outcome = match self.stage(&mut results, Stage::Connectivity, async {
            self.connectivity(executor, diag).await
        })
        .await
        {
            Ok(()) => self.stage_fetch(&mut results).await,
            Err(error) => return PipelineReport { results, error: Some(error) },
        };

        let fetched = match outcome {
            Ok(fetched) => fetched,
            Err(error) => return PipelineReport { results, error: Some(error) },
        };

        let remaining = async {
            self.stage(&mut results, Stage::Provision, async {
                let reconciler = ResourceReconciler::new(executor);
                let installed = reconciler.ensure_all(diag).await?;
                Ok(if installed.is_empty() {
                    "all tools already present".to_string()
                } else {
                    format!("installed: {}", installed.join(", "))
                })
            })
            .await?;

            self.stage(&mut results, Stage::Sync, async {
                let project_dir = self.config.remote_project_dir();
                let mkdir = RemoteCommand::new(
                    format!("mkdir -p {}", shell_quote(&project_dir)),
                    Duration::from_secs(30),
                );
                let output = executor.run(&mkdir).await?;
                if !output.success() {
                    return Err(Error::Deployment(format!(
                        "failed to create {project_dir}: {}",
                        output.combined()
                    )));
                }

                let synchronizer = FileSynchronizer::new(executor, self.config.command_timeout);
                let summary = synchronizer
                    .sync(&fetched.local_root, &project_dir, &self.config.excludes)
                    .await?;
                Ok(format!(
                    "{} file(s) transferred ({} bytes), {} deleted",
                    summary.transferred_files,
                    summary.transferred_bytes,
                    summary.deleted_files
                ))
            })
            .await?;

            self.stage(&mut results, Stage::Containers, async {
                ContainerDeployer::new(
                    executor,
                    self.config.app_name(),
                    self.config.port,
                    self.config.remote_project_dir(),
                    fetched.uses_compose,
                )
                .health_check(self.health)
                .deploy()
                .await
            })
            .await?;

            self.stage(&mut results, Stage::Proxy, async {
                ProxyConfigurer::new(executor, self.config.app_name(), self.config.port)
                    .configure()
                    .await
            })
            .await?;

            self.stage(&mut results, Stage::Validate, async {
                let validator = DeploymentValidator::new(
                    executor,
                    self.config.app_name(),
                    self.config.port,
                    &self.config.server.host,
                    self.config.remote_project_dir(),
                    fetched.uses_compose,
                );
                Ok(validator.validate(diag).await)
            })
            .await?;

            Ok(())
        }
        .await;

        PipelineReport {
            results,
            error: outcome_error(remaining),
        }
    }

    /// Inverse reconciliation, reported as a single Cleanup stage.
    pub async fn teardown<E: Executor>(&self, executor: &E) -> PipelineReport {
        let mut results = Vec::new();
        let outcome = self
            .stage(&mut results, Stage::Cleanup, async {
                CleanupOrchestrator::new(
                    executor,
                    self.config.app_name(),
                    self.config.remote_project_dir(),
                )
                .teardown()
                .await
            })
            .await;

        PipelineReport {
            results,
            error: outcome_error(outcome),
        }
    }

    /// Run one stage, recording its redacted result. Errors propagate so
    /// the caller stops at the first failed stage.
    async fn stage<F>(
        &self,
        results: &mut Vec<StageResult>,
        stage: Stage,
        work: F,
    ) -> Result<()>
    where
        F: Future<Output = Result<String>>,
    {
        tracing::info!("stage {stage}: starting");
        match work.await {
            Ok(output) => {
                let output = self.redactor.redact(&output);
                tracing::info!("stage {stage}: ok ({output})");
                results.push(StageResult::ok(stage, &output));
                Ok(())
            }
            Err(e) => {
                let message = self.redactor.redact(&e.to_string());
                tracing::error!("stage {stage}: failed: {message}");
                results.push(StageResult::failed(stage, &e, &message));
                Err(e)
            }
        }
    }

    /// Repository fetch, which also yields data later stages need.
    async fn stage_fetch(&self, results: &mut Vec<StageResult>) -> Result<FetchOutcome> {
        tracing::info!("stage repository: starting");
        let fetcher = RepositoryFetcher::new(self.config, self.redactor, &self.work_dir);
        match fetcher.fetch().await {
            Ok(fetched) => {
                let output = format!(
                    "source at {} ({})",
                    fetched.local_root.display(),
                    if fetched.uses_compose {
                        "compose"
                    } else {
                        "dockerfile"
                    }
                );
                tracing::info!("stage repository: ok ({output})");
                results.push(StageResult::ok(Stage::Repository, &output));
                Ok(fetched)
            }
            Err(e) => {
                let message = self.redactor.redact(&e.to_string());
                tracing::error!("stage repository: failed: {message}");
                results.push(StageResult::failed(Stage::Repository, &e, &message));
                Err(e)
            }
        }
    }

    /// Advisory ping, then the gating remote echo. Ping failure is a
    /// warning only; SSH is still attempted.
    async fn connectivity<E: Executor>(
        &self,
        executor: &E,
        diag: &mut Diagnostics,
    ) -> Result<String> {
        if self.ping_enabled {
            let reply = tokio::process::Command::new("ping")
                .args(["-c", "1", "-W", "3", &self.config.server.host])
                .output()
                .await;
            match reply {
                Ok(output) if output.status.success() => {}
                _ => diag.warn(Warning::connectivity(format!(
                    "no ping reply from {}; attempting SSH anyway",
                    self.config.server.host
                ))),
            }
        }

        let echo = RemoteCommand::new("echo connected", self.config.connect_timeout);
        let output = executor.run(&echo).await?;
        if !output.success() {
            return Err(Error::Connection(format!(
                "connectivity check returned exit code {}",
                output.exit_code
            )));
        }
        Ok(format!("connected to {}", self.config.server.host))
    }
}

fn outcome_error(outcome: Result<()>) -> Option<Error> {
    match outcome {
        Ok(()) => None,
        Err(e) => Some(e),
    }
}
