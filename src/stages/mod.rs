// ABOUTME: The staged deployment pipeline and its individual stages.
// ABOUTME: Each stage is idempotent and talks to the host through Executor.

mod cleanup;
mod containers;
mod pipeline;
mod provision;
mod proxy;
mod repo;
mod result;
mod sync;
mod validate;

pub use cleanup::CleanupOrchestrator;
pub use containers::{ContainerDeployer, HealthCheck, HealthCheckState, ProbeOutcome};
pub use pipeline::{Pipeline, PipelineReport};
pub use provision::{ResourceReconciler, Tool};
pub use proxy::{ProxyConfigurer, ProxyInputs, render_proxy_config};
pub use repo::{FetchOutcome, RepositoryFetcher};
pub use result::{EXCERPT_LINES, Stage, StageResult, excerpt};
pub use sync::{FileSynchronizer, SyncSummary};
pub use validate::DeploymentValidator;

/// Quote a string for safe interpolation into a shell script body.
pub(crate) fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}
