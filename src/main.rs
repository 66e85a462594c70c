// ABOUTME: Entry point for the apostoli CLI application.
// ABOUTME: Parses arguments and dispatches to appropriate command handlers.

mod cli;

use apostoli::config::{self, DeploymentConfig};
use apostoli::diagnostics::{Diagnostics, Warning};
use apostoli::error::{Error, ExitCategory, Result};
use apostoli::logging::{self, Redactor};
use apostoli::output::{Output, OutputMode};
use apostoli::ssh::{Session, SessionConfig};
use apostoli::stages::{DeploymentValidator, Pipeline, PipelineReport};
use clap::Parser;
use cli::{Cli, Commands};
use std::env;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mode = if cli.json {
        OutputMode::Json
    } else if cli.quiet {
        OutputMode::Quiet
    } else {
        OutputMode::Normal
    };
    let output = Output::new(mode);

    let (category, result) = run(cli, &output).await;
    if let Err(e) = result {
        output.error(&format!("{e}"));
        std::process::exit(category.code());
    }
}

async fn run(cli: Cli, output: &Output) -> (ExitCategory, Result<()>) {
    let result = dispatch(cli, output).await;
    let category = match &result {
        Ok(()) => ExitCategory::Success,
        Err(e) => e.category(),
    };
    (category, result)
}

async fn dispatch(cli: Cli, output: &Output) -> Result<()> {
    // Init runs before any config exists, so handle it first.
    if let Commands::Init { repository, force } = &cli.command {
        logging::init(cli.verbose, None, Redactor::default())?;
        let cwd = env::current_dir()?;
        config::init_config(&cwd, repository.as_deref(), *force)?;
        output.success(&format!("wrote {}", config::CONFIG_FILENAME));
        return Ok(());
    }

    let config = match &cli.config {
        Some(path) => DeploymentConfig::load(path)?,
        None => DeploymentConfig::discover(&env::current_dir()?)?,
    };

    // The token is fed to the redactor before anything is logged; every
    // line that reaches a sink passes through it.
    let redactor = Redactor::new(config.token());
    logging::init(cli.verbose, cli.log_file.as_deref(), redactor.clone())?;

    match cli.command {
        Commands::Init { .. } => unreachable!("handled above"),
        Commands::Deploy => deploy(&config, &redactor, output).await,
        Commands::Teardown { yes } => teardown(&config, &redactor, output, yes).await,
        Commands::Check => check(&config, output).await,
    }
}

/// Run the full deployment pipeline.
async fn deploy(config: &DeploymentConfig, redactor: &Redactor, output: &Output) -> Result<()> {
    output.progress(&format!(
        "Deploying {} ({}) to {}",
        config.app_name(),
        config.repository,
        config.server.host
    ));

    let session = connect(config, output).await?;
    let mut diag = Diagnostics::default();

    let pipeline = Pipeline::new(config, redactor, env::current_dir()?);
    let report = pipeline.run(&session, &mut diag).await;

    disconnect(session, &mut diag).await;
    render_report(&report, &diag, output);

    match report.error {
        None => {
            output.success(&format!(
                "Deployed {} behind https://{}",
                config.app_name(),
                config.server.host
            ));
            Ok(())
        }
        Some(e) => Err(e),
    }
}

/// Inverse reconciliation, gated on explicit confirmation.
async fn teardown(
    config: &DeploymentConfig,
    redactor: &Redactor,
    output: &Output,
    yes: bool,
) -> Result<()> {
    if !yes {
        return Err(Error::InvalidConfig(
            "teardown removes containers, proxy config, and the project directory; \
             re-run with --yes to confirm"
                .to_string(),
        ));
    }

    output.progress(&format!(
        "Tearing down {} on {}",
        config.app_name(),
        config.server.host
    ));

    let session = connect(config, output).await?;
    let mut diag = Diagnostics::default();

    let pipeline = Pipeline::new(config, redactor, env::current_dir()?);
    let report = pipeline.teardown(&session).await;

    disconnect(session, &mut diag).await;
    render_report(&report, &diag, output);

    match report.error {
        None => {
            output.success(&format!("Removed {}", config.app_name()));
            Ok(())
        }
        Some(e) => Err(e),
    }
}

/// Read-only validation of an existing deployment.
async fn check(config: &DeploymentConfig, output: &Output) -> Result<()> {
    let session = connect(config, output).await?;
    let mut diag = Diagnostics::default();

    // Compose detection has to happen remotely here: there may be no
    // local source tree when only checking.
    let uses_compose = remote_uses_compose(&session, config).await;
    let validator = DeploymentValidator::new(
        &session,
        config.app_name(),
        config.port,
        &config.server.host,
        config.remote_project_dir(),
        uses_compose,
    );
    let summary = validator.validate(&mut diag).await;

    disconnect(session, &mut diag).await;
    for warning in diag.warnings() {
        output.warning(&warning.message);
    }
    output.success(&summary);
    Ok(())
}

async fn remote_uses_compose(session: &Session, config: &DeploymentConfig) -> bool {
    use apostoli::ssh::{Executor, RemoteCommand};
    let script = format!(
        "ls {dir}/docker-compose.yml {dir}/docker-compose.yaml \
         {dir}/compose.yml {dir}/compose.yaml 2>/dev/null | grep -q .",
        dir = config.remote_project_dir(),
    );
    let command = RemoteCommand::new(script, config.connect_timeout);
    matches!(session.run(&command).await, Ok(out) if out.success())
}

async fn connect(config: &DeploymentConfig, output: &Output) -> Result<Session> {
    output.progress(&format!(
        "  → Connecting to {}@{}:{}...",
        config.server.user, config.server.host, config.server.port
    ));

    let mut ssh_config = SessionConfig::new(&config.server.host, &config.server.user)
        .port(config.server.port)
        .trust_on_first_use(config.server.trust_first_connection)
        .connect_timeout(config.connect_timeout)
        .command_timeout(config.command_timeout);

    if let Some(key_path) = &config.server.key_path {
        ssh_config = ssh_config.key_path(key_path);
    }

    Ok(Session::connect(ssh_config).await?)
}

async fn disconnect(session: Session, diag: &mut Diagnostics) {
    if let Err(e) = session.disconnect().await {
        diag.warn(Warning::ssh_disconnect(e.to_string()));
    }
}

fn render_report(report: &PipelineReport, diag: &Diagnostics, output: &Output) {
    for result in &report.results {
        if result.success {
            output.progress(&format!("  ✓ {}: {}", result.stage, result.excerpt));
        } else {
            output.progress(&format!("  ✗ {}: {}", result.stage, result.excerpt));
        }
    }
    for warning in diag.warnings() {
        output.warning(&warning.message);
    }
}
