// ABOUTME: Repository fetch stage: clone or update the source tree locally.
// ABOUTME: The access token lives only in the in-memory clone URL, never in logs.

use crate::config::DeploymentConfig;
use crate::error::{Error, Result};
use crate::logging::Redactor;
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// Compose file names checked in precedence order.
pub(crate) const COMPOSE_FILES: [&str; 4] = [
    "docker-compose.yml",
    "docker-compose.yaml",
    "compose.yml",
    "compose.yaml",
];

/// Where the source tree ended up locally.
#[derive(Debug)]
pub struct FetchOutcome {
    pub local_root: PathBuf,
    /// True when a compose file is present (compose takes precedence over
    /// a plain Dockerfile).
    pub uses_compose: bool,
}

/// Clones or updates the configured repository into a local staging
/// directory, then verifies a build descriptor is present.
pub struct RepositoryFetcher<'a> {
    config: &'a DeploymentConfig,
    redactor: &'a Redactor,
    work_dir: PathBuf,
}

impl<'a> RepositoryFetcher<'a> {
    pub fn new(config: &'a DeploymentConfig, redactor: &'a Redactor, work_dir: &Path) -> Self {
        Self {
            config,
            redactor,
            work_dir: work_dir.to_path_buf(),
        }
    }

    /// Fetch the source tree. With a `source.path` override the clone is
    /// skipped and the local tree is used as-is.
    pub async fn fetch(&self) -> Result<FetchOutcome> {
        let local_root = match &self.config.source_path {
            Some(path) => {
                if !path.is_dir() {
                    return Err(Error::Repository(format!(
                        "source path {} is not a directory",
                        path.display()
                    )));
                }
                path.clone()
            }
            None => {
                let staging = self
                    .work_dir
                    .join(".apostoli")
                    .join("src")
                    .join(self.config.app_name().as_str());
                self.clone_or_update(&staging).await?;
                staging
            }
        };

        let uses_compose = check_build_descriptor(&local_root)?;
        Ok(FetchOutcome {
            local_root,
            uses_compose,
        })
    }

    async fn clone_or_update(&self, staging: &Path) -> Result<()> {
        let url = self.authenticated_url();

        if staging.join(".git").is_dir() {
            tracing::info!("updating {} from {}", self.config.branch, self.config.repository);
            self.git(staging, &["fetch", "--depth", "1", "origin", &self.config.branch])
                .await?;
            self.git(staging, &["checkout", &self.config.branch]).await?;
            let target = format!("origin/{}", self.config.branch);
            self.git(staging, &["reset", "--hard", &target]).await?;
        } else {
            tracing::info!("cloning {} ({})", self.config.repository, self.config.branch);
            if let Some(parent) = staging.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let staging_str = staging.to_string_lossy().to_string();
            self.git(
                &self.work_dir,
                &[
                    "clone",
                    "--depth",
                    "1",
                    "--branch",
                    &self.config.branch,
                    &url,
                    &staging_str,
                ],
            )
            .await?;
        }

        Ok(())
    }

    /// The clone URL with the token injected, for https remotes only.
    fn authenticated_url(&self) -> String {
        let repo = &self.config.repository;
        match self.config.token() {
            Some(token) if repo.starts_with("https://") => {
                format!("https://x-access-token:{}@{}", token, &repo["https://".len()..])
            }
            _ => repo.clone(),
        }
    }

    async fn git(&self, cwd: &Path, args: &[&str]) -> Result<()> {
        let output = Command::new("git")
            .args(args)
            .current_dir(cwd)
            .output()
            .await
            .map_err(|e| Error::Repository(format!("failed to run git: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Repository(format!(
                "git {} failed: {}",
                args.first().unwrap_or(&"?"),
                self.redactor.redact(stderr.trim())
            )));
        }

        Ok(())
    }
}

/// Verify a build descriptor exists; returns whether compose is in use.
pub(crate) fn check_build_descriptor(root: &Path) -> Result<bool> {
    for name in COMPOSE_FILES {
        if root.join(name).is_file() {
            return Ok(true);
        }
    }
    if root.join("Dockerfile").is_file() {
        return Ok(false);
    }
    Err(Error::Repository(format!(
        "no Dockerfile or compose file found in {}",
        root.display()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compose_takes_precedence_over_dockerfile() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Dockerfile"), "FROM scratch\n").unwrap();
        std::fs::write(dir.path().join("compose.yml"), "services: {}\n").unwrap();
        assert!(check_build_descriptor(dir.path()).unwrap());
    }

    #[test]
    fn dockerfile_alone_is_enough() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Dockerfile"), "FROM scratch\n").unwrap();
        assert!(!check_build_descriptor(dir.path()).unwrap());
    }

    #[test]
    fn missing_descriptor_is_a_repository_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = check_build_descriptor(dir.path()).unwrap_err();
        assert!(matches!(err, Error::Repository(_)));
    }
}
