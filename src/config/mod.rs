// ABOUTME: Deployment configuration types and parsing for apostoli.yml.
// ABOUTME: Handles YAML parsing, derived fields, and template generation.

mod server;

pub use server::ServerConfig;

use crate::error::{Error, Result};
use crate::types::AppName;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILENAME: &str = "apostoli.yml";
pub const CONFIG_FILENAME_ALT: &str = "apostoli.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".apostoli/config.yml";

/// Default environment variable holding the repository access token.
pub const DEFAULT_TOKEN_ENV: &str = "GIT_ACCESS_TOKEN";

/// The validated deployment configuration.
///
/// Immutable once loaded; the pipeline passes it by reference to every
/// stage. `app_name` and `remote_project_dir` are derived, not configured.
#[derive(Debug, Clone)]
pub struct DeploymentConfig {
    pub repository: String,
    pub branch: String,
    pub port: u16,
    pub server: ServerConfig,
    /// Deploy this local tree instead of cloning the repository.
    pub source_path: Option<PathBuf>,
    pub remote_root: String,
    pub excludes: Vec<String>,
    pub connect_timeout: Duration,
    pub command_timeout: Duration,
    /// Name of the environment variable holding the access token.
    pub token_env: String,
    app_name: AppName,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    repository: String,

    #[serde(default = "default_branch")]
    branch: String,

    port: u16,

    #[serde(deserialize_with = "deserialize_server")]
    server: ServerConfig,

    #[serde(default)]
    source: Option<SourceSection>,

    #[serde(default = "default_remote_root")]
    remote_root: String,

    #[serde(default = "default_excludes")]
    excludes: Vec<String>,

    #[serde(default = "default_connect_timeout", with = "humantime_serde")]
    connect_timeout: Duration,

    #[serde(default = "default_command_timeout", with = "humantime_serde")]
    command_timeout: Duration,

    #[serde(default = "default_token_env")]
    token_env: String,
}

#[derive(Debug, Deserialize)]
struct SourceSection {
    path: PathBuf,
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_remote_root() -> String {
    "/opt/apostoli".to_string()
}

fn default_excludes() -> Vec<String> {
    [".git", "node_modules", "target", "*.log"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_command_timeout() -> Duration {
    Duration::from_secs(300)
}

fn default_token_env() -> String {
    DEFAULT_TOKEN_ENV.to_string()
}

impl DeploymentConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let raw: RawConfig = serde_yaml::from_str(yaml)?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawConfig) -> Result<Self> {
        if raw.port == 0 {
            return Err(Error::InvalidConfig(
                "application port must be between 1 and 65535".to_string(),
            ));
        }

        let app_name = AppName::derive(&raw.repository)
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;

        Ok(Self {
            repository: raw.repository,
            branch: raw.branch,
            port: raw.port,
            server: raw.server,
            source_path: raw.source.map(|s| s.path),
            remote_root: raw.remote_root.trim_end_matches('/').to_string(),
            excludes: raw.excludes,
            connect_timeout: raw.connect_timeout,
            command_timeout: raw.command_timeout,
            token_env: raw.token_env,
            app_name,
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ];

        for path in &candidates {
            if path.exists() {
                return Self::load(path);
            }
        }

        Err(Error::ConfigNotFound(dir.to_path_buf()))
    }

    /// Application name derived from the repository URL.
    pub fn app_name(&self) -> &AppName {
        &self.app_name
    }

    /// Remote project directory: `<remote_root>/<app_name>`.
    pub fn remote_project_dir(&self) -> String {
        format!("{}/{}", self.remote_root, self.app_name)
    }

    /// Access token read from the configured environment variable.
    ///
    /// Held only in memory for the repository-fetch stage and fed to the
    /// log redactor; never persisted.
    pub fn token(&self) -> Option<String> {
        std::env::var(&self.token_env).ok().filter(|t| !t.is_empty())
    }
}

fn deserialize_server<'de, D>(deserializer: D) -> std::result::Result<ServerConfig, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ServerEntry {
        Simple(String),
        Detailed(ServerConfig),
    }

    match ServerEntry::deserialize(deserializer)? {
        ServerEntry::Simple(s) => ServerConfig::parse(&s).map_err(serde::de::Error::custom),
        ServerEntry::Detailed(c) => Ok(c),
    }
}

/// Write a starter configuration file into `dir`.
pub fn init_config(dir: &Path, repository: Option<&str>, force: bool) -> Result<()> {
    let config_path = dir.join(CONFIG_FILENAME);

    if config_path.exists() && !force {
        return Err(Error::AlreadyExists(config_path));
    }

    let repository = repository.unwrap_or("https://github.com/acme/my-app.git");
    let yaml = format!(
        r#"repository: {repository}
branch: main
port: 8080
server:
  host: server.example.com
  port: 22
  user: deploy
  # key_path: ~/.ssh/id_ed25519
# remote_root: /opt/apostoli
# excludes: [".git", "node_modules", "target", "*.log"]
"#
    );
    std::fs::write(&config_path, yaml)?;

    Ok(())
}
