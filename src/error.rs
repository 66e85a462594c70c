// ABOUTME: Application-wide error types for apostoli.
// ABOUTME: Every error maps to one of the categorized exit codes.

use std::path::PathBuf;
use thiserror::Error;

/// Categorized pipeline outcome, surfaced to the caller as an exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCategory {
    Success,
    Validation,
    Repository,
    Connection,
    Deployment,
    ProxyConfig,
}

impl ExitCategory {
    pub fn code(self) -> i32 {
        match self {
            ExitCategory::Success => 0,
            ExitCategory::Validation => 1,
            ExitCategory::Repository => 2,
            ExitCategory::Connection => 3,
            ExitCategory::Deployment => 4,
            ExitCategory::ProxyConfig => 5,
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("file already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("configuration file not found in {0}")]
    ConfigNotFound(PathBuf),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("repository error: {0}")]
    Repository(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("deployment error: {0}")]
    Deployment(String),

    #[error("proxy configuration error: {0}")]
    ProxyConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl From<crate::ssh::Error> for Error {
    fn from(e: crate::ssh::Error) -> Self {
        Error::Connection(e.to_string())
    }
}

impl Error {
    /// The exit category this error falls into.
    pub fn category(&self) -> ExitCategory {
        match self {
            Error::AlreadyExists(_)
            | Error::ConfigNotFound(_)
            | Error::InvalidConfig(_)
            | Error::Yaml(_)
            | Error::Io(_) => ExitCategory::Validation,
            Error::Repository(_) => ExitCategory::Repository,
            Error::Connection(_) => ExitCategory::Connection,
            Error::Deployment(_) => ExitCategory::Deployment,
            Error::ProxyConfig(_) => ExitCategory::ProxyConfig,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
