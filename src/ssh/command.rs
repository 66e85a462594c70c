// ABOUTME: The RemoteCommand unit of work and the Executor trait.
// ABOUTME: Stages depend on Executor, not on a concrete SSH session.

use super::client::CommandOutput;
use super::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// A unit of work sent to the remote host: a script body plus an
/// execution timeout. Stateless, constructed fresh per call.
#[derive(Debug, Clone)]
pub struct RemoteCommand {
    script: String,
    timeout: Duration,
    input: Option<Vec<u8>>,
}

impl RemoteCommand {
    pub fn new(script: impl Into<String>, timeout: Duration) -> Self {
        Self {
            script: script.into(),
            timeout,
            input: None,
        }
    }

    /// Attach bytes to be streamed to the command's stdin.
    pub fn with_input(mut self, input: Vec<u8>) -> Self {
        self.input = Some(input);
        self
    }

    pub fn script(&self) -> &str {
        &self.script
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn input(&self) -> Option<&[u8]> {
        self.input.as_deref()
    }
}

/// The remote execution seam.
///
/// Implemented by `Session` for real deployments; tests use scripted
/// fakes so every stage is exercisable without a network.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn run(&self, command: &RemoteCommand) -> Result<CommandOutput>;
}
