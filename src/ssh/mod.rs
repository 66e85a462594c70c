// ABOUTME: Remote command execution over SSH.
// ABOUTME: Session management, the RemoteCommand unit, and the Executor seam.

mod client;
mod command;
mod error;

pub use client::{CommandOutput, Session, SessionConfig};
pub use command::{Executor, RemoteCommand};
pub use error::{Error, Result};
