// ABOUTME: Target server configuration.
// ABOUTME: Host, SSH port, user, and key material location.

use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,

    #[serde(default = "default_ssh_port")]
    pub port: u16,

    pub user: String,

    #[serde(default)]
    pub key_path: Option<PathBuf>,

    /// Accept unknown host keys on first connection.
    #[serde(default)]
    pub trust_first_connection: bool,
}

fn default_ssh_port() -> u16 {
    22
}

impl ServerConfig {
    /// Parse a compact `user@host:port` server entry.
    pub fn parse(value: &str) -> Result<Self, String> {
        let (user, rest) = value
            .split_once('@')
            .ok_or_else(|| format!("server entry '{}' must be user@host[:port]", value))?;

        if user.is_empty() {
            return Err(format!("server entry '{}' has an empty user", value));
        }

        let (host, port) = match rest.rsplit_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| format!("invalid port in server entry '{}'", value))?;
                (host, port)
            }
            None => (rest, default_ssh_port()),
        };

        if host.is_empty() {
            return Err(format!("server entry '{}' has an empty host", value));
        }

        Ok(Self {
            host: host.to_string(),
            port,
            user: user.to_string(),
            key_path: None,
            trust_first_connection: false,
        })
    }
}
