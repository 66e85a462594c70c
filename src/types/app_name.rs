// ABOUTME: DNS- and filesystem-safe application name validation.
// ABOUTME: Derived deterministically from the repository URL.

use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppNameError {
    #[error("application name cannot be empty")]
    Empty,

    #[error("application name exceeds maximum length of 63 characters")]
    TooLong,

    #[error("application name cannot start with a hyphen")]
    StartsWithHyphen,

    #[error("application name cannot end with a hyphen")]
    EndsWithHyphen,

    #[error("invalid character in application name: '{0}'")]
    InvalidChar(char),

    #[error("cannot derive application name from repository URL: {0}")]
    Underivable(String),
}

/// A validated application name.
///
/// Used as the container name, the proxy configuration filename, and the
/// remote project directory name, so it must be a valid RFC 1123 label.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AppName(String);

impl AppName {
    pub fn new(value: &str) -> Result<Self, AppNameError> {
        if value.is_empty() {
            return Err(AppNameError::Empty);
        }

        if value.len() > 63 {
            return Err(AppNameError::TooLong);
        }

        if value.starts_with('-') {
            return Err(AppNameError::StartsWithHyphen);
        }

        if value.ends_with('-') {
            return Err(AppNameError::EndsWithHyphen);
        }

        for c in value.chars() {
            if !c.is_ascii_lowercase() && !c.is_ascii_digit() && c != '-' {
                return Err(AppNameError::InvalidChar(c));
            }
        }

        Ok(Self(value.to_string()))
    }

    /// Derive the application name from a repository URL.
    ///
    /// Takes the last path segment, strips a trailing `.git`, lowercases,
    /// and maps every character outside `[a-z0-9-]` to a hyphen. The same
    /// URL always yields the same name.
    pub fn derive(repository: &str) -> Result<Self, AppNameError> {
        let trimmed = repository.trim_end_matches('/');
        let segment = trimmed
            .rsplit(['/', ':'])
            .next()
            .unwrap_or_default()
            .trim_end_matches(".git");

        let mut name = String::with_capacity(segment.len());
        for c in segment.chars() {
            let c = c.to_ascii_lowercase();
            if c.is_ascii_lowercase() || c.is_ascii_digit() {
                name.push(c);
            } else {
                name.push('-');
            }
        }

        let name = name.trim_matches('-');
        if name.is_empty() {
            return Err(AppNameError::Underivable(repository.to_string()));
        }

        let mut name = name.to_string();
        name.truncate(63);
        let name = name.trim_end_matches('-').to_string();

        Self::new(&name).map_err(|_| AppNameError::Underivable(repository.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AppName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derivation_is_deterministic() {
        let a = AppName::derive("https://github.com/acme/Demo_App.git").unwrap();
        let b = AppName::derive("https://github.com/acme/Demo_App.git").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "demo-app");
    }

    #[test]
    fn scp_style_urls_work() {
        let name = AppName::derive("git@github.com:acme/widget.git").unwrap();
        assert_eq!(name.as_str(), "widget");
    }

    #[test]
    fn underivable_url_is_rejected() {
        assert!(AppName::derive("https://example.com/___").is_err());
        assert!(AppName::derive("").is_err());
    }
}
