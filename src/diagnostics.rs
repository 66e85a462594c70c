// ABOUTME: Diagnostics accumulator for non-fatal warnings during deployment.
// ABOUTME: Collects warnings that shouldn't fail a deployment but should be shown to users.

/// Collects non-fatal warnings during deployment operations.
#[derive(Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    /// Record a warning, auto-logging it via tracing.
    pub fn warn(&mut self, warning: Warning) {
        tracing::warn!("{}", warning.message);
        self.warnings.push(warning);
    }

    /// Get all collected warnings.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Check if any warnings were collected.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// A non-fatal warning collected during deployment.
#[derive(Debug, Clone)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

impl Warning {
    /// The advisory connectivity probe did not get a reply.
    pub fn connectivity(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::Connectivity,
            message: message.into(),
        }
    }

    /// A managed service could not be enabled or started.
    pub fn service_start(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::ServiceStart,
            message: message.into(),
        }
    }

    /// A post-deployment validation check did not pass.
    pub fn validation(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::Validation,
            message: message.into(),
        }
    }

    /// The SSH session did not disconnect cleanly.
    pub fn ssh_disconnect(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::SshDisconnect,
            message: message.into(),
        }
    }
}

/// Categories of warnings that can occur during deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    /// Ping probe failed; SSH was still attempted.
    Connectivity,
    /// systemctl enable/start failed for a managed service.
    ServiceStart,
    /// Read-only post-deployment check failed.
    Validation,
    /// Failed to cleanly disconnect SSH session.
    SshDisconnect,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostics_starts_empty() {
        let diag = Diagnostics::default();
        assert!(!diag.has_warnings());
        assert!(diag.warnings().is_empty());
    }

    #[test]
    fn diagnostics_collects_warnings() {
        let mut diag = Diagnostics::default();

        diag.warn(Warning::connectivity("no ping reply from host"));
        diag.warn(Warning::validation("HTTPS probe returned 502"));

        assert!(diag.has_warnings());
        assert_eq!(diag.warnings().len(), 2);
    }

    #[test]
    fn warning_constructors_set_correct_kind() {
        assert_eq!(
            Warning::service_start("test").kind,
            WarningKind::ServiceStart
        );
        assert_eq!(
            Warning::ssh_disconnect("test").kind,
            WarningKind::SshDisconnect
        );
    }
}
