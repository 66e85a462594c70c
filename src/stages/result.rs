// ABOUTME: Per-stage result reporting.
// ABOUTME: Stage identity, outcome category, and a bounded output excerpt.

use crate::error::{Error, ExitCategory};
use std::fmt;

/// Number of trailing output lines kept in a stage excerpt.
pub const EXCERPT_LINES: usize = 20;

/// One discrete, independently idempotent unit of the deployment pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Connectivity,
    Repository,
    Provision,
    Sync,
    Containers,
    Proxy,
    Validate,
    Cleanup,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Connectivity => "connectivity",
            Stage::Repository => "repository",
            Stage::Provision => "provision",
            Stage::Sync => "sync",
            Stage::Containers => "containers",
            Stage::Proxy => "proxy",
            Stage::Validate => "validate",
            Stage::Cleanup => "cleanup",
        };
        write!(f, "{name}")
    }
}

/// Outcome of a single stage, consumed by the pipeline to decide whether
/// to continue.
#[derive(Debug, Clone)]
pub struct StageResult {
    pub stage: Stage,
    pub success: bool,
    pub category: ExitCategory,
    /// Last `EXCERPT_LINES` lines of captured output, already redacted.
    pub excerpt: String,
}

impl StageResult {
    pub fn ok(stage: Stage, output: &str) -> Self {
        Self {
            stage,
            success: true,
            category: ExitCategory::Success,
            excerpt: excerpt(output, EXCERPT_LINES),
        }
    }

    pub fn failed(stage: Stage, error: &Error, output: &str) -> Self {
        Self {
            stage,
            success: false,
            category: error.category(),
            excerpt: excerpt(output, EXCERPT_LINES),
        }
    }
}

/// Keep only the last `lines` lines of `text`.
pub fn excerpt(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.trim_end().lines().collect();
    let start = all.len().saturating_sub(lines);
    all[start..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excerpt_keeps_trailing_lines() {
        let text: String = (1..=30).map(|i| format!("line {i}\n")).collect();
        let out = excerpt(&text, 5);
        assert_eq!(out, "line 26\nline 27\nline 28\nline 29\nline 30");
    }

    #[test]
    fn excerpt_of_short_text_is_unchanged() {
        assert_eq!(excerpt("one\ntwo\n", 20), "one\ntwo");
    }

    #[test]
    fn failed_result_carries_category() {
        let err = Error::Deployment("health check exhausted".to_string());
        let result = StageResult::failed(Stage::Containers, &err, "logs");
        assert!(!result.success);
        assert_eq!(result.category, ExitCategory::Deployment);
    }
}
