//! Error types for dbbench operations

use crate::config::ConfigError;
use std::fmt::Display;
use thiserror::Error;

/// Master error type for all dbbench errors.
///
/// Driver failures are flattened into [`BenchError::Backend`] with a
/// descriptive context string. There is no distinction between transient and
/// permanent failures: any error aborts the current workload step.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BenchError {
    #[error("{context}: {reason}")]
    Backend { context: String, reason: String },

    #[error("no document found by query: {what}")]
    NotFound { what: String },

    #[error("expectation failed in {step}: expected {expected}, got {actual}")]
    Expectation {
        step: String,
        expected: String,
        actual: String,
    },

    #[error("db is already populated: {rows} rows, target {target}")]
    AlreadyPopulated { rows: u64, target: u64 },

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl BenchError {
    /// Wrap a backend failure with a context string.
    pub fn backend(context: impl Into<String>, reason: impl Display) -> Self {
        BenchError::Backend {
            context: context.into(),
            reason: reason.to_string(),
        }
    }

    /// Distinct "no document found" error for reads and traversals.
    pub fn not_found(what: impl Into<String>) -> Self {
        BenchError::NotFound { what: what.into() }
    }

    /// Harness assertion failure.
    pub fn expectation(step: impl Into<String>, expected: impl Display, actual: impl Display) -> Self {
        BenchError::Expectation {
            step: step.into(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, BenchError::NotFound { .. })
    }
}

/// Result type alias for dbbench operations.
pub type BenchResult<T> = Result<T, BenchError>;

/// Attach a context string to any displayable driver error.
pub trait ResultExt<T> {
    fn context(self, context: &str) -> BenchResult<T>;
}

impl<T, E: Display> ResultExt<T> for Result<T, E> {
    fn context(self, context: &str) -> BenchResult<T> {
        self.map_err(|e| BenchError::backend(context, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_error_display_carries_context() {
        let err = BenchError::backend("failed counting rows", "connection reset");
        assert_eq!(err.to_string(), "failed counting rows: connection reset");
    }

    #[test]
    fn test_context_wraps_foreign_errors() {
        let parsed: Result<i32, _> = "x".parse::<i32>();
        let err = parsed.context("failed parsing count").unwrap_err();
        match err {
            BenchError::Backend { context, reason } => {
                assert_eq!(context, "failed parsing count");
                assert!(!reason.is_empty());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_not_found_is_distinct() {
        let err = BenchError::not_found("hop 12 from artifact-0");
        assert!(err.is_not_found());
        assert!(err.to_string().contains("no document found"));
        assert!(!BenchError::backend("x", "y").is_not_found());
    }

    #[test]
    fn test_expectation_display() {
        let err = BenchError::expectation("14_query_pairs_10000", 10000, 9999);
        let msg = err.to_string();
        assert!(msg.contains("14_query_pairs_10000"));
        assert!(msg.contains("10000"));
        assert!(msg.contains("9999"));
    }

    #[test]
    fn test_config_error_converts() {
        let err = BenchError::from(ConfigError::MissingRequired {
            field: "postgres.url".to_string(),
        });
        assert!(matches!(err, BenchError::Config(_)));
    }
}
