// src/infra/errors.rs — Error types for promptprobe

use thiserror::Error;

use crate::core::template::TemplateError;

#[derive(Error, Debug)]
pub enum ProbeError {
    // Suite loading (fatal: nothing runs)
    #[error("Suite '{name}' not found: {path} does not exist")]
    SuiteNotFound { name: String, path: String },

    #[error("Suite '{name}' is malformed: {reason}")]
    MalformedSuite { name: String, reason: String },

    // Trial execution (recorded on the trial, never fatal)
    #[error("Evaluator '{evaluator}' failed: {message}")]
    Evaluator { evaluator: String, message: String },

    #[error("Provider '{provider}' error: {message}")]
    Provider {
        provider: String,
        message: String,
        retriable: bool,
    },

    #[error("Rate limited by '{provider}', retry after {retry_after_ms}ms")]
    RateLimited {
        provider: String,
        retry_after_ms: u64,
    },

    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    /// The grading call succeeded but its content was unusable.
    /// Graders fail closed on this; it never marks a trial as errored.
    #[error("Grader output unusable: {reason}")]
    MalformedGraderOutput { reason: String, raw: String },

    #[error(transparent)]
    Template(#[from] TemplateError),

    // Remote dashboard
    #[error("Remote endpoint returned {status}: {body}")]
    Remote { status: u16, body: String },

    // Infra
    #[error("No API key configured. Set OPENAI_API_KEY or [provider].api_key in config.toml.")]
    NoApiKey,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ProbeError {
    pub fn evaluator(evaluator: impl Into<String>, message: impl Into<String>) -> Self {
        ProbeError::Evaluator {
            evaluator: evaluator.into(),
            message: message.into(),
        }
    }

    pub fn malformed_suite(name: impl Into<String>, reason: impl Into<String>) -> Self {
        ProbeError::MalformedSuite {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn timeout(operation: impl Into<String>, timeout: std::time::Duration) -> Self {
        ProbeError::Timeout {
            operation: operation.into(),
            timeout_ms: timeout.as_millis() as u64,
        }
    }

    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            ProbeError::Provider {
                retriable: true,
                ..
            } | ProbeError::RateLimited { .. }
        )
    }

    /// Errors raised while loading a suite. These abort the invocation
    /// before any trial runs.
    pub fn is_suite_error(&self) -> bool {
        matches!(
            self,
            ProbeError::SuiteNotFound { .. } | ProbeError::MalformedSuite { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_retriable_classification() {
        let transient = ProbeError::Provider {
            provider: "openai".into(),
            message: "HTTP 503".into(),
            retriable: true,
        };
        assert!(transient.is_retriable());
        assert!(ProbeError::RateLimited {
            provider: "openai".into(),
            retry_after_ms: 100,
        }
        .is_retriable());
        assert!(!ProbeError::NoApiKey.is_retriable());
        assert!(!ProbeError::timeout("chat completion", Duration::from_secs(1)).is_retriable());
    }

    #[test]
    fn test_suite_error_classification() {
        assert!(ProbeError::malformed_suite("s", "no tests").is_suite_error());
        assert!(ProbeError::SuiteNotFound {
            name: "s".into(),
            path: "/tmp/s".into(),
        }
        .is_suite_error());
        assert!(!ProbeError::evaluator("contains", "boom").is_suite_error());
    }

    #[test]
    fn test_timeout_message() {
        let e = ProbeError::timeout("link check", Duration::from_millis(1500));
        assert_eq!(e.to_string(), "link check timed out after 1500ms");
    }

    #[test]
    fn test_template_error_is_transparent() {
        let e: ProbeError = TemplateError::MissingVariable("app_name".into()).into();
        assert_eq!(
            e.to_string(),
            "prompt variable 'app_name' is not defined for this test"
        );
    }
}
