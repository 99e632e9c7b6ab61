// src/evaluator/mod.rs — Evaluator library
//
// Every evaluator is built in two stages: a builder captures the parameters
// (`contains_all(["a", "b"])`), and the resulting value is later applied to a
// candidate output. Evaluators hold no mutable state and may be shared across
// trials and tasks.

pub mod classifier;
pub mod judge;
pub mod link;
pub mod similarity;
pub mod spec;
pub mod structure;
pub mod text;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::infra::config::Config;
use crate::infra::errors::ProbeError;
use crate::provider::ModelProvider;

pub use classifier::{ClassificationLabel, MatchesClassification};
pub use judge::LlmGrader;
pub use link::{ContainsLink, ContainsValidLink};
pub use similarity::CosineSimilarity;
pub use spec::EvaluatorSpec;
pub use structure::{LengthBound, RegexMatch, Shape, ShapeCheck};
pub use text::{MatchKind, TextMatch};

/// Verdict of one evaluator invocation.
///
/// `passed` is `None` only when the evaluation could not be carried out.
/// `reason` is never empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalResult {
    pub passed: Option<bool>,
    pub reason: String,
}

impl EvalResult {
    pub fn pass(reason: impl Into<String>) -> Self {
        Self::from_verdict(true, reason)
    }

    pub fn fail(reason: impl Into<String>) -> Self {
        Self::from_verdict(false, reason)
    }

    pub fn errored(reason: impl Into<String>) -> Self {
        Self {
            passed: None,
            reason: non_empty_reason(reason.into(), "evaluation errored"),
        }
    }

    pub fn from_verdict(passed: bool, reason: impl Into<String>) -> Self {
        let fallback = if passed { "passed" } else { "failed" };
        Self {
            passed: Some(passed),
            reason: non_empty_reason(reason.into(), fallback),
        }
    }

    pub fn outcome(&self) -> Outcome {
        match self.passed {
            Some(true) => Outcome::Passed,
            Some(false) => Outcome::Failed,
            None => Outcome::Errored,
        }
    }
}

fn non_empty_reason(reason: String, fallback: &str) -> String {
    if reason.trim().is_empty() {
        fallback.to_string()
    } else {
        reason
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Passed,
    Failed,
    Errored,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Outcome::Passed => "PASSED",
            Outcome::Failed => "FAILED",
            Outcome::Errored => "ERRORED",
        };
        f.write_str(s)
    }
}

/// A predicate over a model output.
///
/// `Err` means the evaluation itself broke (network, script error, ...).
/// The engine records such trials as errored; it never aborts the run.
#[async_trait]
pub trait Evaluator: Send + Sync {
    /// Stable snake_case identifier, e.g. `contains_all`.
    fn name(&self) -> &str;

    async fn evaluate(&self, output: &str, ctx: &EvalContext) -> Result<EvalResult, ProbeError>;
}

/// Shared collaborators for evaluators that leave the process.
#[derive(Clone)]
pub struct EvalContext {
    provider: Option<Arc<dyn ModelProvider>>,
    pub grader_model: String,
    pub classifier_model: String,
    pub embedding_model: String,
    pub request_timeout: Duration,
    pub link_timeout: Duration,
    http: reqwest::Client,
}

impl EvalContext {
    pub fn new(provider: Arc<dyn ModelProvider>) -> Self {
        Self {
            provider: Some(provider),
            ..Self::offline()
        }
    }

    /// No model provider: only local evaluators (and link checks) can run.
    pub fn offline() -> Self {
        let defaults = Config::default();
        Self {
            provider: None,
            grader_model: defaults.provider.grader_model().to_string(),
            classifier_model: defaults.provider.classifier_model().to_string(),
            embedding_model: defaults.provider.embedding_model.clone(),
            request_timeout: defaults.run.request_timeout(),
            link_timeout: defaults.run.link_timeout(),
            http: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &Config, provider: Option<Arc<dyn ModelProvider>>) -> Self {
        Self {
            provider,
            grader_model: config.provider.grader_model().to_string(),
            classifier_model: config.provider.classifier_model().to_string(),
            embedding_model: config.provider.embedding_model.clone(),
            request_timeout: config.run.request_timeout(),
            link_timeout: config.run.link_timeout(),
            http: reqwest::Client::new(),
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_link_timeout(mut self, timeout: Duration) -> Self {
        self.link_timeout = timeout;
        self
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    fn provider(&self, evaluator: &str) -> Result<&dyn ModelProvider, ProbeError> {
        self.provider
            .as_deref()
            .ok_or_else(|| ProbeError::evaluator(evaluator, "no model provider configured"))
    }

    /// Single-message completion bounded by `request_timeout`.
    pub async fn complete(
        &self,
        evaluator: &str,
        model: &str,
        prompt: &str,
    ) -> Result<String, ProbeError> {
        let provider = self.provider(evaluator)?;
        tokio::time::timeout(
            self.request_timeout,
            crate::provider::complete(provider, model, prompt),
        )
        .await
        .map_err(|_| ProbeError::timeout(format!("{evaluator} completion"), self.request_timeout))?
    }

    /// Embed `texts` with the configured embedding model, bounded by `request_timeout`.
    pub async fn embed(&self, evaluator: &str, texts: &[&str]) -> Result<Vec<Vec<f32>>, ProbeError> {
        let provider = self.provider(evaluator)?;
        tokio::time::timeout(
            self.request_timeout,
            provider.embed(texts, &self.embedding_model),
        )
        .await
        .map_err(|_| ProbeError::timeout(format!("{evaluator} embedding"), self.request_timeout))?
    }
}

/// Inverts the wrapped evaluator's verdict. Errored results stay errored.
pub struct Negate {
    inner: Arc<dyn Evaluator>,
    name: String,
}

impl Negate {
    pub fn new(inner: Arc<dyn Evaluator>) -> Self {
        let name = format!("negate_{}", inner.name());
        Self { inner, name }
    }
}

#[async_trait]
impl Evaluator for Negate {
    fn name(&self) -> &str {
        &self.name
    }

    async fn evaluate(&self, output: &str, ctx: &EvalContext) -> Result<EvalResult, ProbeError> {
        let inner = self.inner.evaluate(output, ctx).await?;
        let Some(passed) = inner.passed else {
            return Ok(inner);
        };
        Ok(EvalResult::from_verdict(
            !passed,
            format!(
                "{} returned {} with reason {}",
                self.inner.name(),
                passed,
                inner.reason
            ),
        ))
    }
}

pub fn negate(inner: Arc<dyn Evaluator>) -> Arc<dyn Evaluator> {
    Arc::new(Negate::new(inner))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::testing::StaticProvider;

    #[test]
    fn test_reason_never_empty() {
        assert_eq!(EvalResult::pass("").reason, "passed");
        assert_eq!(EvalResult::fail("  ").reason, "failed");
        assert_eq!(EvalResult::errored("").reason, "evaluation errored");
        assert_eq!(EvalResult::pass("ok").reason, "ok");
    }

    #[test]
    fn test_outcome() {
        assert_eq!(EvalResult::pass("x").outcome(), Outcome::Passed);
        assert_eq!(EvalResult::fail("x").outcome(), Outcome::Failed);
        assert_eq!(EvalResult::errored("x").outcome(), Outcome::Errored);
        assert_eq!(Outcome::Errored.to_string(), "ERRORED");
    }

    #[tokio::test]
    async fn test_negate_contains_hash() {
        let ctx = EvalContext::offline();
        let no_hash = negate(Arc::new(TextMatch::contains("#")));

        let r = no_hash.evaluate("no hashtag", &ctx).await.unwrap();
        assert_eq!(r.passed, Some(true));
        assert!(r.reason.starts_with("contains returned false with reason"));

        let r = no_hash.evaluate("#trending", &ctx).await.unwrap();
        assert_eq!(r.passed, Some(false));
        assert_eq!(no_hash.name(), "negate_contains");
    }

    #[tokio::test]
    async fn test_negate_keeps_errored() {
        struct Broken;
        #[async_trait]
        impl Evaluator for Broken {
            fn name(&self) -> &str {
                "broken"
            }
            async fn evaluate(&self, _: &str, _: &EvalContext) -> Result<EvalResult, ProbeError> {
                Ok(EvalResult::errored("could not decide"))
            }
        }
        let r = Negate::new(Arc::new(Broken))
            .evaluate("x", &EvalContext::offline())
            .await
            .unwrap();
        assert_eq!(r.passed, None);
    }

    #[tokio::test]
    async fn test_offline_context_rejects_model_calls() {
        let ctx = EvalContext::offline();
        let err = ctx.complete("grade_using_llm", "m", "p").await.unwrap_err();
        assert!(err.to_string().contains("no model provider"));
    }

    #[tokio::test]
    async fn test_context_complete_uses_provider() {
        let ctx = EvalContext::new(Arc::new(StaticProvider::replying("yes")));
        assert_eq!(ctx.complete("x", "m", "p").await.unwrap(), "yes");
    }
}
