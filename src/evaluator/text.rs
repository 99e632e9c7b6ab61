// src/evaluator/text.rs — String matchers (equals, contains, starts/ends with)

use async_trait::async_trait;

use super::{EvalContext, EvalResult, Evaluator};
use crate::infra::errors::ProbeError;

#[derive(Debug, Clone, PartialEq)]
pub enum MatchKind {
    Equals(String),
    Contains(String),
    ContainsAll(Vec<String>),
    ContainsAny(Vec<String>),
    ContainsNone(Vec<String>),
    StartsWith(String),
    EndsWith(String),
}

impl MatchKind {
    pub fn name(&self) -> &'static str {
        match self {
            MatchKind::Equals(_) => "equals",
            MatchKind::Contains(_) => "contains",
            MatchKind::ContainsAll(_) => "contains_all",
            MatchKind::ContainsAny(_) => "contains_any",
            MatchKind::ContainsNone(_) => "contains_none",
            MatchKind::StartsWith(_) => "starts_with",
            MatchKind::EndsWith(_) => "ends_with",
        }
    }
}

/// Case-insensitive by default: both sides are lower-cased before comparing.
#[derive(Debug, Clone)]
pub struct TextMatch {
    kind: MatchKind,
    case_sensitive: bool,
}

impl TextMatch {
    pub fn new(kind: MatchKind) -> Self {
        Self {
            kind,
            case_sensitive: false,
        }
    }

    pub fn equals(expected: impl Into<String>) -> Self {
        Self::new(MatchKind::Equals(expected.into()))
    }

    pub fn contains(keyword: impl Into<String>) -> Self {
        Self::new(MatchKind::Contains(keyword.into()))
    }

    pub fn contains_all<S: Into<String>>(keywords: impl IntoIterator<Item = S>) -> Self {
        Self::new(MatchKind::ContainsAll(collect(keywords)))
    }

    pub fn contains_any<S: Into<String>>(keywords: impl IntoIterator<Item = S>) -> Self {
        Self::new(MatchKind::ContainsAny(collect(keywords)))
    }

    pub fn contains_none<S: Into<String>>(keywords: impl IntoIterator<Item = S>) -> Self {
        Self::new(MatchKind::ContainsNone(collect(keywords)))
    }

    pub fn starts_with(prefix: impl Into<String>) -> Self {
        Self::new(MatchKind::StartsWith(prefix.into()))
    }

    pub fn ends_with(suffix: impl Into<String>) -> Self {
        Self::new(MatchKind::EndsWith(suffix.into()))
    }

    pub fn case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    pub fn kind(&self) -> &MatchKind {
        &self.kind
    }

    fn fold(&self, s: &str) -> String {
        if self.case_sensitive {
            s.to_string()
        } else {
            s.to_lowercase()
        }
    }

    /// Synchronous core of `evaluate`; string matching never fails.
    pub fn check(&self, output: &str) -> EvalResult {
        let output = self.fold(output);
        match &self.kind {
            MatchKind::Equals(expected) => {
                if output == self.fold(expected) {
                    EvalResult::pass("output exactly matches expected output")
                } else {
                    EvalResult::fail("output does not exactly match expected output")
                }
            }
            MatchKind::Contains(keyword) => {
                let keyword = self.fold(keyword);
                if output.contains(&keyword) {
                    EvalResult::pass(format!("keyword {keyword} found in output"))
                } else {
                    EvalResult::fail(format!("keyword not found in output: {keyword}"))
                }
            }
            MatchKind::ContainsAll(keywords) => {
                let missing: Vec<String> = keywords
                    .iter()
                    .map(|k| self.fold(k))
                    .filter(|k| !output.contains(k.as_str()))
                    .collect();
                if missing.is_empty() {
                    EvalResult::pass(format!(
                        "{n}/{n} keywords found in output",
                        n = keywords.len()
                    ))
                } else {
                    EvalResult::fail(format!(
                        "keywords not found in output: {}",
                        missing.join(", ")
                    ))
                }
            }
            MatchKind::ContainsAny(keywords) | MatchKind::ContainsNone(keywords) => {
                let found: Vec<String> = keywords
                    .iter()
                    .map(|k| self.fold(k))
                    .filter(|k| output.contains(k.as_str()))
                    .collect();
                let any_found = !found.is_empty();
                let reason = if any_found {
                    format!(
                        "One or more keywords were found in output: {}",
                        found.join(", ")
                    )
                } else {
                    "No keywords found in output".to_string()
                };
                let passed = match self.kind {
                    MatchKind::ContainsAny(_) => any_found,
                    _ => !any_found,
                };
                EvalResult::from_verdict(passed, reason)
            }
            MatchKind::StartsWith(prefix) => {
                let prefix = self.fold(prefix);
                if output.starts_with(&prefix) {
                    EvalResult::pass(format!("output starts with {prefix}"))
                } else {
                    EvalResult::fail(format!("output does not start with {prefix}"))
                }
            }
            MatchKind::EndsWith(suffix) => {
                let suffix = self.fold(suffix);
                if output.ends_with(&suffix) {
                    EvalResult::pass(format!("output ends with {suffix}"))
                } else {
                    EvalResult::fail(format!("output does not end with {suffix}"))
                }
            }
        }
    }
}

fn collect<S: Into<String>>(keywords: impl IntoIterator<Item = S>) -> Vec<String> {
    keywords.into_iter().map(Into::into).collect()
}

#[async_trait]
impl Evaluator for TextMatch {
    fn name(&self) -> &str {
        self.kind.name()
    }

    async fn evaluate(&self, output: &str, _ctx: &EvalContext) -> Result<EvalResult, ProbeError> {
        Ok(self.check(output))
    }
}
