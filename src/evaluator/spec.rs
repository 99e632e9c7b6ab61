// src/evaluator/spec.rs — Serializable evaluator descriptions
//
// Both suite formats resolve checks through `EvaluatorSpec::build`, so the
// parameter validation lives in one place.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{
    negate, ClassificationLabel, ContainsLink, ContainsValidLink, CosineSimilarity, Evaluator,
    LengthBound, LlmGrader, MatchKind, MatchesClassification, RegexMatch, Shape, ShapeCheck,
    TextMatch,
};
use crate::infra::errors::ProbeError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EvaluatorSpec {
    Equals {
        expected: String,
        #[serde(default)]
        case_sensitive: bool,
    },
    Contains {
        keyword: String,
        #[serde(default)]
        case_sensitive: bool,
    },
    ContainsAll {
        keywords: Vec<String>,
        #[serde(default)]
        case_sensitive: bool,
    },
    ContainsAny {
        keywords: Vec<String>,
        #[serde(default)]
        case_sensitive: bool,
    },
    ContainsNone {
        keywords: Vec<String>,
        #[serde(default)]
        case_sensitive: bool,
    },
    StartsWith {
        substring: String,
        #[serde(default)]
        case_sensitive: bool,
    },
    EndsWith {
        substring: String,
        #[serde(default)]
        case_sensitive: bool,
    },
    Regex {
        pattern: String,
    },
    IsJson,
    ContainsJson,
    IsEmail,
    ContainsEmail,
    IsPhoneNumber,
    ContainsPhoneNumber,
    ContainsCreditCardNumber,
    ContainsLink,
    ContainsValidLink,
    LengthLessThan {
        max_length: usize,
    },
    LengthGreaterThan {
        min_length: usize,
    },
    GradeUsingLlm {
        rubric: String,
    },
    IsPositiveSentiment,
    IsNegativeSentiment,
    ContainsPii,
    NotContainsPii,
    CosineSimilarityAboveThreshold {
        comparison: String,
        threshold: f64,
    },
    CosineSimilarityBelowThreshold {
        comparison: String,
        threshold: f64,
    },
    MatchesDesiredClassification {
        labels: Vec<ClassificationLabel>,
        input_description: String,
        task_description: String,
        expected_label: String,
    },
    Negate {
        eval: Box<EvaluatorSpec>,
    },
}

fn text(kind: MatchKind, case_sensitive: bool) -> Arc<dyn Evaluator> {
    Arc::new(TextMatch::new(kind).case_sensitive(case_sensitive))
}

fn invalid(evaluator: &str, message: impl Into<String>) -> ProbeError {
    ProbeError::evaluator(evaluator, message)
}

impl EvaluatorSpec {
    /// Validate parameters and construct the evaluator.
    pub fn build(&self) -> Result<Arc<dyn Evaluator>, ProbeError> {
        use EvaluatorSpec as S;

        let evaluator: Arc<dyn Evaluator> = match self {
            S::Equals {
                expected,
                case_sensitive,
            } => text(MatchKind::Equals(expected.clone()), *case_sensitive),
            S::Contains {
                keyword,
                case_sensitive,
            } => text(MatchKind::Contains(keyword.clone()), *case_sensitive),
            S::ContainsAll {
                keywords,
                case_sensitive,
            } => text(MatchKind::ContainsAll(keywords.clone()), *case_sensitive),
            S::ContainsAny {
                keywords,
                case_sensitive,
            } => text(MatchKind::ContainsAny(keywords.clone()), *case_sensitive),
            S::ContainsNone {
                keywords,
                case_sensitive,
            } => text(MatchKind::ContainsNone(keywords.clone()), *case_sensitive),
            S::StartsWith {
                substring,
                case_sensitive,
            } => text(MatchKind::StartsWith(substring.clone()), *case_sensitive),
            S::EndsWith {
                substring,
                case_sensitive,
            } => text(MatchKind::EndsWith(substring.clone()), *case_sensitive),
            S::Regex { pattern } => Arc::new(
                RegexMatch::new(pattern)
                    .map_err(|e| invalid("regex", format!("invalid pattern: {e}")))?,
            ),
            S::IsJson => Arc::new(ShapeCheck(Shape::IsJson)),
            S::ContainsJson => Arc::new(ShapeCheck(Shape::ContainsJson)),
            S::IsEmail => Arc::new(ShapeCheck(Shape::IsEmail)),
            S::ContainsEmail => Arc::new(ShapeCheck(Shape::ContainsEmail)),
            S::IsPhoneNumber => Arc::new(ShapeCheck(Shape::IsPhoneNumber)),
            S::ContainsPhoneNumber => Arc::new(ShapeCheck(Shape::ContainsPhoneNumber)),
            S::ContainsCreditCardNumber => Arc::new(ShapeCheck(Shape::ContainsCreditCardNumber)),
            S::ContainsLink => Arc::new(ContainsLink),
            S::ContainsValidLink => Arc::new(ContainsValidLink),
            S::LengthLessThan { max_length } => Arc::new(LengthBound::LessThan(*max_length)),
            S::LengthGreaterThan { min_length } => Arc::new(LengthBound::GreaterThan(*min_length)),
            S::GradeUsingLlm { rubric } => {
                if rubric.trim().is_empty() {
                    return Err(invalid("grade_using_llm", "rubric must not be empty"));
                }
                Arc::new(LlmGrader::new(rubric.clone()))
            }
            S::IsPositiveSentiment => Arc::new(LlmGrader::is_positive_sentiment()),
            S::IsNegativeSentiment => Arc::new(LlmGrader::is_negative_sentiment()),
            S::ContainsPii => Arc::new(LlmGrader::contains_pii()),
            S::NotContainsPii => Arc::new(LlmGrader::not_contains_pii()),
            S::CosineSimilarityAboveThreshold {
                comparison,
                threshold,
            } => {
                check_threshold("cosine_similarity_above_threshold", *threshold)?;
                Arc::new(CosineSimilarity::above(comparison.clone(), *threshold))
            }
            S::CosineSimilarityBelowThreshold {
                comparison,
                threshold,
            } => {
                check_threshold("cosine_similarity_below_threshold", *threshold)?;
                Arc::new(CosineSimilarity::below(comparison.clone(), *threshold))
            }
            S::MatchesDesiredClassification {
                labels,
                input_description,
                task_description,
                expected_label,
            } => {
                if !labels.iter().any(|l| &l.label == expected_label) {
                    return Err(invalid(
                        "matches_desired_classification",
                        format!("expected label '{expected_label}' is not among the labels"),
                    ));
                }
                Arc::new(MatchesClassification {
                    labels: labels.clone(),
                    input_description: input_description.clone(),
                    task_description: task_description.clone(),
                    expected: expected_label.clone(),
                })
            }
            S::Negate { eval } => negate(eval.build()?),
        };
        Ok(evaluator)
    }
}

fn check_threshold(evaluator: &str, threshold: f64) -> Result<(), ProbeError> {
    if (-1.0..=1.0).contains(&threshold) {
        Ok(())
    } else {
        Err(invalid(
            evaluator,
            format!("threshold {threshold} is outside [-1, 1]"),
        ))
    }
}
