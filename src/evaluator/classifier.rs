// src/evaluator/classifier.rs — Zero-shot single-label classification

use async_trait::async_trait;
use minijinja::{context, Environment};
use serde::{Deserialize, Serialize};

use super::{EvalContext, EvalResult, Evaluator};
use crate::infra::errors::ProbeError;

const CLASSIFIER_PROMPT: &str = r#"You are acting as a classifier.
I want you to classify this output into one of the classification labels I am describing.
I am giving you the classification labels along with a description of the label.

Use the description to understand what each label means.
Then classify the output I am providing you as one of the labels, depending on which description matches most closely.

Your response should contain ONLY the classification label, and nothing else.
If no description matches, then return "None"

For example:

Classification Labels and Descriptions:
- plod: Represents a mammal.
- zazu: Represents a bird.
- goon: Represents a fish or sea animal.

Output to classify: "Eagles are majestic birds that fly high in the sky."
AI: zazu

Output to classify: "Sharks are dangerous and should be avoided."
AI: goon

Output to classify: "Lions are kings of the jungle."
AI: plod

Now here is my data to classify:
---
My input represents: {{ input_description }}
I want to determine: {{ task_description }}
Classification Labels and Descriptions:
{% for l in labels %}- {{ l.label }}: {{ l.description }}
{% endfor %}
Output to classify: "{{ output }}"
AI:"#;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationLabel {
    pub label: String,
    pub description: String,
}

impl ClassificationLabel {
    pub fn new(label: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            description: description.into(),
        }
    }
}

/// Passes when the classifier model assigns `expected` to the output.
#[derive(Debug, Clone)]
pub struct MatchesClassification {
    pub labels: Vec<ClassificationLabel>,
    pub input_description: String,
    pub task_description: String,
    pub expected: String,
}

impl MatchesClassification {
    pub fn prompt(&self, output: &str) -> Result<String, minijinja::Error> {
        Environment::new().render_str(
            CLASSIFIER_PROMPT,
            context! {
                labels => &self.labels,
                input_description => &self.input_description,
                task_description => &self.task_description,
                output,
            },
        )
    }
}

/// Strip whitespace, quotes and a trailing period from a returned label.
pub fn normalize_label(raw: &str) -> &str {
    raw.trim()
        .trim_start_matches("AI:")
        .trim()
        .trim_end_matches('.')
        .trim_matches(|c| c == '"' || c == '\'' || c == '`')
        .trim_end_matches('.')
        .trim()
}

#[async_trait]
impl Evaluator for MatchesClassification {
    fn name(&self) -> &str {
        "matches_desired_classification"
    }

    async fn evaluate(&self, output: &str, ctx: &EvalContext) -> Result<EvalResult, ProbeError> {
        let prompt = self
            .prompt(output)
            .map_err(|e| ProbeError::evaluator(self.name(), format!("classifier prompt: {e}")))?;
        let raw = ctx
            .complete(self.name(), &ctx.classifier_model, &prompt)
            .await?;
        let label = normalize_label(&raw);

        Ok(if label == self.expected {
            EvalResult::pass(format!("output classified as '{label}'"))
        } else {
            EvalResult::fail(format!(
                "output classified as '{label}', expected '{}'",
                self.expected
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::testing::StaticProvider;
    use std::sync::Arc;

    fn sentiment() -> MatchesClassification {
        MatchesClassification {
            labels: vec![
                ClassificationLabel::new("positive", "Upbeat or happy text"),
                ClassificationLabel::new("negative", "Sad or angry text"),
            ],
            input_description: "A tweet".into(),
            task_description: "The sentiment of the tweet".into(),
            expected: "positive".into(),
        }
    }

    #[test]
    fn test_normalize_label() {
        assert_eq!(normalize_label("  \"zazu\"\n"), "zazu");
        assert_eq!(normalize_label("AI: 'goon'."), "goon");
        assert_eq!(normalize_label("plod"), "plod");
    }

    #[test]
    fn test_prompt_lists_labels() {
        let prompt = sentiment().prompt("I love it").unwrap();
        assert!(prompt.contains("- positive: Upbeat or happy text"));
        assert!(prompt.contains("- negative: Sad or angry text"));
        assert!(prompt.contains("My input represents: A tweet"));
        assert!(prompt.contains("Output to classify: \"I love it\""));
    }

    #[tokio::test]
    async fn test_matching_label_passes() {
        let ctx = EvalContext::new(Arc::new(StaticProvider::replying(" \"positive\" ")));
        let r = sentiment().evaluate("I love it", &ctx).await.unwrap();
        assert_eq!(r.passed, Some(true));
    }

    #[tokio::test]
    async fn test_label_comparison_is_exact() {
        let ctx = EvalContext::new(Arc::new(StaticProvider::replying("Positive")));
        let r = sentiment().evaluate("I love it", &ctx).await.unwrap();
        assert_eq!(r.passed, Some(false));
        assert_eq!(r.reason, "output classified as 'Positive', expected 'positive'");
    }
}
