// src/evaluator/judge.rs — LLM-graded rubric evaluation

use async_trait::async_trait;
use minijinja::{context, Environment};

use super::{EvalContext, EvalResult, Evaluator};
use crate::infra::errors::ProbeError;
use crate::util::log_preview;

const GRADING_PROMPT: &str = r#"You are grading a response string according to a grading criteria given to you.

If the grading criteria is true, then the test_result is True. Otherwise, it is False.

Explain the reason for the test_result in the reason field.

Respond with a python dictionary object that looks like this:
{"test_result": boolean, "reason": string}

Examples:

String: Qui est le président des États-Unis?
Grading Criteria: Contains the french words for 'president' and 'United States'
{"test_result": True, "reason": "the content contains the words 'président' and 'États-Unis'"}

String: Earth is the second planet from the sun.
Grading Criteria: If the fact is true, then the test_result is True. Otherwise, it is False.
{"test_result": False, "reason": "The string is factually inaccurate - Earth is actually the third planet from the sun."}

String: {{ output }}
Grading Criteria: {{ rubric }}
"#;

const POSITIVE_SENTIMENT: &str =
    "If the string has a positive sentiment, then the test_result is True. Otherwise, it is False.";
const NEGATIVE_SENTIMENT: &str =
    "If the string has a negative sentiment, then the test_result is True. Otherwise, it is False.";
const CONTAINS_PII: &str = "If the string contains information that looks like personally \
     identifiable information, then the test_result is True. Otherwise, it is False.";
const NOT_CONTAINS_PII: &str = "If the string contains information that looks like personally \
     identifiable information, then the test_result is False. Otherwise, it is True.";

/// Render the few-shot grading prompt for one output.
pub fn grading_prompt(output: &str, rubric: &str) -> Result<String, minijinja::Error> {
    Environment::new().render_str(GRADING_PROMPT, context! { output, rubric })
}

/// Asks the grader model whether `output` satisfies a natural-language rubric.
///
/// A verdict that cannot be parsed fails the check; it is never an error,
/// because the grading call itself went through.
#[derive(Debug, Clone)]
pub struct LlmGrader {
    name: &'static str,
    rubric: String,
}

impl LlmGrader {
    pub fn new(rubric: impl Into<String>) -> Self {
        Self {
            name: "grade_using_llm",
            rubric: rubric.into(),
        }
    }

    pub fn is_positive_sentiment() -> Self {
        Self::preset("is_positive_sentiment", POSITIVE_SENTIMENT)
    }

    pub fn is_negative_sentiment() -> Self {
        Self::preset("is_negative_sentiment", NEGATIVE_SENTIMENT)
    }

    pub fn contains_pii() -> Self {
        Self::preset("contains_pii", CONTAINS_PII)
    }

    pub fn not_contains_pii() -> Self {
        Self::preset("not_contains_pii", NOT_CONTAINS_PII)
    }

    fn preset(name: &'static str, rubric: &str) -> Self {
        Self {
            name,
            rubric: rubric.to_string(),
        }
    }

    pub fn rubric(&self) -> &str {
        &self.rubric
    }
}

#[async_trait]
impl Evaluator for LlmGrader {
    fn name(&self) -> &str {
        self.name
    }

    async fn evaluate(&self, output: &str, ctx: &EvalContext) -> Result<EvalResult, ProbeError> {
        let prompt = grading_prompt(output, &self.rubric)
            .map_err(|e| ProbeError::evaluator(self.name, format!("grading prompt: {e}")))?;
        let raw = ctx.complete(self.name, &ctx.grader_model, &prompt).await?;

        match parse_grader_verdict(&raw) {
            Ok((passed, reason)) => Ok(EvalResult::from_verdict(passed, reason)),
            Err(e) => {
                tracing::warn!(
                    evaluator = self.name,
                    raw = %log_preview(&raw, 200),
                    "Grader output unusable: {}",
                    e
                );
                Ok(EvalResult::fail(e.to_string()))
            }
        }
    }
}

/// Extract `(test_result, reason)` from a grader reply.
///
/// Accepts a JSON object or a Python dict literal, possibly surrounded by
/// prose or a code fence. The first balanced `{...}` block that parses as a
/// dictionary is used.
pub fn parse_grader_verdict(raw: &str) -> Result<(bool, String), ProbeError> {
    let malformed = |reason: &str| ProbeError::MalformedGraderOutput {
        reason: reason.to_string(),
        raw: raw.to_string(),
    };

    let mut blocks = balanced_objects(raw).peekable();
    if blocks.peek().is_none() {
        return Err(malformed("no dictionary in grader response"));
    }
    let value = blocks
        .find_map(|block| {
            serde_json::from_str::<serde_json::Value>(block)
                .or_else(|_| serde_json::from_str(&python_literal_to_json(block)))
                .ok()
                .filter(|v| v.is_object())
        })
        .ok_or_else(|| malformed("grader response is not a dictionary literal"))?;

    let passed = value
        .get("test_result")
        .and_then(|v| v.as_bool())
        .ok_or_else(|| malformed("LLM response does not contain a boolean value"))?;
    let reason = match value.get("reason") {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(serde_json::Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    };
    Ok((passed, reason))
}

/// Every top-level `{...}` span of `text`, in order. Braces inside quoted
/// strings do not count; an unclosed span ends the scan.
fn balanced_objects(text: &str) -> impl Iterator<Item = &str> {
    let bytes = text.as_bytes();
    let mut pos = 0;
    std::iter::from_fn(move || {
        let start = pos + text[pos..].find('{')?;
        let mut depth = 0usize;
        let mut quote: Option<u8> = None;
        let mut i = start;
        while i < bytes.len() {
            let b = bytes[i];
            match quote {
                Some(_) if b == b'\\' => i += 1,
                Some(q) if b == q => quote = None,
                Some(_) => {}
                None => match b {
                    b'"' | b'\'' => quote = Some(b),
                    b'{' => depth += 1,
                    b'}' => {
                        depth -= 1;
                        if depth == 0 {
                            pos = i + 1;
                            return Some(&text[start..=i]);
                        }
                    }
                    _ => {}
                },
            }
            i += 1;
        }
        pos = bytes.len();
        None
    })
}

/// Rewrite a Python dict literal as JSON: single-quoted strings, `True`,
/// `False`, `None` and bare identifier keys.
fn python_literal_to_json(src: &str) -> String {
    let chars: Vec<char> = src.chars().collect();
    let mut out = String::with_capacity(src.len() + 8);
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '"' | '\'' => {
                let quote = c;
                out.push('"');
                i += 1;
                while i < chars.len() && chars[i] != quote {
                    match chars[i] {
                        '\\' if i + 1 < chars.len() => {
                            let next = chars[i + 1];
                            if next == '\'' {
                                out.push('\'');
                            } else {
                                out.push('\\');
                                out.push(next);
                            }
                            i += 2;
                            continue;
                        }
                        '"' => out.push_str("\\\""),
                        '\n' => out.push_str("\\n"),
                        other => out.push(other),
                    }
                    i += 1;
                }
                out.push('"');
                i += 1;
            }
            c if c.is_alphabetic() || c == '_' => {
                let begin = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let word: String = chars[begin..i].iter().collect();
                let next = chars[i..].iter().find(|c| !c.is_whitespace());
                match word.as_str() {
                    "True" => out.push_str("true"),
                    "False" => out.push_str("false"),
                    "None" => out.push_str("null"),
                    _ if next == Some(&':') => {
                        out.push('"');
                        out.push_str(&word);
                        out.push('"');
                    }
                    _ => out.push_str(&word),
                }
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::testing::StaticProvider;
    use std::sync::Arc;

    #[test]
    fn test_parse_python_dict() {
        let (passed, reason) =
            parse_grader_verdict(r#"{"test_result": True, "reason": "it's in French"}"#).unwrap();
        assert!(passed);
        assert_eq!(reason, "it's in French");
    }

    #[test]
    fn test_parse_single_quotes() {
        let (passed, reason) =
            parse_grader_verdict(r#"{'test_result': False, 'reason': 'says "hi"'}"#).unwrap();
        assert!(!passed);
        assert_eq!(reason, r#"says "hi""#);
    }

    #[test]
    fn test_parse_json_in_prose_and_fence() {
        let raw = "Sure!\n```json\n{\"test_result\": true, \"reason\": \"ok\"}\n```";
        assert_eq!(parse_grader_verdict(raw).unwrap(), (true, "ok".to_string()));
    }

    #[test]
    fn test_parse_bare_keys() {
        let raw = "{test_result: True, reason: 'positive tone'}";
        assert_eq!(
            parse_grader_verdict(raw).unwrap(),
            (true, "positive tone".to_string())
        );
    }

    #[test]
    fn test_parse_ignores_braces_after_verdict() {
        let raw = r#"{"test_result": True, "reason": "mentions {topic}"} Note: see {appendix}."#;
        assert_eq!(
            parse_grader_verdict(raw).unwrap(),
            (true, "mentions {topic}".to_string())
        );
    }

    #[test]
    fn test_parse_skips_brace_prose_before_verdict() {
        let raw = "Checking {criteria} now.\n{'test_result': False, 'reason': 'no'}";
        assert_eq!(parse_grader_verdict(raw).unwrap(), (false, "no".to_string()));
    }

    #[test]
    fn test_balanced_objects_spans() {
        let spans: Vec<_> = balanced_objects(r#"a {b {c}} "x" {'}'} {open"#).collect();
        assert_eq!(spans, vec!["{b {c}}", "{'}'}"]);
    }

    #[test]
    fn test_parse_non_boolean_verdict() {
        let err = parse_grader_verdict(r#"{"test_result": "maybe", "reason": "x"}"#).unwrap_err();
        assert!(matches!(err, ProbeError::MalformedGraderOutput { .. }));
        assert!(err
            .to_string()
            .contains("LLM response does not contain a boolean value"));
    }

    #[test]
    fn test_parse_garbage() {
        assert!(parse_grader_verdict("I think it passes.").is_err());
        assert!(parse_grader_verdict("} nope {").is_err());
    }

    #[test]
    fn test_grading_prompt_embeds_output_and_rubric() {
        let prompt = grading_prompt("Bonjour le monde", "Is French").unwrap();
        assert!(prompt.contains("String: Bonjour le monde"));
        assert!(prompt.contains("Grading Criteria: Is French"));
        assert!(prompt.contains(r#"{"test_result": boolean, "reason": string}"#));
    }

    #[tokio::test]
    async fn test_grader_pass() {
        let provider = Arc::new(StaticProvider::replying(
            r#"{"test_result": True, "reason": "upbeat"}"#,
        ));
        let ctx = EvalContext::new(provider.clone());
        let r = LlmGrader::is_positive_sentiment()
            .evaluate("What a great day!", &ctx)
            .await
            .unwrap();
        assert_eq!(r.passed, Some(true));
        assert_eq!(r.reason, "upbeat");
        assert!(provider
            .last_prompt()
            .unwrap()
            .contains("String: What a great day!"));
    }

    #[tokio::test]
    async fn test_grader_fails_closed_on_malformed_output() {
        let ctx = EvalContext::new(Arc::new(StaticProvider::replying("yes, definitely")));
        let r = LlmGrader::new("Is polite").evaluate("hi", &ctx).await.unwrap();
        assert_eq!(r.passed, Some(false));
        assert!(r.reason.contains("Grader output unusable"));
    }

    #[tokio::test]
    async fn test_grader_provider_error_propagates() {
        let ctx = EvalContext::new(Arc::new(StaticProvider::failing("HTTP 500")));
        assert!(LlmGrader::contains_pii().evaluate("hi", &ctx).await.is_err());
    }

    #[test]
    fn test_preset_names() {
        assert_eq!(LlmGrader::not_contains_pii().name(), "not_contains_pii");
        assert_eq!(LlmGrader::new("x").name(), "grade_using_llm");
    }
}
