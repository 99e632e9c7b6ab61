// src/suite/declarative.rs — `assertions.toml` suite definitions

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::core::types::TestCase;
use crate::evaluator::EvaluatorSpec;
use crate::infra::errors::ProbeError;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AssertionsFile {
    #[serde(default)]
    tests: Vec<TestEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TestEntry {
    description: String,
    eval: EvaluatorSpec,
    #[serde(default)]
    prompt_vars: BTreeMap<String, toml::Value>,
    #[serde(default)]
    failure_labels: Vec<String>,
}

/// Parse `[[tests]]` tables into test cases.
pub fn load_cases(suite: &str, source: &str) -> Result<Vec<TestCase>, ProbeError> {
    let file: AssertionsFile = toml::from_str(source).map_err(|e| {
        ProbeError::malformed_suite(suite, format!("assertions.toml is invalid: {e}"))
    })?;

    file.tests
        .into_iter()
        .enumerate()
        .map(|(i, entry)| {
            let evaluator = entry.eval.build().map_err(|e| {
                ProbeError::malformed_suite(suite, format!("test #{}: {e}", i + 1))
            })?;
            let mut case = TestCase::new(entry.description, evaluator)
                .with_failure_labels(entry.failure_labels);
            for (name, value) in entry.prompt_vars {
                case = case.with_variable(name, scalar_to_string(value));
            }
            Ok(case)
        })
        .collect()
}

// Strings are taken verbatim; other values use their TOML rendering.
fn scalar_to_string(value: toml::Value) -> String {
    match value {
        toml::Value::String(s) => s,
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_cases() {
        let cases = load_cases(
            "tweets",
            r##"
[[tests]]
description = "has a hashtag"
eval = { type = "contains_any", keywords = ["#"] }
failure_labels = ["no_hashtag"]

[[tests]]
description = "no hashtag when asked"
eval = { type = "negate", eval = { type = "contains", keyword = "#" } }
prompt_vars = { topic = "cats", count = 3 }
"##,
        )
        .unwrap();

        assert_eq!(cases.len(), 2);
        assert_eq!(cases[0].eval_name(), "contains_any");
        assert!(cases[0].uses_shared_response());
        assert_eq!(cases[1].eval_name(), "negate_contains");
        assert_eq!(cases[1].prompt_variables["topic"], "cats");
        assert_eq!(cases[1].prompt_variables["count"], "3");
    }

    #[test]
    fn test_unknown_evaluator_is_malformed() {
        let err = load_cases(
            "s",
            "[[tests]]\ndescription = \"x\"\neval = { type = \"nope\" }\n",
        )
        .unwrap_err();
        assert!(err.is_suite_error());
    }

    #[test]
    fn test_builder_error_names_test() {
        let err = load_cases(
            "s",
            "[[tests]]\ndescription = \"x\"\neval = { type = \"regex\", pattern = \"([\" }\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("test #1"));
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(load_cases(
            "s",
            "[[tests]]\ndescription = \"x\"\neval = { type = \"is_json\" }\nlabels = []\n",
        )
        .is_err());
    }
}
