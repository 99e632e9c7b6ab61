// src/suite/rhai_host.rs — Rhai scripting host for assertion suites
//
// `assertions.rhai` runs in a sandboxed interpreter with no I/O and no module
// imports. The host exposes every evaluator builder as a function, so a
// script can write `negate(contains("#"))` or hand in its own closure.

use std::sync::Arc;

use async_trait::async_trait;
use rhai::{Array, CallFnOptions, Dynamic, Engine, EvalAltResult, FnPtr, Map, Scope, AST};

use crate::core::types::TestCase;
use crate::evaluator::{ClassificationLabel, EvalContext, EvalResult, Evaluator, EvaluatorSpec};
use crate::infra::errors::ProbeError;

const FACTORY_FN: &str = "define_tests";
const TESTS_VAR: &str = "tests";
const CONTEXT_VAR: &str = "test_context";
// `eval` is a reserved word in Rhai, so the check lives under `check`.
const CHECK_KEY: &str = "check";

/// A built-in check, as seen from scripts.
#[derive(Clone)]
pub struct Check(pub Arc<dyn Evaluator>);

type BuildResult = Result<Check, Box<EvalAltResult>>;

fn build(spec: EvaluatorSpec) -> BuildResult {
    spec.build().map(Check).map_err(|e| e.to_string().into())
}

fn strings(values: Array, what: &str) -> Result<Vec<String>, Box<EvalAltResult>> {
    values
        .into_iter()
        .map(|v| {
            let type_name = v.type_name();
            v.into_string()
                .map_err(|_| format!("{what} must be strings, found {type_name}").into())
        })
        .collect()
}

fn length(n: i64) -> Result<usize, Box<EvalAltResult>> {
    usize::try_from(n).map_err(|_| format!("length must not be negative, got {n}").into())
}

// ---------------------------------------------------------------------------
// Engine factory
// ---------------------------------------------------------------------------

/// Create the sandboxed engine used to evaluate suite scripts.
pub fn create_suite_engine() -> Engine {
    let mut engine = Engine::new();

    // Set safety limits
    engine.set_max_expr_depths(64, 32);
    engine.set_max_operations(100_000);
    engine.set_max_string_size(1_048_576);
    engine.set_max_array_size(10_000);
    engine.set_max_map_size(10_000);
    engine.set_module_resolver(rhai::module_resolvers::DummyModuleResolver::new());

    engine.on_print(|msg| tracing::info!(target: "suite_script", "{}", msg));
    engine.on_debug(|msg, _source, pos| tracing::debug!(target: "suite_script", "{} @ {}", msg, pos));
    engine.register_fn("log", |msg: &str| {
        tracing::info!(target: "suite_script", "{}", msg);
    });

    engine.register_type_with_name::<Check>("Check");
    register_builders(&mut engine);
    engine
}

fn register_builders(engine: &mut Engine) {
    use EvaluatorSpec as S;

    // String matchers: case-insensitive unless a trailing `true` is passed.
    engine.register_fn("equals", |s: &str| {
        build(S::Equals {
            expected: s.into(),
            case_sensitive: false,
        })
    });
    engine.register_fn("equals", |s: &str, cs: bool| {
        build(S::Equals {
            expected: s.into(),
            case_sensitive: cs,
        })
    });
    engine.register_fn("contains", |s: &str| {
        build(S::Contains {
            keyword: s.into(),
            case_sensitive: false,
        })
    });
    engine.register_fn("contains", |s: &str, cs: bool| {
        build(S::Contains {
            keyword: s.into(),
            case_sensitive: cs,
        })
    });
    engine.register_fn("starts_with", |s: &str| {
        build(S::StartsWith {
            substring: s.into(),
            case_sensitive: false,
        })
    });
    engine.register_fn("starts_with", |s: &str, cs: bool| {
        build(S::StartsWith {
            substring: s.into(),
            case_sensitive: cs,
        })
    });
    engine.register_fn("ends_with", |s: &str| {
        build(S::EndsWith {
            substring: s.into(),
            case_sensitive: false,
        })
    });
    engine.register_fn("ends_with", |s: &str, cs: bool| {
        build(S::EndsWith {
            substring: s.into(),
            case_sensitive: cs,
        })
    });

    engine.register_fn("contains_all", |k: Array| contains_all(k, false));
    engine.register_fn("contains_all", contains_all);
    engine.register_fn("contains_any", |k: Array| contains_any(k, false));
    engine.register_fn("contains_any", contains_any);
    engine.register_fn("contains_none", |k: Array| contains_none(k, false));
    engine.register_fn("contains_none", contains_none);

    engine.register_fn("regex", |pattern: &str| {
        build(S::Regex {
            pattern: pattern.into(),
        })
    });

    // Fixed-shape checks
    engine.register_fn("is_json", || build(S::IsJson));
    engine.register_fn("contains_json", || build(S::ContainsJson));
    engine.register_fn("is_email", || build(S::IsEmail));
    engine.register_fn("contains_email", || build(S::ContainsEmail));
    engine.register_fn("is_phone_number", || build(S::IsPhoneNumber));
    engine.register_fn("contains_phone_number", || build(S::ContainsPhoneNumber));
    engine.register_fn("contains_credit_card_number", || {
        build(S::ContainsCreditCardNumber)
    });
    engine.register_fn("contains_link", || build(S::ContainsLink));
    engine.register_fn("contains_valid_link", || build(S::ContainsValidLink));
    engine.register_fn("length_less_than", |n: i64| {
        build(S::LengthLessThan {
            max_length: length(n)?,
        })
    });
    engine.register_fn("length_greater_than", |n: i64| {
        build(S::LengthGreaterThan {
            min_length: length(n)?,
        })
    });

    // Model-backed checks
    engine.register_fn("grade_using_llm", |rubric: &str| {
        build(S::GradeUsingLlm {
            rubric: rubric.into(),
        })
    });
    engine.register_fn("is_positive_sentiment", || build(S::IsPositiveSentiment));
    engine.register_fn("is_negative_sentiment", || build(S::IsNegativeSentiment));
    engine.register_fn("contains_pii", || build(S::ContainsPii));
    engine.register_fn("not_contains_pii", || build(S::NotContainsPii));
    engine.register_fn(
        "cosine_similarity_above_threshold",
        |comparison: &str, threshold: f64| {
            build(S::CosineSimilarityAboveThreshold {
                comparison: comparison.into(),
                threshold,
            })
        },
    );
    engine.register_fn(
        "cosine_similarity_below_threshold",
        |comparison: &str, threshold: f64| {
            build(S::CosineSimilarityBelowThreshold {
                comparison: comparison.into(),
                threshold,
            })
        },
    );
    engine.register_fn(
        "matches_desired_classification",
        |labels: Map, input_description: &str, task_description: &str, expected: &str| {
            let labels = labels
                .into_iter()
                .map(|(label, description)| {
                    let type_name = description.type_name();
                    description
                        .into_string()
                        .map(|d| ClassificationLabel::new(label.as_str(), d))
                        .map_err(|_| {
                            format!("description of label '{label}' must be a string, found {type_name}")
                        })
                })
                .collect::<Result<Vec<_>, _>>()?;
            build(S::MatchesDesiredClassification {
                labels,
                input_description: input_description.into(),
                task_description: task_description.into(),
                expected_label: expected.into(),
            })
        },
    );

    engine.register_fn("negate", |check: Check| Check(crate::evaluator::negate(check.0)));
    engine.register_fn("name", |check: &mut Check| check.0.name().to_string());
}

fn contains_all(keywords: Array, case_sensitive: bool) -> BuildResult {
    build(EvaluatorSpec::ContainsAll {
        keywords: strings(keywords, "keywords")?,
        case_sensitive,
    })
}

fn contains_any(keywords: Array, case_sensitive: bool) -> BuildResult {
    build(EvaluatorSpec::ContainsAny {
        keywords: strings(keywords, "keywords")?,
        case_sensitive,
    })
}

fn contains_none(keywords: Array, case_sensitive: bool) -> BuildResult {
    build(EvaluatorSpec::ContainsNone {
        keywords: strings(keywords, "keywords")?,
        case_sensitive,
    })
}

// ---------------------------------------------------------------------------
// Script-defined evaluators
// ---------------------------------------------------------------------------

/// Compiled script shared by every closure it defines.
struct ScriptRuntime {
    engine: Engine,
    ast: AST,
}

/// A user closure `|output| ...` returning a bool or `#{ result, reason }`.
pub struct ScriptEvaluator {
    runtime: Arc<ScriptRuntime>,
    callback: FnPtr,
}

impl ScriptEvaluator {
    fn interpret(&self, value: Dynamic) -> Result<EvalResult, ProbeError> {
        if let Ok(passed) = value.as_bool() {
            return Ok(EvalResult::from_verdict(
                passed,
                format!("custom check returned {passed}"),
            ));
        }
        if let Some(map) = value.try_cast::<Map>() {
            let passed = map
                .get("result")
                .and_then(|v| v.as_bool().ok())
                .ok_or_else(|| {
                    ProbeError::evaluator(self.name(), "returned map has no boolean `result`")
                })?;
            let reason = map
                .get("reason")
                .map(|r| r.to_string())
                .unwrap_or_else(|| format!("custom check returned {passed}"));
            return Ok(EvalResult::from_verdict(passed, reason));
        }
        Err(ProbeError::evaluator(
            self.name(),
            "custom check must return a bool or #{ result, reason }",
        ))
    }
}

#[async_trait]
impl Evaluator for ScriptEvaluator {
    fn name(&self) -> &str {
        "custom"
    }

    async fn evaluate(&self, output: &str, _ctx: &EvalContext) -> Result<EvalResult, ProbeError> {
        let value = self
            .callback
            .call::<Dynamic>(
                &self.runtime.engine,
                &self.runtime.ast,
                (output.to_string(),),
            )
            .map_err(|e| ProbeError::evaluator(self.name(), e.to_string()))?;
        self.interpret(value)
    }
}

// ---------------------------------------------------------------------------
// Suite loading
// ---------------------------------------------------------------------------

/// Evaluate an assertions script and collect its test cases.
///
/// The script either binds a top-level `tests` array or defines
/// `define_tests(context)`. The context is the script's `test_context`
/// variable, else `fallback_context` (from `context.json`), else unit.
pub fn load_cases(
    suite: &str,
    script: &str,
    fallback_context: Option<&serde_json::Value>,
) -> Result<Vec<TestCase>, ProbeError> {
    let malformed = |reason: String| ProbeError::malformed_suite(suite, reason);

    let engine = create_suite_engine();
    let ast = engine
        .compile(script)
        .map_err(|e| malformed(format!("assertions.rhai does not compile: {e}")))?;

    let mut scope = Scope::new();
    engine
        .run_ast_with_scope(&mut scope, &ast)
        .map_err(|e| malformed(format!("assertions.rhai failed to run: {e}")))?;

    let factory_arity = ast
        .iter_functions()
        .find(|f| f.name == FACTORY_FN)
        .map(|f| f.params.len());

    let declared = match factory_arity {
        Some(arity) if arity <= 1 => {
            let options = CallFnOptions::new().eval_ast(false).rewind_scope(true);
            let result = if arity == 1 {
                let context = scope
                    .get_value::<Dynamic>(CONTEXT_VAR)
                    .or_else(|| fallback_context.map(json_to_dynamic))
                    .unwrap_or(Dynamic::UNIT);
                engine.call_fn_with_options::<Dynamic>(
                    options,
                    &mut scope,
                    &ast,
                    FACTORY_FN,
                    (context,),
                )
            } else {
                engine.call_fn_with_options::<Dynamic>(options, &mut scope, &ast, FACTORY_FN, ())
            };
            result.map_err(|e| malformed(format!("{FACTORY_FN} failed: {e}")))?
        }
        Some(arity) => {
            return Err(malformed(format!(
                "{FACTORY_FN} must take at most one parameter, found {arity}"
            )))
        }
        None => scope.get_value::<Dynamic>(TESTS_VAR).ok_or_else(|| {
            malformed(format!(
                "assertions.rhai defines neither a `{TESTS_VAR}` array nor `{FACTORY_FN}`"
            ))
        })?,
    };

    let type_name = declared.type_name();
    let entries = declared
        .try_cast::<Array>()
        .ok_or_else(|| malformed(format!("test list must be an array, found {type_name}")))?;

    tracing::debug!(suite, tests = entries.len(), "Evaluated assertions script");

    let runtime = Arc::new(ScriptRuntime { engine, ast });
    entries
        .into_iter()
        .enumerate()
        .map(|(i, entry)| parse_entry(entry, &runtime).map_err(|e| malformed(format!("test #{}: {e}", i + 1))))
        .collect()
}

fn parse_entry(entry: Dynamic, runtime: &Arc<ScriptRuntime>) -> Result<TestCase, String> {
    let type_name = entry.type_name();
    let mut map = entry
        .try_cast::<Map>()
        .ok_or_else(|| format!("expected a map, found {type_name}"))?;

    let description = map
        .remove("description")
        .and_then(|d| d.into_string().ok())
        .filter(|d| !d.trim().is_empty())
        .ok_or("`description` must be a non-empty string")?;

    let check = map
        .remove(CHECK_KEY)
        .ok_or_else(|| format!("'{description}' has no `{CHECK_KEY}`"))?;
    let evaluator: Arc<dyn Evaluator> = if check.is::<Check>() {
        check.cast::<Check>().0
    } else if check.is::<FnPtr>() {
        Arc::new(ScriptEvaluator {
            runtime: runtime.clone(),
            callback: check.cast::<FnPtr>(),
        })
    } else {
        return Err(format!(
            "'{description}': `{CHECK_KEY}` must be a built-in check or a closure, found {}",
            check.type_name()
        ));
    };

    let mut case = TestCase::new(description, evaluator);

    match map.remove("prompt_vars") {
        None => {}
        Some(v) if v.is_unit() => {}
        Some(v) => {
            let type_name = v.type_name();
            let vars = v
                .try_cast::<Map>()
                .ok_or_else(|| format!("`prompt_vars` must be a map, found {type_name}"))?;
            for (name, value) in vars {
                case = case.with_variable(name.as_str(), value.to_string());
            }
        }
    }

    match map.remove("failure_labels") {
        None => {}
        Some(v) if v.is_unit() => {}
        Some(v) => {
            let type_name = v.type_name();
            let labels = v
                .try_cast::<Array>()
                .ok_or_else(|| format!("`failure_labels` must be an array, found {type_name}"))?;
            let labels = strings(labels, "failure_labels").map_err(|e| e.to_string())?;
            case = case.with_failure_labels(labels);
        }
    }

    Ok(case)
}

/// Convert a serde_json::Value to a Rhai Dynamic.
fn json_to_dynamic(value: &serde_json::Value) -> Dynamic {
    match value {
        serde_json::Value::Null => Dynamic::UNIT,
        serde_json::Value::Bool(b) => Dynamic::from(*b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Dynamic::from(i)
            } else if let Some(f) = n.as_f64() {
                Dynamic::from(f)
            } else {
                Dynamic::UNIT
            }
        }
        serde_json::Value::String(s) => Dynamic::from(s.clone()),
        serde_json::Value::Array(arr) => {
            let rhai_arr: Array = arr.iter().map(json_to_dynamic).collect();
            Dynamic::from(rhai_arr)
        }
        serde_json::Value::Object(obj) => {
            let mut map = Map::new();
            for (k, v) in obj {
                map.insert(k.clone().into(), json_to_dynamic(v));
            }
            Dynamic::from(map)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
