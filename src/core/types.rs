// src/core/types.rs — Core domain types

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize, Serializer};

use crate::evaluator::{EvalResult, Evaluator, Outcome};

/// One declared assertion: an evaluator plus the variables for its prompt.
///
/// An empty `prompt_variables` map means the case is judged against the
/// suite's shared response.
#[derive(Clone)]
pub struct TestCase {
    pub description: String,
    pub evaluator: Arc<dyn Evaluator>,
    pub prompt_variables: BTreeMap<String, String>,
    /// Reporting tags attached to failed trials only.
    pub failure_labels: Vec<String>,
}

impl TestCase {
    pub fn new(description: impl Into<String>, evaluator: Arc<dyn Evaluator>) -> Self {
        Self {
            description: description.into(),
            evaluator,
            prompt_variables: BTreeMap::new(),
            failure_labels: Vec::new(),
        }
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.prompt_variables.insert(name.into(), value.into());
        self
    }

    pub fn with_failure_labels<S: Into<String>>(
        mut self,
        labels: impl IntoIterator<Item = S>,
    ) -> Self {
        self.failure_labels = labels.into_iter().map(Into::into).collect();
        self
    }

    pub fn uses_shared_response(&self) -> bool {
        self.prompt_variables.is_empty()
    }

    pub fn eval_name(&self) -> &str {
        self.evaluator.name()
    }
}

impl std::fmt::Debug for TestCase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestCase")
            .field("description", &self.description)
            .field("evaluator", &self.evaluator.name())
            .field("prompt_variables", &self.prompt_variables)
            .field("failure_labels", &self.failure_labels)
            .finish()
    }
}

#[derive(Serialize)]
struct TestCaseRecord<'a> {
    description: &'a str,
    eval: &'a str,
    prompt_vars: &'a BTreeMap<String, String>,
    failure_labels: &'a [String],
}

impl Serialize for TestCase {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        TestCaseRecord {
            description: &self.description,
            eval: self.evaluator.name(),
            prompt_vars: &self.prompt_variables,
            failure_labels: &self.failure_labels,
        }
        .serialize(serializer)
    }
}

/// One concrete execution of a test case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
    pub run_index: u32,
    /// The prompt after substitution (the raw template if substitution failed).
    pub prompt: String,
    /// `None` when no response was obtained.
    pub response: Option<String>,
    pub result: EvalResult,
    /// Copied from the case only when the trial failed.
    pub failure_labels: Vec<String>,
    /// The response came from the suite's shared-response cache.
    pub cached: bool,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCaseStatistics {
    pub num_runs: u32,
    pub num_passed: u32,
    pub num_failed: u32,
    pub num_errored: u32,
    /// `None` when every trial errored.
    pub pass_rate: Option<f64>,
    pub flakiness_index: Option<f64>,
    pub runtime_ms: u64,
}

impl TestCaseStatistics {
    /// No trial produced a verdict.
    pub fn all_errored(&self) -> bool {
        self.num_runs > 0 && self.num_errored == self.num_runs
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TestCaseResult {
    pub case: TestCase,
    pub statistics: TestCaseStatistics,
    pub trials: Vec<TrialRecord>,
}

impl TestCaseResult {
    /// Failure labels of the case when at least one trial failed.
    pub fn failure_labels(&self) -> &[String] {
        if self.statistics.num_failed > 0 {
            &self.case.failure_labels
        } else {
            &[]
        }
    }
}

/// Everything one invocation produced, in suite order.
#[derive(Debug, Clone, Serialize)]
pub struct TestSuiteResult {
    pub suite: String,
    pub run_id: String,
    pub started_at: DateTime<Local>,
    pub model: String,
    pub number_of_runs: u32,
    pub duration_ms: u64,
    pub results: Vec<TestCaseResult>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SuiteTotals {
    pub cases: usize,
    pub trials: u32,
    pub passed: u32,
    pub failed: u32,
    pub errored: u32,
    pub all_errored_cases: usize,
}

impl TestSuiteResult {
    pub fn get(&self, description: &str) -> Option<&TestCaseResult> {
        self.results
            .iter()
            .find(|r| r.case.description == description)
    }

    pub fn totals(&self) -> SuiteTotals {
        self.results
            .iter()
            .fold(SuiteTotals::default(), |mut t, r| {
                t.cases += 1;
                t.trials += r.statistics.num_runs;
                t.passed += r.statistics.num_passed;
                t.failed += r.statistics.num_failed;
                t.errored += r.statistics.num_errored;
                if r.statistics.all_errored() {
                    t.all_errored_cases += 1;
                }
                t
            })
    }
}

/// Lifecycle events emitted by `SuiteRunner` while a suite executes.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    SuiteStart {
        suite: String,
        cases: usize,
        runs: u32,
    },
    TrialComplete {
        description: String,
        run_index: u32,
        outcome: Outcome,
        cached: bool,
    },
    CaseComplete {
        description: String,
        statistics: TestCaseStatistics,
    },
    SuiteComplete {
        totals: SuiteTotals,
        duration_ms: u64,
    },
}
