// src/core/runner.rs — Suite execution engine
//
// Each test case runs `number_of_runs` trials in order. A trial moves
// Pending -> PromptBuilt -> ResponseObtained -> Evaluated; any error moves it
// to Errored and the run carries on. Independent cases may run concurrently.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use tokio::sync::OnceCell;

use super::stats::compute_statistics;
use super::template;
use super::types::{ProgressEvent, TestCase, TestCaseResult, TestSuiteResult, TrialRecord};
use crate::evaluator::{EvalContext, EvalResult};
use crate::infra::config::Config;
use crate::infra::errors::ProbeError;
use crate::provider::{ChatRequest, ModelProvider};
use crate::suite::Suite;

/// Where a trial is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialState {
    Pending,
    PromptBuilt,
    ResponseObtained,
    Evaluated,
    Errored,
}

impl TrialState {
    /// The step a trial in this state was attempting.
    fn attempted_step(&self) -> &'static str {
        match self {
            TrialState::Pending => "building prompt",
            TrialState::PromptBuilt => "obtaining response",
            TrialState::ResponseObtained => "evaluating response",
            TrialState::Evaluated | TrialState::Errored => "finishing trial",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub number_of_runs: u32,
    /// Test cases executed at the same time (trials within a case never overlap).
    pub concurrency: usize,
    pub model: String,
    pub request_timeout: Duration,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl RunnerConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            number_of_runs: config.run.number_of_runs,
            concurrency: config.run.concurrency,
            model: config.provider.default_model.clone(),
            request_timeout: config.run.request_timeout(),
            temperature: config.provider.temperature,
            max_tokens: config.provider.max_tokens,
        }
    }
}

/// Mutable bookkeeping for one trial, turned into a `TrialRecord` at the end.
struct TrialProgress {
    state: TrialState,
    prompt: String,
    response: Option<String>,
    cached: bool,
}

pub struct SuiteRunner {
    provider: Arc<dyn ModelProvider>,
    eval_ctx: EvalContext,
    config: RunnerConfig,
    /// Optional callback for real-time progress events.
    on_progress: Option<Box<dyn Fn(ProgressEvent) + Send + Sync>>,
}

impl SuiteRunner {
    pub fn new(provider: Arc<dyn ModelProvider>, config: RunnerConfig) -> Self {
        let eval_ctx =
            EvalContext::new(provider.clone()).with_request_timeout(config.request_timeout);
        Self {
            provider,
            eval_ctx,
            config,
            on_progress: None,
        }
    }

    /// Replace the context evaluators run with (models, timeouts, HTTP client).
    pub fn with_eval_context(mut self, ctx: EvalContext) -> Self {
        self.eval_ctx = ctx;
        self
    }

    /// Set a callback for real-time progress events.
    pub fn with_progress(mut self, cb: impl Fn(ProgressEvent) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Box::new(cb));
        self
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    fn emit(&self, event: ProgressEvent) {
        if let Some(ref cb) = self.on_progress {
            cb(event);
        }
    }

    /// Execute every case of `suite`. Trial-level failures are recorded, never returned.
    pub async fn run(&self, suite: &Suite) -> TestSuiteResult {
        let started = Instant::now();
        let started_at = chrono::Local::now();
        let run_id = uuid::Uuid::new_v4().to_string();

        tracing::info!(
            suite = %suite.name,
            run_id = %run_id,
            cases = suite.cases.len(),
            runs = self.config.number_of_runs,
            model = %self.config.model,
            "Starting suite"
        );
        self.emit(ProgressEvent::SuiteStart {
            suite: suite.name.clone(),
            cases: suite.cases.len(),
            runs: self.config.number_of_runs,
        });

        // Written once by the first variable-free trial, read by the rest.
        let shared = OnceCell::new();
        let shared = &shared;

        let mut indexed: Vec<(usize, TestCaseResult)> = stream::iter(suite.cases.iter().enumerate())
            .map(|(i, case)| async move {
                (i, self.run_case(&suite.prompt_template, case, shared).await)
            })
            .buffer_unordered(self.config.concurrency.max(1))
            .collect()
            .await;
        indexed.sort_by_key(|(i, _)| *i);

        let result = TestSuiteResult {
            suite: suite.name.clone(),
            run_id,
            started_at,
            model: self.config.model.clone(),
            number_of_runs: self.config.number_of_runs,
            duration_ms: started.elapsed().as_millis() as u64,
            results: indexed.into_iter().map(|(_, r)| r).collect(),
        };

        let totals = result.totals();
        tracing::info!(
            suite = %suite.name,
            passed = totals.passed,
            failed = totals.failed,
            errored = totals.errored,
            "Suite complete"
        );
        self.emit(ProgressEvent::SuiteComplete {
            totals,
            duration_ms: result.duration_ms,
        });
        result
    }

    async fn run_case(
        &self,
        template: &str,
        case: &TestCase,
        shared: &OnceCell<String>,
    ) -> TestCaseResult {
        let mut trials = Vec::with_capacity(self.config.number_of_runs as usize);

        for run_index in 0..self.config.number_of_runs {
            let trial = self.run_trial(template, case, run_index, shared).await;
            self.emit(ProgressEvent::TrialComplete {
                description: case.description.clone(),
                run_index,
                outcome: trial.result.outcome(),
                cached: trial.cached,
            });
            trials.push(trial);
        }

        let statistics = compute_statistics(&trials);
        tracing::debug!(
            test = %case.description,
            pass_rate = ?statistics.pass_rate,
            flakiness = ?statistics.flakiness_index,
            "Case complete"
        );
        self.emit(ProgressEvent::CaseComplete {
            description: case.description.clone(),
            statistics: statistics.clone(),
        });

        TestCaseResult {
            case: case.clone(),
            statistics,
            trials,
        }
    }

    async fn run_trial(
        &self,
        template: &str,
        case: &TestCase,
        run_index: u32,
        shared: &OnceCell<String>,
    ) -> TrialRecord {
        let started = Instant::now();
        let mut progress = TrialProgress {
            state: TrialState::Pending,
            prompt: template.to_string(),
            response: None,
            cached: false,
        };

        let result = match self.advance(template, case, shared, &mut progress).await {
            Ok(result) => result,
            Err(e) => {
                let step = progress.state.attempted_step();
                progress.state = TrialState::Errored;
                tracing::warn!(
                    test = %case.description,
                    run = run_index,
                    "Trial errored while {}: {}",
                    step,
                    e
                );
                EvalResult::errored(format!("error while {step}: {e}"))
            }
        };

        let failure_labels = if result.passed == Some(false) {
            case.failure_labels.clone()
        } else {
            Vec::new()
        };

        TrialRecord {
            run_index,
            prompt: progress.prompt,
            response: progress.response,
            result,
            failure_labels,
            cached: progress.cached,
            duration_ms: started.elapsed().as_millis() as u64,
        }
    }

    /// Drive one trial from `Pending` to `Evaluated`.
    async fn advance(
        &self,
        template: &str,
        case: &TestCase,
        shared: &OnceCell<String>,
        progress: &mut TrialProgress,
    ) -> Result<EvalResult, ProbeError> {
        let response = if case.uses_shared_response() {
            progress.state = TrialState::PromptBuilt;
            let mut fresh = false;
            let text = shared
                .get_or_try_init(|| {
                    fresh = true;
                    self.call_model(template)
                })
                .await?;
            progress.cached = !fresh;
            text.clone()
        } else {
            progress.prompt = template::render(template, &case.prompt_variables)?;
            progress.state = TrialState::PromptBuilt;
            self.call_model(&progress.prompt).await?
        };

        progress.response = Some(response);
        progress.state = TrialState::ResponseObtained;

        let output = progress.response.as_deref().unwrap_or_default();
        let result = case.evaluator.evaluate(output, &self.eval_ctx).await?;
        progress.state = TrialState::Evaluated;
        Ok(result)
    }

    async fn call_model(&self, prompt: &str) -> Result<String, ProbeError> {
        let timeout = self.config.request_timeout;
        let request = ChatRequest::single(&self.config.model, prompt)
            .with_sampling(self.config.temperature, self.config.max_tokens);
        tokio::time::timeout(timeout, crate::provider::send(self.provider.as_ref(), request))
        .await
        .map_err(|_| ProbeError::timeout("model call", timeout))?
    }
}
