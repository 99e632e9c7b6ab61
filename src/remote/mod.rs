// src/remote/mod.rs — Remote dashboard client: production run triggers and suite deploys
//
// Nothing here feeds back into local statistics. A trigger asks the dashboard
// to replay recorded production traffic against deployed suites; response
// logging records prompt/response pairs that such replays draw from.

use serde::{Serialize, Serializer};

use crate::core::types::TestSuiteResult;
use crate::infra::config::RemoteConfig;
use crate::infra::errors::ProbeError;
use crate::suite::Suite;

pub const API_KEY_HEADER: &str = "promptprobe-api-key";
const TRIGGER_PATH: &str = "api/v1/testRun/trigger/byPromptSlug";
const DEPLOY_PATH: &str = "api/v1/testDeploy";
const LOG_RESPONSE_PATH: &str = "api/v1/savePromptAndResponse";

/// Which tests of a prompt to replay: all of them, or a named subset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestSlugs {
    All,
    Only(Vec<String>),
}

impl TestSlugs {
    /// `"*"` selects everything; anything else is a comma-separated list.
    pub fn parse(raw: &str) -> Self {
        if raw.trim() == "*" {
            return TestSlugs::All;
        }
        TestSlugs::Only(
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
        )
    }
}

impl Serialize for TestSlugs {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            TestSlugs::All => serializer.serialize_str("*"),
            TestSlugs::Only(slugs) => slugs.serialize(serializer),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProdRunRequest {
    pub prompt_slug: String,
    pub test_slugs: TestSlugs,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Serialize)]
struct TriggerPayload<'a> {
    source: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    start_date: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    end_date: Option<&'a str>,
    prompt_tests: [PromptTests<'a>; 1],
}

#[derive(Serialize)]
struct PromptTests<'a> {
    prompt_slug: &'a str,
    test_slugs: &'a TestSlugs,
}

/// One model call to record on the dashboard.
#[derive(Debug, Clone)]
pub struct PromptResponseRecord {
    pub prompt_slug: String,
    pub prompt: String,
    pub response: String,
    pub model: String,
    pub response_time_ms: Option<u64>,
    pub context: Option<serde_json::Value>,
}

#[derive(Serialize)]
struct LogPayload<'a> {
    prompt_slug: &'a str,
    prompt_data: PromptText<'a>,
    language_model_id: &'a str,
    completion: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_time: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<&'a serde_json::Value>,
}

#[derive(Serialize)]
struct PromptText<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct DeployMetadata<'a> {
    test_slug: &'a str,
    test_data: &'a [crate::core::types::TestCase],
}

pub struct RemoteClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl RemoteClient {
    pub fn new(base_url: &str, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &RemoteConfig) -> Result<Self, ProbeError> {
        let api_key = config.resolved_api_key().ok_or_else(|| {
            ProbeError::Config(
                "No remote API key. Set PROMPTPROBE_API_KEY or [remote].api_key in config.toml."
                    .into(),
            )
        })?;
        Ok(Self::new(&config.base_url, api_key))
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn check(response: reqwest::Response) -> Result<(), ProbeError> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(ProbeError::Remote {
            status: status.as_u16(),
            body,
        })
    }

    /// Ask the dashboard to run deployed tests against production traffic.
    pub async fn trigger_prod_run(&self, request: &ProdRunRequest) -> Result<(), ProbeError> {
        let payload = TriggerPayload {
            source: "CLI",
            start_date: request.start_date.as_deref(),
            end_date: request.end_date.as_deref(),
            prompt_tests: [PromptTests {
                prompt_slug: &request.prompt_slug,
                test_slugs: &request.test_slugs,
            }],
        };
        tracing::debug!(
            prompt = %request.prompt_slug,
            tests = ?request.test_slugs,
            "Triggering production run"
        );

        let response = self
            .client
            .post(self.url(TRIGGER_PATH))
            .header(API_KEY_HEADER, &self.api_key)
            .json(&payload)
            .send()
            .await?;
        Self::check(response).await
    }

    /// Record one prompt/response pair under `prompt_slug`.
    pub async fn log_prompt_response(&self, record: &PromptResponseRecord) -> Result<(), ProbeError> {
        let payload = LogPayload {
            prompt_slug: &record.prompt_slug,
            prompt_data: PromptText {
                text: &record.prompt,
            },
            language_model_id: &record.model,
            completion: &record.response,
            response_time: record.response_time_ms,
            context: record.context.as_ref(),
        };
        let response = self
            .client
            .post(self.url(LOG_RESPONSE_PATH))
            .header(API_KEY_HEADER, &self.api_key)
            .json(&payload)
            .send()
            .await?;
        Self::check(response).await
    }

    /// Record every freshly obtained response of a run under the suite name.
    /// Reused shared responses are skipped so each model call is logged once.
    /// Returns the number of records sent.
    pub async fn log_run_responses(&self, result: &TestSuiteResult) -> Result<usize, ProbeError> {
        let mut sent = 0;
        for case in &result.results {
            for trial in case.trials.iter().filter(|t| !t.cached) {
                let Some(ref response) = trial.response else {
                    continue;
                };
                self.log_prompt_response(&PromptResponseRecord {
                    prompt_slug: result.suite.clone(),
                    prompt: trial.prompt.clone(),
                    response: response.clone(),
                    model: result.model.clone(),
                    response_time_ms: Some(trial.duration_ms),
                    context: Some(serde_json::json!({
                        "test": case.case.description,
                        "run_index": trial.run_index,
                    })),
                })
                .await?;
                sent += 1;
            }
        }
        tracing::info!(suite = %result.suite, sent, "Logged run responses");
        Ok(sent)
    }

    /// Upload a suite's raw assertions file plus per-test metadata.
    pub async fn deploy_suite(&self, suite: &Suite) -> Result<(), ProbeError> {
        let source = suite.source.as_ref().ok_or_else(|| {
            ProbeError::Config(format!(
                "Suite '{}' was not loaded from disk; nothing to deploy",
                suite.name
            ))
        })?;

        let metadata = serde_json::to_string(&DeployMetadata {
            test_slug: &suite.name,
            test_data: &suite.cases,
        })
        .map_err(|e| ProbeError::Other(e.into()))?;

        let file = reqwest::multipart::Part::bytes(source.raw.clone().into_bytes())
            .file_name(source.format.file_name())
            .mime_str("application/octet-stream")?;
        let json = reqwest::multipart::Part::text(metadata).mime_str("application/json")?;
        let form = reqwest::multipart::Form::new()
            .part("file", file)
            .part("json", json);

        let response = self
            .client
            .post(self.url(DEPLOY_PATH))
            .header(API_KEY_HEADER, &self.api_key)
            .multipart(form)
            .send()
            .await?;
        Self::check(response).await?;

        tracing::info!(suite = %suite.name, tests = suite.cases.len(), "Deployed suite");
        Ok(())
    }
}
