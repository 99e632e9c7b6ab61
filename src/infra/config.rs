// src/infra/config.rs — Configuration loading (TOML)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::infra::paths;

pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-ada-002";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub provider: ProviderConfig,

    #[serde(default)]
    pub run: RunConfig,

    #[serde(default)]
    pub retry: RetrySettings,

    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub remote: RemoteConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Overridden by OPENAI_API_KEY when set.
    pub api_key: Option<String>,
    pub base_url: String,
    pub default_model: String,
    /// Model used by LLM-graded evaluators (defaults to `default_model`).
    pub grader_model: Option<String>,
    /// Model used by the classification evaluator (defaults to `default_model`).
    pub classifier_model: Option<String>,
    pub embedding_model: String,
    /// Sampling temperature for prompts under test (provider default when unset).
    pub temperature: Option<f32>,
    /// Completion length cap for prompts under test.
    pub max_tokens: Option<u32>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_OPENAI_BASE_URL.into(),
            default_model: DEFAULT_MODEL.into(),
            grader_model: None,
            classifier_model: None,
            embedding_model: DEFAULT_EMBEDDING_MODEL.into(),
            temperature: None,
            max_tokens: None,
        }
    }
}

impl ProviderConfig {
    pub fn resolved_api_key(&self) -> Option<String> {
        non_empty(std::env::var("OPENAI_API_KEY").ok()).or_else(|| non_empty(self.api_key.clone()))
    }

    pub fn grader_model(&self) -> &str {
        self.grader_model.as_deref().unwrap_or(&self.default_model)
    }

    pub fn classifier_model(&self) -> &str {
        self.classifier_model
            .as_deref()
            .unwrap_or(&self.default_model)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub number_of_runs: u32,
    /// Test cases executed in parallel (1 = sequential).
    pub concurrency: usize,
    pub request_timeout_secs: u64,
    pub link_timeout_secs: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            number_of_runs: 8,
            concurrency: 1,
            request_timeout_secs: 60,
            link_timeout_secs: 10,
        }
    }
}

impl RunConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn link_timeout(&self) -> Duration {
        Duration::from_secs(self.link_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub delay_ms: u64,
    /// 1.0 keeps the delay fixed between attempts.
    pub backoff_factor: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay_ms: 1_000,
            backoff_factor: 1.0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub test_dir: Option<String>,
    pub test_runs_dir: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub base_url: String,
    /// Overridden by PROMPTPROBE_API_KEY when set.
    pub api_key: Option<String>,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:9000".into(),
            api_key: None,
        }
    }
}

impl RemoteConfig {
    pub fn resolved_api_key(&self) -> Option<String> {
        non_empty(std::env::var("PROMPTPROBE_API_KEY").ok())
            .or_else(|| non_empty(self.api_key.clone()))
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl Config {
    /// Load config from file, falling back to defaults.
    pub fn load() -> anyhow::Result<Self> {
        let path = paths::config_file_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn test_dir(&self) -> PathBuf {
        self.paths
            .test_dir
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(paths::default_test_dir)
    }

    pub fn test_runs_dir(&self) -> PathBuf {
        self.paths
            .test_runs_dir
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(paths::default_test_runs_dir)
    }
}

/// Starter config written by `promptprobe init`.
pub const CONFIG_TEMPLATE: &str = r#"# promptprobe configuration

[provider]
# api_key = "sk-..."            # or set OPENAI_API_KEY
base_url = "https://api.openai.com/v1"
default_model = "gpt-3.5-turbo"
embedding_model = "text-embedding-ada-002"
# grader_model = "gpt-4o"
# temperature = 0.7
# max_tokens = 512

[run]
number_of_runs = 8
concurrency = 1
request_timeout_secs = 60
link_timeout_secs = 10

[retry]
max_retries = 3
delay_ms = 1000
backoff_factor = 1.0

[remote]
base_url = "http://localhost:9000"
# api_key = "..."               # or set PROMPTPROBE_API_KEY
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_reasonable() {
        let c = Config::default();
        assert_eq!(c.run.number_of_runs, 8);
        assert_eq!(c.run.concurrency, 1);
        assert_eq!(c.run.request_timeout(), Duration::from_secs(60));
        assert_eq!(c.provider.default_model, "gpt-3.5-turbo");
        assert_eq!(c.provider.embedding_model, "text-embedding-ada-002");
        assert_eq!(c.retry.max_retries, 3);
        assert!((c.retry.backoff_factor - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_model_fallbacks() {
        let mut p = ProviderConfig::default();
        assert_eq!(p.grader_model(), "gpt-3.5-turbo");
        assert_eq!(p.classifier_model(), "gpt-3.5-turbo");

        p.grader_model = Some("gpt-4.1".into());
        assert_eq!(p.grader_model(), "gpt-4.1");
        assert_eq!(p.classifier_model(), "gpt-3.5-turbo");
    }

    #[test]
    fn test_parse_minimal_toml() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.run.number_of_runs, 8);
        assert!(config.paths.test_dir.is_none());
    }

    #[test]
    fn test_parse_full_toml() {
        let toml_str = r#"
[provider]
api_key = "sk-test"
base_url = "http://localhost:8080/v1"
default_model = "gpt-4.1-mini"
grader_model = "gpt-4.1"
embedding_model = "text-embedding-3-small"

[run]
number_of_runs = 3
concurrency = 4
request_timeout_secs = 5
link_timeout_secs = 2

[retry]
max_retries = 0
delay_ms = 10
backoff_factor = 2.0

[paths]
test_dir = "suites"
test_runs_dir = "logs"

[remote]
base_url = "https://dashboard.example.com"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.provider.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.provider.grader_model(), "gpt-4.1");
        assert_eq!(config.provider.classifier_model(), "gpt-4.1-mini");
        assert_eq!(config.run.number_of_runs, 3);
        assert_eq!(config.run.concurrency, 4);
        assert_eq!(config.run.link_timeout(), Duration::from_secs(2));
        assert_eq!(config.retry.max_retries, 0);
        assert_eq!(config.test_dir(), PathBuf::from("suites"));
        assert_eq!(config.test_runs_dir(), PathBuf::from("logs"));
        assert_eq!(config.remote.base_url, "https://dashboard.example.com");
    }

    #[test]
    fn test_template_parses() {
        let config: Config = toml::from_str(CONFIG_TEMPLATE).unwrap();
        assert_eq!(config.run.number_of_runs, 8);
        assert_eq!(config.provider.base_url, DEFAULT_OPENAI_BASE_URL);
        assert!(config.provider.api_key.is_none());
        assert!(config.provider.temperature.is_none());
    }

    #[test]
    fn test_partial_sections_keep_defaults() {
        let config: Config = toml::from_str(
            "[run]\nnumber_of_runs = 3\n\n[provider]\ndefault_model = \"gpt-4o\"\ntemperature = 0.2\n\n[retry]\nmax_retries = 1\n\n[remote]\napi_key = \"k\"\n",
        )
        .unwrap();
        assert_eq!(config.run.number_of_runs, 3);
        assert_eq!(config.run.concurrency, 1);
        assert_eq!(config.run.request_timeout_secs, 60);
        assert_eq!(config.provider.default_model, "gpt-4o");
        assert_eq!(config.provider.base_url, DEFAULT_OPENAI_BASE_URL);
        assert_eq!(config.provider.embedding_model, DEFAULT_EMBEDDING_MODEL);
        assert_eq!(config.provider.temperature, Some(0.2));
        assert_eq!(config.retry.max_retries, 1);
        assert_eq!(config.retry.delay_ms, 1_000);
        assert_eq!(config.remote.base_url, "http://localhost:9000");
    }

    #[test]
    fn test_template_round_trips_through_load_from() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, CONFIG_TEMPLATE).unwrap();
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.provider.default_model, DEFAULT_MODEL);
        assert_eq!(config.retry.max_retries, 3);
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = Config::load_from(Path::new("/nonexistent/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_non_empty_filters_blank() {
        assert_eq!(non_empty(Some("  ".into())), None);
        assert_eq!(non_empty(Some("k".into())), Some("k".into()));
        assert_eq!(non_empty(None), None);
    }
}
