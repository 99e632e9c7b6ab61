// src/cli/run.rs — `promptprobe run`: load, execute and report one suite

use std::path::Path;
use std::sync::Arc;

use super::progress::terminal_progress;
use super::RunArgs;
use crate::core::runner::{RunnerConfig, SuiteRunner};
use crate::core::types::TestSuiteResult;
use crate::evaluator::EvalContext;
use crate::infra::config::Config;
use crate::infra::errors::ProbeError;
use crate::provider::openai::OpenAIProvider;
use crate::provider::retry::{RetryConfig, RetryProvider};
use crate::provider::ModelProvider;
use crate::remote::RemoteClient;
use crate::report::{export, log_file, print_report};
use crate::suite::SuiteLoader;

/// Apply command-line overrides on top of the loaded config.
pub fn effective_config(config: &Config, args: &RunArgs) -> Config {
    let mut config = config.clone();
    if let Some(runs) = args.runs {
        config.run.number_of_runs = runs;
    }
    if let Some(concurrency) = args.concurrency {
        config.run.concurrency = concurrency;
    }
    if let Some(ref model) = args.model {
        config.provider.default_model = model.clone();
    }
    config
}

/// OpenAI provider wrapped in the configured retry policy.
pub fn build_provider(config: &Config) -> Result<Arc<dyn ModelProvider>, ProbeError> {
    let api_key = config
        .provider
        .resolved_api_key()
        .ok_or(ProbeError::NoApiKey)?;
    let openai = OpenAIProvider::with_base_url(api_key, config.provider.base_url.clone());
    Ok(Arc::new(RetryProvider::with_config(
        Arc::new(openai),
        RetryConfig::from(&config.retry),
    )))
}

/// Execute the suite with an already-built provider.
pub async fn execute(
    config: &Config,
    provider: Arc<dyn ModelProvider>,
    name: &str,
    quiet: bool,
) -> Result<TestSuiteResult, ProbeError> {
    let suite = SuiteLoader::new(config.test_dir()).load(name)?;

    let ctx = EvalContext::from_config(config, Some(provider.clone()));
    let mut runner =
        SuiteRunner::new(provider, RunnerConfig::from_config(config)).with_eval_context(ctx);
    if !quiet {
        runner = runner.with_progress(terminal_progress());
    }
    Ok(runner.run(&suite).await)
}

/// Entry point for `promptprobe run`. Failing or errored trials do not make
/// this return an error; only load and setup problems do.
pub async fn run_suite(config: &Config, args: &RunArgs) -> anyhow::Result<()> {
    let config = effective_config(config, args);
    let provider = build_provider(&config)?;
    let result = execute(&config, provider, &args.name, args.quiet).await?;

    print_report(&result);

    if !args.no_log {
        match log_file::write_run_log(&config.test_runs_dir(), &result) {
            Ok(path) => println!("Run log: {}", path.display()),
            Err(e) => tracing::warn!("Could not write run log: {}", e),
        }
    }
    if let Some(ref path) = args.csv {
        export::write_csv(Path::new(path), &result)?;
        println!("CSV: {path}");
    }
    if let Some(ref path) = args.json {
        export::write_json(Path::new(path), &result)?;
        println!("JSON: {path}");
    }
    if args.log_remote {
        let client = RemoteClient::from_config(&config.remote)?;
        match client.log_run_responses(&result).await {
            Ok(sent) => println!("Logged {sent} response(s) to {}", config.remote.base_url),
            Err(e) => tracing::warn!("Could not log responses remotely: {}", e),
        }
    }
    Ok(())
}
