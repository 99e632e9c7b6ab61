// src/cli/remote.rs — `deploy` and `run-prod`

use crate::infra::config::Config;
use crate::remote::{ProdRunRequest, RemoteClient, TestSlugs};
use crate::suite::SuiteLoader;

pub async fn run_deploy(config: &Config, name: &str) -> anyhow::Result<()> {
    let client = RemoteClient::from_config(&config.remote)?;
    let suite = SuiteLoader::new(config.test_dir()).load(name)?;
    client.deploy_suite(&suite).await?;
    println!("Deployed '{}' ({} test(s))", suite.name, suite.cases.len());
    Ok(())
}

pub async fn run_prod(
    config: &Config,
    prompt: &str,
    tests: &str,
    start_date: Option<String>,
    end_date: Option<String>,
) -> anyhow::Result<()> {
    let client = RemoteClient::from_config(&config.remote)?;
    client
        .trigger_prod_run(&ProdRunRequest {
            prompt_slug: prompt.to_string(),
            test_slugs: TestSlugs::parse(tests),
            start_date,
            end_date,
        })
        .await?;
    println!("Triggered production run for prompt '{prompt}'");
    Ok(())
}
