// src/cli/init.rs — Project bootstrap: `init`, `generate` and `list`

use std::path::{Path, PathBuf};

use crate::infra::config::{Config, CONFIG_TEMPLATE};
use crate::infra::paths;
use crate::suite::{self, PROMPT_FILE, RHAI_ASSERTIONS, TOML_ASSERTIONS};

const EXAMPLE_PROMPT: &str = "Write a tweet about {topic}. Include at least one hashtag.\n";

const EXAMPLE_RHAI: &str = r##"// Each test pairs a description with a check. Tests without
// prompt_vars share one response to the raw prompt.

let tests = [
    #{
        description: "includes a hashtag",
        check: contains_any(["#"]),
        prompt_vars: #{ topic: "rust" },
        failure_labels: ["missing_hashtag"],
    },
    #{
        description: "fits in a tweet",
        check: length_less_than(280),
        prompt_vars: #{ topic: "the weather" },
    },
    #{
        description: "does not leak an email address",
        check: negate(contains_email()),
        prompt_vars: #{ topic: "our support team" },
    },
    #{
        description: "custom check",
        check: |output| #{ result: !output.contains("As an AI"), reason: "no disclaimer" },
        prompt_vars: #{ topic: "AI" },
    },
];
"##;

const EXAMPLE_TOML: &str = r##"[[tests]]
description = "includes a hashtag"
eval = { type = "contains_any", keywords = ["#"] }
prompt_vars = { topic = "rust" }
failure_labels = ["missing_hashtag"]

[[tests]]
description = "fits in a tweet"
eval = { type = "length_less_than", max_length = 280 }
prompt_vars = { topic = "the weather" }

[[tests]]
description = "does not leak an email address"
eval = { type = "negate", eval = { type = "contains_email" } }
prompt_vars = { topic = "our support team" }
"##;

/// Create the directory layout and a template config. Safe to re-run.
pub async fn run_init(config: &Config) -> anyhow::Result<()> {
    println!("promptprobe setup");
    println!();

    let config_path = paths::config_file_path();
    eprint!("  Creating directories... ");
    let created = init_project(config, &config_path).await?;
    eprintln!("done");
    println!("    tests:     {}", config.test_dir().display());
    println!("    test runs: {}", config.test_runs_dir().display());
    let state = if created { "created" } else { "already exists" };
    println!("  Config: {} ({state})", config_path.display());

    if config.provider.resolved_api_key().is_none() {
        println!();
        println!("  No OpenAI API key detected. Set one of:");
        println!("    export OPENAI_API_KEY=sk-...");
        println!("    [provider].api_key in {}", config_path.display());
    }

    println!();
    println!("Setup complete!");
    println!();
    println!("Tips:");
    println!("  promptprobe generate my_prompt     Scaffold a suite");
    println!("  promptprobe run my_prompt          Run it");
    Ok(())
}

/// Create the suite and run-log directories, and write the template config
/// to `config_path` unless a file is already there. Returns whether the
/// config was written.
pub async fn init_project(config: &Config, config_path: &Path) -> anyhow::Result<bool> {
    paths::ensure_dirs(&config.test_dir(), &config.test_runs_dir()).await?;
    if config_path.exists() {
        return Ok(false);
    }
    if let Some(parent) = config_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(config_path, CONFIG_TEMPLATE).await?;
    Ok(true)
}

/// Scaffold `{test_dir}/{slug}/` with an example prompt and assertions.
/// Returns the suite directory.
pub async fn run_generate(config: &Config, name: &str, toml: bool) -> anyhow::Result<PathBuf> {
    let slug = slug::slugify(name).replace('-', "_");
    if slug.is_empty() {
        anyhow::bail!("Suite name '{name}' has no usable characters");
    }
    let dir = paths::suite_dir(&config.test_dir(), &slug);
    if dir.exists() {
        anyhow::bail!("Suite '{slug}' already exists at {}", dir.display());
    }
    tokio::fs::create_dir_all(&dir).await?;

    let (file, body) = if toml {
        (TOML_ASSERTIONS, EXAMPLE_TOML)
    } else {
        (RHAI_ASSERTIONS, EXAMPLE_RHAI)
    };
    write_new(&dir.join(PROMPT_FILE), EXAMPLE_PROMPT).await?;
    write_new(&dir.join(file), body).await?;

    println!("Created suite '{slug}' in {}", dir.display());
    println!("  {PROMPT_FILE}");
    println!("  {file}");
    Ok(dir)
}

async fn write_new(path: &Path, contents: &str) -> anyhow::Result<()> {
    tokio::fs::write(path, contents).await?;
    tracing::debug!(path = %path.display(), "Wrote scaffold file");
    Ok(())
}

pub fn run_list(config: &Config) -> anyhow::Result<()> {
    let test_dir = config.test_dir();
    let names = suite::list_suites(&test_dir)?;
    if names.is_empty() {
        println!("No suites in {}. Try `promptprobe generate <name>`.", test_dir.display());
        return Ok(());
    }
    for name in names {
        println!("{name}");
    }
    Ok(())
}
