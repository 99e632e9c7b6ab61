// src/cli/mod.rs — CLI definition (clap derive)

pub mod init;
pub mod progress;
pub mod remote;
pub mod run;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "promptprobe",
    about = "Test prompts against a language model and measure flakiness",
    version
)]
pub struct Cli {
    /// Config file path
    #[arg(long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the test directories and a template config.toml
    Init,
    /// Scaffold a new suite with an example prompt and assertions
    Generate {
        /// Suite name (slugified)
        name: String,
        /// Write assertions.toml instead of assertions.rhai
        #[arg(long)]
        toml: bool,
    },
    /// List suites in the test directory
    List,
    /// Run a suite locally and report results
    Run(RunArgs),
    /// Upload a suite's assertions to the remote dashboard
    Deploy {
        /// Suite name
        name: String,
    },
    /// Trigger a run against recorded production traffic
    RunProd {
        /// Prompt slug on the dashboard
        #[arg(long)]
        prompt: String,
        /// Comma-separated test slugs, or "*" for all
        #[arg(long, default_value = "*")]
        test: String,
        /// Start of the date range (YYYY-MM-DD)
        #[arg(long)]
        start_date: Option<String>,
        /// End of the date range (YYYY-MM-DD)
        #[arg(long)]
        end_date: Option<String>,
    },
}

#[derive(clap::Args, Clone, Debug)]
pub struct RunArgs {
    /// Suite name
    pub name: String,

    /// Trials per test case (overrides [run].number_of_runs)
    #[arg(short = 'n', long)]
    pub runs: Option<u32>,

    /// Test cases executed in parallel (overrides [run].concurrency)
    #[arg(short, long)]
    pub concurrency: Option<usize>,

    /// Model under test (overrides [provider].default_model)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Also write a CSV summary to this path
    #[arg(long)]
    pub csv: Option<String>,

    /// Also write the full result as JSON to this path
    #[arg(long)]
    pub json: Option<String>,

    /// Do not write a run log under the test-runs directory
    #[arg(long)]
    pub no_log: bool,

    /// Suppress per-trial progress on stderr
    #[arg(short, long)]
    pub quiet: bool,

    /// Record each model response on the remote dashboard
    #[arg(long)]
    pub log_remote: bool,
}
