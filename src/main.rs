// src/main.rs — promptprobe entry point

use clap::Parser;

use promptprobe::cli::{self, Cli, Commands};
use promptprobe::infra::config::Config;
use promptprobe::infra::logger;

#[tokio::main]
async fn main() {
    // Initialize logging (respects RUST_LOG / PROMPTPROBE_LOG)
    logger::init_logging("warn");

    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load config (falls back to defaults if no config.toml)
    let config = if let Some(ref path) = cli.config {
        Config::load_from(std::path::Path::new(path))?
    } else {
        Config::load()?
    };

    match cli.command {
        Commands::Init => cli::init::run_init(&config).await,
        Commands::Generate { name, toml } => {
            cli::init::run_generate(&config, &name, toml).await?;
            Ok(())
        }
        Commands::List => cli::init::run_list(&config),
        Commands::Run(args) => cli::run::run_suite(&config, &args).await,
        Commands::Deploy { name } => cli::remote::run_deploy(&config, &name).await,
        Commands::RunProd {
            prompt,
            test,
            start_date,
            end_date,
        } => cli::remote::run_prod(&config, &prompt, &test, start_date, end_date).await,
    }
}
