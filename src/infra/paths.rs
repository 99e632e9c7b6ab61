// src/infra/paths.rs — Project-local path layout
//
// Everything lives under ./promptprobe/ in the current project, unless
// PROMPTPROBE_HOME points somewhere else.

use std::path::{Path, PathBuf};

/// Returns the PROMPTPROBE_HOME override, if set.
fn promptprobe_home() -> Option<PathBuf> {
    std::env::var_os("PROMPTPROBE_HOME").map(PathBuf::from)
}

/// Root directory: $PROMPTPROBE_HOME or ./promptprobe
pub fn home_dir() -> PathBuf {
    promptprobe_home().unwrap_or_else(|| PathBuf::from("promptprobe"))
}

/// Config file path
pub fn config_file_path() -> PathBuf {
    home_dir().join("config.toml")
}

/// Suite definitions: one directory per suite
pub fn default_test_dir() -> PathBuf {
    home_dir().join("tests")
}

/// Run logs: one directory per suite, one file per run
pub fn default_test_runs_dir() -> PathBuf {
    home_dir().join("test_runs")
}

/// Directory holding a single suite's prompt and assertions.
pub fn suite_dir(test_dir: &Path, name: &str) -> PathBuf {
    test_dir.join(name)
}

/// Log file for one run of a suite, named after the local start time.
pub fn run_log_path(
    test_runs_dir: &Path,
    suite: &str,
    started_at: &chrono::DateTime<chrono::Local>,
) -> PathBuf {
    test_runs_dir
        .join(suite)
        .join(format!("{}.txt", started_at.format("%Y-%m-%d_%H-%M-%S")))
}

/// Ensure the suite and run-log directories exist.
pub async fn ensure_dirs(test_dir: &Path, test_runs_dir: &Path) -> anyhow::Result<()> {
    for dir in [test_dir, test_runs_dir] {
        tokio::fs::create_dir_all(dir).await?;
    }
    Ok(())
}
