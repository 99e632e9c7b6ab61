// src/report/log_file.rs — Append-only plain-text run logs

use std::io::Write;
use std::path::{Path, PathBuf};

use super::console;
use super::theme::Painter;
use crate::core::types::TestSuiteResult;
use crate::infra::errors::ProbeError;
use crate::infra::paths;

/// Write the report for `result` to `{test_runs_dir}/{suite}/{timestamp}.txt`.
/// Returns the path written.
pub fn write_run_log(test_runs_dir: &Path, result: &TestSuiteResult) -> Result<PathBuf, ProbeError> {
    let path = paths::run_log_path(test_runs_dir, &result.suite, &result.started_at);
    append(&path, &console::format_report(&Painter::plain(), result))?;
    tracing::debug!(path = %path.display(), "Wrote run log");
    Ok(path)
}

/// Append text to a file, creating it and its parents on demand.
pub fn append(path: &Path, text: &str) -> Result<(), ProbeError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    file.write_all(text.as_bytes())?;
    file.flush()?;
    Ok(())
}
