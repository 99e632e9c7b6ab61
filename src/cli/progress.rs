// src/cli/progress.rs — Terminal progress renderer for suite runs

use crate::core::stats::round2;
use crate::core::types::ProgressEvent;

/// One progress line per event.
pub fn format_event(event: &ProgressEvent) -> String {
    match event {
        ProgressEvent::SuiteStart { suite, cases, runs } => {
            format!("[suite] {suite}: {cases} test(s) x {runs} run(s)")
        }
        ProgressEvent::TrialComplete {
            description,
            run_index,
            outcome,
            cached,
        } => {
            let shared = if *cached { " (shared response)" } else { "" };
            format!("[run {}] {description}: {outcome}{shared}", run_index + 1)
        }
        ProgressEvent::CaseComplete {
            description,
            statistics,
        } => match (statistics.pass_rate, statistics.flakiness_index) {
            (Some(rate), Some(flaky)) => {
                format!(
                    "[test] {description}: pass rate {rate}%, flakiness {}%",
                    round2(flaky)
                )
            }
            _ => format!(
                "[test] {description}: no verdicts ({} errored)",
                statistics.num_errored
            ),
        },
        ProgressEvent::SuiteComplete {
            totals,
            duration_ms,
        } => format!(
            "[done] passed={} failed={} errored={} in {:.1}s",
            totals.passed,
            totals.failed,
            totals.errored,
            *duration_ms as f64 / 1000.0,
        ),
    }
}

/// Build a progress callback that writes formatted output to stderr.
///
/// Progress goes to stderr so stdout carries only the report.
/// Returns a closure suitable for `SuiteRunner::with_progress()`.
pub fn terminal_progress() -> impl Fn(ProgressEvent) + Send + Sync + 'static {
    move |event| eprintln!("{}", format_event(&event))
}
