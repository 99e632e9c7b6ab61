// src/report/console.rs — Human-readable run report

use std::fmt::Write as _;

use super::theme::{Painter, Theme};
use crate::core::stats::round2;
use crate::core::types::{TestCaseResult, TestSuiteResult, TrialRecord};
use crate::evaluator::Outcome;

/// Per-trial detail block.
pub fn format_trial(p: &Painter, description: &str, trial: &TrialRecord, runs: u32) -> String {
    let mut out = String::new();
    let header = format!("Test: {description} (run {}/{runs})", trial.run_index + 1);
    let _ = writeln!(out, "{}", p.paint(&header, Theme::HEADER));
    let _ = writeln!(out, "{}", p.paint("-----", Theme::HEADER));
    let _ = writeln!(out, "Prompt: {}\n", trial.prompt);
    match &trial.response {
        Some(response) if trial.cached => {
            let _ = writeln!(
                out,
                "Prompt Response: {response} {}\n",
                p.paint("(shared)", Theme::DIM)
            );
        }
        Some(response) => {
            let _ = writeln!(out, "Prompt Response: {response}\n");
        }
        None => {
            let _ = writeln!(out, "Prompt Response: {}\n", p.paint("<none>", Theme::DIM));
        }
    }
    let _ = writeln!(out, "Test Result: {}", p.outcome(trial.result.outcome()));
    let _ = writeln!(out, "Reason: {}", trial.result.reason);
    if !trial.failure_labels.is_empty() {
        let _ = writeln!(out, "Failure Labels: {}", trial.failure_labels.join(", "));
    }
    out
}

/// Every trial of every case, in suite order.
pub fn format_trials(p: &Painter, result: &TestSuiteResult) -> String {
    let mut out = String::new();
    for case in &result.results {
        for trial in &case.trials {
            out.push_str(&format_trial(p, &case.case.description, trial, result.number_of_runs));
            out.push('\n');
        }
    }
    out
}

fn percent(value: Option<f64>) -> String {
    value.map(|v| format!("{}%", round2(v))).unwrap_or_else(|| "n/a".into())
}

/// Aggregate block for one case.
pub fn format_case_summary(p: &Painter, result: &TestCaseResult) -> String {
    let s = &result.statistics;
    let mut out = String::new();

    if s.all_errored() {
        let _ = writeln!(
            out,
            "{}: {}",
            result.case.description,
            p.bold("ERRORED (no verdicts)", Theme::NO_VERDICT)
        );
        let _ = writeln!(out, " {} errored of {} runs", s.num_errored, s.num_runs);
        return out;
    }

    let _ = writeln!(out, "{}:", result.case.description);
    let _ = writeln!(out, " {} {}", s.num_passed, p.paint("passed", Theme::outcome(Outcome::Passed)));
    let _ = writeln!(out, " {} {}", s.num_failed, p.paint("failed", Theme::outcome(Outcome::Failed)));
    let _ = writeln!(out, " {} {}", s.num_errored, p.paint("errored", Theme::outcome(Outcome::Errored)));
    let _ = writeln!(out, " Pass Rate: {}", percent(s.pass_rate));
    let _ = writeln!(out, " Flakiness: {}", percent(s.flakiness_index));
    let labels = result.failure_labels();
    if !labels.is_empty() {
        let _ = writeln!(out, " Failure Labels: {}", labels.join(", "));
    }
    out
}

/// Results section followed by suite totals.
pub fn format_summary(p: &Painter, result: &TestSuiteResult) -> String {
    let mut out = String::new();
    let rule = p.paint("---------------", Theme::HEADER);
    let _ = writeln!(out, "{rule}\n{}\n{rule}\n", p.bold("TEST RESULTS", Theme::HEADER));

    for case in &result.results {
        out.push_str(&format_case_summary(p, case));
        out.push('\n');
    }

    let t = result.totals();
    let _ = writeln!(
        out,
        "Suite '{}' ({}, {} run(s) per test): {} test(s), {} trial(s): {} passed, {} failed, {} errored in {:.1}s",
        result.suite,
        result.model,
        result.number_of_runs,
        t.cases,
        t.trials,
        t.passed,
        t.failed,
        t.errored,
        result.duration_ms as f64 / 1000.0,
    );
    if t.all_errored_cases > 0 {
        let _ = writeln!(
            out,
            "{}",
            p.bold(
                &format!("{} test(s) produced no verdicts: every trial errored", t.all_errored_cases),
                Theme::NO_VERDICT
            )
        );
    }
    out
}

/// Full report: trial details then the summary.
pub fn format_report(p: &Painter, result: &TestSuiteResult) -> String {
    let mut out = format_trials(p, result);
    out.push_str(&format_summary(p, result));
    out
}

pub fn print_report(result: &TestSuiteResult) {
    print!("{}", format_report(&Painter::for_stdout(), result));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::fixtures::sample_result;

    #[test]
    fn test_trial_block() {
        let r = sample_result();
        let text = format_trial(&Painter::plain(), "mixed", &r.results[0].trials[1], 2);
        assert!(text.starts_with("Test: mixed (run 2/2)\n-----\n"));
        assert!(text.contains("Prompt Response: Bonjour"));
        assert!(text.contains("Test Result: FAILED"));
        assert!(text.contains("Reason: nope"));
        assert!(text.contains("Failure Labels: wrong"));
    }

    #[test]
    fn test_errored_trial_has_no_response() {
        let r = sample_result();
        let text = format_trial(&Painter::plain(), "broken", &r.results[1].trials[0], 2);
        assert!(text.contains("Prompt Response: <none>"));
        assert!(text.contains("Test Result: ERRORED"));
    }

    #[test]
    fn test_summary_distinguishes_all_errored() {
        let text = format_summary(&Painter::plain(), &sample_result());
        assert!(text.contains("mixed:\n 1 passed\n 1 failed\n 0 errored\n Pass Rate: 50%\n Flakiness: 100%"));
        assert!(text.contains("broken: ERRORED (no verdicts)"));
        assert!(text.contains("1 test(s) produced no verdicts"));
        assert!(text.contains("2 test(s), 4 trial(s): 1 passed, 1 failed, 2 errored in 1.5s"));
    }
}
