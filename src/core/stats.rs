// src/core/stats.rs — Pass rate and flakiness aggregation over trials

use super::types::{TestCaseStatistics, TrialRecord};

/// Round to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Percentage of decided trials that passed. `None` when nothing was decided.
pub fn pass_rate(passed: u32, failed: u32) -> Option<f64> {
    let decided = passed + failed;
    if decided == 0 {
        return None;
    }
    Some(round2(passed as f64 / decided as f64 * 100.0))
}

/// Triangular instability score: 100 at a 50% pass rate, 0 at 0% or 100%.
/// Kept at full precision; display code rounds.
pub fn flakiness_index(pass_rate: f64) -> f64 {
    let p = pass_rate.clamp(0.0, 100.0);
    let normalized = (2.0 * p - 100.0) / 100.0;
    (1.0 - normalized.abs()) * 100.0
}

/// Aggregate a case's trials. Pure: the same trials always give the same result.
pub fn compute_statistics(trials: &[TrialRecord]) -> TestCaseStatistics {
    let mut passed = 0u32;
    let mut failed = 0u32;
    let mut errored = 0u32;
    let mut runtime_ms = 0u64;

    for trial in trials {
        match trial.result.passed {
            Some(true) => passed += 1,
            Some(false) => failed += 1,
            None => errored += 1,
        }
        runtime_ms += trial.duration_ms;
    }

    let rate = pass_rate(passed, failed);
    TestCaseStatistics {
        num_runs: trials.len() as u32,
        num_passed: passed,
        num_failed: failed,
        num_errored: errored,
        pass_rate: rate,
        flakiness_index: rate.map(flakiness_index),
        runtime_ms,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::EvalResult;

    fn trial(passed: Option<bool>) -> TrialRecord {
        TrialRecord {
            run_index: 0,
            prompt: "p".into(),
            response: passed.map(|_| "r".to_string()),
            result: match passed {
                Some(true) => EvalResult::pass("ok"),
                Some(false) => EvalResult::fail("no"),
                None => EvalResult::errored("boom"),
            },
            failure_labels: vec![],
            cached: false,
            duration_ms: 10,
        }
    }

    #[test]
    fn test_flakiness_endpoints() {
        assert_eq!(flakiness_index(50.0), 100.0);
        assert_eq!(flakiness_index(0.0), 0.0);
        assert_eq!(flakiness_index(100.0), 0.0);
        assert_eq!(flakiness_index(75.0), 50.0);
    }

    #[test]
    fn test_flakiness_symmetric() {
        for i in 0..=1000 {
            let p = i as f64 / 10.0;
            let diff = (flakiness_index(p) - flakiness_index(100.0 - p)).abs();
            assert!(diff < 1e-9, "p = {p}");
        }
    }

    #[test]
    fn test_flakiness_keeps_full_precision() {
        let g = flakiness_index(12.3456);
        assert!((g - 24.6912).abs() < 1e-9, "got {g}");
        assert_ne!(g, round2(g));
    }

    #[test]
    fn test_flakiness_clamps_out_of_range() {
        assert_eq!(flakiness_index(-5.0), 0.0);
        assert_eq!(flakiness_index(140.0), 0.0);
    }

    #[test]
    fn test_pass_rate_rounding() {
        assert_eq!(pass_rate(1, 2), Some(33.33));
        assert_eq!(pass_rate(2, 1), Some(66.67));
        assert_eq!(pass_rate(0, 0), None);
    }

    #[test]
    fn test_counts_sum_to_runs() {
        let trials: Vec<_> = [Some(true), Some(false), None, Some(true), None]
            .into_iter()
            .map(trial)
            .collect();
        let s = compute_statistics(&trials);
        assert_eq!(s.num_runs, 5);
        assert_eq!(s.num_passed + s.num_failed + s.num_errored, s.num_runs);
        assert_eq!(s.num_errored, 2);
        assert_eq!(s.pass_rate, Some(66.67));
        assert_eq!(s.runtime_ms, 50);
    }

    #[test]
    fn test_all_errored_has_no_rates() {
        let trials: Vec<_> = (0..8).map(|_| trial(None)).collect();
        let s = compute_statistics(&trials);
        assert_eq!(s.num_errored, 8);
        assert_eq!(s.pass_rate, None);
        assert_eq!(s.flakiness_index, None);
    }

    #[test]
    fn test_alternating_is_maximally_flaky() {
        let trials: Vec<_> = (0..8).map(|i| trial(Some(i % 2 == 0))).collect();
        let s = compute_statistics(&trials);
        assert_eq!(s.pass_rate, Some(50.0));
        assert_eq!(s.flakiness_index, Some(100.0));
    }

    #[test]
    fn test_idempotent() {
        let trials: Vec<_> = [Some(true), Some(false), Some(false), None]
            .into_iter()
            .map(trial)
            .collect();
        assert_eq!(compute_statistics(&trials), compute_statistics(&trials));
    }

    #[test]
    fn test_empty_trials() {
        let s = compute_statistics(&[]);
        assert_eq!(s.num_runs, 0);
        assert!(s.pass_rate.is_none());
    }
}
