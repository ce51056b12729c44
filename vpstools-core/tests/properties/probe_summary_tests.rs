//! Property-based tests for fleet probe summaries

use proptest::prelude::*;
use uuid::Uuid;
use vpstools_core::{ConnectionTestResult, ProbeOutcome, ProbeSummary};

fn outcome(index: usize, passed: bool) -> ProbeOutcome {
    ProbeOutcome {
        vps_id: Uuid::new_v4(),
        name: format!("vps-{index}"),
        result: if passed {
            ConnectionTestResult::success()
        } else {
            ConnectionTestResult::unreachable("connection timed out")
        },
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Passed and failed always partition the total
    #[test]
    fn prop_summary_counts_partition(flags in prop::collection::vec(any::<bool>(), 0..64)) {
        let outcomes = flags.iter().enumerate().map(|(i, p)| outcome(i, *p)).collect();
        let summary = ProbeSummary::from_outcomes(outcomes);

        prop_assert_eq!(summary.total, flags.len());
        prop_assert_eq!(summary.passed + summary.failed, summary.total);
        prop_assert_eq!(summary.passed, flags.iter().filter(|p| **p).count());
        prop_assert_eq!(summary.failed_results().len(), summary.failed);
        prop_assert_eq!(summary.all_passed(), summary.failed == 0);
    }

    /// Pass rate stays within bounds
    #[test]
    fn prop_pass_rate_bounded(flags in prop::collection::vec(any::<bool>(), 0..64)) {
        let outcomes = flags.iter().enumerate().map(|(i, p)| outcome(i, *p)).collect();
        let summary = ProbeSummary::from_outcomes(outcomes);
        let rate = summary.pass_rate();
        prop_assert!((0.0..=100.0).contains(&rate));
    }

    /// Every failed outcome carries a reason
    #[test]
    fn prop_failures_have_reasons(flags in prop::collection::vec(any::<bool>(), 1..32)) {
        let outcomes = flags.iter().enumerate().map(|(i, p)| outcome(i, *p)).collect();
        let summary = ProbeSummary::from_outcomes(outcomes);
        for failed in summary.failed_results() {
            prop_assert!(failed.result.failure_reason().is_some());
        }
    }
}
