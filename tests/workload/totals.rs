//! Counter totals always equal completed attempts.

use crate::common::*;
use proptest::prelude::*;
use std::sync::Arc;
use txchaos::Classifier;

fn mixed_script(len: usize, seed: u64) -> Vec<Step> {
    (0..len as u64)
        .map(|i| match (i.wrapping_mul(2654435761) ^ seed) % 4 {
            0 => Step::Echo,
            1 => Step::Row(-1),
            2 => Step::NoRow,
            _ => Step::Fail(FailureKind::Timeout),
        })
        .collect()
}

fn run_mixed(workers: usize, iterations: u64, seed: u64) -> CounterSnapshot {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .unwrap();
    runtime.block_on(async {
        let executor = ScriptedExecutor::new(
            mixed_script(workers * iterations as usize, seed),
            Step::Echo,
        );
        let engine = WorkloadEngine::new(
            test_settings(workers, iterations),
            Arc::new(executor),
            Classifier::default(),
            RecordingReporter::new(),
        );
        engine.run(CancellationSignal::new()).await.unwrap().snapshot
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn totals_match_attempts(workers in 1usize..24, iterations in 1u64..40, seed in any::<u64>()) {
        let snapshot = run_mixed(workers, iterations, seed);
        prop_assert_eq!(snapshot.total(), workers as u64 * iterations);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn final_report_matches_returned_snapshot() {
    let reporter = RecordingReporter::new();
    let engine = WorkloadEngine::new(
        test_settings(50, 20),
        Arc::new(AlternatingExecutor::new()),
        Classifier::default(),
        reporter.clone(),
    );

    let report = engine.run(CancellationSignal::new()).await.unwrap();

    let finals = reporter.final_reports();
    assert_eq!(finals.len(), 1);
    assert_eq!(finals[0].snapshot, report.snapshot);
    assert_eq!(report.attempts, report.snapshot.total());
    // progress lines never go backwards
    let reports = reporter.reports();
    for pair in reports.windows(2) {
        assert!(pair[0].snapshot.total() <= pair[1].snapshot.total());
    }
}
