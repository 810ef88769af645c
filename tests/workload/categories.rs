//! Every executor behavior lands in the expected bucket.

use crate::common::*;
use std::sync::Arc;
use txchaos::Classifier;

fn engine(executor: Arc<dyn TransactionExecutor>, workers: usize, iterations: u64) -> WorkloadEngine {
    WorkloadEngine::new(
        test_settings(workers, iterations),
        executor,
        Classifier::default(),
        RecordingReporter::new(),
    )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn echo_counts_everything_as_success() {
    let report = engine(Arc::new(EchoExecutor::new()), 100, 50)
        .run(CancellationSignal::new())
        .await
        .unwrap();

    assert_eq!(report.snapshot.success, 5000);
    assert_totals(&report.snapshot, 5000);
    assert!(!report.snapshot.has_correctness_violations());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn off_by_one_counts_everything_as_invalid() {
    let report = engine(Arc::new(OffByOneExecutor), 100, 50)
        .run(CancellationSignal::new())
        .await
        .unwrap();

    assert_eq!(report.snapshot.invalid, 5000);
    assert_eq!(report.snapshot.success, 0);
    assert!(report.snapshot.has_correctness_violations());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn no_row_counts_everything_as_missing() {
    let report = engine(Arc::new(NoRowExecutor), 100, 50)
        .run(CancellationSignal::new())
        .await
        .unwrap();

    assert_eq!(report.snapshot.missing, 5000);
    assert_totals(&report.snapshot, 5000);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn alternating_failures_split_exactly_in_half() {
    let report = engine(Arc::new(AlternatingExecutor::new()), 100, 50)
        .run(CancellationSignal::new())
        .await
        .unwrap();

    assert_eq!(report.snapshot.network_errors, 2500);
    assert_eq!(report.snapshot.success, 2500);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn random_values_still_echo_correctly() {
    let mut settings = test_settings(32, 40);
    settings.value_source = txchaos::ValueSource::Random;
    settings.seed = Some(7);
    let engine = WorkloadEngine::new(
        settings,
        Arc::new(EchoExecutor::new()),
        Classifier::default(),
        RecordingReporter::new(),
    );

    let report = engine.run(CancellationSignal::new()).await.unwrap();
    assert_eq!(report.snapshot.success, 1280);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn non_transient_kind_is_fatal_unless_configured() {
    let fatal = engine(Arc::new(ScriptedExecutor::always(Step::Fail(FailureKind::Protocol))), 8, 10)
        .run(CancellationSignal::new())
        .await
        .unwrap_err();
    assert!(matches!(fatal, WorkloadError::WorkerFailed { .. }));

    let lenient = WorkloadEngine::new(
        test_settings(8, 10),
        Arc::new(ScriptedExecutor::always(Step::Fail(FailureKind::Protocol))),
        Classifier::default().with_transient(FailureKind::Protocol),
        RecordingReporter::new(),
    );
    let report = lenient.run(CancellationSignal::new()).await.unwrap();
    assert_eq!(report.snapshot.network_errors, 80);
}
