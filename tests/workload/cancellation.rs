//! Interrupts, run duration and fatal failures stop the pool cleanly.

use crate::common::*;
use std::sync::Arc;
use std::time::Duration;
use txchaos::{watch_interrupts, Classifier, InterruptPolicy, RunMode};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn interrupt_stops_until_cancelled_run() {
    let executor = Arc::new(EchoExecutor::new());
    let mut settings = test_settings(64, 0);
    settings.mode = RunMode::UntilCancelled;
    let engine = WorkloadEngine::new(settings, executor.clone(), Classifier::default(), RecordingReporter::new());

    let signal = CancellationSignal::new();
    let notify = Arc::new(tokio::sync::Notify::new());
    let watcher = {
        let notify = Arc::clone(&notify);
        tokio::spawn(watch_interrupts(signal.clone(), InterruptPolicy::StopWorkers, move || {
            let notify = Arc::clone(&notify);
            async move {
                notify.notified().await;
                Ok::<(), std::io::Error>(())
            }
        }))
    };
    let run = tokio::spawn({
        let signal = signal.clone();
        async move { engine.run(signal).await }
    });

    while executor.calls() < 1_000 {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    notify.notify_one();

    let report = run.await.unwrap().unwrap();
    assert_eq!(watcher.await.unwrap(), 1);
    assert_eq!(report.stop_reason, StopReason::Interrupted);
    assert_eq!(report.snapshot.total(), report.attempts);
    // every started attempt was classified
    assert_eq!(executor.calls(), report.attempts);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn duration_limit_stops_until_cancelled_run() {
    struct Sleepy;
    #[async_trait::async_trait]
    impl TransactionExecutor for Sleepy {
        async fn execute(&self, value: i32) -> Result<Reply, TransactionError> {
            tokio::time::sleep(Duration::from_millis(5)).await;
            Ok(Reply::Row(value))
        }
    }

    let mut settings = test_settings(16, 0);
    settings.mode = RunMode::UntilCancelled;
    settings.run_duration = Some(Duration::from_millis(200));
    let engine = WorkloadEngine::new(settings, Arc::new(Sleepy), Classifier::default(), RecordingReporter::new());

    let report = engine.run(CancellationSignal::new()).await.unwrap();

    assert_eq!(report.stop_reason, StopReason::DurationElapsed);
    assert!(report.snapshot.success > 0);
    assert!(report.elapsed >= Duration::from_millis(200));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn fatal_failure_surfaces_after_all_workers_stop() {
    let executor = Arc::new(txchaos_engine::testing::FailingExecutor::after(2_000, FailureKind::Database));
    let mut settings = test_settings(32, 0);
    settings.mode = RunMode::UntilCancelled;
    let reporter = RecordingReporter::new();
    let engine = WorkloadEngine::new(settings, executor.clone(), Classifier::default(), reporter.clone());
    let signal = CancellationSignal::new();

    let err = engine.run(signal.clone()).await.unwrap_err();

    match err {
        WorkloadError::WorkerFailed { source, .. } => assert_eq!(source.kind(), FailureKind::Database),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(signal.reason(), Some(StopReason::WorkerFailed));
    // the monitor still emitted its single final line
    assert_eq!(reporter.final_reports().len(), 1);
    let calls_after = executor.calls();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(executor.calls(), calls_after);
}
