//! The workload only starts after a verified hard block and an armed drop.

use crate::common::*;
use std::sync::Arc;
use std::time::Duration;
use txchaos::SequenceError;

#[tokio::test]
async fn faults_are_sequenced_before_workload() {
    let network = FakeNetwork::new();
    let faults = Arc::new(RecordingFaultController::wired(Arc::clone(&network)));
    let executor = Arc::new(NetworkExecutor::new(Arc::clone(&network)));
    let harness = Harness::new(test_config(20, 10), executor, faults.clone(), RecordingReporter::new());

    let report = harness.run(CancellationSignal::new()).await.unwrap();

    assert_eq!(
        faults.calls(),
        vec![
            FaultCall::Clear,
            FaultCall::HardBlock,
            FaultCall::Clear,
            FaultCall::Drop(0.1)
        ]
    );
    assert_eq!(report.sequence.readiness_attempts, 1);
    assert_eq!(report.workload.snapshot.success, 200);
}

#[tokio::test(start_paused = true)]
async fn ineffective_hard_block_aborts_before_any_workload_traffic() {
    let executor = Arc::new(EchoExecutor::new());
    let faults = Arc::new(RecordingFaultController::new());
    let reporter = RecordingReporter::new();
    let harness = Harness::new(test_config(50, 10), executor.clone(), faults.clone(), reporter.clone());

    let err = harness.run(CancellationSignal::new()).await.unwrap_err();

    assert!(matches!(
        err,
        HarnessError::Sequence(SequenceError::HardBlockIneffective {
            category: Category::Success
        })
    ));
    assert_eq!(executor.calls(), 2);
    assert!(reporter.reports().is_empty());
    assert!(!faults.calls().contains(&FaultCall::Drop(0.1)));
}

#[tokio::test(start_paused = true)]
async fn unreachable_database_times_out_after_readiness_deadline() {
    let executor = Arc::new(ScriptedExecutor::always(Step::Fail(FailureKind::Connection)));
    let mut config = test_config(10, 10);
    config.readiness_timeout_ms = 5_000;
    config.readiness_retry_ms = 1_000;
    let harness = Harness::new(config, executor.clone(), Arc::new(RecordingFaultController::new()), RecordingReporter::new());
    let started = tokio::time::Instant::now();

    let err = harness.run(CancellationSignal::new()).await.unwrap_err();

    match err {
        HarnessError::Sequence(SequenceError::ReadinessTimeout { attempts, elapsed, .. }) => {
            assert_eq!(attempts, 6);
            assert_eq!(elapsed, Duration::from_secs(5));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(started.elapsed(), Duration::from_secs(5));
    assert_eq!(executor.calls(), 6);
}

#[tokio::test(start_paused = true)]
async fn late_database_is_waited_for() {
    let executor = Arc::new(ScriptedExecutor::new(
        [
            Step::Fail(FailureKind::Connection),
            Step::Fail(FailureKind::Timeout),
            Step::Echo,
            Step::Fail(FailureKind::Connection),
        ],
        Step::Echo,
    ));
    let harness = Harness::new(test_config(4, 5), executor, Arc::new(RecordingFaultController::new()), RecordingReporter::new());

    let report = harness.run(CancellationSignal::new()).await.unwrap();

    assert_eq!(report.sequence.readiness_attempts, 3);
    assert_eq!(report.sequence.readiness_elapsed, Duration::from_secs(2));
    assert_eq!(report.workload.snapshot.success, 20);
}

#[tokio::test]
async fn missing_iptables_binary_is_fatal() {
    let faults = Arc::new(RecordingFaultController::new().fail_next_clear(FaultFailure::Spawn));
    let executor = Arc::new(EchoExecutor::new());
    let harness = Harness::new(test_config(4, 5), executor.clone(), faults, RecordingReporter::new());

    let err = harness.run(CancellationSignal::new()).await.unwrap_err();

    assert!(matches!(
        err,
        HarnessError::Sequence(SequenceError::FaultController {
            source: FaultError::Spawn { .. },
            ..
        })
    ));
    assert_eq!(executor.calls(), 0);
}
