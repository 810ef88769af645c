//! End-to-end run over a simulated lossy network.

use crate::common::*;
use std::sync::Arc;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn dropped_replies_are_network_errors_never_violations() {
    let network = LossyNetwork::seeded(42);
    let mut config = test_config(100, 50);
    config.drop_probability = 0.3;
    let harness = Harness::new(
        config,
        Arc::new(LossyExecutor(Arc::clone(&network))),
        Arc::new(LossyController(Arc::clone(&network))),
        RecordingReporter::new(),
    );

    let report = harness.run(CancellationSignal::new()).await.unwrap();
    let s = report.workload.snapshot;

    assert_eq!(network.drop_probability(), Some(0.3));
    assert_totals(&s, 5000);
    assert_eq!(s.network_errors, network.dropped());
    assert!(s.network_errors > 0);
    assert!(s.success > 0);
    assert!(!report.has_correctness_violations());
    assert_eq!(report.sequence.hard_block_failure, "connection");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn report_serializes_for_json_output() {
    let network = LossyNetwork::seeded(1);
    let harness = Harness::new(
        test_config(10, 10),
        Arc::new(LossyExecutor(Arc::clone(&network))),
        Arc::new(LossyController(network)),
        RecordingReporter::new(),
    );

    let report = harness.run(CancellationSignal::new()).await.unwrap();
    let json = serde_json::to_value(&report).unwrap();

    assert_eq!(json["workload"]["stop_reason"], "completed");
    assert_eq!(json["workload"]["workers"], 10);
    assert_eq!(json["workload"]["snapshot"]["success"].as_u64().unwrap() + json["workload"]["snapshot"]["network_errors"].as_u64().unwrap(), 100);
    assert!(json["started_at"].is_string());
    assert!(json["elapsed_ms"].is_u64());
}
