mod common;

use common::*;
use etlcore::{ConnectorError, EngineError, EventBus, Node, NodeStatus, RunError, RunReport, ValidationIssue, Workflow};
use etlruntime::{ConnectorRegistry, EngineConfig, ExecutionEngine, RetryPolicy, WorkflowGraph};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn fast_engine() -> ExecutionEngine {
    ExecutionEngine::new(EngineConfig {
        max_in_flight: 4,
        node_timeout: Duration::from_secs(5),
        retry: RetryPolicy {
            max_attempts: 3,
            base_delay_ms: 1,
            backoff_multiplier: 2.0,
        },
    })
}

async fn run(workflow: &Workflow, registry: &ConnectorRegistry) -> RunReport {
    fast_engine()
        .execute(workflow, registry, &EventBus::new(64), CancellationToken::new())
        .await
        .unwrap()
}

fn chain(source_connector: &str) -> Workflow {
    let mut workflow = Workflow::new("chain");
    workflow.add_node(Node::source("s", source_connector));
    workflow.add_node(Node::transformation("t", "pass"));
    workflow.add_node(Node::destination("d", "sink"));
    workflow.connect("s", "t");
    workflow.connect("t", "d");
    workflow
}

#[tokio::test]
async fn linear_chain_succeeds() {
    let mut registry = ConnectorRegistry::new();
    registry.register_source(
        "static",
        Arc::new(StaticSource {
            rows: vec!["r1", "r2"],
        }),
    );
    registry.register_transformation("pass", Arc::new(PassThrough));
    let sink = Arc::new(CapturingDestination::default());
    let received = sink.received.clone();
    registry.register_destination("sink", sink);

    let report = run(&chain("static"), &registry).await;

    assert!(report.is_success());
    for id in ["s", "t", "d"] {
        assert_eq!(report.node(id).unwrap().status, NodeStatus::Success, "{}", id);
    }

    // Round-trip: the destination received the source table unchanged
    // through the pass-through transformation.
    let received = received.lock().unwrap();
    assert_eq!(received.as_slice(), &[table(&["r1", "r2"])]);

    assert_eq!(report.node("d").unwrap().rows_loaded, Some(2));
    assert!(report.node("d").unwrap().output.is_none());
    assert!(report.node("s").unwrap().output.is_some());
}

#[tokio::test]
async fn failed_source_skips_downstream() {
    let attempts = Arc::new(AtomicU32::new(0));
    let mut registry = ConnectorRegistry::new();
    registry.register_source(
        "failing",
        Arc::new(FailingSource {
            error: ConnectorError::Unauthorized("bad credentials".to_string()),
            attempts: attempts.clone(),
        }),
    );
    registry.register_transformation("pass", Arc::new(PassThrough));
    registry.register_destination("sink", Arc::new(CapturingDestination::default()));

    let report = run(&chain("failing"), &registry).await;

    assert!(!report.is_success());
    assert_eq!(report.node("s").unwrap().status, NodeStatus::Failed);
    assert_eq!(report.node("t").unwrap().status, NodeStatus::Skipped);
    assert_eq!(report.node("d").unwrap().status, NodeStatus::Skipped);
    assert!(matches!(
        report.node("s").unwrap().error,
        Some(RunError::Connector(ConnectorError::Unauthorized(_)))
    ));
    // skipped nodes carry no error of their own
    assert!(report.node("t").unwrap().error.is_none());
    // non-retryable errors get exactly one attempt
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn independent_branches_survive_failure() {
    let attempts = Arc::new(AtomicU32::new(0));
    let mut registry = ConnectorRegistry::new();
    registry.register_source(
        "failing",
        Arc::new(FailingSource {
            error: ConnectorError::Data("corrupt object".to_string()),
            attempts: attempts.clone(),
        }),
    );
    registry.register_source("static", Arc::new(StaticSource { rows: vec!["ok"] }));
    registry.register_destination("sink", Arc::new(CapturingDestination::default()));

    let mut workflow = Workflow::new("two-chains");
    workflow.add_node(Node::source("s1", "failing"));
    workflow.add_node(Node::destination("d1", "sink"));
    workflow.add_node(Node::source("s2", "static"));
    workflow.add_node(Node::destination("d2", "sink"));
    workflow.connect("s1", "d1");
    workflow.connect("s2", "d2");

    let report = run(&workflow, &registry).await;

    assert!(!report.is_success());
    assert_eq!(report.node("s1").unwrap().status, NodeStatus::Failed);
    assert_eq!(report.node("d1").unwrap().status, NodeStatus::Skipped);
    assert_eq!(report.node("s2").unwrap().status, NodeStatus::Success);
    assert_eq!(report.node("d2").unwrap().status, NodeStatus::Success);
}

#[tokio::test]
async fn transient_errors_are_retried() {
    let attempts = Arc::new(AtomicU32::new(0));
    let mut registry = ConnectorRegistry::new();
    registry.register_source(
        "flaky",
        Arc::new(FlakySource {
            failures_before_success: 2,
            attempts: attempts.clone(),
        }),
    );
    registry.register_transformation("pass", Arc::new(PassThrough));
    registry.register_destination("sink", Arc::new(CapturingDestination::default()));

    let report = run(&chain("flaky"), &registry).await;

    assert!(report.is_success());
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn retries_stop_at_max_attempts() {
    let attempts = Arc::new(AtomicU32::new(0));
    let mut registry = ConnectorRegistry::new();
    registry.register_source(
        "failing",
        Arc::new(FailingSource {
            error: ConnectorError::Connection("refused".to_string()),
            attempts: attempts.clone(),
        }),
    );
    registry.register_transformation("pass", Arc::new(PassThrough));
    registry.register_destination("sink", Arc::new(CapturingDestination::default()));

    let report = run(&chain("failing"), &registry).await;

    assert!(!report.is_success());
    assert_eq!(report.node("s").unwrap().status, NodeStatus::Failed);
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn slow_node_times_out() {
    let mut registry = ConnectorRegistry::new();
    registry.register_source("slow", Arc::new(SlowSource { delay_ms: 5_000 }));
    registry.register_transformation("pass", Arc::new(PassThrough));
    registry.register_destination("sink", Arc::new(CapturingDestination::default()));

    let engine = ExecutionEngine::new(EngineConfig {
        max_in_flight: 4,
        node_timeout: Duration::from_millis(50),
        retry: RetryPolicy::default(),
    });
    let report = engine
        .execute(
            &chain("slow"),
            &registry,
            &EventBus::new(64),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(!report.is_success());
    assert!(matches!(
        report.node("s").unwrap().error,
        Some(RunError::Timeout { .. })
    ));
    assert_eq!(report.node("d").unwrap().status, NodeStatus::Skipped);
}

#[tokio::test]
async fn cancelled_run_skips_unstarted_nodes() {
    let attempts = Arc::new(AtomicU32::new(0));
    let mut registry = ConnectorRegistry::new();
    registry.register_source(
        "counting",
        Arc::new(FlakySource {
            failures_before_success: 0,
            attempts: attempts.clone(),
        }),
    );
    registry.register_transformation("pass", Arc::new(PassThrough));
    registry.register_destination("sink", Arc::new(CapturingDestination::default()));

    let cancellation = CancellationToken::new();
    cancellation.cancel();

    let report = fast_engine()
        .execute(
            &chain("counting"),
            &registry,
            &EventBus::new(64),
            cancellation,
        )
        .await
        .unwrap();

    assert!(!report.is_success());
    for id in ["s", "t", "d"] {
        assert_eq!(report.node(id).unwrap().status, NodeStatus::Skipped, "{}", id);
        assert!(matches!(
            report.node(id).unwrap().error,
            Some(RunError::Cancelled)
        ));
    }
    assert_eq!(attempts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn cancellation_mid_run_lets_in_flight_finish() {
    let cancellation = CancellationToken::new();
    let mut registry = ConnectorRegistry::new();
    registry.register_source(
        "cancelling",
        Arc::new(CancellingSource {
            token: cancellation.clone(),
        }),
    );
    registry.register_destination("sink", Arc::new(CapturingDestination::default()));

    let mut workflow = Workflow::new("cancel-mid-run");
    workflow.add_node(Node::source("s", "cancelling"));
    workflow.add_node(Node::destination("d", "sink"));
    workflow.connect("s", "d");

    let report = fast_engine()
        .execute(&workflow, &registry, &EventBus::new(64), cancellation)
        .await
        .unwrap();

    // The in-flight source completed; the not-yet-started destination was
    // skipped.
    assert_eq!(report.node("s").unwrap().status, NodeStatus::Success);
    assert_eq!(report.node("d").unwrap().status, NodeStatus::Skipped);
    assert!(!report.is_success());
}

#[tokio::test]
async fn in_flight_bound_is_respected() {
    let current = Arc::new(AtomicU32::new(0));
    let max_seen = Arc::new(AtomicU32::new(0));
    let mut registry = ConnectorRegistry::new();
    registry.register_source(
        "probe",
        Arc::new(ProbeSource {
            current: current.clone(),
            max_seen: max_seen.clone(),
            delay_ms: 50,
        }),
    );

    let mut workflow = Workflow::new("wide");
    for id in ["s1", "s2", "s3", "s4"] {
        workflow.add_node(Node::source(id, "probe"));
    }

    let engine = ExecutionEngine::new(EngineConfig {
        max_in_flight: 2,
        node_timeout: Duration::from_secs(5),
        retry: RetryPolicy::default(),
    });
    let report = engine
        .execute(&workflow, &registry, &EventBus::new(64), CancellationToken::new())
        .await
        .unwrap();

    assert!(report.is_success());
    assert!(
        max_seen.load(Ordering::SeqCst) <= 2,
        "saw {} concurrent nodes",
        max_seen.load(Ordering::SeqCst)
    );
}

#[tokio::test]
async fn invalid_workflow_never_invokes_connectors() {
    let attempts = Arc::new(AtomicU32::new(0));
    let mut registry = ConnectorRegistry::new();
    registry.register_source(
        "counting",
        Arc::new(FlakySource {
            failures_before_success: 0,
            attempts: attempts.clone(),
        }),
    );
    registry.register_transformation("pass", Arc::new(PassThrough));
    registry.register_destination("sink", Arc::new(CapturingDestination::default()));

    let mut workflow = Workflow::new("cyclic");
    workflow.add_node(Node::source("s", "counting"));
    workflow.add_node(Node::transformation("t1", "pass"));
    workflow.add_node(Node::transformation("t2", "pass"));
    workflow.add_node(Node::destination("d", "sink"));
    workflow.connect("s", "t1");
    workflow.connect("t1", "t2");
    workflow.connect("t2", "t1");
    workflow.connect("t2", "d");

    let result = fast_engine()
        .execute(&workflow, &registry, &EventBus::new(64), CancellationToken::new())
        .await;

    match result {
        Err(EngineError::Invalid(report)) => {
            assert!(report
                .issues
                .iter()
                .any(|i| matches!(i, ValidationIssue::CycleDetected)));
        }
        other => panic!("expected validation failure, got {:?}", other.map(|r| r.status)),
    }
    assert_eq!(attempts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn rerun_is_idempotent() {
    let mut registry = ConnectorRegistry::new();
    registry.register_source("static", Arc::new(StaticSource { rows: vec!["r1"] }));
    registry.register_transformation("pass", Arc::new(PassThrough));
    registry.register_destination("sink", Arc::new(CapturingDestination::default()));

    let workflow = chain("static");
    let first = run(&workflow, &registry).await;
    let second = run(&workflow, &registry).await;

    assert_eq!(first.status, second.status);
    for node in workflow.nodes.iter() {
        assert_eq!(
            first.node(&node.id).unwrap().status,
            second.node(&node.id).unwrap().status
        );
    }

    let order_a = WorkflowGraph::build(&workflow)
        .unwrap()
        .topological_order()
        .unwrap();
    let order_b = WorkflowGraph::build(&workflow)
        .unwrap()
        .topological_order()
        .unwrap();
    assert_eq!(order_a, order_b);
}
