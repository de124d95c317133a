use crate::{ConnectorRegistry, ResultStore, Validator, WorkflowGraph};
use chrono::Utc;
use etlcore::{
    Connector, ConnectorContext, ConnectorError, EngineError, EventBus, GraphError, NodeId,
    NodeStatus, RunError, RunEvent, RunId, RunReport, TabularResult, Workflow, WorkflowStatus,
};
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::HashMap;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Retry policy applied at the connector-invocation boundary
///
/// Only errors the connector marks retryable are retried; credential and
/// data errors fail immediately.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    fn delay(&self, attempt: u32) -> Duration {
        let ms = self.base_delay_ms as f64 * self.backoff_multiplier.powi(attempt as i32);
        Duration::from_millis(ms as u64)
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Upper bound on concurrently executing nodes, so a wide graph cannot
    /// saturate connection limits on the external systems
    pub max_in_flight: usize,
    /// Per-node budget covering all retry attempts
    pub node_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_in_flight: 4,
            node_timeout: Duration::from_secs(300),
            retry: RetryPolicy::default(),
        }
    }
}

/// Executes a validated workflow snapshot as a DAG
///
/// A pure function of (workflow, registry): no ambient workflow state. Each
/// run validates first, orders nodes deterministically, invokes connectors
/// with bounded parallelism, and reports per-node outcomes. A failing node
/// fails only itself and its downstream closure; independent branches keep
/// running.
pub struct ExecutionEngine {
    config: EngineConfig,
}

/// What a connector invocation produced
enum NodeOutcome {
    Table(TabularResult),
    Loaded(u64),
}

impl ExecutionEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub async fn execute(
        &self,
        workflow: &Workflow,
        registry: &ConnectorRegistry,
        events: &EventBus,
        cancellation: CancellationToken,
    ) -> Result<RunReport, EngineError> {
        let run_id = Uuid::new_v4();
        let started = Instant::now();

        let report = Validator::new(registry).validate(workflow);
        if !report.is_valid() {
            tracing::warn!(
                workflow = %workflow.id,
                issues = report.issues.len(),
                "refusing to run invalid workflow"
            );
            return Err(EngineError::Invalid(report));
        }

        let graph = WorkflowGraph::build(workflow)?;
        let order = graph.topological_order()?;

        events.emit(RunEvent::RunStarted {
            run_id,
            workflow_id: workflow.id,
            timestamp: Utc::now(),
        });
        tracing::info!(workflow = %workflow.id, %run_id, nodes = order.len(), "starting workflow run");

        let store = self
            .run_nodes(workflow, &graph, &order, registry, events, run_id, &cancellation)
            .await?;

        // Any skip means the snapshot did not fully execute, whether from a
        // failed ancestor or cancellation.
        let status = if store.any_failed() || store.any_skipped() {
            WorkflowStatus::Failed
        } else {
            WorkflowStatus::Success
        };
        let duration_ms = started.elapsed().as_millis() as u64;

        events.emit(RunEvent::RunCompleted {
            run_id,
            status,
            duration_ms,
            timestamp: Utc::now(),
        });
        tracing::info!(%run_id, ?status, duration_ms, "workflow run finished");

        Ok(RunReport {
            run_id,
            workflow_id: workflow.id,
            status,
            nodes: store.into_results(),
            duration_ms,
        })
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_nodes(
        &self,
        workflow: &Workflow,
        graph: &WorkflowGraph,
        order: &[NodeId],
        registry: &ConnectorRegistry,
        events: &EventBus,
        run_id: RunId,
        cancellation: &CancellationToken,
    ) -> Result<ResultStore, EngineError> {
        let mut store = ResultStore::new(workflow);
        let mut running = FuturesUnordered::new();

        loop {
            // Scheduling pass. Scanning in topological order lets one pass
            // both launch ready nodes and propagate skips through the whole
            // downstream closure, since predecessors are visited first.
            for node_id in order {
                if store.status(node_id) != NodeStatus::Pending {
                    continue;
                }

                if cancellation.is_cancelled() {
                    store.record_skipped(node_id, Some(RunError::Cancelled));
                    events.emit(RunEvent::NodeSkipped {
                        run_id,
                        node_id: node_id.clone(),
                        timestamp: Utc::now(),
                    });
                    continue;
                }

                let predecessors = graph.predecessors(node_id);
                if predecessors.iter().any(|p| {
                    matches!(store.status(p), NodeStatus::Failed | NodeStatus::Skipped)
                }) {
                    tracing::debug!(node = %node_id, "skipping node, upstream incomplete");
                    store.record_skipped(node_id, None);
                    events.emit(RunEvent::NodeSkipped {
                        run_id,
                        node_id: node_id.clone(),
                        timestamp: Utc::now(),
                    });
                    continue;
                }

                if !predecessors
                    .iter()
                    .all(|p| store.status(p) == NodeStatus::Success)
                {
                    continue;
                }
                if running.len() >= self.config.max_in_flight {
                    continue;
                }

                let node = workflow
                    .find_node(node_id)
                    .ok_or_else(|| GraphError::UnknownNode(node_id.clone()))?;
                let connector = registry.resolve(node.kind, &node.connector)?;
                let inputs = gather_inputs(graph, node_id, &store);
                let ctx = ConnectorContext {
                    node_id: node_id.clone(),
                    config: node.configuration.clone(),
                    events: events.emitter(run_id, node_id.clone()),
                    cancellation: cancellation.child_token(),
                };

                events.emit(RunEvent::NodeStarted {
                    run_id,
                    node_id: node_id.clone(),
                    connector: node.connector.clone(),
                    timestamp: Utc::now(),
                });
                store.mark_running(node_id);

                let retry = self.config.retry.clone();
                let node_timeout = self.config.node_timeout;
                let id = node_id.clone();
                running.push(tokio::spawn(async move {
                    let start = Instant::now();
                    let outcome = invoke_node(connector, ctx, inputs, retry, node_timeout).await;
                    (id, outcome, start.elapsed().as_millis() as u64)
                }));
            }

            if running.is_empty() {
                break;
            }

            if let Some(joined) = running.next().await {
                let (node_id, outcome, duration_ms) = joined
                    .map_err(|e| EngineError::Task(format!("node task join error: {}", e)))?;
                match outcome {
                    Ok(NodeOutcome::Table(table)) => {
                        tracing::info!(node = %node_id, rows = table.row_count(), duration_ms, "node completed");
                        events.emit(RunEvent::NodeSucceeded {
                            run_id,
                            node_id: node_id.clone(),
                            rows_loaded: None,
                            duration_ms,
                            timestamp: Utc::now(),
                        });
                        store.record_success(&node_id, Some(table), None, duration_ms);
                    }
                    Ok(NodeOutcome::Loaded(rows)) => {
                        tracing::info!(node = %node_id, rows_loaded = rows, duration_ms, "destination completed");
                        events.emit(RunEvent::NodeSucceeded {
                            run_id,
                            node_id: node_id.clone(),
                            rows_loaded: Some(rows),
                            duration_ms,
                            timestamp: Utc::now(),
                        });
                        store.record_success(&node_id, None, Some(rows), duration_ms);
                    }
                    Err(error) => {
                        tracing::error!(node = %node_id, %error, duration_ms, "node failed");
                        events.emit(RunEvent::NodeFailed {
                            run_id,
                            node_id: node_id.clone(),
                            error: error.to_string(),
                            timestamp: Utc::now(),
                        });
                        store.record_failure(&node_id, error, duration_ms);
                    }
                }
            }
        }

        Ok(store)
    }
}

impl Default for ExecutionEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

/// Clone each completed predecessor's output, keyed by predecessor id.
/// Topological order guarantees they are all present by now.
fn gather_inputs(
    graph: &WorkflowGraph,
    node_id: &str,
    store: &ResultStore,
) -> HashMap<NodeId, TabularResult> {
    graph
        .predecessors(node_id)
        .into_iter()
        .filter_map(|p| store.output(&p).cloned().map(|t| (p, t)))
        .collect()
}

async fn invoke_node(
    connector: Connector,
    ctx: ConnectorContext,
    inputs: HashMap<NodeId, TabularResult>,
    retry: RetryPolicy,
    node_timeout: Duration,
) -> Result<NodeOutcome, RunError> {
    let timeout_ms = node_timeout.as_millis() as u64;
    match timeout(node_timeout, invoke_with_retry(&connector, &ctx, &inputs, &retry)).await {
        Ok(result) => result.map_err(RunError::Connector),
        Err(_) => Err(RunError::Timeout { timeout_ms }),
    }
}

async fn invoke_with_retry(
    connector: &Connector,
    ctx: &ConnectorContext,
    inputs: &HashMap<NodeId, TabularResult>,
    retry: &RetryPolicy,
) -> Result<NodeOutcome, ConnectorError> {
    let mut attempt = 0;
    loop {
        match invoke_once(connector, ctx, inputs).await {
            Err(e) if e.is_retryable() && attempt + 1 < retry.max_attempts => {
                let delay = retry.delay(attempt);
                tracing::warn!(
                    node = %ctx.node_id,
                    error = %e,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "retrying connector after transient error"
                );
                sleep(delay).await;
                attempt += 1;
            }
            other => return other,
        }
    }
}

async fn invoke_once(
    connector: &Connector,
    ctx: &ConnectorContext,
    inputs: &HashMap<NodeId, TabularResult>,
) -> Result<NodeOutcome, ConnectorError> {
    match connector {
        Connector::Source(source) => source.extract(ctx).await.map(NodeOutcome::Table),
        Connector::Transformation(transform) => transform
            .transform(ctx, inputs.clone())
            .await
            .map(NodeOutcome::Table),
        Connector::Destination(destination) => {
            // The validator guarantees exactly one predecessor.
            let (_, input) = inputs.iter().next().ok_or_else(|| {
                ConnectorError::Data("destination has no input table".to_string())
            })?;
            destination
                .load(ctx, input.clone())
                .await
                .map(|summary| NodeOutcome::Loaded(summary.rows_written))
        }
    }
}
