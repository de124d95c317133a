use crate::{ConnectorRegistry, EngineConfig, ExecutionEngine};
use etlcore::{EngineError, EventBus, RunEvent, RunReport, Workflow, WorkflowId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

/// Main entry point for executing workflows
///
/// Bundles the connector registry, execution engine, event bus, and an
/// in-memory workflow map so callers can register snapshots and run them
/// by id. Durable storage stays behind [`crate::WorkflowStore`].
pub struct PipelineRuntime {
    registry: Arc<ConnectorRegistry>,
    engine: ExecutionEngine,
    event_bus: Arc<EventBus>,
    workflows: Arc<RwLock<HashMap<WorkflowId, Workflow>>>,
}

impl PipelineRuntime {
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        Self::with_registry(Arc::new(ConnectorRegistry::new()), config)
    }

    pub fn with_registry(registry: Arc<ConnectorRegistry>, config: RuntimeConfig) -> Self {
        Self {
            registry,
            engine: ExecutionEngine::new(config.engine),
            event_bus: Arc::new(EventBus::new(config.event_buffer_size)),
            workflows: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn registry(&self) -> &Arc<ConnectorRegistry> {
        &self.registry
    }

    pub async fn register_workflow(&self, workflow: Workflow) {
        let mut workflows = self.workflows.write().await;
        workflows.insert(workflow.id, workflow);
    }

    /// Execute a previously registered workflow by id
    pub async fn execute_workflow(
        &self,
        workflow_id: WorkflowId,
        cancellation: CancellationToken,
    ) -> Result<RunReport, EngineError> {
        let workflows = self.workflows.read().await;
        let workflow = workflows
            .get(&workflow_id)
            .ok_or_else(|| EngineError::WorkflowNotFound(workflow_id.to_string()))?;
        self.engine
            .execute(workflow, &self.registry, &self.event_bus, cancellation)
            .await
    }

    /// Execute a workflow snapshot directly, without registration
    pub async fn execute(
        &self,
        workflow: &Workflow,
        cancellation: CancellationToken,
    ) -> Result<RunReport, EngineError> {
        self.engine
            .execute(workflow, &self.registry, &self.event_bus, cancellation)
            .await
    }

    pub fn subscribe_events(&self) -> tokio::sync::broadcast::Receiver<RunEvent> {
        self.event_bus.subscribe()
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }
}

impl Default for PipelineRuntime {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for the runtime
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub engine: EngineConfig,
    pub event_buffer_size: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            event_buffer_size: 1000,
        }
    }
}
