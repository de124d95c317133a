use crate::{
    ConnectorError, EventEmitter, LoadSummary, NodeConfig, NodeId, NodeKind, TabularResult,
};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Execution context handed to a connector for one node invocation
#[derive(Clone)]
pub struct ConnectorContext {
    pub node_id: NodeId,
    pub config: NodeConfig,
    /// Emitter for real-time progress updates
    pub events: EventEmitter,
    /// Run-scoped cancellation; connectors observe it cooperatively
    pub cancellation: CancellationToken,
}

impl ConnectorContext {
    pub fn new(node_id: NodeId, config: NodeConfig, events: EventEmitter) -> Self {
        Self {
            node_id,
            config,
            events,
            cancellation: CancellationToken::new(),
        }
    }

    /// Decode the raw configuration map into the connector's declared shape
    pub fn typed_config<T: DeserializeOwned>(&self) -> Result<T, ConnectorError> {
        typed_config(&self.config)
    }

    pub fn require_config(&self, key: &str) -> Result<&serde_json::Value, ConnectorError> {
        self.config
            .get(key)
            .ok_or_else(|| ConnectorError::Configuration(format!("missing config key: {}", key)))
    }
}

/// Decode a configuration map into a typed struct. Used by
/// `validate_config` implementations, which run before any context exists.
pub fn typed_config<T: DeserializeOwned>(config: &NodeConfig) -> Result<T, ConnectorError> {
    serde_json::from_value(serde_json::Value::Object(config.clone()))
        .map_err(|e| ConnectorError::Configuration(e.to_string()))
}

/// Connector that reads a table out of an external system
#[async_trait]
pub trait SourceConnector: Send + Sync {
    /// Check the configuration without performing any I/O
    fn validate_config(&self, config: &NodeConfig) -> Result<(), ConnectorError>;

    async fn extract(&self, ctx: &ConnectorContext) -> Result<TabularResult, ConnectorError>;
}

/// Connector that reshapes one or more upstream tables into a new table
///
/// Inputs are keyed by predecessor node id; how multiple inputs combine
/// (join, union, ...) is entirely the connector's decision.
#[async_trait]
pub trait TransformConnector: Send + Sync {
    fn validate_config(&self, config: &NodeConfig) -> Result<(), ConnectorError>;

    async fn transform(
        &self,
        ctx: &ConnectorContext,
        inputs: HashMap<NodeId, TabularResult>,
    ) -> Result<TabularResult, ConnectorError>;
}

/// Connector that writes a table into an external system
#[async_trait]
pub trait LoadConnector: Send + Sync {
    fn validate_config(&self, config: &NodeConfig) -> Result<(), ConnectorError>;

    async fn load(
        &self,
        ctx: &ConnectorContext,
        input: TabularResult,
    ) -> Result<LoadSummary, ConnectorError>;
}

/// Capability-dispatching handle stored in the registry
#[derive(Clone)]
pub enum Connector {
    Source(Arc<dyn SourceConnector>),
    Transformation(Arc<dyn TransformConnector>),
    Destination(Arc<dyn LoadConnector>),
}

impl Connector {
    pub fn kind(&self) -> NodeKind {
        match self {
            Connector::Source(_) => NodeKind::Source,
            Connector::Transformation(_) => NodeKind::Transformation,
            Connector::Destination(_) => NodeKind::Destination,
        }
    }

    pub fn validate_config(&self, config: &NodeConfig) -> Result<(), ConnectorError> {
        match self {
            Connector::Source(c) => c.validate_config(config),
            Connector::Transformation(c) => c.validate_config(config),
            Connector::Destination(c) => c.validate_config(config),
        }
    }
}
