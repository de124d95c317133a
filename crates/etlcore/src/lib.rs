//! Core abstractions for the data-integration engine
//!
//! This crate provides the fundamental types and traits that all other
//! components depend on: the workflow snapshot handed over by the editor,
//! the tabular payload threaded along edges, the connector contract, and
//! the per-run result and event types.

mod connector;
mod error;
mod events;
mod result;
mod table;
mod workflow;

pub use connector::{
    typed_config, Connector, ConnectorContext, LoadConnector, SourceConnector, TransformConnector,
};
pub use error::{
    ConnectorError, EngineError, GraphError, RegistryError, RunError, TableError, ValidationIssue,
    ValidationReport,
};
pub use events::{EventBus, EventEmitter, NodeMessage, RunEvent};
pub use result::{LoadSummary, NodeRunResult, NodeStatus, RunId, RunReport};
pub use table::{Scalar, TabularResult};
pub use workflow::{
    Edge, Node, NodeConfig, NodeId, NodeKind, Position, Workflow, WorkflowId, WorkflowStatus,
};

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;
