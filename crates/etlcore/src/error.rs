use crate::{NodeId, NodeKind};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Top-level error for engine and tooling operations
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("workflow failed validation with {} issue(s)", .0.issues.len())]
    Invalid(ValidationReport),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("workflow not found: {0}")]
    WorkflowNotFound(String),

    #[error("task error: {0}")]
    Task(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failure raised by a connector during extract/transform/load
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ConnectorError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("authorization failed: {0}")]
    Unauthorized(String),

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("remote system error: {message}")]
    Remote { message: String, retryable: bool },

    #[error("malformed data: {0}")]
    Data(String),

    #[error("cancelled")]
    Cancelled,
}

impl ConnectorError {
    /// Whether the engine may retry the invocation. Transient transport
    /// failures are; credential and data problems are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            ConnectorError::Connection(_) | ConnectorError::RateLimited(_) => true,
            ConnectorError::Remote { retryable, .. } => *retryable,
            _ => false,
        }
    }
}

/// Why a node run ended in `Failed` or `Skipped`
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum RunError {
    #[error("connector error: {0}")]
    Connector(#[from] ConnectorError),

    #[error("timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("cancelled before execution")]
    Cancelled,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("cycle detected in workflow graph")]
    CycleDetected,

    #[error("edge references unknown node: {0}")]
    UnknownNode(NodeId),

    #[error("duplicate node id: {0}")]
    DuplicateNode(NodeId),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("no {kind} connector registered for '{key}'")]
    UnknownConnector { kind: NodeKind, key: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TableError {
    #[error("row {row} has {got} values, table has {expected} columns")]
    RaggedRow {
        row: usize,
        got: usize,
        expected: usize,
    },

    #[error("unknown column: {0}")]
    UnknownColumn(String),
}

/// One violation found by the validator
//
// NOTE: this enum cannot use `#[derive(thiserror::Error)]` because several
// variants carry a field named `source` (an edge's source NodeId). thiserror
// unconditionally treats any field named `source` as the error's
// `std::error::Error` source, which requires that field to implement `Error`.
// A `NodeId` (String) does not, so the `Display`/`Error` impls below are
// written by hand to reproduce the same messages while keeping the field name.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum ValidationIssue {
    DuplicateNodeId { node_id: NodeId },

    UnknownEdgeEndpoint {
        source: NodeId,
        target: NodeId,
        node_id: NodeId,
    },

    EdgeIntoSource { source: NodeId, target: NodeId },

    EdgeOutOfDestination { source: NodeId, target: NodeId },

    CycleDetected,

    MissingInput { node_id: NodeId, kind: NodeKind },

    DestinationFanIn { node_id: NodeId, count: usize },

    Unreachable { node_id: NodeId },

    UnknownConnector {
        node_id: NodeId,
        kind: NodeKind,
        key: String,
    },

    InvalidConfiguration { node_id: NodeId, message: String },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::DuplicateNodeId { node_id } => {
                write!(f, "duplicate node id: {node_id}")
            }
            ValidationIssue::UnknownEdgeEndpoint {
                source,
                target,
                node_id,
            } => write!(
                f,
                "edge {source} -> {target} references unknown node {node_id}"
            ),
            ValidationIssue::EdgeIntoSource { source, target } => write!(
                f,
                "edge {source} -> {target} feeds source node {target}; sources accept no input"
            ),
            ValidationIssue::EdgeOutOfDestination { source, target } => write!(
                f,
                "edge {source} -> {target} leaves destination node {source}; destinations are sinks"
            ),
            ValidationIssue::CycleDetected => write!(f, "workflow graph contains a cycle"),
            ValidationIssue::MissingInput { node_id, kind } => {
                write!(f, "{kind} node {node_id} has no incoming edge")
            }
            ValidationIssue::DestinationFanIn { node_id, count } => write!(
                f,
                "destination node {node_id} has {count} incoming edges; combine branches with a transformation first"
            ),
            ValidationIssue::Unreachable { node_id } => {
                write!(f, "node {node_id} is not reachable from any source")
            }
            ValidationIssue::UnknownConnector {
                node_id,
                kind,
                key,
            } => write!(
                f,
                "node {node_id}: no {kind} connector registered for '{key}'"
            ),
            ValidationIssue::InvalidConfiguration { node_id, message } => {
                write!(f, "node {node_id}: invalid configuration: {message}")
            }
        }
    }
}

impl std::error::Error for ValidationIssue {}

/// Aggregate of every violation found in one validation pass
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn push(&mut self, issue: ValidationIssue) {
        self.issues.push(issue);
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.issues.is_empty() {
            return write!(f, "workflow is valid");
        }
        for (i, issue) in self.issues.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", issue)?;
        }
        Ok(())
    }
}
