use crate::{NodeId, RunError, TabularResult, WorkflowId, WorkflowStatus};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

pub type RunId = Uuid;

/// Lifecycle of one node within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Pending,
    Running,
    Success,
    Failed,
    Skipped,
}

impl NodeStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            NodeStatus::Success | NodeStatus::Failed | NodeStatus::Skipped
        )
    }
}

/// What a destination connector reports after writing rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadSummary {
    pub rows_written: u64,
}

/// Outcome of a single node in a run
#[derive(Debug, Clone, Serialize)]
pub struct NodeRunResult {
    pub node_id: NodeId,
    pub status: NodeStatus,
    /// Table produced by a source or transformation; destinations are sinks
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<TabularResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RunError>,
    /// Row count written by a destination, surfaced for observability
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows_loaded: Option<u64>,
    pub duration_ms: u64,
}

impl NodeRunResult {
    pub fn pending(node_id: NodeId) -> Self {
        Self {
            node_id,
            status: NodeStatus::Pending,
            output: None,
            error: None,
            rows_loaded: None,
            duration_ms: 0,
        }
    }
}

/// Complete outcome of one workflow run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub workflow_id: WorkflowId,
    pub status: WorkflowStatus,
    pub nodes: HashMap<NodeId, NodeRunResult>,
    pub duration_ms: u64,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.status == WorkflowStatus::Success
    }

    pub fn node(&self, id: &str) -> Option<&NodeRunResult> {
        self.nodes.get(id)
    }

    pub fn failed_nodes(&self) -> impl Iterator<Item = &NodeRunResult> {
        self.nodes
            .values()
            .filter(|r| r.status == NodeStatus::Failed)
    }
}
