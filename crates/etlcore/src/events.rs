use crate::{NodeId, RunId, WorkflowId, WorkflowStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Events emitted during a workflow run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RunEvent {
    RunStarted {
        run_id: RunId,
        workflow_id: WorkflowId,
        timestamp: DateTime<Utc>,
    },
    RunCompleted {
        run_id: RunId,
        status: WorkflowStatus,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
    NodeStarted {
        run_id: RunId,
        node_id: NodeId,
        connector: String,
        timestamp: DateTime<Utc>,
    },
    NodeSucceeded {
        run_id: RunId,
        node_id: NodeId,
        /// Rows written, for destination nodes
        rows_loaded: Option<u64>,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
    NodeFailed {
        run_id: RunId,
        node_id: NodeId,
        error: String,
        timestamp: DateTime<Utc>,
    },
    NodeSkipped {
        run_id: RunId,
        node_id: NodeId,
        timestamp: DateTime<Utc>,
    },
    NodeMessage {
        run_id: RunId,
        node_id: NodeId,
        message: NodeMessage,
        timestamp: DateTime<Utc>,
    },
}

/// Messages a connector can emit while executing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "level")]
pub enum NodeMessage {
    Info { message: String },
    Warning { message: String },
    Progress { percent: f64, message: Option<String> },
}

/// Per-node emitter handed to connectors for real-time updates
#[derive(Clone)]
pub struct EventEmitter {
    run_id: RunId,
    node_id: NodeId,
    sender: broadcast::Sender<RunEvent>,
}

impl EventEmitter {
    pub fn new(run_id: RunId, node_id: NodeId, sender: broadcast::Sender<RunEvent>) -> Self {
        Self {
            run_id,
            node_id,
            sender,
        }
    }

    pub fn emit(&self, message: NodeMessage) {
        let _ = self.sender.send(RunEvent::NodeMessage {
            run_id: self.run_id,
            node_id: self.node_id.clone(),
            message,
            timestamp: Utc::now(),
        });
    }

    pub fn info(&self, message: impl Into<String>) {
        self.emit(NodeMessage::Info {
            message: message.into(),
        });
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.emit(NodeMessage::Warning {
            message: message.into(),
        });
    }

    pub fn progress(&self, percent: f64, message: Option<String>) {
        self.emit(NodeMessage::Progress { percent, message });
    }
}

/// Broadcast bus carrying run events to any number of observers
pub struct EventBus {
    sender: broadcast::Sender<RunEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RunEvent> {
        self.sender.subscribe()
    }

    pub fn emit(&self, event: RunEvent) {
        let _ = self.sender.send(event);
    }

    pub fn emitter(&self, run_id: RunId, node_id: NodeId) -> EventEmitter {
        EventEmitter::new(run_id, node_id, self.sender.clone())
    }
}
