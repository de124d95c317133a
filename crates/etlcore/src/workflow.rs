use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub type WorkflowId = Uuid;

/// Node ids come from the editor as strings and must be unique within a
/// workflow. Execution order ties are broken by ascending id comparison,
/// so the string form is load-bearing.
pub type NodeId = String;

/// Raw per-node configuration as produced by the form layer. Connectors
/// decode this into their own typed shape; the engine never interprets it.
pub type NodeConfig = serde_json::Map<String, serde_json::Value>;

/// Capability class of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Source,
    Transformation,
    Destination,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Source => "source",
            NodeKind::Transformation => "transformation",
            NodeKind::Destination => "destination",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Node specification in a workflow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    /// Connector key, e.g. "google_cloud_storage" or "snowflake"
    pub connector: String,
    #[serde(default)]
    pub configuration: NodeConfig,
    /// Placement in the visual editor; carried through, ignored by the core
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
}

impl Node {
    fn new(id: impl Into<NodeId>, kind: NodeKind, connector: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            connector: connector.into(),
            configuration: NodeConfig::new(),
            position: None,
        }
    }

    pub fn source(id: impl Into<NodeId>, connector: impl Into<String>) -> Self {
        Self::new(id, NodeKind::Source, connector)
    }

    pub fn transformation(id: impl Into<NodeId>, connector: impl Into<String>) -> Self {
        Self::new(id, NodeKind::Transformation, connector)
    }

    pub fn destination(id: impl Into<NodeId>, connector: impl Into<String>) -> Self {
        Self::new(id, NodeKind::Destination, connector)
    }

    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.configuration.insert(key.into(), value.into());
        self
    }

    pub fn with_position(mut self, x: f32, y: f32) -> Self {
        self.position = Some(Position { x, y });
        self
    }
}

/// Directed edge between two nodes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub source: NodeId,
    pub target: NodeId,
}

/// Node position in the visual editor
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    #[default]
    Draft,
    Running,
    Success,
    Failed,
}

/// Complete workflow snapshot
///
/// Created and edited externally, handed to the engine as a value per run.
/// The engine never mutates it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub id: WorkflowId,
    pub name: String,
    #[serde(default)]
    pub status: WorkflowStatus,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl Workflow {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            status: WorkflowStatus::default(),
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    pub fn add_node(&mut self, node: Node) -> NodeId {
        let id = node.id.clone();
        self.nodes.push(node);
        id
    }

    pub fn connect(&mut self, source: impl Into<NodeId>, target: impl Into<NodeId>) {
        self.edges.push(Edge {
            source: source.into(),
            target: target.into(),
        });
    }

    pub fn find_node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }
}
