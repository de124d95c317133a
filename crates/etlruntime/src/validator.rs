use crate::{ConnectorRegistry, WorkflowGraph};
use etlcore::{Node, NodeId, NodeKind, ValidationIssue, ValidationReport, Workflow};
use std::collections::{HashMap, HashSet};

/// Checks a workflow snapshot against structural and configuration
/// invariants before execution
///
/// Every violation is collected, not just the first, so callers can surface
/// all problems at once. The engine refuses to run any workflow whose
/// report carries issues.
pub struct Validator<'a> {
    registry: &'a ConnectorRegistry,
}

impl<'a> Validator<'a> {
    pub fn new(registry: &'a ConnectorRegistry) -> Self {
        Self { registry }
    }

    pub fn validate(&self, workflow: &Workflow) -> ValidationReport {
        let mut report = ValidationReport::default();

        // Duplicate ids first; everything below indexes nodes by id.
        let mut seen = HashSet::new();
        let mut has_duplicates = false;
        for node in &workflow.nodes {
            if !seen.insert(node.id.as_str()) {
                has_duplicates = true;
                report.push(ValidationIssue::DuplicateNodeId {
                    node_id: node.id.clone(),
                });
            }
        }
        let nodes_by_id: HashMap<&str, &Node> = workflow
            .nodes
            .iter()
            .map(|n| (n.id.as_str(), n))
            .collect();

        // Edges: unknown endpoints and kind compatibility. The allowed flow
        // is source -> transformation* -> destination, so an edge may never
        // feed a source or leave a destination.
        let mut incoming: HashMap<&str, usize> = HashMap::new();
        let mut well_formed = Vec::new();
        for edge in &workflow.edges {
            let mut known = true;
            for endpoint in [&edge.source, &edge.target] {
                if !nodes_by_id.contains_key(endpoint.as_str()) {
                    known = false;
                    report.push(ValidationIssue::UnknownEdgeEndpoint {
                        source: edge.source.clone(),
                        target: edge.target.clone(),
                        node_id: endpoint.clone(),
                    });
                }
            }
            if !known {
                continue;
            }
            *incoming.entry(edge.target.as_str()).or_default() += 1;
            if nodes_by_id[edge.target.as_str()].kind == NodeKind::Source {
                report.push(ValidationIssue::EdgeIntoSource {
                    source: edge.source.clone(),
                    target: edge.target.clone(),
                });
            }
            if nodes_by_id[edge.source.as_str()].kind == NodeKind::Destination {
                report.push(ValidationIssue::EdgeOutOfDestination {
                    source: edge.source.clone(),
                    target: edge.target.clone(),
                });
            }
            well_formed.push(edge.clone());
        }

        // Per-node in-degree rules. Edges into sources are already flagged
        // per offending edge above.
        for node in &workflow.nodes {
            let count = incoming.get(node.id.as_str()).copied().unwrap_or(0);
            match node.kind {
                NodeKind::Source => {}
                NodeKind::Transformation | NodeKind::Destination if count == 0 => {
                    report.push(ValidationIssue::MissingInput {
                        node_id: node.id.clone(),
                        kind: node.kind,
                    });
                }
                NodeKind::Destination if count > 1 => {
                    report.push(ValidationIssue::DestinationFanIn {
                        node_id: node.id.clone(),
                        count,
                    });
                }
                _ => {}
            }
        }

        // Cycle and reachability checks run on the subgraph of well-formed
        // edges; with duplicate ids the arena cannot be built at all.
        if !has_duplicates {
            let mut pruned = workflow.clone();
            pruned.edges = well_formed;
            if let Ok(graph) = WorkflowGraph::build(&pruned) {
                if graph.topological_order().is_err() {
                    report.push(ValidationIssue::CycleDetected);
                }
                let sources: Vec<&NodeId> = workflow
                    .nodes
                    .iter()
                    .filter(|n| n.kind == NodeKind::Source)
                    .map(|n| &n.id)
                    .collect();
                let reachable = graph.reachable_from(sources);
                for node in &workflow.nodes {
                    if !reachable.contains(&node.id) {
                        report.push(ValidationIssue::Unreachable {
                            node_id: node.id.clone(),
                        });
                    }
                }
            }
        }

        // Connector resolvability, then semantic configuration validation.
        // Configuration arrives shape-checked from the form layer but is
        // never trusted.
        for node in &workflow.nodes {
            match self.registry.resolve(node.kind, &node.connector) {
                Ok(connector) => {
                    if let Err(e) = connector.validate_config(&node.configuration) {
                        report.push(ValidationIssue::InvalidConfiguration {
                            node_id: node.id.clone(),
                            message: e.to_string(),
                        });
                    }
                }
                Err(_) => {
                    report.push(ValidationIssue::UnknownConnector {
                        node_id: node.id.clone(),
                        kind: node.kind,
                        key: node.connector.clone(),
                    });
                }
            }
        }

        if !report.is_valid() {
            tracing::debug!(
                workflow = %workflow.id,
                issues = report.issues.len(),
                "validation found issues"
            );
        }
        report
    }
}
