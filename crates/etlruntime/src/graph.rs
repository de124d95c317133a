use etlcore::{GraphError, NodeId, Workflow};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};

/// Immutable adjacency view over a workflow snapshot
///
/// An arena of node ids in a petgraph `DiGraph` plus an id index, built once
/// per validator or engine invocation so predecessor/successor queries do
/// not rescan the flat node/edge lists.
pub struct WorkflowGraph {
    graph: DiGraph<NodeId, ()>,
    index: HashMap<NodeId, NodeIndex>,
}

impl WorkflowGraph {
    pub fn build(workflow: &Workflow) -> Result<Self, GraphError> {
        let mut graph = DiGraph::new();
        let mut index = HashMap::new();

        for node in &workflow.nodes {
            if index.contains_key(&node.id) {
                return Err(GraphError::DuplicateNode(node.id.clone()));
            }
            let idx = graph.add_node(node.id.clone());
            index.insert(node.id.clone(), idx);
        }

        for edge in &workflow.edges {
            let from = *index
                .get(&edge.source)
                .ok_or_else(|| GraphError::UnknownNode(edge.source.clone()))?;
            let to = *index
                .get(&edge.target)
                .ok_or_else(|| GraphError::UnknownNode(edge.target.clone()))?;
            graph.add_edge(from, to, ());
        }

        Ok(Self { graph, index })
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn node_ids(&self) -> impl Iterator<Item = &NodeId> + '_ {
        self.graph.node_indices().map(|idx| &self.graph[idx])
    }

    pub fn predecessors(&self, id: &str) -> Vec<NodeId> {
        self.neighbors(id, Direction::Incoming)
    }

    pub fn successors(&self, id: &str) -> Vec<NodeId> {
        self.neighbors(id, Direction::Outgoing)
    }

    fn neighbors(&self, id: &str, direction: Direction) -> Vec<NodeId> {
        let Some(&idx) = self.index.get(id) else {
            return Vec::new();
        };
        self.graph
            .neighbors_directed(idx, direction)
            .map(|n| self.graph[n].clone())
            .collect()
    }

    /// Node ids reachable from any of the seeds, seeds included
    pub fn reachable_from<'a>(
        &self,
        seeds: impl IntoIterator<Item = &'a NodeId>,
    ) -> HashSet<NodeId> {
        let mut seen = HashSet::new();
        let mut queue = VecDeque::new();
        for id in seeds {
            if let Some(&idx) = self.index.get(id) {
                if seen.insert(self.graph[idx].clone()) {
                    queue.push_back(idx);
                }
            }
        }
        while let Some(idx) = queue.pop_front() {
            for next in self.graph.neighbors_directed(idx, Direction::Outgoing) {
                if seen.insert(self.graph[next].clone()) {
                    queue.push_back(next);
                }
            }
        }
        seen
    }

    /// Deterministic topological order
    ///
    /// Kahn's algorithm with the ready set kept in a min-heap ordered by
    /// ascending node id, so nodes with no ordering constraint between them
    /// always come out in the same sequence for identical inputs.
    pub fn topological_order(&self) -> Result<Vec<NodeId>, GraphError> {
        let mut in_degree: HashMap<NodeIndex, usize> = HashMap::new();
        let mut ready: BinaryHeap<Reverse<(NodeId, NodeIndex)>> = BinaryHeap::new();

        for idx in self.graph.node_indices() {
            let degree = self
                .graph
                .neighbors_directed(idx, Direction::Incoming)
                .count();
            if degree == 0 {
                ready.push(Reverse((self.graph[idx].clone(), idx)));
            }
            in_degree.insert(idx, degree);
        }

        let mut order = Vec::with_capacity(self.graph.node_count());
        while let Some(Reverse((id, idx))) = ready.pop() {
            order.push(id);
            for next in self.graph.neighbors_directed(idx, Direction::Outgoing) {
                if let Some(degree) = in_degree.get_mut(&next) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.push(Reverse((self.graph[next].clone(), next)));
                    }
                }
            }
        }

        if order.len() != self.graph.node_count() {
            return Err(GraphError::CycleDetected);
        }
        Ok(order)
    }
}
