use etlcore::{NodeId, NodeRunResult, NodeStatus, RunError, TabularResult, Workflow};
use std::collections::HashMap;

/// Per-run result map, owned exclusively by the engine's scheduling loop
///
/// Every node's entry moves to a terminal state exactly once; outputs are
/// held here for the duration of the run so dependents can read them.
pub struct ResultStore {
    entries: HashMap<NodeId, NodeRunResult>,
}

impl ResultStore {
    pub fn new(workflow: &Workflow) -> Self {
        let entries = workflow
            .nodes
            .iter()
            .map(|n| (n.id.clone(), NodeRunResult::pending(n.id.clone())))
            .collect();
        Self { entries }
    }

    pub fn status(&self, id: &str) -> NodeStatus {
        self.entries
            .get(id)
            .map(|e| e.status)
            .unwrap_or(NodeStatus::Pending)
    }

    pub fn mark_running(&mut self, id: &str) {
        if let Some(entry) = self.entries.get_mut(id) {
            debug_assert_eq!(entry.status, NodeStatus::Pending);
            entry.status = NodeStatus::Running;
        }
    }

    pub fn record_success(
        &mut self,
        id: &str,
        output: Option<TabularResult>,
        rows_loaded: Option<u64>,
        duration_ms: u64,
    ) {
        self.finish(id, NodeStatus::Success, output, None, rows_loaded, duration_ms);
    }

    pub fn record_failure(&mut self, id: &str, error: RunError, duration_ms: u64) {
        self.finish(id, NodeStatus::Failed, None, Some(error), None, duration_ms);
    }

    /// A skip caused by cancellation carries `RunError::Cancelled`; a skip
    /// caused by an upstream failure carries no error of its own, the
    /// failing ancestor does.
    pub fn record_skipped(&mut self, id: &str, cause: Option<RunError>) {
        self.finish(id, NodeStatus::Skipped, None, cause, None, 0);
    }

    fn finish(
        &mut self,
        id: &str,
        status: NodeStatus,
        output: Option<TabularResult>,
        error: Option<RunError>,
        rows_loaded: Option<u64>,
        duration_ms: u64,
    ) {
        if let Some(entry) = self.entries.get_mut(id) {
            debug_assert!(
                !entry.status.is_terminal(),
                "node {} completed twice",
                id
            );
            entry.status = status;
            entry.output = output;
            entry.error = error;
            entry.rows_loaded = rows_loaded;
            entry.duration_ms = duration_ms;
        }
    }

    pub fn output(&self, id: &str) -> Option<&TabularResult> {
        self.entries.get(id).and_then(|e| e.output.as_ref())
    }

    pub fn any_failed(&self) -> bool {
        self.entries
            .values()
            .any(|e| e.status == NodeStatus::Failed)
    }

    pub fn any_skipped(&self) -> bool {
        self.entries
            .values()
            .any(|e| e.status == NodeStatus::Skipped)
    }

    pub fn into_results(self) -> HashMap<NodeId, NodeRunResult> {
        self.entries
    }
}
