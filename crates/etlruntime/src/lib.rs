//! Workflow execution runtime
//!
//! Validates workflow snapshots, resolves connectors, and runs the graph
//! with bounded parallelism, per-node results, and partial-failure
//! semantics: one broken branch never aborts independent branches.

mod engine;
mod graph;
mod loader;
mod registry;
mod runtime;
mod store;
mod validator;

pub use engine::{EngineConfig, ExecutionEngine, RetryPolicy};
pub use graph::WorkflowGraph;
pub use loader::{JsonFileStore, WorkflowStore};
pub use registry::ConnectorRegistry;
pub use runtime::{PipelineRuntime, RuntimeConfig};
pub use store::ResultStore;
pub use validator::Validator;
