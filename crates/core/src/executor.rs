//! Execution engine: push-style dispatch along execution edges.

use std::collections::HashMap;

use anyhow::Result;

use crate::context::ExecutionContext;
use crate::error::EngineError;
use crate::graph::Graph;
use crate::node::NodeId;

/// The shared primitive every exec-carrying node calls to hand control to
/// a successor. A `None` (not-connected) exec port is legal and a no-op —
/// this is what lets a branch or loop body end a chain without every node
/// needing its own dead-end handling.
pub fn execute(graph: &Graph, next: Option<&NodeId>, ctx: &ExecutionContext) -> Result<()> {
    let Some(id) = next else {
        return Ok(());
    };

    if ctx.is_cancelled() {
        return Err(EngineError::Cancelled.into());
    }

    let node = graph.node(id)?;
    tracing::debug!(node = %id, node_type = %node.base().type_tag, branch = %ctx.current_branch(), "execute");
    node.execute(graph, ctx)
}

/// Top-level kick-off: resolves the entry node and runs it with a
/// freshly rooted execution context seeded from `env`.
pub fn run_graph(graph: &Graph, env: HashMap<String, String>) -> Result<()> {
    let entry = graph.entry()?;
    tracing::info!(entry = %entry.base().id, "run graph");
    entry.execute_entry(graph, env)
}
