//! Graph document loading and the runtime graph container.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::error::EngineError;
use crate::node::{EdgeSource, NodeId, NodeKind};
use crate::registry::NodeTypeRegistry;
use crate::value::Value;

#[derive(Debug, Deserialize)]
struct GraphDocument {
    nodes: Vec<NodeDoc>,
    #[serde(default)]
    connections: Vec<ConnectionDoc>,
    #[serde(default)]
    executions: Vec<ExecutionDoc>,
    entry: String,
}

#[derive(Debug, Deserialize)]
struct NodeDoc {
    id: String,
    #[serde(rename = "type")]
    node_type: String,
    #[serde(default)]
    inputs: HashMap<String, Value>,
}

#[derive(Debug, Deserialize)]
struct PortRef {
    node: String,
    port: String,
}

#[derive(Debug, Deserialize)]
struct ExecDstRef {
    node: String,
}

#[derive(Debug, Deserialize)]
struct ConnectionDoc {
    src: PortRef,
    dst: PortRef,
}

#[derive(Debug, Deserialize)]
struct ExecutionDoc {
    src: PortRef,
    dst: Option<ExecDstRef>,
}

/// A loaded, wired graph ready to execute. Holds every node instance by
/// id plus the resolved entry node id.
pub struct Graph {
    nodes: HashMap<NodeId, Arc<dyn NodeKind>>,
    entry_id: NodeId,
}

impl Graph {
    pub fn node(&self, id: &str) -> Result<&Arc<dyn NodeKind>> {
        self.nodes
            .get(id)
            .ok_or_else(|| EngineError::UnresolvedReference(id.to_string()).into())
    }

    pub fn entry(&self) -> Result<&Arc<dyn NodeKind>> {
        self.node(&self.entry_id)
    }

    pub fn node_ids(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    #[cfg(test)]
    pub(crate) fn from_parts(nodes: HashMap<NodeId, Arc<dyn NodeKind>>, entry_id: NodeId) -> Self {
        Self { nodes, entry_id }
    }
}

/// Parses a graph document (YAML or JSON; both deserialize through the
/// same model) and wires it into an executable [`Graph`]:
/// instantiate every node and apply its input overrides, wire execution
/// edges, wire data connections, then record and validate the entry. Any
/// failure at any step discards the whole partially built graph — there
/// is no partial-graph result.
///
/// `entry_override` lets a caller (the CLI's `--entry` flag) pick a
/// different entry node than the document declares; it must still name a
/// node registered as entry-capable.
pub fn load_graph(
    source: &str,
    registry: &NodeTypeRegistry,
    entry_override: Option<&str>,
) -> Result<Graph> {
    let document: GraphDocument = parse_document(source)?;

    let mut nodes: HashMap<NodeId, Arc<dyn NodeKind>> = HashMap::new();
    let mut entry_capable: HashMap<NodeId, bool> = HashMap::new();

    for node_doc in &document.nodes {
        let (node, is_entry) = registry
            .create(&node_doc.node_type, node_doc.id.clone())
            .with_context(|| format!("failed to instantiate node '{}'", node_doc.id))?;

        for (input_id, value) in &node_doc.inputs {
            node.base().set_input_value(input_id, value.clone());
        }

        entry_capable.insert(node_doc.id.clone(), is_entry);
        nodes.insert(node_doc.id.clone(), node);
    }

    for execution in &document.executions {
        let src_node = nodes
            .get(&execution.src.node)
            .ok_or_else(|| EngineError::UnresolvedReference(execution.src.node.clone()))?;
        let dst_id = match &execution.dst {
            Some(dst) => {
                if !nodes.contains_key(&dst.node) {
                    return Err(EngineError::UnresolvedReference(dst.node.clone()).into());
                }
                Some(dst.node.clone())
            }
            None => None,
        };
        src_node.base().set_execution(&execution.src.port, dst_id);
    }

    for connection in &document.connections {
        if !nodes.contains_key(&connection.src.node) {
            return Err(EngineError::UnresolvedReference(connection.src.node.clone()).into());
        }
        let dst_node = nodes
            .get(&connection.dst.node)
            .ok_or_else(|| EngineError::UnresolvedReference(connection.dst.node.clone()))?;
        dst_node.base().connect_port(
            &connection.dst.port,
            EdgeSource {
                src_node: connection.src.node.clone(),
                src_output: connection.src.port.clone(),
            },
        );
    }

    let entry_id = entry_override
        .map(str::to_string)
        .unwrap_or(document.entry);

    if !nodes.contains_key(&entry_id) {
        return Err(EngineError::UnresolvedReference(entry_id).into());
    }
    if !entry_capable.get(&entry_id).copied().unwrap_or(false) {
        anyhow::bail!(
            "node '{entry_id}' is not registered as an entry-capable type"
        );
    }

    Ok(Graph { nodes, entry_id })
}

fn parse_document(source: &str) -> Result<GraphDocument> {
    let trimmed = source.trim_start();
    if trimmed.starts_with('{') {
        serde_json::from_str(source).context("failed to parse graph document as JSON")
    } else {
        serde_yaml::from_str(source).context("failed to parse graph document as YAML")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::register_all_nodes;

    const SIMPLE_GRAPH: &str = r#"
nodes:
  - id: begin
    type: start@v1
  - id: greet
    type: print@v1
    inputs:
      message: "hello"
connections: []
executions:
  - src: { node: begin, port: next }
    dst: { node: greet }
entry: begin
"#;

    fn registry() -> NodeTypeRegistry {
        let mut registry = NodeTypeRegistry::new();
        register_all_nodes(&mut registry).unwrap();
        registry
    }

    #[test]
    fn load_graph_wires_nodes_executions_and_entry() {
        let registry = registry();
        let graph = load_graph(SIMPLE_GRAPH, &registry, None).unwrap();
        assert!(graph.node("begin").is_ok());
        assert!(graph.node("greet").is_ok());
        assert!(graph.entry().is_ok());
    }

    #[test]
    fn load_graph_rejects_unresolved_execution_target() {
        let registry = registry();
        let bad = r#"
nodes:
  - id: begin
    type: start@v1
connections: []
executions:
  - src: { node: begin, port: next }
    dst: { node: ghost }
entry: begin
"#;
        let err = load_graph(bad, &registry, None).unwrap_err();
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn load_graph_rejects_non_entry_capable_entry() {
        let registry = registry();
        let bad = r#"
nodes:
  - id: begin
    type: start@v1
  - id: greet
    type: print@v1
    inputs:
      message: "hello"
connections: []
executions:
  - src: { node: begin, port: next }
    dst: { node: greet }
entry: greet
"#;
        let err = load_graph(bad, &registry, None).unwrap_err();
        assert!(err.to_string().contains("entry-capable"));
    }

    #[test]
    fn entry_override_replaces_declared_entry() {
        let registry = registry();
        let doc = r#"
nodes:
  - id: begin
    type: start@v1
  - id: other
    type: start@v1
connections: []
executions: []
entry: begin
"#;
        let graph = load_graph(doc, &registry, Some("other")).unwrap();
        assert!(graph.entry().is_ok());
    }
}
