//! `print@v1`: logs its `message` input, then dispatches `done`.

use std::sync::Arc;

use anyhow::Result;

use crate::context::ExecutionContext;
use crate::graph::Graph;
use crate::node::{NodeBase, NodeKind};
use crate::registry::NodeTypeRegistry;

const DEFINITION: &str = r#"
id: print
version: "1"
entry: false
inputs:
  message:
    type: string
    index: 0
outputs:
  done:
    type: any
    index: 0
    exec: true
"#;

pub struct PrintNode {
    base: NodeBase,
}

impl NodeKind for PrintNode {
    fn base(&self) -> &NodeBase {
        &self.base
    }

    fn execute(&self, graph: &Graph, ctx: &ExecutionContext) -> Result<()> {
        let message: String = self.base.input_value(graph, ctx, "message")?;
        tracing::info!(node = %self.base.id, "{message}");
        crate::executor::execute(graph, self.base.execution_target("done").as_ref(), ctx)
    }
}

pub fn register(registry: &mut NodeTypeRegistry) -> Result<()> {
    registry.register(DEFINITION, |def, id| {
        Ok(Arc::new(PrintNode {
            base: NodeBase::new(id, def.composite_key(), def.inputs.clone(), def.outputs.clone()),
        }) as Arc<dyn NodeKind>)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use std::collections::HashMap;

    #[test]
    fn prints_message_and_dispatches_done() {
        let mut registry = NodeTypeRegistry::new();
        register(&mut registry).unwrap();
        let (node, _) = registry.create("print@v1", "n1".into()).unwrap();
        node.base().set_input_value("message", Value::Str("hi".into()));

        let mut nodes = HashMap::new();
        nodes.insert("n1".to_string(), node.clone());
        let graph = Graph::from_parts(nodes, "n1".to_string());
        let ctx = ExecutionContext::empty();
        assert!(node.execute(&graph, &ctx).is_ok());
    }
}
