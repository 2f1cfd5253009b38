//! `branch@v1`: fires exactly one of two execution outputs depending on a
//! boolean condition. Exec outputs are named `true_`/`false_` (the
//! trailing underscore sidesteps the Rust keyword `true`/`false`).

use std::sync::Arc;

use anyhow::Result;

use crate::context::ExecutionContext;
use crate::graph::Graph;
use crate::node::{NodeBase, NodeKind};
use crate::registry::NodeTypeRegistry;

const DEFINITION: &str = r#"
id: branch
version: "1"
entry: false
inputs:
  condition:
    type: bool
    index: 0
outputs:
  true_:
    type: any
    index: 0
    exec: true
  false_:
    type: any
    index: 1
    exec: true
"#;

pub struct BranchNode {
    base: NodeBase,
}

impl NodeKind for BranchNode {
    fn base(&self) -> &NodeBase {
        &self.base
    }

    fn execute(&self, graph: &Graph, ctx: &ExecutionContext) -> Result<()> {
        let condition: bool = self.base.input_value(graph, ctx, "condition")?;
        let port = if condition { "true_" } else { "false_" };
        crate::executor::execute(graph, self.base.execution_target(port).as_ref(), ctx)
    }
}

pub fn register(registry: &mut NodeTypeRegistry) -> Result<()> {
    registry.register(DEFINITION, |def, id| {
        Ok(Arc::new(BranchNode {
            base: NodeBase::new(id, def.composite_key(), def.inputs.clone(), def.outputs.clone()),
        }) as Arc<dyn NodeKind>)
    })
}
