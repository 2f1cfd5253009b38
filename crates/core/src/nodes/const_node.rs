//! `const@v1`: publishes its own `value` input override as its `value`
//! output, recomputed fresh on every pull. Same pure-leaf shape as
//! `string-fmt@v1`: it overrides the read path rather than storing
//! through `execute`.

use std::sync::Arc;

use anyhow::Result;

use crate::context::ExecutionContext;
use crate::graph::Graph;
use crate::node::{NodeBase, NodeKind};
use crate::registry::NodeTypeRegistry;
use crate::value::Value;

const DEFINITION: &str = r#"
id: const
version: "1"
entry: false
inputs:
  value:
    type: any
    index: 0
    description: The literal value this node publishes on its output.
outputs:
  value:
    type: any
    index: 0
"#;

pub struct ConstNode {
    base: NodeBase,
}

impl NodeKind for ConstNode {
    fn base(&self) -> &NodeBase {
        &self.base
    }

    fn output_value_by_id(&self, graph: &Graph, ctx: &ExecutionContext, output_id: &str) -> Result<Value> {
        if output_id == "value" {
            return self.base.raw_input_value(graph, ctx, "value", None);
        }
        self.base.output_value_by_id(ctx, output_id)
    }
}

pub fn register(registry: &mut NodeTypeRegistry) -> Result<()> {
    registry.register(DEFINITION, |def, id| {
        Ok(Arc::new(ConstNode {
            base: NodeBase::new(id, def.composite_key(), def.inputs.clone(), def.outputs.clone()),
        }) as Arc<dyn NodeKind>)
    })
}
