//! `negate@v1`: boolean inverse of `value`, recomputed fresh on every
//! pull. No exec ports, same computed-leaf shape as `string-fmt@v1`.

use std::sync::Arc;

use anyhow::Result;

use crate::context::ExecutionContext;
use crate::graph::Graph;
use crate::node::{NodeBase, NodeKind};
use crate::registry::NodeTypeRegistry;
use crate::value::Value;

const DEFINITION: &str = r#"
id: negate
version: "1"
entry: false
inputs:
  value:
    type: bool
    index: 0
outputs:
  value:
    type: bool
    index: 0
"#;

pub struct NegateNode {
    base: NodeBase,
}

impl NodeKind for NegateNode {
    fn base(&self) -> &NodeBase {
        &self.base
    }

    fn output_value_by_id(&self, graph: &Graph, ctx: &ExecutionContext, output_id: &str) -> Result<Value> {
        if output_id != "value" {
            return self.base.output_value_by_id(ctx, output_id);
        }
        let value: bool = self.base.input_value(graph, ctx, "value")?;
        Ok(Value::Bool(!value))
    }
}

pub fn register(registry: &mut NodeTypeRegistry) -> Result<()> {
    registry.register(DEFINITION, |def, id| {
        Ok(Arc::new(NegateNode {
            base: NodeBase::new(id, def.composite_key(), def.inputs.clone(), def.outputs.clone()),
        }) as Arc<dyn NodeKind>)
    })
}
