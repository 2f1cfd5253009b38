//! `start@v1`: the Entry node. No inputs; publishes `args`/`env` outputs
//! from the process's command-line arguments and the caller-supplied
//! initial environment, then dispatches the `next` exec port.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;

use crate::context::ExecutionContext;
use crate::graph::Graph;
use crate::node::{NodeBase, NodeKind};
use crate::registry::NodeTypeRegistry;
use crate::value::Value;

const DEFINITION: &str = r#"
id: start
version: "1"
entry: true
outputs:
  args:
    type: "[]string"
    index: 0
  env:
    type: "map[string]string"
    index: 1
  next:
    type: any
    index: 2
    exec: true
"#;

pub struct StartNode {
    base: NodeBase,
}

impl NodeKind for StartNode {
    fn base(&self) -> &NodeBase {
        &self.base
    }

    fn execute_entry(&self, graph: &Graph, env: HashMap<String, String>) -> Result<()> {
        let ctx = ExecutionContext::new(env.clone());

        let args: Vec<Value> = std::env::args().skip(1).map(Value::Str).collect();
        self.base.set_output_value(&ctx, "args", Value::Seq(args))?;

        let env_value: HashMap<String, Value> =
            env.into_iter().map(|(k, v)| (k, Value::Str(v))).collect();
        self.base.set_output_value(&ctx, "env", Value::Map(env_value))?;

        crate::executor::execute(graph, self.base.execution_target("next").as_ref(), &ctx)
    }
}

pub fn register(registry: &mut NodeTypeRegistry) -> Result<()> {
    registry.register(DEFINITION, |def, id| {
        Ok(Arc::new(StartNode {
            base: NodeBase::new(id, def.composite_key(), def.inputs.clone(), def.outputs.clone()),
        }) as Arc<dyn NodeKind>)
    })
}
