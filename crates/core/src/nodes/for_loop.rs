//! `for@v1`: sequential fan. Publishes `index` then fires `body` once
//! per iteration in the same branch, so each iteration observes the
//! previous one's output values; fires `finished` once the loop completes.

use std::sync::Arc;

use anyhow::Result;

use crate::context::ExecutionContext;
use crate::graph::Graph;
use crate::node::{NodeBase, NodeKind};
use crate::registry::NodeTypeRegistry;
use crate::value::Value;

const DEFINITION: &str = r#"
id: for
version: "1"
entry: false
inputs:
  first:
    type: number
    index: 0
  last:
    type: number
    index: 1
outputs:
  index:
    type: number
    index: 0
  body:
    type: any
    index: 1
    exec: true
  finished:
    type: any
    index: 2
    exec: true
"#;

pub struct ForNode {
    base: NodeBase,
}

impl NodeKind for ForNode {
    fn base(&self) -> &NodeBase {
        &self.base
    }

    fn execute(&self, graph: &Graph, ctx: &ExecutionContext) -> Result<()> {
        let first: i64 = self.base.input_value(graph, ctx, "first")?;
        let last: i64 = self.base.input_value(graph, ctx, "last")?;

        if first > last {
            return Ok(());
        }

        if let Some(body) = self.base.execution_target("body") {
            for i in first..=last {
                self.base.set_output_value(ctx, "index", Value::Int(i))?;
                crate::executor::execute(graph, Some(&body), ctx)?;
            }
        }

        crate::executor::execute(graph, self.base.execution_target("finished").as_ref(), ctx)
    }
}

pub fn register(registry: &mut NodeTypeRegistry) -> Result<()> {
    registry.register(DEFINITION, |def, id| {
        Ok(Arc::new(ForNode {
            base: NodeBase::new(id, def.composite_key(), def.inputs.clone(), def.outputs.clone()),
        }) as Arc<dyn NodeKind>)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Records every `index` value it observes when fired as the loop body,
    /// so the test can assert the exact sequence of indices observed.
    struct RecordingBody {
        base: NodeBase,
        seen: Mutex<Vec<i64>>,
    }

    impl NodeKind for RecordingBody {
        fn base(&self) -> &NodeBase {
            &self.base
        }

        fn execute(&self, graph: &Graph, ctx: &ExecutionContext) -> Result<()> {
            let index: i64 = self.base.input_value(graph, ctx, "index")?;
            self.seen.lock().unwrap().push(index);
            Ok(())
        }
    }

    fn graph_with_body(first: i64, last: i64) -> (Graph, Arc<dyn NodeKind>, Arc<RecordingBody>) {
        let mut registry = NodeTypeRegistry::new();
        register(&mut registry).unwrap();

        let (for_node, _) = registry.create("for@v1", "loop".into()).unwrap();
        for_node.base().set_input_value("first", Value::Int(first));
        for_node.base().set_input_value("last", Value::Int(last));
        for_node.base().set_execution("body", Some("body".to_string()));

        let mut body_inputs = HashMap::new();
        body_inputs.insert(
            "index".to_string(),
            crate::port::InputDefinition {
                port_type: crate::port::PortTypeOrEmpty(crate::port::PortType::Number),
                index: 0,
                ..Default::default()
            },
        );
        let body = Arc::new(RecordingBody {
            base: NodeBase::new("body", "recording-body", body_inputs, HashMap::new()),
            seen: Mutex::new(Vec::new()),
        });
        body.base().connect_port(
            "index",
            crate::node::EdgeSource {
                src_node: "loop".to_string(),
                src_output: "index".to_string(),
            },
        );

        let mut nodes: HashMap<String, Arc<dyn NodeKind>> = HashMap::new();
        nodes.insert("loop".to_string(), for_node.clone());
        nodes.insert("body".to_string(), body.clone() as Arc<dyn NodeKind>);
        (Graph::from_parts(nodes, "loop".to_string()), for_node, body)
    }

    #[test]
    fn body_observes_each_index_in_order() {
        let (graph, for_node, body) = graph_with_body(3, 7);
        let ctx = ExecutionContext::empty();
        for_node.execute(&graph, &ctx).unwrap();
        assert_eq!(*body.seen.lock().unwrap(), vec![3, 4, 5, 6, 7]);
    }

    #[test]
    fn first_greater_than_last_runs_zero_iterations() {
        let (graph, for_node, body) = graph_with_body(5, 1);
        let ctx = ExecutionContext::empty();
        for_node.execute(&graph, &ctx).unwrap();
        assert!(body.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn unconnected_body_still_fires_finished() {
        let mut registry = NodeTypeRegistry::new();
        register(&mut registry).unwrap();
        crate::nodes::print::register(&mut registry).unwrap();

        let (for_node, _) = registry.create("for@v1", "loop".into()).unwrap();
        for_node.base().set_input_value("first", Value::Int(0));
        for_node.base().set_input_value("last", Value::Int(2));

        let (sink, _) = registry.create("print@v1", "sink".into()).unwrap();
        sink.base().set_input_value("message", Value::Str("done".into()));
        for_node.base().set_execution("finished", Some("sink".to_string()));

        let mut nodes: HashMap<String, Arc<dyn NodeKind>> = HashMap::new();
        nodes.insert("loop".to_string(), for_node.clone());
        nodes.insert("sink".to_string(), sink);
        let graph = Graph::from_parts(nodes, "loop".to_string());

        let ctx = ExecutionContext::empty();
        assert!(for_node.execute(&graph, &ctx).is_ok());
    }
}
