//! `parallel-for@v1`: parallel fan. Each iteration gets its own
//! pushed branch with `index` published into it before the branch's
//! thread is spawned, so a reader inside the branch never races the
//! write. `NodeKind::execute` is synchronous, so branches run on native
//! OS threads (`std::thread::scope`) rather than a tokio task — either is
//! an acceptable way to keep one blocking branch from starving its
//! siblings. `finished` fires on the original (parent) context, never a
//! branch's.

use std::sync::{Arc, Mutex};

use anyhow::Result;

use crate::context::ExecutionContext;
use crate::error::EngineError;
use crate::graph::Graph;
use crate::node::{NodeBase, NodeKind};
use crate::registry::NodeTypeRegistry;
use crate::value::Value;

const DEFINITION: &str = r#"
id: parallel-for
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

pub struct ParallelForNode {
    base: NodeBase,
}

impl NodeKind for ParallelForNode {
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
            let errors: Mutex<Vec<anyhow::Error>> = Mutex::new(Vec::new());

            // TODO: queue branches instead of spawning every iteration at once.
            std::thread::scope(|scope| {
                for i in first..=last {
                    let branch_ctx = ctx.push();
                    if let Err(err) = self.base.set_output_value(&branch_ctx, "index", Value::Int(i)) {
                        errors.lock().expect("error list lock poisoned").push(err);
                        continue;
                    }

                    let body = &body;
                    let errors = &errors;
                    scope.spawn(move || {
                        if let Err(err) = crate::executor::execute(graph, Some(body), &branch_ctx) {
                            errors.lock().expect("error list lock poisoned").push(err);
                        }
                    });
                }
            });

            let errors = errors.into_inner().expect("error list lock poisoned");
            if !errors.is_empty() {
                return Err(EngineError::Aggregate(errors).into());
            }
        }

        crate::executor::execute(graph, self.base.execution_target("finished").as_ref(), ctx)
    }
}

pub fn register(registry: &mut NodeTypeRegistry) -> Result<()> {
    registry.register(DEFINITION, |def, id| {
        Ok(Arc::new(ParallelForNode {
            base: NodeBase::new(id, def.composite_key(), def.inputs.clone(), def.outputs.clone()),
        }) as Arc<dyn NodeKind>)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;

    /// Records the `index` each branch observed and fails if it ever sees
    /// a value that was not the one published into its own branch.
    struct RecordingBody {
        base: NodeBase,
        seen: StdMutex<Vec<i64>>,
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

    struct FailingBody {
        base: NodeBase,
    }

    impl NodeKind for FailingBody {
        fn base(&self) -> &NodeBase {
            &self.base
        }

        fn execute(&self, _graph: &Graph, _ctx: &ExecutionContext) -> Result<()> {
            anyhow::bail!("branch failed")
        }
    }

    fn index_input_defs() -> HashMap<String, crate::port::InputDefinition> {
        let mut defs = HashMap::new();
        defs.insert(
            "index".to_string(),
            crate::port::InputDefinition {
                port_type: crate::port::PortTypeOrEmpty(crate::port::PortType::Number),
                index: 0,
                ..Default::default()
            },
        );
        defs
    }

    #[test]
    fn every_branch_observes_its_own_index() {
        let mut registry = NodeTypeRegistry::new();
        register(&mut registry).unwrap();
        let (node, _) = registry.create("parallel-for@v1", "loop".into()).unwrap();
        node.base().set_input_value("first", Value::Int(0));
        node.base().set_input_value("last", Value::Int(9));
        node.base().set_execution("body", Some("body".to_string()));

        let body = Arc::new(RecordingBody {
            base: NodeBase::new("body", "recording-body", index_input_defs(), HashMap::new()),
            seen: StdMutex::new(Vec::new()),
        });
        body.base().connect_port(
            "index",
            crate::node::EdgeSource {
                src_node: "loop".to_string(),
                src_output: "index".to_string(),
            },
        );

        let mut nodes: HashMap<String, Arc<dyn NodeKind>> = HashMap::new();
        nodes.insert("loop".to_string(), node.clone());
        nodes.insert("body".to_string(), body.clone() as Arc<dyn NodeKind>);
        let graph = Graph::from_parts(nodes, "loop".to_string());

        let ctx = ExecutionContext::empty();
        node.execute(&graph, &ctx).unwrap();

        let mut seen = body.seen.lock().unwrap().clone();
        seen.sort_unstable();
        assert_eq!(seen, (0..=9).collect::<Vec<_>>());
    }

    #[test]
    fn first_greater_than_last_runs_zero_branches() {
        let mut registry = NodeTypeRegistry::new();
        register(&mut registry).unwrap();
        let (node, _) = registry.create("parallel-for@v1", "loop".into()).unwrap();
        node.base().set_input_value("first", Value::Int(5));
        node.base().set_input_value("last", Value::Int(1));

        let mut nodes: HashMap<String, Arc<dyn NodeKind>> = HashMap::new();
        nodes.insert("loop".to_string(), node.clone());
        let graph = Graph::from_parts(nodes, "loop".to_string());

        let ctx = ExecutionContext::empty();
        assert!(node.execute(&graph, &ctx).is_ok());
    }

    #[test]
    fn branch_failures_aggregate_into_one_error() {
        let mut registry = NodeTypeRegistry::new();
        register(&mut registry).unwrap();
        let (node, _) = registry.create("parallel-for@v1", "loop".into()).unwrap();
        node.base().set_input_value("first", Value::Int(0));
        node.base().set_input_value("last", Value::Int(2));
        node.base().set_execution("body", Some("body".to_string()));

        let body = Arc::new(FailingBody {
            base: NodeBase::new("body", "failing-body", HashMap::new(), HashMap::new()),
        });

        let mut nodes: HashMap<String, Arc<dyn NodeKind>> = HashMap::new();
        nodes.insert("loop".to_string(), node.clone());
        nodes.insert("body".to_string(), body as Arc<dyn NodeKind>);
        let graph = Graph::from_parts(nodes, "loop".to_string());

        let ctx = ExecutionContext::empty();
        let err = node.execute(&graph, &ctx).unwrap_err();
        assert!(err.to_string().contains("branch(es) failed"));
    }
}
