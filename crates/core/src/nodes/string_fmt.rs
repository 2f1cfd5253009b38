//! `string-fmt@v1`: formats a `fmt` template against the `input` sub-port
//! group, recomputed fresh on every pull. No exec ports at all — it
//! overrides `output_value_by_id` instead of ever calling
//! `set_output_value` from an `execute` body.

use std::sync::Arc;

use anyhow::Result;

use crate::context::ExecutionContext;
use crate::graph::Graph;
use crate::node::{NodeBase, NodeKind};
use crate::registry::NodeTypeRegistry;
use crate::value::Value;

const DEFINITION: &str = r#"
id: string-fmt
version: "1"
entry: false
inputs:
  fmt:
    type: string
    index: 0
    description: "A Go-style format template, e.g. \"%s is %s\"."
  input:
    type: any
    index: 1
    group: true
    description: Positional arguments substituted into the template in order.
outputs:
  value:
    type: string
    index: 0
"#;

pub struct StringFmtNode {
    base: NodeBase,
}

impl NodeKind for StringFmtNode {
    fn base(&self) -> &NodeBase {
        &self.base
    }

    fn output_value_by_id(&self, graph: &Graph, ctx: &ExecutionContext, output_id: &str) -> Result<Value> {
        if output_id != "value" {
            return self.base.output_value_by_id(ctx, output_id);
        }

        let template: String = self.base.input_value(graph, ctx, "fmt")?;
        let args: Vec<Value> = self.base.input_group_value(graph, ctx, "input")?;
        Ok(Value::Str(format_template(&template, &args)))
    }
}

/// A small `%s`/`%d`/`%v`-style formatter: walks `template`, substituting
/// each `%<verb>` occurrence with the next positional argument rendered
/// via its natural string form. Unrecognized verbs and `%%` pass through
/// literally.
fn format_template(template: &str, args: &[Value]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    let mut arg_iter = args.iter();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }

        match chars.peek() {
            Some('%') => {
                chars.next();
                out.push('%');
            }
            Some('s') | Some('d') | Some('v') | Some('f') => {
                chars.next();
                match arg_iter.next() {
                    Some(value) => out.push_str(&render_value(value)),
                    None => out.push_str("%!(MISSING)"),
                }
            }
            _ => out.push('%'),
        }
    }

    out
}

fn render_value(value: &Value) -> String {
    match value {
        Value::Str(s) => s.clone(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        Value::Seq(_) | Value::Map(_) => format!("{value:?}"),
    }
}

pub fn register(registry: &mut NodeTypeRegistry) -> Result<()> {
    registry.register(DEFINITION, |def, id| {
        Ok(Arc::new(StringFmtNode {
            base: NodeBase::new(id, def.composite_key(), def.inputs.clone(), def.outputs.clone()),
        }) as Arc<dyn NodeKind>)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn graph_with(node: Arc<dyn NodeKind>) -> Graph {
        let mut nodes = HashMap::new();
        nodes.insert("n1".to_string(), node);
        Graph::from_parts(nodes, "n1".to_string())
    }

    #[test]
    fn formats_positional_args_in_order() {
        let mut registry = NodeTypeRegistry::new();
        register(&mut registry).unwrap();
        let (node, _) = registry.create("string-fmt@v1", "n1".into()).unwrap();
        node.base().set_input_value("fmt", Value::Str("%s is %d".into()));
        node.base()
            .set_input_value("input[0]", Value::Str("answer".into()));
        node.base().set_input_value("input[1]", Value::Int(42));

        let graph = graph_with(node.clone());
        let ctx = ExecutionContext::empty();
        let value = node.output_value_by_id(&graph, &ctx, "value").unwrap();
        assert_eq!(value, Value::Str("answer is 42".to_string()));
    }

    #[test]
    fn recomputes_fresh_after_input_changes() {
        let mut registry = NodeTypeRegistry::new();
        register(&mut registry).unwrap();
        let (node, _) = registry.create("string-fmt@v1", "n1".into()).unwrap();
        node.base().set_input_value("fmt", Value::Str("%s".into()));
        node.base().set_input_value("input[0]", Value::Str("a".into()));

        let graph = graph_with(node.clone());
        let ctx = ExecutionContext::empty();
        assert_eq!(
            node.output_value_by_id(&graph, &ctx, "value").unwrap(),
            Value::Str("a".to_string())
        );

        node.base().set_input_value("input[0]", Value::Str("b".into()));
        assert_eq!(
            node.output_value_by_id(&graph, &ctx, "value").unwrap(),
            Value::Str("b".to_string())
        );
    }
}
