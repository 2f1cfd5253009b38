//! Node base state and the per-kind execution trait.
//!
//! Rust has no struct embedding, so the `Inputs` + `Outputs` + `Executions`
//! capability split collapses into one [`NodeBase`] that every node kind
//! holds by composition, paired with a [`NodeKind`] trait object for the
//! per-kind logic that would otherwise live on an embedding struct.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::Result;

use crate::context::{BranchId, ExecutionContext};
use crate::error::EngineError;
use crate::graph::Graph;
use crate::port::{validate_output_value, FromPortValue, InputDefinition, OutputDefinition, PortType};
use crate::value::Value;

pub type NodeId = String;
pub type PortId = String;

/// The upstream side of an incoming data connection.
#[derive(Debug, Clone)]
pub struct EdgeSource {
    pub src_node: NodeId,
    pub src_output: PortId,
}

/// Shared state every node instance carries regardless of kind: its
/// declared ports, any user-set input overrides, the incoming-edge table,
/// the per-branch output store, and the outgoing execution-edge table.
pub struct NodeBase {
    pub id: NodeId,
    pub type_tag: String,
    pub input_defs: HashMap<String, InputDefinition>,
    pub output_defs: HashMap<String, OutputDefinition>,
    input_values: RwLock<HashMap<PortId, Value>>,
    incoming_edges: RwLock<HashMap<PortId, EdgeSource>>,
    output_values: RwLock<HashMap<BranchId, HashMap<PortId, Value>>>,
    executions: RwLock<HashMap<PortId, Option<NodeId>>>,
}

impl NodeBase {
    pub fn new(
        id: impl Into<NodeId>,
        type_tag: impl Into<String>,
        input_defs: HashMap<String, InputDefinition>,
        output_defs: HashMap<String, OutputDefinition>,
    ) -> Self {
        Self {
            id: id.into(),
            type_tag: type_tag.into(),
            input_defs,
            output_defs,
            input_values: RwLock::new(HashMap::new()),
            incoming_edges: RwLock::new(HashMap::new()),
            output_values: RwLock::new(HashMap::new()),
            executions: RwLock::new(HashMap::new()),
        }
    }

    // ---- inputs ----

    pub fn connect_port(&self, dst_input: &str, src: EdgeSource) {
        self.incoming_edges
            .write()
            .expect("incoming edges lock poisoned")
            .insert(dst_input.to_string(), src);
    }

    pub fn set_input_value(&self, input_id: &str, value: Value) {
        self.input_values
            .write()
            .expect("input values lock poisoned")
            .insert(input_id.to_string(), value);
    }

    /// Resolves the raw dynamic value for `input_id`, walking the four
    /// steps in order: incoming connection, user override, declared
    /// default, canonical zero value. `group_id` is the owning group's id
    /// when resolving one member of a sub-port group, so default lookup
    /// falls back to the group's own default rather than the sub-port's.
    pub fn raw_input_value(
        &self,
        graph: &Graph,
        ctx: &ExecutionContext,
        input_id: &str,
        group_id: Option<&str>,
    ) -> Result<Value> {
        let edge = self
            .incoming_edges
            .read()
            .expect("incoming edges lock poisoned")
            .get(input_id)
            .cloned();

        if let Some(edge) = edge {
            let src = graph.node(&edge.src_node)?;
            let raw = src.output_value_by_id(graph, ctx, &edge.src_output)?;
            let def = self.resolve_input_def(group_id.unwrap_or(input_id))?;
            if matches!(*def.port_type, PortType::Option) {
                return coerce_option(&raw, def);
            }
            return Ok(raw);
        }

        if let Some(value) = self
            .input_values
            .read()
            .expect("input values lock poisoned")
            .get(input_id)
        {
            if !value.is_null() {
                return Ok(value.clone());
            }
        }

        let def = self.resolve_input_def(group_id.unwrap_or(input_id))?;
        if let Some(default) = &def.default {
            return Ok(default.clone());
        }

        if let Some(zero) = zero_value(&def.port_type) {
            return Ok(zero);
        }

        Err(EngineError::NoInputValue {
            input: input_id.to_string(),
        }
        .into())
    }

    pub fn input_value<T: FromPortValue>(
        &self,
        graph: &Graph,
        ctx: &ExecutionContext,
        input_id: &str,
    ) -> Result<T> {
        let raw = self.raw_input_value(graph, ctx, input_id, None)?;
        T::from_value(&raw)
    }

    /// Collects every `<input_id>[k]` sub-port currently set, sorted
    /// lexicographically by the whole sub-port id string (a string sort,
    /// not a numeric one), coerced element-wise to `T`.
    pub fn input_group_value<T: FromPortValue>(
        &self,
        graph: &Graph,
        ctx: &ExecutionContext,
        input_id: &str,
    ) -> Result<Vec<T>> {
        let def = self.resolve_input_def(input_id)?;
        if !def.group {
            return Err(EngineError::NotAGroup(input_id.to_string()).into());
        }

        let mut keys: Vec<String> = Vec::new();
        {
            let values = self.input_values.read().expect("input values lock poisoned");
            let edges = self.incoming_edges.read().expect("incoming edges lock poisoned");
            for key in values.keys().chain(edges.keys()) {
                if let Some((base, _)) = parse_subport(key) {
                    if base == input_id && !keys.contains(key) {
                        keys.push(key.clone());
                    }
                }
            }
        }
        keys.sort();

        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            let raw = self.raw_input_value(graph, ctx, &key, Some(input_id))?;
            out.push(T::from_value(&raw)?);
        }
        Ok(out)
    }

    fn resolve_input_def(&self, id: &str) -> Result<&InputDefinition> {
        self.input_defs
            .get(id)
            .ok_or_else(|| EngineError::UnknownPort(id.to_string()).into())
    }

    // ---- outputs ----

    /// Validates and stores `value` for `output_id` under the context's
    /// current branch. Falls back to matching a sub-port id's base output
    /// definition for group outputs.
    pub fn set_output_value(&self, ctx: &ExecutionContext, output_id: &str, value: Value) -> Result<()> {
        let def = self.resolve_output_def(output_id)?;
        if !validate_output_value(&value, &def.port_type) {
            return Err(EngineError::TypeMismatch {
                expected: def.port_type.as_str(),
                actual: value.kind_name().to_string(),
            }
            .into());
        }

        let mut store = self.output_values.write().expect("output values lock poisoned");
        store
            .entry(ctx.current_branch().to_string())
            .or_default()
            .insert(output_id.to_string(), value);
        Ok(())
    }

    /// Walks the context's ancestor stack (current branch first) and
    /// returns the first stored value for `output_id`. Popped branches are
    /// never evicted; only dropping the whole `Graph` clears this.
    pub fn output_value_by_id(&self, ctx: &ExecutionContext, output_id: &str) -> Result<Value> {
        let store = self.output_values.read().expect("output values lock poisoned");
        for branch in ctx.ancestors_to_root() {
            if let Some(map) = store.get(&branch) {
                if let Some(value) = map.get(output_id) {
                    return Ok(value.clone());
                }
            }
        }
        Err(EngineError::NoOutputValue(output_id.to_string()).into())
    }

    fn resolve_output_def(&self, output_id: &str) -> Result<&OutputDefinition> {
        if let Some(def) = self.output_defs.get(output_id) {
            return Ok(def);
        }
        if let Some((base, _)) = parse_subport(output_id) {
            if let Some(def) = self.output_defs.get(base) {
                return Ok(def);
            }
        }
        Err(EngineError::UnknownPort(output_id.to_string()).into())
    }

    // ---- execution edges ----

    pub fn set_execution(&self, output_id: &str, target: Option<NodeId>) {
        self.executions
            .write()
            .expect("executions lock poisoned")
            .insert(output_id.to_string(), target);
    }

    pub fn execution_target(&self, output_id: &str) -> Option<NodeId> {
        self.executions
            .read()
            .expect("executions lock poisoned")
            .get(output_id)
            .cloned()
            .flatten()
    }
}

/// Parses the `name[k]` sub-port convention. Kept as plain string slicing
/// rather than a regex dependency for one fixed shape.
pub fn parse_subport(id: &str) -> Option<(&str, u64)> {
    let open = id.find('[')?;
    if !id.ends_with(']') {
        return None;
    }
    let base = &id[..open];
    if base.is_empty() {
        return None;
    }
    let index_str = &id[open + 1..id.len() - 1];
    index_str.parse::<u64>().ok().map(|index| (base, index))
}

fn zero_value(port_type: &PortType) -> Option<Value> {
    match port_type {
        PortType::Str => Some(Value::Str(String::new())),
        PortType::Number => Some(Value::Int(0)),
        PortType::Bool => Some(Value::Bool(false)),
        PortType::Sequence(_) => Some(Value::Seq(Vec::new())),
        PortType::Mapping(_) => Some(Value::Map(HashMap::new())),
        PortType::Any | PortType::Option | PortType::Custom(_) => None,
    }
}

/// The `option` port type's read-time special case: a string
/// is trimmed as-is; an integer is treated as an index into the input
/// definition's declared options list.
fn coerce_option(value: &Value, def: &InputDefinition) -> Result<Value> {
    match value {
        Value::Str(s) => Ok(Value::Str(s.trim().to_string())),
        Value::Int(i) => {
            let index = *i;
            if index < 0 || index as usize >= def.options.len() {
                return Err(EngineError::Coercion {
                    from: "integer".to_string(),
                    to: "option".to_string(),
                }
                .into());
            }
            Ok(Value::Str(def.options[index as usize].name.clone()))
        }
        other => Ok(other.clone()),
    }
}

/// Per-kind execution logic, composed onto a [`NodeBase`] rather than
/// inherited from it.
pub trait NodeKind: Send + Sync {
    fn base(&self) -> &NodeBase;

    /// Looks up a value this node has published for `output_id`. The
    /// default reads whatever a prior `execute` stored; purely computed
    /// node kinds with no execution edges (e.g. a string-format node)
    /// override this to recompute fresh on every pull instead.
    fn output_value_by_id(&self, _graph: &Graph, ctx: &ExecutionContext, output_id: &str) -> Result<Value> {
        self.base().output_value_by_id(ctx, output_id)
    }

    /// Runs this node's logic for one invocation within `ctx`. Only
    /// called for kinds reachable via an execution edge; the default
    /// fails loudly so a malformed graph wiring a pure node into the
    /// execution chain doesn't fail silently.
    fn execute(&self, _graph: &Graph, _ctx: &ExecutionContext) -> Result<()> {
        Err(anyhow::anyhow!(
            "node '{}' has no executable body",
            self.base().id
        ))
    }

    /// Entry-node capability. Non-entry kinds keep the
    /// default, which only runs if a malformed graph document names them
    /// as the entry despite not being registered as entry-capable.
    fn execute_entry(&self, _graph: &Graph, _env: HashMap<String, String>) -> Result<()> {
        Err(anyhow::anyhow!(
            "node '{}' is not an entry node",
            self.base().id
        ))
    }
}
