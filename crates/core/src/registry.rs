//! Node-type registry: type definitions + factories keyed by composite
//! `"<id>@v<version>"` id.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::error::EngineError;
use crate::node::{NodeId, NodeKind};
use crate::port::NodeTypeDefinition;

type MakeNode = dyn Fn(&NodeTypeDefinition, NodeId) -> Result<Arc<dyn NodeKind>> + Send + Sync;
type MakeParametricNode = dyn Fn(&str, NodeId) -> Result<Arc<dyn NodeKind>> + Send + Sync;

struct Registration {
    definition: NodeTypeDefinition,
    make: Box<MakeNode>,
}

/// Populated at startup via [`NodeTypeRegistry::register`], then read-only
/// for the rest of the process's life once the loader starts calling
/// [`NodeTypeRegistry::create`].
#[derive(Default)]
pub struct NodeTypeRegistry {
    entries: HashMap<String, Registration>,
    parametric: Option<Box<MakeParametricNode>>,
}

impl NodeTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a node kind from its embedded YAML type definition.
    /// Scales every declared port index x128 so each port
    /// owns 128 sub-port slots, and rejects a definition that reuses a
    /// declared index within its own inputs or within its own outputs.
    pub fn register<F>(&mut self, definition_yaml: &str, make: F) -> Result<()>
    where
        F: Fn(&NodeTypeDefinition, NodeId) -> Result<Arc<dyn NodeKind>> + Send + Sync + 'static,
    {
        let mut definition: NodeTypeDefinition = serde_yaml::from_str(definition_yaml)
            .context("failed to parse embedded node type definition")?;

        scale_port_indices(&mut definition)?;

        let key = definition.composite_key();
        if self.entries.contains_key(&key) {
            return Err(EngineError::DuplicateType(key).into());
        }

        self.entries.insert(
            key,
            Registration {
                definition,
                make: Box::new(make),
            },
        );
        Ok(())
    }

    /// Registers the distinguished factory for parametric, URL-identified
    /// node types (e.g. `github.com/owner/repo@ref`), detected by a `/` in
    /// the id portion rather than a composite-key lookup.
    pub fn register_parametric<F>(&mut self, make: F)
    where
        F: Fn(&str, NodeId) -> Result<Arc<dyn NodeKind>> + Send + Sync + 'static,
    {
        self.parametric = Some(Box::new(make));
    }

    /// Instantiates a node of `type_tag` with id `node_id`. Returns
    /// whether the type is registered as entry-capable alongside the
    /// instance, so the graph loader can validate the declared entry node
    /// without the `NodeKind` trait itself needing an is-entry probe.
    pub fn create(&self, type_tag: &str, node_id: NodeId) -> Result<(Arc<dyn NodeKind>, bool)> {
        if is_parametric_type(type_tag) {
            let make = self
                .parametric
                .as_ref()
                .ok_or_else(|| EngineError::UnknownType(type_tag.to_string()))?;
            let node = make(type_tag, node_id)?;
            return Ok((node, false));
        }

        let registration = self
            .entries
            .get(type_tag)
            .ok_or_else(|| EngineError::UnknownType(type_tag.to_string()))?;
        let node = (registration.make)(&registration.definition, node_id)?;
        Ok((node, registration.definition.entry))
    }

    pub fn list_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }
}

/// A `/` before the last `@` marks a parametric, URL-identified type
/// (`github.com/owner/repo@ref`) rather than a registered `id@vversion`.
fn is_parametric_type(type_tag: &str) -> bool {
    let id_part = type_tag.rsplit_once('@').map(|(id, _)| id).unwrap_or(type_tag);
    id_part.contains('/')
}

fn scale_port_indices(definition: &mut NodeTypeDefinition) -> Result<()> {
    let mut seen_inputs = HashMap::new();
    for (name, input) in definition.inputs.iter_mut() {
        if let Some(prev) = seen_inputs.insert(input.index, name.clone()) {
            return Err(EngineError::DuplicatePortIndex {
                node_type: definition.composite_key(),
                port: format!("{prev} / {name}"),
            }
            .into());
        }
        input.index *= 128;
    }

    let mut seen_outputs = HashMap::new();
    for (name, output) in definition.outputs.iter_mut() {
        if let Some(prev) = seen_outputs.insert(output.index, name.clone()) {
            return Err(EngineError::DuplicatePortIndex {
                node_type: definition.composite_key(),
                port: format!("{prev} / {name}"),
            }
            .into());
        }
        output.index *= 128;
    }

    Ok(())
}
