//! Reference node library: a minimal set of concrete kinds
//! sufficient to exercise the engine end to end and give the CLI driver
//! something to run against. These are deliberately thin — real node
//! bodies (shell steps, container runs, branching) are application
//! concerns layered on top of this crate, not part of it.

pub mod branch;
pub mod const_node;
pub mod for_loop;
pub mod negate;
pub mod parallel_for;
pub mod print;
pub mod start;
pub mod string_fmt;

use anyhow::Result;

use crate::registry::NodeTypeRegistry;

/// Registers every reference node kind. Not called implicitly — an
/// embedder registers only the kinds it actually wants available to
/// graph documents it loads.
pub fn register_all_nodes(registry: &mut NodeTypeRegistry) -> Result<()> {
    const_node::register(registry)?;
    string_fmt::register(registry)?;
    branch::register(registry)?;
    negate::register(registry)?;
    for_loop::register(registry)?;
    parallel_for::register(registry)?;
    print::register(registry)?;
    start::register(registry)?;
    Ok(())
}
