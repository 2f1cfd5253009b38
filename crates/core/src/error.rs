//! Engine error taxonomy.
//!
//! Call sites thread `anyhow::Result` end to end, the way the rest of this
//! crate does; `EngineError` is the small plain enum that gets wrapped into
//! an `anyhow::Error` at the point a specific kind needs to be raised, and
//! downcast back out of one where the CLI driver needs to map a failure to
//! an exit code.

use std::fmt;

#[derive(Debug)]
pub enum EngineError {
    UnknownType(String),
    DuplicateType(String),
    DuplicatePortIndex { node_type: String, port: String },
    UnresolvedReference(String),
    NoInputValue { input: String },
    TypeMismatch { expected: String, actual: String },
    Coercion { from: String, to: String },
    UnknownPort(String),
    NotAGroup(String),
    NoOutputValue(String),
    NodeExecution { node: String },
    Cancelled,
    Aggregate(Vec<anyhow::Error>),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::UnknownType(t) => write!(f, "unknown node type '{t}'"),
            EngineError::DuplicateType(t) => write!(f, "node definition '{t}' already registered"),
            EngineError::DuplicatePortIndex { node_type, port } => write!(
                f,
                "duplicate port index in '{node_type}' at '{port}'"
            ),
            EngineError::UnresolvedReference(id) => {
                write!(f, "referenced node '{id}' does not exist")
            }
            EngineError::NoInputValue { input } => {
                write!(f, "no value for input '{input}'")
            }
            EngineError::TypeMismatch { expected, actual } => {
                write!(f, "type mismatch: expected {expected}, got {actual}")
            }
            EngineError::Coercion { from, to } => {
                write!(f, "cannot coerce {from} to {to}")
            }
            EngineError::UnknownPort(port) => write!(f, "unknown port '{port}'"),
            EngineError::NotAGroup(input) => write!(f, "input '{input}' is not a group input"),
            EngineError::NoOutputValue(output) => write!(f, "no value for output '{output}'"),
            EngineError::NodeExecution { node } => {
                write!(f, "node '{node}' execution failed")
            }
            EngineError::Cancelled => write!(f, "execution was cancelled"),
            EngineError::Aggregate(errors) => {
                write!(f, "{} branch(es) failed:", errors.len())?;
                for err in errors {
                    write!(f, " [{err:#}]")?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for EngineError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displays_readable_messages() {
        assert_eq!(
            EngineError::UnknownType("foo@v1".into()).to_string(),
            "unknown node type 'foo@v1'"
        );
        assert_eq!(
            EngineError::Coercion {
                from: "bool".into(),
                to: "sequence".into()
            }
            .to_string(),
            "cannot coerce bool to sequence"
        );
    }
}
