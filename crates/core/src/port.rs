//! Port-type system and cross-type value coercion.

use std::collections::HashMap;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::value::Value;

/// A port's declared type tag. Unrecognized tags are kept verbatim and
/// matched by string equality against a value's runtime kind name, a
/// fallback for foreign, free-form types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortType {
    Bool,
    Number,
    Str,
    Any,
    Option,
    Sequence(Box<PortType>),
    Mapping(Box<PortType>),
    Custom(String),
}

impl PortType {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "bool" => PortType::Bool,
            "number" => PortType::Number,
            "string" => PortType::Str,
            "any" => PortType::Any,
            "option" => PortType::Option,
            _ if raw.starts_with("[]") => PortType::Sequence(Box::new(PortType::parse(&raw[2..]))),
            _ if raw.starts_with("map[") => {
                let close = raw.find(']').unwrap_or(raw.len());
                let value_ty = raw.get(close + 1..).unwrap_or("any");
                PortType::Mapping(Box::new(PortType::parse(value_ty)))
            }
            other => PortType::Custom(other.to_string()),
        }
    }

    pub fn as_str(&self) -> String {
        match self {
            PortType::Bool => "bool".to_string(),
            PortType::Number => "number".to_string(),
            PortType::Str => "string".to_string(),
            PortType::Any => "any".to_string(),
            PortType::Option => "option".to_string(),
            PortType::Sequence(elem) => format!("[]{}", elem.as_str()),
            PortType::Mapping(elem) => format!("map[string]{}", elem.as_str()),
            PortType::Custom(tag) => tag.clone(),
        }
    }
}

impl<'de> Deserialize<'de> for PortType {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(PortType::parse(&raw))
    }
}

impl Serialize for PortType {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputOption {
    pub name: String,
    #[serde(default)]
    pub value: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputDefinition {
    #[serde(rename = "type")]
    pub port_type: PortTypeOrEmpty,
    pub index: i64,
    pub name: String,
    pub group: bool,
    pub group_initial: i64,
    pub exec: bool,
    pub description: String,
    pub default: Option<Value>,
    pub required: bool,
    pub options: Vec<InputOption>,
    pub multiline: bool,
    pub hint: String,
    pub step: f64,
}

impl Default for InputDefinition {
    fn default() -> Self {
        Self {
            port_type: PortTypeOrEmpty(PortType::Any),
            index: 0,
            name: String::new(),
            group: false,
            group_initial: 0,
            exec: false,
            description: String::new(),
            default: None,
            required: false,
            options: Vec::new(),
            multiline: false,
            hint: String::new(),
            step: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub port_type: PortTypeOrEmpty,
    pub index: i64,
    pub group: bool,
    pub group_initial: i64,
    pub exec: bool,
    pub description: String,
    pub default: Option<Value>,
}

impl Default for OutputDefinition {
    fn default() -> Self {
        Self {
            name: String::new(),
            port_type: PortTypeOrEmpty(PortType::Any),
            index: 0,
            group: false,
            group_initial: 0,
            exec: false,
            description: String::new(),
            default: None,
        }
    }
}

/// Thin wrapper so `PortType` (which has no meaningful `Default`) can sit
/// inside a `#[serde(default)]` struct.
#[derive(Debug, Clone)]
pub struct PortTypeOrEmpty(pub PortType);

impl<'de> Deserialize<'de> for PortTypeOrEmpty {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        PortType::deserialize(deserializer).map(PortTypeOrEmpty)
    }
}

impl Serialize for PortTypeOrEmpty {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl std::ops::Deref for PortTypeOrEmpty {
    type Target = PortType;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Full node-type definition as embedded per kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeTypeDefinition {
    pub id: String,
    pub version: String,
    #[serde(default)]
    pub entry: bool,
    #[serde(default)]
    pub inputs: HashMap<String, InputDefinition>,
    #[serde(default)]
    pub outputs: HashMap<String, OutputDefinition>,
}

impl NodeTypeDefinition {
    pub fn composite_key(&self) -> String {
        format!("{}@v{}", self.id, self.version)
    }
}

/// Output-write validation. `any` rejects `Value::Null`.
pub fn validate_output_value(value: &Value, port_type: &PortType) -> bool {
    match port_type {
        PortType::Str => matches!(value, Value::Str(_)),
        PortType::Number => matches!(value, Value::Int(_) | Value::Float(_) | Value::Bool(_)),
        PortType::Bool => matches!(value, Value::Bool(_)),
        PortType::Any => !value.is_null(),
        PortType::Option => !value.is_null(),
        PortType::Sequence(elem) => match value {
            Value::Seq(items) => items.iter().all(|v| validate_output_value(v, elem)),
            _ => false,
        },
        PortType::Mapping(elem) => match value {
            Value::Map(entries) => entries.values().all(|v| validate_output_value(v, elem)),
            _ => false,
        },
        PortType::Custom(tag) => value.kind_name() == tag,
    }
}

/// Types an input can be coerced into on read: one trait impl per
/// requestable Rust type, in place of a generic reflection-based
/// conversion.
pub trait FromPortValue: Sized {
    fn from_value(value: &Value) -> Result<Self>;
}

fn coercion_error(from: &str, to: &str) -> anyhow::Error {
    EngineError::Coercion {
        from: from.to_string(),
        to: to.to_string(),
    }
    .into()
}

impl FromPortValue for bool {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Bool(b) => Ok(*b),
            Value::Int(i) => Ok(*i != 0),
            Value::Float(f) => Ok(*f != 0.0),
            Value::Str(s) => parse_bool(s.trim()).ok_or_else(|| coercion_error("string", "bool")),
            other => Err(coercion_error(other.kind_name(), "bool")),
        }
    }
}

/// `strconv.ParseBool`-equivalent: accepts `1`/`t`/`T`/`TRUE`/`true`/`True`
/// and `0`/`f`/`F`/`FALSE`/`false`/`False`, not just Rust's `true`/`false`.
fn parse_bool(s: &str) -> Option<bool> {
    match s {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

impl FromPortValue for i64 {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Bool(b) => Ok(if *b { 1 } else { 0 }),
            Value::Int(i) => Ok(*i),
            Value::Float(f) => Ok(*f as i64),
            Value::Str(s) => s
                .trim()
                .parse::<i64>()
                .map_err(|_| coercion_error("string", "integer")),
            other => Err(coercion_error(other.kind_name(), "integer")),
        }
    }
}

impl FromPortValue for f64 {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
            Value::Int(i) => Ok(*i as f64),
            Value::Float(f) => Ok(*f),
            Value::Str(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| coercion_error("string", "float")),
            other => Err(coercion_error(other.kind_name(), "float")),
        }
    }
}

impl FromPortValue for String {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Int(i) => Ok(i.to_string()),
            Value::Float(f) => Ok(format_float(*f)),
            Value::Str(s) => Ok(s.clone()),
            other => Err(coercion_error(other.kind_name(), "string")),
        }
    }
}

impl<T: FromPortValue> FromPortValue for Vec<T> {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Seq(items) => items.iter().map(T::from_value).collect(),
            other => Err(coercion_error(other.kind_name(), "sequence")),
        }
    }
}

impl FromPortValue for Value {
    fn from_value(value: &Value) -> Result<Self> {
        Ok(value.clone())
    }
}

fn format_float(f: f64) -> String {
    if f == f.trunc() && f.is_finite() {
        format!("{f:.0}")
    } else {
        f.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_recognizes_builtin_and_compound_tags() {
        assert_eq!(PortType::parse("bool"), PortType::Bool);
        assert_eq!(
            PortType::parse("[]string"),
            PortType::Sequence(Box::new(PortType::Str))
        );
        assert_eq!(
            PortType::parse("map[string]number"),
            PortType::Mapping(Box::new(PortType::Number))
        );
        assert_eq!(
            PortType::parse("VideoFrames"),
            PortType::Custom("VideoFrames".to_string())
        );
    }

    #[test]
    fn validate_output_value_matches_write_rules() {
        assert!(validate_output_value(&Value::Int(1), &PortType::Number));
        assert!(validate_output_value(&Value::Bool(true), &PortType::Number));
        assert!(!validate_output_value(&Value::Str("x".into()), &PortType::Number));
        assert!(!validate_output_value(&Value::Null, &PortType::Any));
        assert!(validate_output_value(&Value::Int(1), &PortType::Any));
        assert!(validate_output_value(
            &Value::Seq(vec![Value::Str("a".into())]),
            &PortType::Sequence(Box::new(PortType::Str))
        ));
        assert!(!validate_output_value(
            &Value::Seq(vec![Value::Int(1)]),
            &PortType::Sequence(Box::new(PortType::Str))
        ));
    }

    #[test]
    fn coercion_matrix_covers_common_pairs() {
        let v = Value::Int(42);
        assert_eq!(bool::from_value(&v).unwrap(), true);
        assert_eq!(i64::from_value(&v).unwrap(), 42);
        assert_eq!(String::from_value(&v).unwrap(), "42");
    }

    #[test]
    fn string_to_bool_accepts_parse_bool_forms() {
        for s in ["1", "t", "T", "TRUE", "true", "True"] {
            assert_eq!(bool::from_value(&Value::Str(s.to_string())).unwrap(), true, "{s}");
        }
        for s in ["0", "f", "F", "FALSE", "false", "False"] {
            assert_eq!(bool::from_value(&Value::Str(s.to_string())).unwrap(), false, "{s}");
        }
        assert!(bool::from_value(&Value::Str("yes".to_string())).is_err());
    }

    #[test]
    fn bool_does_not_coerce_to_string() {
        let err = String::from_value(&Value::Bool(true)).unwrap_err();
        assert_eq!(err.to_string(), "cannot coerce bool to string");
    }

    #[test]
    fn sequence_only_coerces_from_sequence() {
        let err = Vec::<String>::from_value(&Value::Int(1)).unwrap_err();
        assert_eq!(err.to_string(), "cannot coerce integer to sequence");
    }

    #[test]
    fn float_to_string_uses_default_format() {
        assert_eq!(String::from_value(&Value::Float(1.5)).unwrap(), "1.5");
        assert_eq!(String::from_value(&Value::Float(2.0)).unwrap(), "2");
    }
}
