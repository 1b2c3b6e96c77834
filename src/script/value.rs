// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 plumber contributors

//! Runtime values for inline scripts and templated parameters

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::outcome::Severity;
use crate::pipeline::PropertySource;
use crate::sandbox::Receiver;

/// A value seen by inline script code
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Severity(Severity),
    /// Part of the pipeline model, readable only through named properties
    Object(Arc<dyn PropertySource>),
}

impl Value {
    pub fn str(s: impl Into<String>) -> Self {
        Self::Str(s.into())
    }

    /// Receiver kind used by the allow-list
    pub fn receiver(&self) -> Receiver {
        match self {
            Self::Null => Receiver::Null,
            Self::Bool(_) | Self::Int(_) | Self::Float(_) => Receiver::Scalar,
            Self::Str(_) => Receiver::Text,
            Self::List(_) => Receiver::List,
            Self::Map(_) => Receiver::Map,
            Self::Severity(_) => Receiver::Severity,
            Self::Object(_) => Receiver::Model,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(l) => Some(l),
            _ => None,
        }
    }

    /// Convert a string-keyed map of strings, e.g. an environment
    pub fn from_env(env: &BTreeMap<String, String>) -> Self {
        Self::Map(
            env.iter()
                .map(|(k, v)| (k.clone(), Value::str(v.clone())))
                .collect(),
        )
    }
}

impl From<&serde_json::Value> for Value {
    fn from(v: &serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Float(n.as_f64().unwrap_or_default()),
            },
            serde_json::Value::String(s) => Self::Str(s.clone()),
            serde_json::Value::Array(items) => Self::List(items.iter().map(Value::from).collect()),
            serde_json::Value::Object(map) => Self::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), Value::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Map(a), Self::Map(b)) => a == b,
            (Self::Severity(a), Self::Severity(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

// Groovy-style rendering: `[a, b]` for lists, `[k:v]` for maps
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{}", x),
            Self::Str(s) => write!(f, "{}", s),
            Self::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Self::Map(map) if map.is_empty() => write!(f, "[:]"),
            Self::Map(map) => {
                write!(f, "[")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}:{}", k, v)?;
                }
                write!(f, "]")
            }
            Self::Severity(s) => write!(f, "{}", s),
            Self::Object(o) => write!(f, "{}", o.type_name()),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => write!(f, "{:?}", s),
            Self::Object(o) => write!(f, "<{}>", o.type_name()),
            other => write!(f, "{}", other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_groovy_rendering() {
        let v = Value::from(&json!({"echo": "nested"}));
        assert_eq!(v.to_string(), "[echo:nested]");

        let v = Value::from(&json!(["a", 1, true]));
        assert_eq!(v.to_string(), "[a, 1, true]");

        assert_eq!(Value::Map(BTreeMap::new()).to_string(), "[:]");
        assert_eq!(Value::Null.to_string(), "null");
    }

    #[test]
    fn test_receiver_kinds() {
        assert_eq!(Value::str("x").receiver(), Receiver::Text);
        assert_eq!(Value::List(vec![]).receiver(), Receiver::List);
        assert_eq!(Value::Severity(Severity::Failure).receiver(), Receiver::Severity);
    }
}
