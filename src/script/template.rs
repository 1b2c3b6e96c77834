// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 plumber contributors

//! Templated step parameters
//!
//! String parameters may contain `${...}` expressions. They are parsed once,
//! before the run starts, and rendered for each invocation.

use std::collections::BTreeMap;

use super::lexer::ParseError;
use super::parser::{parse_template, Segment};
use super::value::Value;

/// A parameter value with its templates parsed
#[derive(Debug, Clone, PartialEq)]
pub enum ParamTemplate {
    /// Used as-is
    Value(Value),
    /// Text containing at least one `${...}`
    Text(Vec<Segment>),
    List(Vec<ParamTemplate>),
    Map(BTreeMap<String, ParamTemplate>),
}

impl ParamTemplate {
    /// Parse every string in a document value
    pub fn parse(value: &serde_json::Value) -> Result<Self, ParseError> {
        match value {
            serde_json::Value::String(s) if s.contains("${") => Ok(Self::Text(parse_template(s)?)),
            serde_json::Value::Array(items) => items
                .iter()
                .map(Self::parse)
                .collect::<Result<Vec<_>, _>>()
                .map(Self::List),
            serde_json::Value::Object(map) => Self::parse_map(map).map(Self::Map),
            other => Ok(Self::Value(Value::from(other))),
        }
    }

    pub fn parse_map(
        map: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<BTreeMap<String, Self>, ParseError> {
        map.iter()
            .map(|(k, v)| Ok((k.clone(), Self::parse(v)?)))
            .collect()
    }

    /// Whether rendering needs an evaluator
    pub fn is_templated(&self) -> bool {
        match self {
            Self::Value(_) => false,
            Self::Text(_) => true,
            Self::List(items) => items.iter().any(Self::is_templated),
            Self::Map(map) => map.values().any(Self::is_templated),
        }
    }

    /// Every embedded expression, for bind-time checks
    pub fn segments(&self) -> Vec<&Segment> {
        match self {
            Self::Value(_) => vec![],
            Self::Text(segments) => segments.iter().collect(),
            Self::List(items) => items.iter().flat_map(Self::segments).collect(),
            Self::Map(map) => map.values().flat_map(Self::segments).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_only_interpolated_strings_are_templates() {
        let parsed = ParamTemplate::parse(&json!({
            "plain": "no templates",
            "count": 3,
            "greeting": "hello ${phase.name}",
            "nested": ["${action.name}", "x"]
        }))
        .unwrap();

        match &parsed {
            ParamTemplate::Map(map) => {
                assert_eq!(map["plain"], ParamTemplate::Value(Value::str("no templates")));
                assert_eq!(map["count"], ParamTemplate::Value(Value::Int(3)));
                assert!(map["greeting"].is_templated());
                assert!(map["nested"].is_templated());
                assert!(!map["plain"].is_templated());
            }
            other => panic!("expected a map, got {:?}", other),
        }
        assert_eq!(parsed.segments().len(), 3);
    }

    #[test]
    fn test_bad_template_is_reported() {
        assert!(ParamTemplate::parse(&json!("oops ${phase.")).is_err());
    }
}
