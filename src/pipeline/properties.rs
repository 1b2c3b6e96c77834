// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 plumber contributors

//! Read-only property bridge into the pipeline model
//!
//! Templated values and inline scripts can read a fixed set of named
//! properties from the model, e.g. `${phase.name}`. Nothing here can be
//! invoked; lookups take no arguments and have no side effects.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::pipeline::{Action, ActionKind, Phase, PipelineSpec};
use crate::script::Value;

/// A model object exposing named, no-argument properties
pub trait PropertySource: Send + Sync {
    /// Name shown when the object is printed or rejected
    fn type_name(&self) -> &'static str;

    /// Names that [`PropertySource::property`] answers
    fn property_names(&self) -> &'static [&'static str];

    /// Look up a property by name
    fn property(&self, name: &str) -> Option<Value>;
}

impl PropertySource for PipelineSpec {
    fn type_name(&self) -> &'static str {
        "Pipeline"
    }

    fn property_names(&self) -> &'static [&'static str] {
        &["options", "phases", "clean"]
    }

    fn property(&self, name: &str) -> Option<Value> {
        match name {
            "options" => Some(Value::Map(
                self.options
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::from(v)))
                    .collect(),
            )),
            "phases" => Some(Value::List(
                self.phases.iter().map(|p| Value::str(p.name.clone())).collect(),
            )),
            "clean" => Some(
                self.clean
                    .as_ref()
                    .map(|c| Value::str(c.name.clone()))
                    .unwrap_or(Value::Null),
            ),
            _ => None,
        }
    }
}

impl PropertySource for Phase {
    fn type_name(&self) -> &'static str {
        "Phase"
    }

    fn property_names(&self) -> &'static [&'static str] {
        &["name", "concurrency", "actions"]
    }

    fn property(&self, name: &str) -> Option<Value> {
        match name {
            "name" => Some(Value::str(self.name.clone())),
            "concurrency" => Some(
                self.concurrency
                    .map(|c| Value::Int(c.get() as i64))
                    .unwrap_or(Value::Null),
            ),
            "actions" => Some(Value::List(
                self.actions.iter().map(|a| Value::str(a.name.clone())).collect(),
            )),
            _ => None,
        }
    }
}

impl PropertySource for Action {
    fn type_name(&self) -> &'static str {
        "Action"
    }

    fn property_names(&self) -> &'static [&'static str] {
        &["name", "kind", "step", "env"]
    }

    fn property(&self, name: &str) -> Option<Value> {
        match name {
            "name" => Some(Value::str(self.name.clone())),
            "kind" => Some(Value::str(self.kind_name())),
            "step" => Some(match &self.kind {
                ActionKind::NamedStep { reference, .. } => Value::str(reference.clone()),
                ActionKind::InlineScript(_) => Value::Null,
            }),
            "env" => Some(Value::from_env(&self.env)),
            _ => None,
        }
    }
}

/// Snapshot of every readable property, used by `plumber validate --verbose`
pub fn describe(source: &Arc<dyn PropertySource>) -> BTreeMap<&'static str, Value> {
    source
        .property_names()
        .iter()
        .filter_map(|name| source.property(name).map(|v| (*name, v)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> PipelineSpec {
        PipelineSpec::from_yaml(
            r#"
options:
  retries: 2
phases:
  - name: build
    concurrency: 2
    actions:
      - name: compile
        action: shell
        params:
          script: make
      - name: lint
        pipeline: echo 'lint'
        env:
          STRICT: "1"
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_phase_properties() {
        let spec = spec();
        let phase = &spec.phases[0];
        assert_eq!(phase.property("name"), Some(Value::str("build")));
        assert_eq!(phase.property("concurrency"), Some(Value::Int(2)));
        assert_eq!(
            phase.property("actions").unwrap().to_string(),
            "[compile, lint]"
        );
        assert_eq!(phase.property("getClass"), None);
    }

    #[test]
    fn test_action_and_pipeline_properties() {
        let spec = spec();
        let compile = &spec.phases[0].actions[0];
        assert_eq!(compile.property("step"), Some(Value::str("shell")));
        assert_eq!(compile.property("kind"), Some(Value::str("step")));

        let lint = &spec.phases[0].actions[1];
        assert_eq!(lint.property("step"), Some(Value::Null));
        assert_eq!(lint.property("env").unwrap().to_string(), "[STRICT:1]");

        assert_eq!(spec.property("options").unwrap().to_string(), "[retries:2]");
        assert_eq!(spec.property("clean"), Some(Value::Null));
    }

    #[test]
    fn test_describe_lists_every_property() {
        let spec = spec();
        let phase: Arc<dyn PropertySource> = Arc::new(spec.phases[0].clone());
        let props = describe(&phase);
        assert_eq!(props.len(), 3);
        assert_eq!(props["name"], Value::str("build"));
    }
}
