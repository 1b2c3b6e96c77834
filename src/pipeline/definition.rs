// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 plumber contributors

//! Pipeline model
//!
//! The typed form of a pipeline document. Built by the translator, checked by
//! the validator, then shared read-only by the scheduler.

use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::path::Path;

use crate::errors::PlumberResult;
use crate::pipeline::document::{load_document, parse_document, DocumentFormat};
use crate::pipeline::translate::translate;
use crate::script::Script;

/// A validated pipeline: global options, ordered phases and a clean section
#[derive(Debug, Clone)]
pub struct PipelineSpec {
    /// Free-form options, kept exactly as written
    pub options: serde_json::Map<String, serde_json::Value>,

    /// Options the engine itself understands
    pub run_options: RunOptions,

    /// Phases in execution order
    pub phases: Vec<Phase>,

    /// Finalizer phase, run after the main phases
    pub clean: Option<Phase>,
}

impl PipelineSpec {
    /// Load and translate a pipeline document
    pub fn from_file(path: &Path, format: Option<DocumentFormat>) -> PlumberResult<Self> {
        translate(&load_document(path, format)?)
    }

    /// Parse and translate YAML text
    pub fn from_yaml(yaml: &str) -> PlumberResult<Self> {
        translate(&parse_document(yaml, DocumentFormat::Yaml)?)
    }

    /// Get all main phase names
    pub fn phase_names(&self) -> Vec<&str> {
        self.phases.iter().map(|p| p.name.as_str()).collect()
    }

    /// Main phases followed by the clean section
    pub fn all_phases(&self) -> impl Iterator<Item = &Phase> {
        self.phases.iter().chain(self.clean.iter())
    }

    pub fn action_count(&self) -> usize {
        self.all_phases().map(|p| p.actions.len()).sum()
    }
}

/// Options read from the `options` mapping
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// `options.env`: exported to every action
    pub env: BTreeMap<String, String>,

    /// `options.concurrency`: cap for phases that declare none
    pub concurrency: Option<NonZeroUsize>,
}

/// A named stage of the run
#[derive(Debug, Clone)]
pub struct Phase {
    /// Phase name (unique within the pipeline)
    pub name: String,

    /// Actions in declaration order
    pub actions: Vec<Action>,

    /// Maximum number of actions running at once; `None` means unlimited
    pub concurrency: Option<NonZeroUsize>,
}

impl Phase {
    /// Number of actions allowed to run at once
    pub fn width(&self, default: Option<NonZeroUsize>) -> usize {
        let total = self.actions.len();
        match self.concurrency.or(default) {
            Some(limit) => limit.get().min(total),
            None => total,
        }
    }
}

/// A unit of work within a phase
#[derive(Debug, Clone)]
pub struct Action {
    /// Action name (unique within its phase)
    pub name: String,

    /// What the action runs
    pub kind: ActionKind,

    /// Extra environment, layered over `options.env`
    pub env: BTreeMap<String, String>,
}

impl Action {
    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            ActionKind::NamedStep { .. } => "step",
            ActionKind::InlineScript(_) => "pipeline",
        }
    }

    pub fn inline_script(&self) -> Option<&InlineScript> {
        match &self.kind {
            ActionKind::InlineScript(script) => Some(script),
            ActionKind::NamedStep { .. } => None,
        }
    }
}

/// Exactly one of: a registered step, or inline script code
#[derive(Debug, Clone)]
pub enum ActionKind {
    NamedStep {
        /// Contributor name
        reference: String,
        /// Parameters passed to the contributor
        params: serde_json::Map<String, serde_json::Value>,
    },
    InlineScript(InlineScript),
}

/// Inline script text with its parsed form
#[derive(Debug, Clone)]
pub struct InlineScript {
    pub source: String,
    pub script: Script,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn phase(actions: usize, concurrency: Option<usize>) -> Phase {
        Phase {
            name: "p".into(),
            actions: (0..actions)
                .map(|i| Action {
                    name: format!("a{}", i),
                    kind: ActionKind::NamedStep {
                        reference: "echoParams".into(),
                        params: Default::default(),
                    },
                    env: BTreeMap::new(),
                })
                .collect(),
            concurrency: concurrency.and_then(NonZeroUsize::new),
        }
    }

    #[test]
    fn test_phase_width() {
        assert_eq!(phase(3, None).width(None), 3);
        assert_eq!(phase(3, Some(1)).width(None), 1);
        assert_eq!(phase(2, Some(5)).width(None), 2);
        assert_eq!(phase(4, None).width(NonZeroUsize::new(2)), 2);
        assert_eq!(phase(4, Some(3)).width(NonZeroUsize::new(2)), 3);
    }

    #[test]
    fn test_from_yaml_builds_model() {
        let spec = PipelineSpec::from_yaml(
            r#"
options:
  env:
    FOO: bar
phases:
  - name: build
    actions:
      - name: hello
        pipeline: echo 'hello'
clean:
  actions:
    - name: tidy
      action: echoParams
"#,
        )
        .unwrap();

        assert_eq!(spec.phase_names(), vec!["build"]);
        assert_eq!(spec.run_options.env.get("FOO").unwrap(), "bar");
        assert_eq!(spec.action_count(), 2);
        assert_eq!(spec.all_phases().last().unwrap().name, "clean");
        let hello = &spec.phases[0].actions[0];
        assert_eq!(hello.name, "hello");
        assert_eq!(hello.kind_name(), "pipeline");
        assert!(hello.inline_script().is_some());
    }
}
