// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 plumber contributors

//! Step contributors
//!
//! A step contributor is a named implementation that actions invoke with
//! `action: <name>`. The registry is filled once at start-up and handed to
//! the scheduler; nothing is discovered at run time.

mod echo;
mod shell;
mod sleep;

pub use echo::EchoParamsContributor;
pub use shell::ShellContributor;
pub use sleep::SleepContributor;

use async_trait::async_trait;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, OnceLock};

use crate::errors::{PlumberError, PlumberResult};
use crate::log::ActionLog;
use crate::outcome::Severity;
use crate::pipeline::is_reserved;
use crate::script::{is_builtin, Value};

/// Everything a contributor gets for one invocation
pub struct StepInvocation<'a> {
    /// Name of the action running the step
    pub action: &'a str,
    /// Parameters, with templates already rendered
    pub params: &'a BTreeMap<String, Value>,
    /// Merged environment
    pub env: &'a BTreeMap<String, String>,
    /// This action's log
    pub log: &'a ActionLog,
    pub working_dir: &'a Path,
}

impl StepInvocation<'_> {
    /// Optional string parameter
    pub fn str_param(&self, step: &str, key: &str) -> PlumberResult<Option<&str>> {
        match self.params.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Str(s)) => Ok(Some(s)),
            Some(other) => Err(PlumberError::InvalidParam {
                step: step.to_string(),
                param: key.to_string(),
                reason: format!("expected a string, got {}", other),
            }),
        }
    }

    /// Required string parameter
    pub fn required_str(&self, step: &str, key: &str) -> PlumberResult<&str> {
        self.str_param(step, key)?.ok_or_else(|| PlumberError::InvalidParam {
            step: step.to_string(),
            param: key.to_string(),
            reason: "missing required parameter".into(),
        })
    }

    /// Optional boolean parameter
    pub fn bool_param(&self, step: &str, key: &str) -> PlumberResult<bool> {
        match self.params.get(key) {
            None | Some(Value::Null) => Ok(false),
            Some(Value::Bool(b)) => Ok(*b),
            Some(Value::Str(s)) if s == "true" || s == "false" => Ok(s == "true"),
            Some(other) => Err(PlumberError::InvalidParam {
                step: step.to_string(),
                param: key.to_string(),
                reason: format!("expected true or false, got {}", other),
            }),
        }
    }
}

/// Trait for step contributors
#[async_trait]
pub trait StepContributor: Send + Sync {
    /// Unique name used by `action:` references
    fn name(&self) -> &str;

    /// One-line summary for `plumber contributors`
    fn description(&self) -> &str {
        ""
    }

    /// Run the step
    ///
    /// `Ok` carries the step's outcome. `Err` is reported as a failure of the
    /// action, or of the whole run when the error is build-time.
    async fn run(&self, invocation: StepInvocation<'_>) -> PlumberResult<Severity>;
}

/// Name to implementation map, populated once and then read-only
#[derive(Default, Clone)]
pub struct ContributorRegistry {
    contributors: BTreeMap<String, Arc<dyn StepContributor>>,
}

impl ContributorRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the built-in contributors
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        let defaults: Vec<Arc<dyn StepContributor>> = vec![
            Arc::new(EchoParamsContributor),
            Arc::new(ShellContributor::new()),
            Arc::new(SleepContributor),
        ];
        for contributor in defaults {
            let registered = registry.register_arc(contributor);
            if let Err(e) = &registered {
                tracing::error!(error = %e, "built-in contributor was not registered");
            }
            debug_assert!(registered.is_ok(), "built-in contributors must register");
        }
        registry
    }

    /// Register a contributor under its own name
    pub fn register<C: StepContributor + 'static>(&mut self, contributor: C) -> PlumberResult<()> {
        self.register_arc(Arc::new(contributor))
    }

    pub fn register_arc(&mut self, contributor: Arc<dyn StepContributor>) -> PlumberResult<()> {
        let name = contributor.name().to_string();
        if name.trim().is_empty() || is_reserved(&name) || is_builtin(&name) {
            return Err(PlumberError::InvalidParam {
                step: name,
                param: "name".into(),
                reason: "contributor names must not be empty or shadow Pipeline built-ins".into(),
            });
        }
        if self.contributors.contains_key(&name) {
            return Err(PlumberError::DuplicateContributor { name });
        }
        tracing::debug!(contributor = %name, "registered step contributor");
        self.contributors.insert(name, contributor);
        Ok(())
    }

    /// Find a contributor by name
    pub fn lookup(&self, name: &str) -> Option<Arc<dyn StepContributor>> {
        self.contributors.get(name).cloned()
    }

    /// Find a contributor or fail with the list of known names
    pub fn resolve(&self, name: &str) -> PlumberResult<Arc<dyn StepContributor>> {
        self.lookup(name)
            .ok_or_else(|| PlumberError::unknown_contributor(name, &self.names()))
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        self.contributors.keys().map(|s| s.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn StepContributor>> {
        self.contributors.values()
    }

    pub fn len(&self) -> usize {
        self.contributors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contributors.is_empty()
    }

    /// Names that inline scripts can call directly
    pub fn script_callable(&self) -> impl Iterator<Item = &str> {
        self.names().into_iter().filter(|n| is_identifier(n))
    }
}

fn is_identifier(name: &str) -> bool {
    static IDENT: OnceLock<Regex> = OnceLock::new();
    IDENT
        .get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier pattern"))
        .is_match(name)
}
