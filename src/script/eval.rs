// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 plumber contributors

//! Inline script evaluation
//!
//! The evaluator is built with a fixed set of callable bindings: the
//! built-in steps below plus the script-callable contributors of the registry
//! it was created from. [`Evaluator::bind`] rejects any other call before the
//! script runs; member accesses are checked against the allow-list as they
//! are evaluated.

use std::collections::BTreeMap;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;

use crate::contributors::{ContributorRegistry, StepContributor, StepInvocation};
use crate::errors::{PlumberError, PlumberResult};
use crate::log::ActionLog;
use crate::outcome::Severity;
use crate::sandbox::{Access, AllowList, Operation};

use super::parser::{Arg, Expr, Script, Segment, Statement};
use super::template::ParamTemplate;
use super::value::Value;

/// Steps every inline script can call
pub const BUILTINS: [&str; 5] = ["echo", "withEnv", "error", "unstable", "setResult"];

/// Whether `name` is a built-in script step
pub fn is_builtin(name: &str) -> bool {
    BUILTINS.contains(&name)
}

fn builtin_operation(name: &str) -> Option<Operation> {
    match name {
        "echo" => Some(Operation::TextOutput),
        "withEnv" => Some(Operation::EnvCompose),
        "error" | "unstable" => Some(Operation::SignalResult),
        "setResult" => Some(Operation::SeverityFromString),
        _ => None,
    }
}

/// Mutable state of one running action
pub struct ScriptContext {
    pub action: String,
    pub env: BTreeMap<String, String>,
    /// Read-only roots: `options`, `params`, `phase`, `action`
    pub roots: BTreeMap<String, Value>,
    pub log: ActionLog,
    pub working_dir: PathBuf,
    severity: Severity,
}

impl ScriptContext {
    pub fn new(action: impl Into<String>, env: BTreeMap<String, String>, log: ActionLog) -> Self {
        Self {
            action: action.into(),
            env,
            roots: BTreeMap::new(),
            log,
            working_dir: PathBuf::from("."),
            severity: Severity::Success,
        }
    }

    pub fn with_root(mut self, name: &str, value: Value) -> Self {
        self.roots.insert(name.to_string(), value);
        self
    }

    pub fn with_working_dir(mut self, dir: PathBuf) -> Self {
        self.working_dir = dir;
        self
    }

    /// Severity accumulated so far
    pub fn severity(&self) -> Severity {
        self.severity
    }

    fn lookup(&self, name: &str) -> Option<Value> {
        match name {
            "env" => Some(Value::from_env(&self.env)),
            "currentResult" => Some(Value::Severity(self.severity)),
            _ => self.roots.get(name).cloned(),
        }
    }
}

/// How an inline script finished
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptOutcome {
    pub severity: Severity,
    pub message: Option<String>,
}

type BlockFuture<'a> = Pin<Box<dyn Future<Output = PlumberResult<()>> + Send + 'a>>;

/// Capability-bound script evaluator
#[derive(Clone)]
pub struct Evaluator {
    allow_list: Arc<AllowList>,
    steps: BTreeMap<String, Arc<dyn StepContributor>>,
}

impl Evaluator {
    /// Bind the built-ins and every script-callable contributor
    pub fn new(allow_list: Arc<AllowList>, registry: &ContributorRegistry) -> Self {
        let steps = registry
            .script_callable()
            .filter_map(|name| registry.lookup(name).map(|c| (name.to_string(), c)))
            .collect();
        Self { allow_list, steps }
    }

    /// Check every call in `script` against the bindings
    pub fn bind(&self, action: &str, script: &Script) -> PlumberResult<()> {
        for (name, position) in script.call_names() {
            let op = match builtin_operation(name) {
                Some(op) => op,
                None if self.steps.contains_key(name) => Operation::RunStep,
                None => {
                    return Err(PlumberError::security_violation(format!(
                        "calling '{}' (action '{}', line {})",
                        name, action, position
                    )))
                }
            };
            self.allow_list.check(op, &format!("calling '{}'", name))?;
        }
        Ok(())
    }

    /// Run a bound script
    ///
    /// Run-time problems become a FAILURE outcome; `Err` is only returned for
    /// build-time errors such as security violations.
    pub async fn run(&self, script: &Script, ctx: &mut ScriptContext) -> PlumberResult<ScriptOutcome> {
        match self.exec_block(&script.statements, ctx).await {
            Ok(()) => Ok(ScriptOutcome {
                severity: ctx.severity,
                message: None,
            }),
            Err(e) if e.is_build_time() => Err(e),
            Err(e) => {
                let message = e.to_string();
                ctx.log.line(&format!("ERROR: {}", message));
                Ok(ScriptOutcome {
                    severity: Severity::Failure,
                    message: Some(message),
                })
            }
        }
    }

    fn exec_block<'a>(&'a self, statements: &'a [Statement], ctx: &'a mut ScriptContext) -> BlockFuture<'a> {
        Box::pin(async move {
            for statement in statements {
                self.exec_statement(statement, ctx).await?;
            }
            Ok(())
        })
    }

    async fn exec_statement(&self, statement: &Statement, ctx: &mut ScriptContext) -> PlumberResult<()> {
        let name = statement.name.as_str();
        let op = match builtin_operation(name) {
            Some(op) => op,
            None if self.steps.contains_key(name) => Operation::RunStep,
            None => {
                return Err(PlumberError::security_violation(format!("calling '{}'", name)));
            }
        };
        self.allow_list.check(op, &format!("calling '{}'", name))?;

        if statement.block.is_some() && name != "withEnv" {
            return Err(script_error(format!("'{}' does not take a block", name)));
        }

        let (positional, named) = self.eval_args(&statement.args, ctx)?;

        match name {
            "echo" => {
                let text = single_arg(name, positional, &named)?;
                ctx.log.line(&text.to_string());
            }
            "error" => {
                let text = single_arg(name, positional, &named)?;
                return Err(script_error(text.to_string()));
            }
            "unstable" => {
                let text = single_arg(name, positional, &named)?;
                ctx.log.line(&format!("WARNING: {}", text));
                ctx.severity = ctx.severity.combine(Severity::Unstable);
            }
            "setResult" => {
                let text = single_arg(name, positional, &named)?;
                let severity: Severity = text.to_string().parse()?;
                ctx.severity = ctx.severity.combine(severity);
            }
            "withEnv" => {
                let overrides = env_overrides(single_arg(name, positional, &named)?)?;
                let block = statement
                    .block
                    .as_deref()
                    .ok_or_else(|| script_error("'withEnv' needs a block"))?;

                let saved = ctx.env.clone();
                ctx.env.extend(overrides);
                let result = self.exec_block(block, ctx).await;
                ctx.env = saved;
                result?;
            }
            _ => self.call_step(name, positional, named, ctx).await?,
        }
        Ok(())
    }

    async fn call_step(
        &self,
        name: &str,
        positional: Vec<Value>,
        named: BTreeMap<String, Value>,
        ctx: &mut ScriptContext,
    ) -> PlumberResult<()> {
        let contributor = self
            .steps
            .get(name)
            .cloned()
            .ok_or_else(|| PlumberError::security_violation(format!("calling '{}'", name)))?;

        let params = match (positional.len(), named.is_empty()) {
            (0, _) => named,
            (1, true) => match positional.into_iter().next() {
                Some(Value::Map(map)) => map,
                _ => return Err(script_error(format!("'{}' takes named parameters", name))),
            },
            _ => return Err(script_error(format!("'{}' takes named parameters", name))),
        };

        let severity = contributor
            .run(StepInvocation {
                action: &ctx.action,
                params: &params,
                env: &ctx.env,
                log: &ctx.log,
                working_dir: &ctx.working_dir,
            })
            .await?;

        ctx.severity = ctx.severity.combine(severity);
        if severity.is_fatal() {
            return Err(PlumberError::StepFailed {
                step: name.to_string(),
                error: format!("finished with {}", severity),
                help: None,
            });
        }
        Ok(())
    }

    fn eval_args(
        &self,
        args: &[Arg],
        ctx: &ScriptContext,
    ) -> PlumberResult<(Vec<Value>, BTreeMap<String, Value>)> {
        let mut positional = Vec::new();
        let mut named = BTreeMap::new();
        for arg in args {
            match arg {
                Arg::Positional(expr) => positional.push(self.eval(expr, ctx)?),
                Arg::Named(key, expr) => {
                    named.insert(key.clone(), self.eval(expr, ctx)?);
                }
            }
        }
        Ok((positional, named))
    }

    /// Evaluate an expression
    pub fn eval(&self, expr: &Expr, ctx: &ScriptContext) -> PlumberResult<Value> {
        match expr {
            Expr::Str(s) => Ok(Value::Str(s.clone())),
            Expr::Int(i) => Ok(Value::Int(*i)),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Null => Ok(Value::Null),
            Expr::Template(segments) => Ok(Value::Str(self.render(segments, ctx)?)),
            Expr::Ident(name, position) => ctx
                .lookup(name)
                .ok_or_else(|| script_error(format!("No such property: {} at {}", name, position))),
            Expr::List(items) => items
                .iter()
                .map(|e| self.eval(e, ctx))
                .collect::<PlumberResult<Vec<_>>>()
                .map(Value::List),
            Expr::Map(entries) => entries
                .iter()
                .map(|(k, e)| Ok((k.clone(), self.eval(e, ctx)?)))
                .collect::<PlumberResult<BTreeMap<_, _>>>()
                .map(Value::Map),
            Expr::Member {
                target,
                name,
                args,
                ..
            } => {
                let receiver = self.eval(target, ctx)?;
                let access = match args {
                    Some(a) => Access::Call(a.len()),
                    None => Access::Property,
                };
                // Resolve before evaluating arguments so a rejected call has no effects
                let op = self
                    .allow_list
                    .resolve_member(receiver.receiver(), name, access)?;
                let args = args
                    .as_deref()
                    .unwrap_or_default()
                    .iter()
                    .map(|e| self.eval(e, ctx))
                    .collect::<PlumberResult<Vec<_>>>()?;
                apply(op, receiver, name, args)
            }
        }
    }

    /// Render interpolated text
    pub fn render(&self, segments: &[Segment], ctx: &ScriptContext) -> PlumberResult<String> {
        let mut out = String::new();
        for segment in segments {
            match segment {
                Segment::Literal(s) => out.push_str(s),
                Segment::Expr(e) => out.push_str(&self.eval(e, ctx)?.to_string()),
            }
        }
        Ok(out)
    }

    /// Render templated step parameters
    pub fn render_params(
        &self,
        params: &BTreeMap<String, ParamTemplate>,
        ctx: &ScriptContext,
    ) -> PlumberResult<BTreeMap<String, Value>> {
        params
            .iter()
            .map(|(k, p)| Ok((k.clone(), self.render_param(p, ctx)?)))
            .collect()
    }

    fn render_param(&self, param: &ParamTemplate, ctx: &ScriptContext) -> PlumberResult<Value> {
        match param {
            ParamTemplate::Value(v) => Ok(v.clone()),
            ParamTemplate::Text(segments) => Ok(Value::Str(self.render(segments, ctx)?)),
            ParamTemplate::List(items) => items
                .iter()
                .map(|p| self.render_param(p, ctx))
                .collect::<PlumberResult<Vec<_>>>()
                .map(Value::List),
            ParamTemplate::Map(map) => self.render_params(map, ctx).map(Value::Map),
        }
    }
}

fn script_error(message: impl Into<String>) -> PlumberError {
    PlumberError::ScriptError {
        message: message.into(),
    }
}

fn single_arg(name: &str, positional: Vec<Value>, named: &BTreeMap<String, Value>) -> PlumberResult<Value> {
    if !named.is_empty() || positional.len() != 1 {
        return Err(script_error(format!("'{}' takes exactly one argument", name)));
    }
    Ok(positional.into_iter().next().unwrap_or_default())
}

/// `['A=b', 'C=d']` or `[A: 'b']`
fn env_overrides(value: Value) -> PlumberResult<BTreeMap<String, String>> {
    match value {
        Value::List(items) => items
            .iter()
            .map(|item| {
                let text = item.to_string();
                match text.split_once('=') {
                    Some((k, v)) if !k.is_empty() => Ok((k.to_string(), v.to_string())),
                    _ => Err(script_error(format!(
                        "withEnv entries must look like NAME=value, got '{}'",
                        text
                    ))),
                }
            })
            .collect(),
        Value::Map(map) => Ok(map.into_iter().map(|(k, v)| (k, v.to_string())).collect()),
        other => Err(script_error(format!("withEnv expects a list, got {}", other))),
    }
}

fn severity_arg(value: &Value) -> PlumberResult<Severity> {
    match value {
        Value::Severity(s) => Ok(*s),
        Value::Str(s) => s.parse(),
        other => Err(script_error(format!("expected a result, got {}", other))),
    }
}

fn apply(op: Operation, receiver: Value, member: &str, args: Vec<Value>) -> PlumberResult<Value> {
    let mut args = args.into_iter();
    match (op, receiver) {
        (Operation::MapGet, Value::Map(map)) => Ok(map.get(member).cloned().unwrap_or_default()),
        (Operation::MapContainsKey, Value::Map(map)) => {
            let key = args.next().unwrap_or_default().to_string();
            Ok(Value::Bool(map.contains_key(&key)))
        }
        (Operation::CollectionIsEmpty, Value::Map(map)) => Ok(Value::Bool(map.is_empty())),
        (Operation::CollectionIsEmpty, Value::List(list)) => Ok(Value::Bool(list.is_empty())),
        (Operation::CollectionSize, Value::Map(map)) => Ok(Value::Int(map.len() as i64)),
        (Operation::CollectionSize, Value::List(list)) => Ok(Value::Int(list.len() as i64)),
        (Operation::ListAppend, Value::List(mut list)) => {
            list.extend(args.next());
            Ok(Value::List(list))
        }
        (Operation::MapPutAll, Value::Map(mut map)) => match args.next() {
            Some(Value::Map(other)) => {
                map.extend(other);
                Ok(Value::Map(map))
            }
            other => Err(script_error(format!(
                "Map.plus() expects a map, got {}",
                other.unwrap_or_default()
            ))),
        },
        (Operation::SeverityCompare, Value::Severity(s)) => {
            let other = severity_arg(&args.next().unwrap_or_default())?;
            Ok(Value::Bool(s.is_better_than(other)))
        }
        (Operation::SeverityCombine, Value::Severity(s)) => {
            let other = severity_arg(&args.next().unwrap_or_default())?;
            Ok(Value::Severity(s.combine(other)))
        }
        (Operation::PropertyRead, Value::Object(object)) => object.property(member).ok_or_else(|| {
            PlumberError::security_violation(format!("{}.{}", object.type_name(), member))
        }),
        (op, receiver) => Err(PlumberError::security_violation(format!(
            "{:?} on {}",
            op,
            receiver.receiver()
        ))),
    }
}
