// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 plumber contributors

//! Running one phase: bounded fan-out, then a join barrier

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tokio::task::{AbortHandle, JoinHandle};

use super::bind::{BoundAction, BoundPhase, Unit};
use super::cancel::CancelSignal;
use crate::contributors::{StepContributor, StepInvocation};
use crate::errors::{PlumberError, PlumberResult};
use crate::log::{ActionLog, LogRef, LogSink};
use crate::outcome::{ActionResult, PhaseResult, Severity};
use crate::pipeline::{Phase, PropertySource};
use crate::script::{Evaluator, ParamTemplate, ScriptContext, ScriptOutcome, Value};

/// Logged once per phase that runs more than one action at a time
pub const CONCURRENCY_MARKER: &str = "Multiple phase actions running in parallel";

/// Shared, read-only state of one run
pub(crate) struct RunContext {
    pub evaluator: Arc<Evaluator>,
    pub log: Arc<dyn LogSink>,
    pub working_dir: PathBuf,
    pub env: BTreeMap<String, String>,
    pub options: Value,
    pub pipeline: Arc<dyn PropertySource>,
}

/// Outcome of a phase plus the first build-time error raised inside it
pub(crate) struct PhaseRun {
    pub result: PhaseResult,
    pub violation: Option<PlumberError>,
}

type ActionRun = (ActionResult, Option<PlumberError>);

pub(crate) async fn run_phase(run: &Arc<RunContext>, bound: &BoundPhase, cancel: &CancelSignal) -> PhaseRun {
    let name = bound.phase.name.clone();
    let source = LogRef::phase(&name);
    let mut cancel = cancel.clone();

    tracing::info!(phase = %name, width = bound.width, "starting phase");
    run.log.append(&source, &format!("Phase {}", name));
    if bound.width > 1 {
        run.log.append(
            &source,
            &format!("{} (up to {} at a time)", CONCURRENCY_MARKER, bound.width),
        );
    }

    let semaphore = Arc::new(Semaphore::new(bound.width.max(1)));
    let mut handles: Vec<(usize, JoinHandle<ActionRun>)> = Vec::with_capacity(bound.actions.len());
    let mut aborts: Vec<AbortHandle> = Vec::with_capacity(bound.actions.len());
    let mut cancelled = false;

    // Permits are taken in declaration order, so actions start in that order
    for action in &bound.actions {
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                cancelled = true;
                break;
            }
            permit = semaphore.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };

        tracing::debug!(phase = %name, action = %action.action.name, "spawning action");
        let task = run_action(run.clone(), bound.phase.clone(), action.clone());
        let handle = tokio::spawn(async move {
            let _permit = permit;
            task.await
        });
        aborts.push(handle.abort_handle());
        handles.push((action.index, handle));
    }

    if cancelled {
        abort_all(&aborts);
    }

    let mut slots: Vec<Option<ActionResult>> = vec![None; bound.actions.len()];
    let mut violation = None;

    // Join barrier: every spawned action settles before the phase does
    for (index, mut handle) in handles {
        let joined = if cancelled {
            (&mut handle).await
        } else {
            let raced = tokio::select! {
                joined = &mut handle => Some(joined),
                _ = cancel.cancelled() => None,
            };
            match raced {
                Some(joined) => joined,
                None => {
                    tracing::warn!(phase = %name, "cancellation requested, aborting running actions");
                    cancelled = true;
                    abort_all(&aborts);
                    handle.await
                }
            }
        };

        let action = &bound.actions[index].action.name;
        slots[index] = Some(match joined {
            Ok((result, error)) => {
                if let Some(error) = error {
                    violation.get_or_insert(error);
                }
                result
            }
            Err(e) if e.is_cancelled() => aborted(&name, action, "aborted by cancellation"),
            Err(e) => {
                tracing::error!(phase = %name, action = %action, error = %e, "action panicked");
                let message = format!("action panicked: {}", e);
                run.log.append(&LogRef::action(&name, action), &format!("ERROR: {}", message));
                ActionResult::new(action, Severity::Failure, LogRef::action(&name, action), Duration::ZERO)
                    .with_message(message)
            }
        });
    }

    let actions: Vec<ActionResult> = slots
        .into_iter()
        .zip(&bound.actions)
        .map(|(slot, action)| slot.unwrap_or_else(|| aborted(&name, &action.action.name, "not started: run was cancelled")))
        .collect();

    let result = PhaseResult::from_actions(&name, actions);
    tracing::info!(phase = %name, severity = %result.severity, "finished phase");
    run.log.append(&source, &format!("Phase {} finished: {}", name, result.severity));

    PhaseRun { result, violation }
}

fn abort_all(aborts: &[AbortHandle]) {
    for handle in aborts {
        handle.abort();
    }
}

fn aborted(phase: &str, action: &str, message: &str) -> ActionResult {
    ActionResult::new(action, Severity::Aborted, LogRef::action(phase, action), Duration::ZERO)
        .with_message(message)
}

async fn run_action(run: Arc<RunContext>, phase: Arc<Phase>, bound: Arc<BoundAction>) -> ActionRun {
    let action = bound.action.clone();
    let source = LogRef::action(&phase.name, &action.name);
    let log = ActionLog::new(run.log.clone(), source.clone());

    let mut env = run.env.clone();
    env.extend(action.env.clone());

    let phase_root: Arc<dyn PropertySource> = phase.clone();
    let action_root: Arc<dyn PropertySource> = action.clone();
    let mut ctx = ScriptContext::new(&action.name, env, log)
        .with_root("options", run.options.clone())
        .with_root("pipeline", Value::Object(run.pipeline.clone()))
        .with_root("phase", Value::Object(phase_root))
        .with_root("action", Value::Object(action_root))
        .with_working_dir(run.working_dir.clone());

    let start = Instant::now();
    let outcome = match &bound.unit {
        Unit::Step { contributor, params } => {
            run_step(&run.evaluator, contributor.as_ref(), params, &ctx).await
        }
        Unit::Script(script) => run.evaluator.run(script, &mut ctx).await,
    };
    let duration = start.elapsed();

    match outcome {
        Ok(ScriptOutcome { severity, message }) => {
            tracing::debug!(action = %action.name, %severity, "action finished");
            let result = ActionResult::new(&action.name, severity, source, duration);
            let result = match message {
                Some(message) => result.with_message(message),
                None => result,
            };
            (result, None)
        }
        Err(error) => {
            let message = error.to_string();
            tracing::warn!(action = %action.name, error = %message, "action failed");
            ctx.log.line(&format!("ERROR: {}", message));
            let result = ActionResult::new(&action.name, Severity::Failure, source, duration).with_message(&message);
            let violation = error.is_build_time().then_some(error);
            (result, violation)
        }
    }
}

async fn run_step(
    evaluator: &Evaluator,
    contributor: &dyn StepContributor,
    params: &BTreeMap<String, ParamTemplate>,
    ctx: &ScriptContext,
) -> PlumberResult<ScriptOutcome> {
    let params = evaluator.render_params(params, ctx)?;
    let severity = contributor
        .run(StepInvocation {
            action: &ctx.action,
            params: &params,
            env: &ctx.env,
            log: &ctx.log,
            working_dir: &ctx.working_dir,
        })
        .await?;
    Ok(ScriptOutcome {
        severity,
        message: None,
    })
}
