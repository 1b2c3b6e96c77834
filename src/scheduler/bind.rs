// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 plumber contributors

//! Binding: resolve every action before anything runs

use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::sync::Arc;

use crate::contributors::{ContributorRegistry, StepContributor};
use crate::errors::{PlumberError, PlumberResult};
use crate::pipeline::{Action, ActionKind, Phase, PipelineSpec, PipelineValidator};
use crate::script::{Evaluator, Expr, ParamTemplate, Script, Segment};

/// Names a `${...}` parameter template may start from
pub const TEMPLATE_ROOTS: [&str; 6] = ["options", "env", "phase", "action", "pipeline", "currentResult"];

/// What an action runs once bound
pub(crate) enum Unit {
    Step {
        contributor: Arc<dyn StepContributor>,
        params: BTreeMap<String, ParamTemplate>,
    },
    Script(Arc<Script>),
}

pub(crate) struct BoundAction {
    /// Declaration index within the phase
    pub index: usize,
    pub action: Arc<Action>,
    pub unit: Unit,
}

pub(crate) struct BoundPhase {
    pub phase: Arc<Phase>,
    pub actions: Vec<Arc<BoundAction>>,
    pub width: usize,
}

/// A fully bound run
///
/// Main phases are validated, then bound, as a unit: the first failure
/// leaves none of them runnable. Clean is checked on its own so it can
/// still run.
pub struct ExecutionPlan {
    pub(crate) main: Result<Vec<BoundPhase>, PlumberError>,
    pub(crate) clean: Option<Result<BoundPhase, PlumberError>>,
}

impl ExecutionPlan {
    pub(crate) fn bind(
        spec: &PipelineSpec,
        registry: &ContributorRegistry,
        evaluator: &Evaluator,
    ) -> Self {
        let default = spec.run_options.concurrency;
        let main = spec
            .phases
            .iter()
            .try_for_each(PipelineValidator::validate_phase)
            .and_then(|()| {
                spec.phases
                    .iter()
                    .map(|phase| bind_phase(phase, default, registry, evaluator))
                    .collect::<PlumberResult<Vec<_>>>()
            });
        let clean = spec.clean.as_ref().map(|phase| {
            PipelineValidator::validate_phase(phase)?;
            bind_phase(phase, default, registry, evaluator)
        });

        Self { main, clean }
    }

    /// The first binding error, main phases before clean
    pub fn error(&self) -> Option<&PlumberError> {
        self.main
            .as_ref()
            .err()
            .or_else(|| self.clean.as_ref().and_then(|c| c.as_ref().err()))
    }

    /// Concurrency width of each bound phase, clean last
    pub fn widths(&self) -> Vec<(&str, usize)> {
        let main = self.main.as_deref().unwrap_or_default();
        main.iter()
            .chain(self.clean.iter().filter_map(|c| c.as_ref().ok()))
            .map(|p| (p.phase.name.as_str(), p.width))
            .collect()
    }
}

fn bind_phase(
    phase: &Phase,
    default: Option<NonZeroUsize>,
    registry: &ContributorRegistry,
    evaluator: &Evaluator,
) -> PlumberResult<BoundPhase> {
    let actions = phase
        .actions
        .iter()
        .enumerate()
        .map(|(index, action)| {
            let unit = bind_action(action, registry, evaluator)?;
            Ok(Arc::new(BoundAction {
                index,
                action: Arc::new(action.clone()),
                unit,
            }))
        })
        .collect::<PlumberResult<Vec<_>>>()?;

    tracing::debug!(phase = %phase.name, actions = actions.len(), "bound phase");

    Ok(BoundPhase {
        phase: Arc::new(phase.clone()),
        width: phase.width(default),
        actions,
    })
}

fn bind_action(action: &Action, registry: &ContributorRegistry, evaluator: &Evaluator) -> PlumberResult<Unit> {
    match &action.kind {
        ActionKind::NamedStep { reference, params } => {
            let contributor = registry.resolve(reference)?;
            let params = ParamTemplate::parse_map(params).map_err(|e| PlumberError::ScriptSyntax {
                action: action.name.clone(),
                line: e.position.line,
                column: e.position.column,
                message: e.message,
            })?;
            for template in params.values() {
                check_template_roots(&action.name, template)?;
            }
            Ok(Unit::Step { contributor, params })
        }
        ActionKind::InlineScript(inline) => {
            evaluator.bind(&action.name, &inline.script)?;
            Ok(Unit::Script(Arc::new(inline.script.clone())))
        }
    }
}

fn check_template_roots(action: &str, template: &ParamTemplate) -> PlumberResult<()> {
    for segment in template.segments() {
        if let Segment::Expr(expr) = segment {
            let root = root_name(expr);
            if let Some(root) = root.filter(|r| !TEMPLATE_ROOTS.contains(r)) {
                return Err(PlumberError::InvalidParam {
                    step: action.to_string(),
                    param: root.to_string(),
                    reason: format!(
                        "templates can only read {}",
                        TEMPLATE_ROOTS.join(", ")
                    ),
                });
            }
        }
    }
    Ok(())
}

fn root_name(expr: &Expr) -> Option<&str> {
    match expr {
        Expr::Ident(name, _) => Some(name.as_str()),
        Expr::Member { target, .. } => root_name(target),
        _ => None,
    }
}
