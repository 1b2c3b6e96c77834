// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 plumber contributors

//! Pipeline scheduler
//!
//! Runs the main phases in order, each as a bounded fan-out of its actions
//! followed by a join barrier. A fatal phase stops the main sequence; the
//! clean phase always runs last, even after cancellation.

mod bind;
mod cancel;
mod phase;

pub use bind::{ExecutionPlan, TEMPLATE_ROOTS};
pub use cancel::{cancel_pair, CancelHandle, CancelSignal};
pub use phase::CONCURRENCY_MARKER;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use crate::contributors::ContributorRegistry;
use crate::errors::PlumberError;
use crate::log::{LogRef, LogSink};
use crate::outcome::{PhaseResult, RunResult, Severity};
use crate::pipeline::{translate, PipelineSpec, PropertySource};
use crate::sandbox::AllowList;
use crate::script::{Evaluator, Value};

use phase::{run_phase, RunContext};

/// Pipeline scheduler
pub struct Scheduler {
    registry: Arc<ContributorRegistry>,
    evaluator: Arc<Evaluator>,
    log: Arc<dyn LogSink>,
    working_dir: PathBuf,
}

impl Scheduler {
    /// Create a scheduler writing its build log to `log`
    pub fn new(registry: Arc<ContributorRegistry>, allow_list: Arc<AllowList>, log: Arc<dyn LogSink>) -> Self {
        let evaluator = Arc::new(Evaluator::new(allow_list, &registry));
        Self {
            registry,
            evaluator,
            log,
            working_dir: PathBuf::from("."),
        }
    }

    /// Directory that step contributors run in
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = dir.into();
        self
    }

    /// Resolve every action of `spec` without running anything
    pub fn bind(&self, spec: &PipelineSpec) -> ExecutionPlan {
        ExecutionPlan::bind(spec, &self.registry, &self.evaluator)
    }

    /// Translate a loaded document and execute it
    ///
    /// A document that does not translate is reported as a failed run with
    /// the translation error as its reason.
    pub async fn execute_document(&self, document: &serde_json::Value, cancel: CancelSignal) -> RunResult {
        let start = Instant::now();
        match translate(document) {
            Ok(spec) => self.execute_with_cancel(&spec, cancel).await,
            Err(e) => self.reject(e, start),
        }
    }

    /// Execute a pipeline to completion
    pub async fn execute(&self, spec: &PipelineSpec) -> RunResult {
        self.execute_with_cancel(spec, CancelSignal::never()).await
    }

    /// Execute a pipeline, stopping early if `cancel` fires
    pub async fn execute_with_cancel(&self, spec: &PipelineSpec, cancel: CancelSignal) -> RunResult {
        let start = Instant::now();
        let root = LogRef::run();
        let plan = self.bind(spec);
        let run = Arc::new(RunContext {
            evaluator: self.evaluator.clone(),
            log: self.log.clone(),
            working_dir: self.working_dir.clone(),
            env: spec.run_options.env.clone(),
            options: Value::from(&serde_json::Value::Object(spec.options.clone())),
            pipeline: Arc::new(spec.clone()) as Arc<dyn PropertySource>,
        });

        let mut phases: Vec<PhaseResult> = Vec::new();
        let mut skipped: Vec<String> = Vec::new();
        let mut failure: Option<PlumberError> = None;

        match &plan.main {
            Err(e) => {
                tracing::error!(error = %e, "binding failed, main phases will not run");
                self.log.append(&root, &e.to_string());
                failure = Some(e.clone());
                skipped = spec.phase_names().into_iter().map(String::from).collect();
            }
            Ok(bound) => {
                for (i, phase) in bound.iter().enumerate() {
                    if cancel.is_cancelled() {
                        skipped.extend(bound[i..].iter().map(|p| p.phase.name.clone()));
                        break;
                    }

                    let outcome = run_phase(&run, phase, &cancel).await;
                    let fatal = outcome.result.severity.is_fatal();
                    if let Some(violation) = outcome.violation {
                        failure.get_or_insert(violation);
                    }
                    phases.push(outcome.result);

                    if fatal {
                        skipped.extend(bound[i + 1..].iter().map(|p| p.phase.name.clone()));
                        break;
                    }
                }
            }
        }

        if !skipped.is_empty() {
            tracing::warn!(phases = ?skipped, "skipping phases");
            self.log
                .append(&root, &format!("Skipping phases: {}", skipped.join(", ")));
        }

        let clean = match &plan.clean {
            None => None,
            Some(Ok(bound)) => {
                let outcome = run_phase(&run, bound, &CancelSignal::never()).await;
                if let Some(violation) = outcome.violation {
                    failure.get_or_insert(violation);
                }
                Some(outcome.result)
            }
            Some(Err(e)) => {
                tracing::error!(error = %e, "binding failed for the clean phase");
                self.log.append(&root, &e.to_string());
                failure.get_or_insert(e.clone());
                None
            }
        };

        let mut result = RunResult::new(
            phases,
            clean,
            skipped,
            failure.map(|e| e.to_string()),
            start.elapsed(),
        );
        if cancel.is_cancelled() {
            self.log.append(&root, "Run was cancelled");
            result.severity = result.severity.combine(Severity::Aborted);
        }
        tracing::info!(severity = %result.severity, "run finished");
        self.log.append(&root, &format!("Finished: {}", result.severity));
        result
    }

    fn reject(&self, error: PlumberError, start: Instant) -> RunResult {
        tracing::error!(error = %error, "pipeline rejected");
        let root = LogRef::run();
        self.log.append(&root, &error.to_string());
        let result = RunResult::rejected(error.to_string(), start.elapsed());
        self.log.append(&root, &format!("Finished: {}", result.severity));
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::MemoryLog;

    fn scheduler(log: &Arc<MemoryLog>) -> Scheduler {
        Scheduler::new(
            Arc::new(ContributorRegistry::with_defaults()),
            Arc::new(AllowList::default()),
            log.clone(),
        )
    }

    #[tokio::test]
    async fn test_single_phase_success() {
        let spec = PipelineSpec::from_yaml(
            r#"
phases:
  - name: build
    actions:
      - name: greet
        pipeline: echo 'hello'
"#,
        )
        .unwrap();
        let log = Arc::new(MemoryLog::new());
        let result = scheduler(&log).execute(&spec).await;

        assert_eq!(result.severity, Severity::Success);
        assert_eq!(log.lines_for("build", "greet"), vec!["hello"]);
        assert!(!log.contains(CONCURRENCY_MARKER));
    }

    #[tokio::test]
    async fn test_reserved_steps_skip_main_but_clean_runs() {
        let spec = PipelineSpec::from_yaml(
            r#"
phases:
  - name: build
    actions:
      - name: bad
        pipeline: node { echo 'x' }
clean:
  actions:
    - name: tidy
      pipeline: echo 'tidy'
"#,
        )
        .unwrap();
        let log = Arc::new(MemoryLog::new());
        let result = scheduler(&log).execute(&spec).await;

        assert_eq!(result.severity, Severity::Failure);
        assert_eq!(
            result.failure_reason.as_deref(),
            Some("Illegal Pipeline steps used in inline Pipeline - node")
        );
        assert_eq!(
            log.lines()[0],
            "Illegal Pipeline steps used in inline Pipeline - node"
        );
        assert!(result.phases.is_empty());
        assert_eq!(result.skipped, vec!["build"]);
        assert_eq!(result.clean.as_ref().unwrap().severity, Severity::Success);
        assert_eq!(log.lines_for("clean", "tidy"), vec!["tidy"]);
    }

    #[tokio::test]
    async fn test_templated_params_render_from_model() {
        let spec = PipelineSpec::from_yaml(
            r#"
options:
  target: prod
phases:
  - name: deploy
    actions:
      - name: show
        action: echoParams
        params:
          where: "${options.target} from ${phase.name}/${action.name}"
"#,
        )
        .unwrap();
        let log = Arc::new(MemoryLog::new());
        let result = scheduler(&log).execute(&spec).await;

        assert_eq!(result.severity, Severity::Success);
        assert!(log.contains("echoing where == prod from deploy/show"));
    }

    #[tokio::test]
    async fn test_cancel_before_start_skips_main_but_runs_clean() {
        let spec = PipelineSpec::from_yaml(
            r#"
phases:
  - name: build
    actions:
      - name: a
        pipeline: echo 'a'
clean:
  actions:
    - name: tidy
      pipeline: echo 'tidy'
"#,
        )
        .unwrap();
        let log = Arc::new(MemoryLog::new());
        let (handle, signal) = cancel_pair();
        handle.cancel();

        let result = scheduler(&log).execute_with_cancel(&spec, signal).await;
        assert_eq!(result.severity, Severity::Aborted);
        assert_eq!(result.skipped, vec!["build"]);
        assert!(result.phases.is_empty());
        assert_eq!(result.clean.as_ref().unwrap().severity, Severity::Success);
        assert!(log.contains("tidy"));
    }
}
